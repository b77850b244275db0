// src/units/gif.rs

//! Image dimensions from the GIF logical screen descriptor.
//!
//! ```text
//! offset  size
//!      0     6  "GIF87a" or "GIF89a"
//!      6     2  width, little-endian
//!      8     2  height, little-endian
//!     10     1  packed: bits 0..3 are the global color table size - 1
//! ```
//!
//! The stream is peeked, never changed.

use crate::analyzers::units::{TransformUnit, TransformUnitFactory, UnitFactory};
use crate::data::analysisresult::SinkHandle;
use crate::data::fieldregister::{FieldP, FieldRegister};
use crate::readers::bytesource::{peek_bytes, ByteSource};

use ::si_trace_print::{defn, defx};

pub const NAME_GIF: &str = "GifTransformUnit";

pub const FIELD_WIDTH: &str = "width";
pub const FIELD_HEIGHT: &str = "height";
pub const FIELD_COLORDEPTH: &str = "colorDepth";
pub const TYPE_RASTER_IMAGE: &str = "RasterImage";

const GIF_HEADER_SZ: usize = 12;

/// Dimensions of a GIF header.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GifInfo {
    pub width: u16,
    pub height: u16,
    pub color_depth: u8,
}

/// Parse the start of a GIF stream. `None` if `buf` is not one.
pub fn parse_gif_header(buf: &[u8]) -> Option<GifInfo> {
    if buf.len() < GIF_HEADER_SZ
        || &buf[..4] != b"GIF8"
        || buf[5] != b'a'
        || (buf[4] != b'7' && buf[4] != b'9')
    {
        return None;
    }

    Some(GifInfo {
        width: u16::from_le_bytes([buf[6], buf[7]]),
        height: u16::from_le_bytes([buf[8], buf[9]]),
        color_depth: (buf[10] & 0x07) + 1,
    })
}

pub struct GifTransformUnit {
    width_field: FieldP,
    height_field: FieldP,
    colordepth_field: FieldP,
    type_field: FieldP,
    sink: Option<SinkHandle>,
}

impl TransformUnit for GifTransformUnit {
    fn name(&self) -> &str {
        NAME_GIF
    }

    fn set_indexable(&mut self, sink: Option<SinkHandle>) {
        self.sink = sink;
    }

    fn connect_input_stream<'b>(
        &mut self,
        mut input: Box<dyn ByteSource + 'b>,
    ) -> Box<dyn ByteSource + 'b> {
        defn!();
        let sink = match self.sink.as_ref() {
            Some(val) => val,
            None => {
                defx!("not bound");
                return input;
            }
        };
        let buf = match peek_bytes(input.as_mut(), GIF_HEADER_SZ) {
            Ok(val) => val,
            Err(_err) => {
                defx!("peek failed {}", _err);
                return input;
            }
        };
        if let Some(info) = parse_gif_header(&buf) {
            sink.add_value(&self.width_field, u32::from(info.width));
            sink.add_value(&self.height_field, u32::from(info.height));
            sink.add_value(&self.colordepth_field, u32::from(info.color_depth));
            sink.add_value(&self.type_field, TYPE_RASTER_IMAGE);
        }
        defx!();

        input
    }

    fn is_ready_with_stream(&self) -> bool {
        true
    }
}

#[derive(Debug, Default)]
pub struct GifTransformUnitFactory {}

impl GifTransformUnitFactory {
    pub fn new() -> GifTransformUnitFactory {
        GifTransformUnitFactory {}
    }
}

impl UnitFactory for GifTransformUnitFactory {
    fn name(&self) -> &str {
        NAME_GIF
    }

    fn register_fields(&self, register: &FieldRegister) {
        register.register_field(FIELD_WIDTH);
        register.register_field(FIELD_HEIGHT);
        register.register_field(FIELD_COLORDEPTH);
    }
}

impl TransformUnitFactory for GifTransformUnitFactory {
    fn new_instance(&self, register: &FieldRegister) -> Box<dyn TransformUnit> {
        Box::new(GifTransformUnit {
            width_field: register.register_field(FIELD_WIDTH),
            height_field: register.register_field(FIELD_HEIGHT),
            colordepth_field: register.register_field(FIELD_COLORDEPTH),
            type_field: register.type_field.clone(),
            sink: None,
        })
    }
}
