// src/units/mime.rs

//! MIME type sniffing from the first chunk of a stream.
//!
//! The content is matched against [`MAGIC`]. When nothing matches, the
//! node name is matched by extension with [`MimeGuess`]. Text without a
//! known extension is `text/plain`, anything else
//! `application/octet-stream`.
//!
//! [`MimeGuess`]: https://docs.rs/mime_guess/2.0.4/mime_guess/struct.MimeGuess.html

use crate::analyzers::eventdispatcher::looks_like_text;
use crate::analyzers::units::{EventUnit, EventUnitFactory, UnitFactory};
use crate::data::analysisresult::SinkHandle;
use crate::data::fieldregister::{FieldP, FieldRegister};

use ::mime_guess::MimeGuess;
use ::si_trace_print::{defn, defx};

pub const NAME_MIME: &str = "MimeEventUnit";

pub const MIME_OCTET_STREAM: &str = "application/octet-stream";
pub const MIME_TEXT_PLAIN: &str = "text/plain";

/// `(offset, magic bytes, MIME type)`, first match wins.
pub const MAGIC: &[(usize, &[u8], &str)] = &[
    (0, b"\x1f\x8b", "application/gzip"),
    (0, b"BZh", "application/x-bzip2"),
    (0, b"\xfd7zXZ\x00", "application/x-xz"),
    (0, b"\x04\x22\x4d\x18", "application/x-lz4"),
    (0, b"PK\x03\x04", "application/zip"),
    (0, b"PK\x05\x06", "application/zip"),
    (257, b"ustar", "application/x-tar"),
    (0, b"ID3", "audio/mpeg"),
    (0, b"GIF87a", "image/gif"),
    (0, b"GIF89a", "image/gif"),
    (0, b"\x89PNG\r\n\x1a\n", "image/png"),
    (0, b"\xff\xd8\xff", "image/jpeg"),
    (0, b"%PDF-", "application/pdf"),
    (0, b"\x7fELF", "application/x-executable"),
    (0, b"<?xml", "application/xml"),
];

/// MIME type of `data` by [`MAGIC`].
pub fn magic_mime_type(data: &[u8]) -> Option<&'static str> {
    MAGIC
        .iter()
        .find(|(offset, magic, _)| {
            data.len() >= offset + magic.len() && &data[*offset..offset + magic.len()] == *magic
        })
        .map(|(_, _, mime)| *mime)
}

/// MIME type of a node named `name` with first chunk `data`.
pub fn sniff_mime_type(name: &str, data: &[u8]) -> String {
    defn!("({:?}, {} bytes)", name, data.len());
    if let Some(mime) = magic_mime_type(data) {
        defx!("magic {:?}", mime);
        return String::from(mime);
    }
    let guess: MimeGuess = MimeGuess::from_path(name);
    if let Some(mime) = guess.first_raw() {
        defx!("guess {:?}", mime);
        return String::from(mime);
    }
    let mime = match looks_like_text(data) {
        true => MIME_TEXT_PLAIN,
        false => MIME_OCTET_STREAM,
    };
    defx!("fallback {:?}", mime);

    String::from(mime)
}

pub struct MimeEventUnit {
    mimetype_field: FieldP,
    sink: Option<SinkHandle>,
    was_called: bool,
}

impl EventUnit for MimeEventUnit {
    fn name(&self) -> &str {
        NAME_MIME
    }

    fn start_analysis(&mut self, sink: SinkHandle) {
        self.sink = Some(sink);
        self.was_called = false;
    }

    fn handle_data(&mut self, data: &[u8]) {
        if self.was_called || data.is_empty() {
            return;
        }
        self.was_called = true;
        let sink = match self.sink.as_ref() {
            Some(val) => val,
            None => return,
        };
        let name = sink.name().unwrap_or_default();
        let mime = sniff_mime_type(&name, data);
        sink.add_value(&self.mimetype_field, mime.as_str());
        sink.set_mime_type(&mime);
    }

    fn end_analysis(&mut self, _complete: bool) {
        self.sink = None;
    }

    fn is_ready_with_stream(&self) -> bool {
        self.was_called
    }
}

#[derive(Debug, Default)]
pub struct MimeEventUnitFactory {}

impl MimeEventUnitFactory {
    pub fn new() -> MimeEventUnitFactory {
        MimeEventUnitFactory {}
    }
}

impl UnitFactory for MimeEventUnitFactory {
    fn name(&self) -> &str {
        NAME_MIME
    }

    fn register_fields(&self, _register: &FieldRegister) {}
}

impl EventUnitFactory for MimeEventUnitFactory {
    fn new_instance(&self, register: &FieldRegister) -> Box<dyn EventUnit> {
        Box::new(MimeEventUnit {
            mimetype_field: register.mimetype_field.clone(),
            sink: None,
            was_called: false,
        })
    }
}
