// src/units/txtline.rs

//! Line statistics of text streams.

use crate::analyzers::units::{LineUnit, LineUnitFactory, UnitFactory};
use crate::common::Count;
use crate::data::analysisresult::SinkHandle;
use crate::data::fieldregister::{FieldP, FieldRegister};

pub const NAME_TXTLINE: &str = "TxtLineUnit";

pub const FIELD_LINECOUNT: &str = "lineCount";
pub const FIELD_MAXLINELENGTH: &str = "maxLineLength";

pub struct TxtLineUnit {
    linecount_field: FieldP,
    maxlinelength_field: FieldP,
    sink: Option<SinkHandle>,
    lines: Count,
    /// in characters
    max_line_length: usize,
}

impl LineUnit for TxtLineUnit {
    fn name(&self) -> &str {
        NAME_TXTLINE
    }

    fn start_analysis(&mut self, sink: SinkHandle) {
        self.sink = Some(sink);
        self.lines = 0;
        self.max_line_length = 0;
    }

    fn handle_line(&mut self, line: &str) {
        self.lines += 1;
        self.max_line_length = std::cmp::max(self.max_line_length, line.chars().count());
    }

    fn end_analysis(&mut self, _complete: bool) {
        let sink = match self.sink.take() {
            Some(val) => val,
            None => return,
        };
        if self.lines == 0 {
            return;
        }
        sink.add_value(&self.linecount_field, u32::try_from(self.lines).unwrap_or(u32::MAX));
        sink.add_value(
            &self.maxlinelength_field,
            u32::try_from(self.max_line_length).unwrap_or(u32::MAX),
        );
    }

    fn is_ready_with_stream(&self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
pub struct TxtLineUnitFactory {}

impl TxtLineUnitFactory {
    pub fn new() -> TxtLineUnitFactory {
        TxtLineUnitFactory {}
    }
}

impl UnitFactory for TxtLineUnitFactory {
    fn name(&self) -> &str {
        NAME_TXTLINE
    }

    fn register_fields(&self, register: &FieldRegister) {
        register.register_field(FIELD_LINECOUNT);
        register.register_field(FIELD_MAXLINELENGTH);
    }
}

impl LineUnitFactory for TxtLineUnitFactory {
    fn new_instance(&self, register: &FieldRegister) -> Box<dyn LineUnit> {
        Box::new(TxtLineUnit {
            linecount_field: register.register_field(FIELD_LINECOUNT),
            maxlinelength_field: register.register_field(FIELD_MAXLINELENGTH),
            sink: None,
            lines: 0,
            max_line_length: 0,
        })
    }
}
