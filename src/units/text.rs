// src/units/text.rs

//! Terminal unit for plain text. Records the text of the node for full-text
//! indexing.
//!
//! Registered last among the built-in terminal units so that any format
//! with a more specific unit is claimed by that unit first.

use crate::analyzers::error::{AnalyzerError, ResultAnalyzer};
use crate::analyzers::eventdispatcher::{decode_text, looks_like_text};
use crate::analyzers::units::{TerminalUnit, TerminalUnitFactory, UnitFactory};
use crate::common::ResultS3;
use crate::data::analysisresult::AnalysisResult;
use crate::data::fieldregister::FieldRegister;
use crate::readers::bytesource::ByteSource;

use ::si_trace_print::{defn, defo, defx};

pub const NAME_TEXT: &str = "TextUnit";

/// At most this many bytes of text are recorded per node.
pub const TEXT_MAX: usize = 1 << 20;
const READ_SZ: usize = 1 << 16;

/// Is `header` the start of UTF-8 text?
///
/// A multi-byte character cut off at the end of `header` is allowed.
pub fn is_utf8_text(header: &[u8]) -> bool {
    if header.is_empty() || !looks_like_text(header) {
        return false;
    }
    match std::str::from_utf8(header) {
        Ok(_) => true,
        Err(err) => err.error_len().is_none(),
    }
}

#[derive(Debug, Default)]
pub struct TextUnit {}

impl TerminalUnit for TextUnit {
    fn name(&self) -> &str {
        NAME_TEXT
    }

    fn check_header(&self, header: &[u8]) -> bool {
        is_utf8_text(header)
    }

    fn analyze(
        &mut self,
        result: &mut AnalysisResult<'_>,
        input: &mut dyn ByteSource,
    ) -> ResultAnalyzer<()> {
        defn!("({:?})", result.path());
        let mut text: Vec<u8> = Vec::with_capacity(READ_SZ);
        while text.len() < TEXT_MAX {
            let max = std::cmp::min(READ_SZ, TEXT_MAX - text.len());
            match input.read(1, max) {
                ResultS3::Found(data) => text.extend_from_slice(data),
                ResultS3::Done => break,
                ResultS3::Err(err) => {
                    defx!("read failed {}", err);
                    return Err(AnalyzerError::Stream(err));
                }
            }
        }
        // a character cut off at TEXT_MAX is dropped
        let valid = match std::str::from_utf8(&text) {
            Ok(_) => text.len(),
            Err(err) if err.error_len().is_none() => err.valid_up_to(),
            Err(_) => text.len(),
        };
        defo!("{} bytes of text", valid);
        if valid > 0 {
            result.add_text(&decode_text(&text[..valid]));
        }
        defx!();

        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct TextUnitFactory {}

impl TextUnitFactory {
    pub fn new() -> TextUnitFactory {
        TextUnitFactory {}
    }
}

impl UnitFactory for TextUnitFactory {
    fn name(&self) -> &str {
        NAME_TEXT
    }

    fn register_fields(&self, _register: &FieldRegister) {}
}

impl TerminalUnitFactory for TextUnitFactory {
    fn new_instance(&self, _register: &FieldRegister) -> Box<dyn TerminalUnit> {
        Box::new(TextUnit {})
    }
}
