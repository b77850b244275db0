// src/units/archive.rs

//! Terminal units for archives: tar and zip.
//!
//! Each regular file in the archive becomes a child node named by its path
//! in the archive, e.g. `logs.tar|var/log/messages`. Archives are read front
//! to back in one pass; neither unit seeks.

use crate::analyzers::error::{AnalysisStatus, AnalyzerError, ResultAnalyzer};
use crate::analyzers::units::{TerminalUnit, TerminalUnitFactory, UnitFactory};
use crate::common::Count;
use crate::data::analysisresult::AnalysisResult;
use crate::data::fieldregister::FieldRegister;
use crate::de_wrn;
use crate::readers::bufferedsource::BufferedSource;
use crate::readers::bytesource::{ByteSource, SourceReader};

use ::si_trace_print::{defn, defo, defx};

pub const NAME_TAR: &str = "TarUnit";
pub const NAME_ZIP: &str = "ZipUnit";

/// Size of a tar header block.
const TAR_BLOCK_SZ: usize = 512;
/// Offset and length of the header checksum field.
const TAR_CHKSUM_AT: usize = 148;
const TAR_CHKSUM_SZ: usize = 8;

/// Parse a tar octal number field; NUL and space terminate it.
fn parse_octal(field: &[u8]) -> Option<u64> {
    let mut value: u64 = 0;
    let mut digits: usize = 0;
    for c in field.iter() {
        match c {
            b'0'..=b'7' => {
                value = value.checked_mul(8)?.checked_add(u64::from(c - b'0'))?;
                digits += 1;
            }
            b' ' | 0 if digits == 0 => {}
            b' ' | 0 => break,
            _ => return None,
        }
    }
    match digits {
        0 => None,
        _ => Some(value),
    }
}

/// Does `header` start with a tar header block with a valid checksum?
pub fn is_tar_header(header: &[u8]) -> bool {
    if header.len() < TAR_BLOCK_SZ || header[0] == 0 {
        return false;
    }
    let block = &header[..TAR_BLOCK_SZ];
    let expect = match parse_octal(&block[TAR_CHKSUM_AT..TAR_CHKSUM_AT + TAR_CHKSUM_SZ]) {
        Some(val) => val,
        None => return false,
    };
    // the checksum field counts as spaces
    let sum: u64 = block
        .iter()
        .enumerate()
        .map(|(i, b)| {
            if (TAR_CHKSUM_AT..TAR_CHKSUM_AT + TAR_CHKSUM_SZ).contains(&i) {
                u64::from(b' ')
            } else {
                u64::from(*b)
            }
        })
        .sum();
    if sum != expect {
        defo!("checksum {} != {}", sum, expect);
        return false;
    }

    true
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TarUnit
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default)]
pub struct TarUnit {}

impl TerminalUnit for TarUnit {
    fn name(&self) -> &str {
        NAME_TAR
    }

    /// The checksum decides; pre-POSIX tar has no `ustar` magic.
    fn check_header(&self, header: &[u8]) -> bool {
        is_tar_header(header)
    }

    fn analyze(
        &mut self,
        result: &mut AnalysisResult<'_>,
        input: &mut dyn ByteSource,
    ) -> ResultAnalyzer<()> {
        defn!("({:?})", result.path());
        let mut archive = ::tar::Archive::new(SourceReader::new(input));
        let entries = match archive.entries() {
            Ok(val) => val,
            Err(err) => {
                defx!("entries() failed {}", err);
                return Err(AnalyzerError::format(NAME_TAR, err.to_string()));
            }
        };
        let mut count: Count = 0;
        for entry_res in entries {
            let entry = match entry_res {
                Ok(val) => val,
                Err(err) => {
                    if count == 0 {
                        defx!("first entry failed {}", err);
                        return Err(AnalyzerError::format(NAME_TAR, err.to_string()));
                    }
                    de_wrn!("{:?}: tar entry {}: {}", result.path(), count, err);
                    break;
                }
            };
            count += 1;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let name: String = match entry.path() {
                Ok(path) => path.to_string_lossy().into_owned(),
                Err(err) => {
                    de_wrn!("{:?}: tar entry {} path: {}", result.path(), count, err);
                    continue;
                }
            };
            let mtime: u64 = entry.header().mtime().unwrap_or(0);
            let size: u64 = entry.size();
            defo!("entry {:?} size {}", name, size);
            let source = BufferedSource::with_size(entry, Some(size));
            let status = result.index_child(&name, mtime, Some(Box::new(source)));
            if status == AnalysisStatus::StreamError {
                defx!("child {:?} stream error", name);
                return Err(AnalyzerError::format(NAME_TAR, format!("cannot read entry {:?}", name)));
            }
            if !result.config().index_more() {
                break;
            }
        }
        defx!("{} entries", count);

        Ok(())
    }

    fn handles_sub_streams(&self) -> bool {
        true
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ZipUnit
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Local file header signature.
const ZIP_LOCAL_MAGIC: &[u8; 4] = b"PK\x03\x04";

#[derive(Debug, Default)]
pub struct ZipUnit {}

impl TerminalUnit for ZipUnit {
    fn name(&self) -> &str {
        NAME_ZIP
    }

    fn check_header(&self, header: &[u8]) -> bool {
        header.starts_with(ZIP_LOCAL_MAGIC)
    }

    /// Read the local file headers in stream order. The central directory at
    /// the end is not needed.
    fn analyze(
        &mut self,
        result: &mut AnalysisResult<'_>,
        input: &mut dyn ByteSource,
    ) -> ResultAnalyzer<()> {
        defn!("({:?})", result.path());
        let mut reader = SourceReader::new(input);
        let mtime = result.mtime();
        let mut count: Count = 0;
        loop {
            let file = match ::zip::read::read_zipfile_from_stream(&mut reader) {
                Ok(Some(val)) => val,
                Ok(None) => break,
                Err(err) => {
                    if count == 0 {
                        defx!("first entry failed {}", err);
                        return Err(AnalyzerError::format(NAME_ZIP, err.to_string()));
                    }
                    de_wrn!("{:?}: zip entry {}: {}", result.path(), count, err);
                    break;
                }
            };
            count += 1;
            if file.is_dir() {
                continue;
            }
            let name = String::from(file.name());
            let size = file.size();
            defo!("entry {:?} size {}", name, size);
            let source = BufferedSource::with_size(file, Some(size));
            let status = result.index_child(&name, mtime, Some(Box::new(source)));
            if status == AnalysisStatus::StreamError {
                defx!("child {:?} stream error", name);
                return Err(AnalyzerError::format(NAME_ZIP, format!("cannot read entry {:?}", name)));
            }
            if !result.config().index_more() {
                break;
            }
        }
        defx!("{} entries", count);

        Ok(())
    }

    fn handles_sub_streams(&self) -> bool {
        true
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// factories
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default)]
pub struct TarUnitFactory {}

impl TarUnitFactory {
    pub fn new() -> TarUnitFactory {
        TarUnitFactory {}
    }
}

impl UnitFactory for TarUnitFactory {
    fn name(&self) -> &str {
        NAME_TAR
    }

    fn register_fields(&self, _register: &FieldRegister) {}
}

impl TerminalUnitFactory for TarUnitFactory {
    fn new_instance(&self, _register: &FieldRegister) -> Box<dyn TerminalUnit> {
        Box::new(TarUnit {})
    }
}

#[derive(Debug, Default)]
pub struct ZipUnitFactory {}

impl ZipUnitFactory {
    pub fn new() -> ZipUnitFactory {
        ZipUnitFactory {}
    }
}

impl UnitFactory for ZipUnitFactory {
    fn name(&self) -> &str {
        NAME_ZIP
    }

    fn register_fields(&self, _register: &FieldRegister) {}
}

impl TerminalUnitFactory for ZipUnitFactory {
    fn new_instance(&self, _register: &FieldRegister) -> Box<dyn TerminalUnit> {
        Box::new(ZipUnit {})
    }
}
