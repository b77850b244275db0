// src/units/decompress.rs

//! Terminal units for compressed streams: gzip, bzip2, lz4, and xz.
//!
//! Each decompresses its node into one child node named after the node
//! without the compression extension, e.g. `logs.tar.gz|logs.tar`.
//!
//! gzip, bzip2, and lz4 decompress while the child is analyzed, so the
//! child reads no more of the parent stream than it needs. xz is
//! decompressed to memory first; the [`lzma_rs`] crate has no streaming
//! reader.
//!
//! [`lzma_rs`]: https://docs.rs/lzma-rs/0.3.0/lzma_rs/index.html

use std::io::BufReader;

use crate::analyzers::error::{AnalysisStatus, AnalyzerError, ResultAnalyzer};
use crate::analyzers::units::{TerminalUnit, TerminalUnitFactory, UnitFactory};
use crate::data::analysisresult::AnalysisResult;
use crate::data::fieldregister::FieldRegister;
use crate::readers::bufferedsource::BufferedSource;
use crate::readers::bytesource::{ByteSource, SourceReader};

use ::bzip2_rs::DecoderReader as Bz2DecoderReader;
use ::flate2::read::MultiGzDecoder;
use ::lz4_flex::frame::FrameDecoder as Lz4FrameDecoder;
use ::si_trace_print::{defn, defo, defx};

pub const NAME_GZIP: &str = "GzipUnit";
pub const NAME_BZ2: &str = "Bz2Unit";
pub const NAME_LZ4: &str = "Lz4Unit";
pub const NAME_XZ: &str = "XzUnit";

/// `(extension, replacement)` for naming the child of a gzip node.
const GZIP_EXTENSIONS: &[(&str, &str)] = &[("gz", ""), ("tgz", "tar"), ("gzip", "")];
const BZ2_EXTENSIONS: &[(&str, &str)] = &[("bz2", ""), ("tbz2", "tar"), ("tbz", "tar")];
const LZ4_EXTENSIONS: &[(&str, &str)] = &[("lz4", "")];
const XZ_EXTENSIONS: &[(&str, &str)] = &[("xz", ""), ("txz", "tar")];

/// Name of the decompressed child of node `name`.
///
/// `"a.tar.gz"` becomes `"a.tar"`, `"a.tgz"` becomes `"a.tar"`. A name
/// without a matching extension is kept.
pub fn decompressed_name(name: &str, extensions: &[(&str, &str)]) -> String {
    if let Some((stem, ext)) = name.rsplit_once('.') {
        let ext = ext.to_ascii_lowercase();
        for (from, to) in extensions.iter() {
            if stem.is_empty() || ext != *from {
                continue;
            }
            if to.is_empty() {
                return String::from(stem);
            }
            return format!("{}.{}", stem, to);
        }
    }

    String::from(name)
}

/// Analyze `decoded` as the only child of the node of `result`.
fn index_decoded<'b>(
    result: &mut AnalysisResult<'_>,
    unit: &str,
    extensions: &[(&str, &str)],
    decoded: Box<dyn ByteSource + 'b>,
) -> ResultAnalyzer<()> {
    let name = decompressed_name(&result.file_name(), extensions);
    let mtime = result.mtime();
    defn!("{} child {:?}", unit, name);
    let status = result.index_child(&name, mtime, Some(decoded));
    defx!("{}", status);
    match status {
        AnalysisStatus::StreamError => Err(AnalyzerError::format(unit, "cannot decompress stream")),
        AnalysisStatus::Ok | AnalysisStatus::Aborted => Ok(()),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// units
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default)]
pub struct GzipUnit {}

impl TerminalUnit for GzipUnit {
    fn name(&self) -> &str {
        NAME_GZIP
    }

    /// magic `1f 8b`, method deflate
    fn check_header(&self, header: &[u8]) -> bool {
        header.len() >= 3 && header[0] == 0x1f && header[1] == 0x8b && header[2] == 0x08
    }

    fn analyze(
        &mut self,
        result: &mut AnalysisResult<'_>,
        input: &mut dyn ByteSource,
    ) -> ResultAnalyzer<()> {
        let decoder = MultiGzDecoder::new(SourceReader::new(input));
        let source = BufferedSource::new(decoder);

        index_decoded(result, NAME_GZIP, GZIP_EXTENSIONS, Box::new(source))
    }

    fn handles_sub_streams(&self) -> bool {
        true
    }
}

#[derive(Debug, Default)]
pub struct Bz2Unit {}

/// bzip2 block magic, π
const BZ2_BLOCK_MAGIC: &[u8; 6] = b"\x31\x41\x59\x26\x53\x59";
/// bzip2 end-of-stream magic, √π
const BZ2_EOS_MAGIC: &[u8; 6] = b"\x17\x72\x45\x38\x50\x90";

impl TerminalUnit for Bz2Unit {
    fn name(&self) -> &str {
        NAME_BZ2
    }

    /// `BZh`, block size `1`..`9`, then a block or the end of stream
    fn check_header(&self, header: &[u8]) -> bool {
        header.len() >= 10
            && &header[..3] == b"BZh"
            && (b'1'..=b'9').contains(&header[3])
            && (&header[4..10] == BZ2_BLOCK_MAGIC || &header[4..10] == BZ2_EOS_MAGIC)
    }

    fn analyze(
        &mut self,
        result: &mut AnalysisResult<'_>,
        input: &mut dyn ByteSource,
    ) -> ResultAnalyzer<()> {
        let decoder = Bz2DecoderReader::new(SourceReader::new(input));
        let source = BufferedSource::new(decoder);

        index_decoded(result, NAME_BZ2, BZ2_EXTENSIONS, Box::new(source))
    }

    fn handles_sub_streams(&self) -> bool {
        true
    }
}

#[derive(Debug, Default)]
pub struct Lz4Unit {}

/// lz4 frame magic, little-endian `0x184D2204`
const LZ4_FRAME_MAGIC: &[u8; 4] = b"\x04\x22\x4d\x18";

impl TerminalUnit for Lz4Unit {
    fn name(&self) -> &str {
        NAME_LZ4
    }

    fn check_header(&self, header: &[u8]) -> bool {
        header.starts_with(LZ4_FRAME_MAGIC)
    }

    fn analyze(
        &mut self,
        result: &mut AnalysisResult<'_>,
        input: &mut dyn ByteSource,
    ) -> ResultAnalyzer<()> {
        let decoder = Lz4FrameDecoder::new(SourceReader::new(input));
        let source = BufferedSource::new(decoder);

        index_decoded(result, NAME_LZ4, LZ4_EXTENSIONS, Box::new(source))
    }

    fn handles_sub_streams(&self) -> bool {
        true
    }
}

#[derive(Debug, Default)]
pub struct XzUnit {}

const XZ_MAGIC: &[u8; 6] = b"\xfd\x37\x7a\x58\x5a\x00";

impl TerminalUnit for XzUnit {
    fn name(&self) -> &str {
        NAME_XZ
    }

    fn check_header(&self, header: &[u8]) -> bool {
        header.starts_with(XZ_MAGIC)
    }

    fn analyze(
        &mut self,
        result: &mut AnalysisResult<'_>,
        input: &mut dyn ByteSource,
    ) -> ResultAnalyzer<()> {
        let mut reader = BufReader::new(SourceReader::new(input));
        let mut buffer: Vec<u8> = Vec::new();
        defo!("xz_decompress");
        if let Err(err) = ::lzma_rs::xz_decompress(&mut reader, &mut buffer) {
            return Err(AnalyzerError::format(NAME_XZ, format!("{:?}", err)));
        }
        defo!("xz_decompress {} bytes", buffer.len());
        let source = BufferedSource::from_bytes(buffer);

        index_decoded(result, NAME_XZ, XZ_EXTENSIONS, Box::new(source))
    }

    fn handles_sub_streams(&self) -> bool {
        true
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// factories
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Declare the factory `$factory` of stateless terminal unit `$unit`.
macro_rules! decompress_factory {
    ($factory:ident, $unit:ident, $name:expr) => {
        #[derive(Debug, Default)]
        pub struct $factory {}

        impl $factory {
            pub fn new() -> $factory {
                $factory {}
            }
        }

        impl UnitFactory for $factory {
            fn name(&self) -> &str {
                $name
            }

            fn register_fields(&self, _register: &FieldRegister) {}
        }

        impl TerminalUnitFactory for $factory {
            fn new_instance(&self, _register: &FieldRegister) -> Box<dyn TerminalUnit> {
                Box::new($unit {})
            }
        }
    };
}

decompress_factory!(GzipUnitFactory, GzipUnit, NAME_GZIP);
decompress_factory!(Bz2UnitFactory, Bz2Unit, NAME_BZ2);
decompress_factory!(Lz4UnitFactory, Lz4Unit, NAME_LZ4);
decompress_factory!(XzUnitFactory, XzUnit, NAME_XZ);
