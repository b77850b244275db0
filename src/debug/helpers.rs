// src/debug/helpers.rs

//! Miscellaneous helper functions for testing: temporary files and
//! in-memory archives built with the same crates the units read them with.

use crate::common::FPath;

use std::io::Write;

use ::lazy_static::lazy_static;
use ::si_trace_print::defñ;

#[doc(hidden)]
pub use ::tempfile::NamedTempFile;
#[doc(hidden)]
pub use ::tempfile::TempDir;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// temporary file helper functions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// NamedTempFile instances default to this file name prefix.
/// See <https://github.com/Stebalien/tempfile/issues/183>.
pub const STR_TEMPFILE_PREFIX: &str = "tmp-dsa-test-";

lazy_static! {
    pub static ref STRING_TEMPFILE_PREFIX: String = String::from(STR_TEMPFILE_PREFIX);
}

/// Small helper function for copying `NamedTempFile` path to a `FPath`.
pub fn ntf_fpath(ntf: &NamedTempFile) -> FPath {
    FPath::from(ntf.path().to_string_lossy())
}

/// Testing helper function to write a `[u8]` to a temporary file with a
/// specific suffix, e.g. `".mp3.gz"`.
pub fn create_temp_file_bytes_with_suffix(
    data: &[u8],
    suffix: &str,
) -> NamedTempFile {
    let mut ntf = match ::tempfile::Builder::new()
        // use known prefix for easier cleanup
        .prefix::<str>(&STRING_TEMPFILE_PREFIX)
        .suffix(suffix)
        .tempfile()
    {
        Ok(val) => val,
        Err(err) => {
            panic!("tempfile::Builder::new()..tempfile() return Err {}", err);
        }
    };
    match ntf.write_all(data) {
        Ok(_) => {}
        Err(err) => {
            panic!("NamedTempFile::write_all() return Err {}", err);
        }
    }

    ntf
}

/// Testing helper function to write a `[u8]` to a temporary file.
pub fn create_temp_file_bytes(data: &[u8]) -> NamedTempFile {
    create_temp_file_bytes_with_suffix(data, "")
}

/// Create a temporary directory
pub fn create_temp_dir() -> TempDir {
    defñ!();
    match ::tempfile::Builder::new()
        .prefix::<str>(&STRING_TEMPFILE_PREFIX)
        .tempdir()
    {
        Ok(val) => val,
        Err(err) => panic!("tempfile::Builder::new()..tempdir() return Err {}", err),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// in-memory fixture builders
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// gzip `data`
pub fn gzip_bytes(data: &[u8]) -> Vec<u8> {
    let mut encoder = ::flate2::write::GzEncoder::new(Vec::new(), ::flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// lz4 frame-compress `data`
pub fn lz4_bytes(data: &[u8]) -> Vec<u8> {
    let mut encoder = ::lz4_flex::frame::FrameEncoder::new(Vec::new());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// xz-compress `data`
pub fn xz_bytes(data: &[u8]) -> Vec<u8> {
    let mut input = std::io::Cursor::new(data);
    let mut out: Vec<u8> = Vec::new();
    ::lzma_rs::xz_compress(&mut input, &mut out).unwrap();
    out
}

/// tar archive of `(name, data)` entries
pub fn tar_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = ::tar::Builder::new(Vec::new());
    for (name, data) in entries.iter() {
        let mut header = ::tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(1_600_000_000);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap()
}

/// zip archive of `(name, data)` entries, deflate compressed
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ::zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = ::zip::write::SimpleFileOptions::default()
        .compression_method(::zip::CompressionMethod::Deflated);
    for (name, data) in entries.iter() {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A minimal ID3v2.3 tag followed by one MPEG-1 layer III frame header and
/// some padding. `frames` is `(frame id, text)`; text is ISO-8859-1.
pub fn id3v2_bytes(frames: &[(&str, &str)]) -> Vec<u8> {
    let mut body: Vec<u8> = Vec::new();
    for (id, text) in frames.iter() {
        assert_eq!(id.len(), 4);
        let size = (text.len() + 1) as u32;
        body.extend_from_slice(id.as_bytes());
        body.extend_from_slice(&size.to_be_bytes());
        body.extend_from_slice(&[0, 0]);
        body.push(0); // ISO-8859-1
        body.extend_from_slice(text.as_bytes());
    }
    let size = body.len() as u32;
    let mut data: Vec<u8> = Vec::new();
    data.extend_from_slice(b"ID3");
    data.extend_from_slice(&[3, 0, 0]);
    // syncsafe size
    data.push(((size >> 21) & 0x7f) as u8);
    data.push(((size >> 14) & 0x7f) as u8);
    data.push(((size >> 7) & 0x7f) as u8);
    data.push((size & 0x7f) as u8);
    data.extend_from_slice(&body);
    // MPEG-1 layer III, 128 kbit/s, 44100 Hz, stereo
    data.extend_from_slice(&[0xff, 0xfb, 0x90, 0x00]);
    data.extend_from_slice(&[0u8; 400]);
    data
}
