// src/readers/bytesource.rs

//! The [`ByteSource`] trait, the readable stream every unit reads from, and
//! [`SourceReader`], which adapts a `ByteSource` to [`std::io::Read`].
//!
//! A `ByteSource` can be read ahead then rewound with [`ByteSource::reset`]
//! as long as the bytes are still buffered. After a successful `reset(p)`
//! the next `read` returns the same bytes the first read from `p` returned.
//! The whole retry protocol of the [`StreamAnalyzer`] depends on that.
//!
//! [`StreamAnalyzer`]: crate::analyzers::streamanalyzer::StreamAnalyzer

use std::fmt;
use std::io::{Error, ErrorKind, Read};

use crate::common::{FileOffset, FileSz, ResultS3};

/// Status of a [`ByteSource`]. `Eof` and `Error` are terminal unless a
/// [`ByteSource::reset`] succeeds.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum StreamStatus {
    #[default]
    Ok,
    Eof,
    Error(String),
}

impl StreamStatus {
    pub const fn is_ok(&self) -> bool {
        matches!(self, StreamStatus::Ok)
    }

    pub const fn is_eof(&self) -> bool {
        matches!(self, StreamStatus::Eof)
    }

    pub const fn is_error(&self) -> bool {
        matches!(self, StreamStatus::Error(_))
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamStatus::Ok => write!(f, "Ok"),
            StreamStatus::Eof => write!(f, "Eof"),
            StreamStatus::Error(msg) => write!(f, "Error({})", msg),
        }
    }
}

/// Result of [`ByteSource::read`].
///
/// `Found(bytes)`: at least one byte.
/// `Done`: end of data, nothing was read.
/// `Err`: the stream has failed.
pub type ResultS3ByteSource<'a> = ResultS3<&'a [u8], Error>;

/// A readable stream that can step back over buffered bytes.
pub trait ByteSource {
    /// Read at least `min` bytes, unless the end of data comes first, and at
    /// most `max` bytes (`0` means no upper bound). A `min` of `0` is taken
    /// as `1`.
    ///
    /// The returned bytes are only valid until the next call.
    fn read(&mut self, min: usize, max: usize) -> ResultS3ByteSource<'_>;

    /// Move to offset `pos`. Succeeds only if `pos` is still buffered.
    /// Returns the position after the call; a caller checks it against
    /// `pos`. A successful reset sets the status to `Ok`.
    fn reset(&mut self, pos: FileOffset) -> FileOffset;

    /// Advance `n` bytes. Returns the count of bytes skipped, which is
    /// smaller than `n` at the end of data or on error.
    fn skip(&mut self, n: u64) -> u64;

    fn position(&self) -> FileOffset;

    /// Size of the whole stream in bytes, once known. A stream of unknown
    /// size learns it when the end of data is reached.
    fn size(&self) -> Option<FileSz>;

    fn status(&self) -> &StreamStatus;
}

/// `Error` for a stream in status `StreamStatus::Error(msg)`.
pub fn status_error(msg: &str) -> Error {
    Error::new(ErrorKind::Other, String::from(msg))
}

/// Adapts a [`ByteSource`] to [`std::io::Read`], so decompressors and
/// archive readers can read from any stream, including the stream of a
/// node being analyzed.
pub struct SourceReader<'a> {
    source: &'a mut (dyn ByteSource + 'a),
}

impl<'a> SourceReader<'a> {
    pub fn new(source: &'a mut (dyn ByteSource + 'a)) -> SourceReader<'a> {
        SourceReader { source }
    }

    pub fn position(&self) -> FileOffset {
        self.source.position()
    }
}

impl Read for SourceReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.source.read(1, buf.len()) {
            ResultS3::Found(data) => {
                let len = data.len();
                buf[..len].copy_from_slice(data);
                Ok(len)
            }
            ResultS3::Done => Ok(0),
            ResultS3::Err(err) => Err(err),
        }
    }
}

/// Read exactly `n` bytes from the current position and rewind to where
/// the read started. Returns fewer bytes at the end of data.
///
/// Used by units that sniff a fixed-size header without consuming it.
pub fn peek_bytes(source: &mut dyn ByteSource, n: usize) -> Result<Vec<u8>, Error> {
    let start = source.position();
    let bytes: Vec<u8> = match source.read(n, n) {
        ResultS3::Found(data) => data.to_vec(),
        ResultS3::Done => Vec::with_capacity(0),
        ResultS3::Err(err) => return Err(err),
    };
    if source.reset(start) != start {
        return Err(Error::new(
            ErrorKind::Other,
            format!("cannot reset stream to {} after reading {} bytes", start, bytes.len()),
        ));
    }

    Ok(bytes)
}
