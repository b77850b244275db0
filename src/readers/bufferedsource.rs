// src/readers/bufferedsource.rs

//! Implements [`BufferedSource`], a [`ByteSource`] over any
//! [`std::io::Read`].
//!
//! Bytes are pulled from the underlying reader into a [`StreamBuffer`] only
//! when a `read` asks for more than is buffered. Bytes handed out stay in
//! the buffer until the space is needed again, so the stream can be rewound
//! with [`ByteSource::reset`].
//!
//! A top-level file is a `BufferedSource<File>`. A decompressed or archived
//! child stream is a `BufferedSource` over a decoder that reads from the
//! parent stream through a [`SourceReader`].
//!
//! [`SourceReader`]: crate::readers::bytesource::SourceReader

use std::fmt;
use std::fs::File;
use std::io::{Cursor, ErrorKind, Read};
use std::path::Path;

use crate::common::{FileOffset, FileSz, ResultS3};
use crate::readers::bytesource::{
    status_error,
    ByteSource,
    ResultS3ByteSource,
    StreamStatus,
};
use crate::readers::streambuffer::StreamBuffer;

use ::si_trace_print::{defn, defo, defx};

/// Message of the error status set when a stream produces more bytes than
/// its declared size.
pub const ERR_LONGER_THAN_SPECIFIED: &str = "stream is longer than specified";

/// Preferred count of bytes asked of the reader at once.
const READ_CHUNK_SZ: usize = 0x10000;

pub struct BufferedSource<R: Read> {
    reader: R,
    buffer: StreamBuffer,
    position: FileOffset,
    size: Option<FileSz>,
    status: StreamStatus,
    /// the reader returned end of data or failed
    finished_writing: bool,
}

impl<R: Read> fmt::Debug for BufferedSource<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferedSource")
            .field("position", &self.position)
            .field("size", &self.size)
            .field("status", &self.status)
            .field("avail", &self.buffer.avail())
            .field("capacity", &self.buffer.capacity())
            .finish()
    }
}

impl<R: Read> BufferedSource<R> {
    /// Create a `BufferedSource` of unknown size.
    pub fn new(reader: R) -> BufferedSource<R> {
        Self::with_size(reader, None)
    }

    /// Create a `BufferedSource` of size `size`. Reading more than `size`
    /// bytes puts the stream in error.
    pub fn with_size(reader: R, size: Option<FileSz>) -> BufferedSource<R> {
        BufferedSource {
            reader,
            buffer: StreamBuffer::new(),
            position: 0,
            size,
            status: StreamStatus::Ok,
            finished_writing: false,
        }
    }

    /// Pull from the reader until at least `ntoread` bytes are available or
    /// the reader is done. `maxread` (`0` means no bound) caps how much is
    /// asked of the reader at once.
    fn write_to_buffer(&mut self, ntoread: usize, maxread: usize) {
        defn!("({}, {})", ntoread, maxread);
        let mut missing: usize = ntoread.saturating_sub(self.buffer.avail());
        while missing > 0 {
            let chunk: usize = match maxread {
                0 => READ_CHUNK_SZ,
                _ => std::cmp::min(maxread, READ_CHUNK_SZ),
            };
            let mut space = self.buffer.make_space(std::cmp::max(missing, chunk));
            if maxread >= ntoread && space > maxread {
                space = maxread;
            }
            let slice = self.buffer.write_slice(space);
            match self.reader.read(slice) {
                Ok(0) => {
                    defo!("reader done");
                    self.finished_writing = true;
                    break;
                }
                Ok(n) => {
                    self.buffer.commit(n);
                    missing = ntoread.saturating_sub(self.buffer.avail());
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => {
                    defo!("reader error {}", err);
                    self.status = StreamStatus::Error(err.to_string());
                    self.finished_writing = true;
                    break;
                }
            }
        }
        defx!("avail {}", self.buffer.avail());
    }

    /// Consume the `BufferedSource`, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl BufferedSource<File> {
    /// Open the file at `path` as a stream of known size.
    pub fn open(path: &Path) -> std::io::Result<BufferedSource<File>> {
        let file = File::open(path)?;
        let size: FileSz = file.metadata()?.len();

        Ok(BufferedSource::with_size(file, Some(size)))
    }
}

impl BufferedSource<Cursor<Vec<u8>>> {
    /// A stream over bytes already in memory, e.g. an embedded picture.
    pub fn from_bytes(data: Vec<u8>) -> BufferedSource<Cursor<Vec<u8>>> {
        let size = data.len() as FileSz;

        BufferedSource::with_size(Cursor::new(data), Some(size))
    }
}

impl<R: Read> ByteSource for BufferedSource<R> {
    fn read(&mut self, min: usize, max: usize) -> ResultS3ByteSource<'_> {
        match &self.status {
            StreamStatus::Error(msg) => return ResultS3::Err(status_error(msg)),
            StreamStatus::Eof => return ResultS3::Done,
            StreamStatus::Ok => {}
        }
        let min: usize = std::cmp::max(min, 1);
        let max: usize = if max != 0 && max < min { min } else { max };
        if !self.finished_writing && min > self.buffer.avail() {
            self.write_to_buffer(min, max);
            if let StreamStatus::Error(msg) = &self.status {
                return ResultS3::Err(status_error(msg));
            }
        }
        let (start, nread) = self.buffer.read(max);
        self.position += nread as FileOffset;
        if let Some(size) = self.size {
            if self.position > size {
                self.status = StreamStatus::Error(String::from(ERR_LONGER_THAN_SPECIFIED));
                return ResultS3::Err(status_error(ERR_LONGER_THAN_SPECIFIED));
            }
        }
        if self.buffer.avail() == 0 && self.finished_writing {
            self.status = StreamStatus::Eof;
            if self.size.is_none() {
                self.size = Some(self.position);
            }
        }
        if nread == 0 {
            return ResultS3::Done;
        }

        ResultS3::Found(&self.buffer.data()[start..start + nread])
    }

    fn reset(&mut self, pos: FileOffset) -> FileOffset {
        if self.status.is_error() {
            return self.position;
        }
        if pos <= self.position {
            let back = self.position - pos;
            if back <= self.buffer.consumed() as u64 && self.buffer.unread(back as usize) {
                self.position = pos;
                self.status = StreamStatus::Ok;
            }
        } else {
            let ahead = pos - self.position;
            if ahead < self.buffer.avail() as u64 && self.buffer.advance(ahead as usize) {
                self.position = pos;
                self.status = StreamStatus::Ok;
            }
        }

        self.position
    }

    fn skip(&mut self, ntoskip: u64) -> u64 {
        defn!("({})", ntoskip);
        let mut ntoskip = ntoskip;
        let mut skipped: u64 = 0;
        while ntoskip > 0 {
            let step_max = std::cmp::max(self.buffer.capacity(), 4096) as u64;
            let step = std::cmp::min(ntoskip, step_max) as usize;
            match ByteSource::read(self, step, step) {
                ResultS3::Found(data) => {
                    let n = data.len() as u64;
                    skipped += n;
                    ntoskip -= n;
                }
                ResultS3::Done | ResultS3::Err(_) => break,
            }
        }
        defx!("skipped {}", skipped);

        skipped
    }

    fn position(&self) -> FileOffset {
        self.position
    }

    fn size(&self) -> Option<FileSz> {
        self.size
    }

    fn status(&self) -> &StreamStatus {
        &self.status
    }
}
