// src/readers/dataeventsource.rs

//! Implements [`DataEventSource`], a [`ByteSource`] wrapper that hands every
//! byte read through it to a [`DataEventHandler`].
//!
//! Each byte is handed over once, in order, even when the stream is rewound
//! and read again. The end of data is signalled once: when the wrapped
//! stream reaches its end, or when the `DataEventSource` is dropped.

use std::fmt;

use crate::common::{FileOffset, FileSz, ResultS3};
use crate::readers::bytesource::{ByteSource, ResultS3ByteSource, StreamStatus};

use ::si_trace_print::{defn, defo, defx};

/// Receiver of the bytes read through a [`DataEventSource`].
pub trait DataEventHandler {
    /// Handle the next bytes of the stream. Returns `false` once no more
    /// bytes are wanted.
    fn handle_data(&mut self, data: &[u8]) -> bool;

    /// The stream has ended. `complete` is `true` when every byte of the
    /// stream was handed over.
    fn handle_end(&mut self, complete: bool);
}

pub struct DataEventSource<'b, H: DataEventHandler> {
    input: Box<dyn ByteSource + 'b>,
    handler: H,
    /// count of bytes handed to `handler`; also the offset of the next byte
    /// `handler` wants
    total_handled: FileOffset,
    /// `handler` wants no more bytes
    satisfied: bool,
    /// `handler.handle_end` was called
    ended: bool,
}

impl<'b, H: DataEventHandler> fmt::Debug for DataEventSource<'b, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataEventSource")
            .field("position", &self.input.position())
            .field("total_handled", &self.total_handled)
            .field("satisfied", &self.satisfied)
            .field("ended", &self.ended)
            .finish()
    }
}

impl<'b, H: DataEventHandler> DataEventSource<'b, H> {
    pub fn new(input: Box<dyn ByteSource + 'b>, handler: H) -> DataEventSource<'b, H> {
        DataEventSource {
            input,
            handler,
            total_handled: 0,
            satisfied: false,
            ended: false,
        }
    }

    /// Count of bytes handed to the handler so far.
    pub const fn total_handled(&self) -> FileOffset {
        self.total_handled
    }

    fn finish(&mut self, complete: bool) {
        if self.ended {
            return;
        }
        defo!("handle_end({})", complete);
        self.ended = true;
        self.handler.handle_end(complete);
    }
}

impl<'b, H: DataEventHandler> ByteSource for DataEventSource<'b, H> {
    fn read(&mut self, min: usize, max: usize) -> ResultS3ByteSource<'_> {
        // the end of data reached by the previous read
        if self.input.status().is_eof() {
            self.finish(true);
        }
        let start: FileOffset = self.input.position();
        match self.input.read(min, max) {
            ResultS3::Found(data) => {
                let end: FileOffset = start + data.len() as FileOffset;
                if end > self.total_handled {
                    if !self.satisfied && !self.ended {
                        let new_from: usize = self.total_handled.saturating_sub(start) as usize;
                        self.satisfied = !self.handler.handle_data(&data[new_from..]);
                    }
                    self.total_handled = end;
                }
                ResultS3::Found(data)
            }
            ResultS3::Done => {
                if !self.ended {
                    self.ended = true;
                    self.handler.handle_end(true);
                }
                ResultS3::Done
            }
            ResultS3::Err(err) => {
                if !self.ended {
                    self.ended = true;
                    self.handler.handle_end(false);
                }
                ResultS3::Err(err)
            }
        }
    }

    fn reset(&mut self, pos: FileOffset) -> FileOffset {
        self.input.reset(pos)
    }

    fn skip(&mut self, ntoskip: u64) -> u64 {
        defn!("({})", ntoskip);
        let skipped: u64 = if self.satisfied || self.ended {
            // nothing more for the handler; skip underneath it
            let start = self.input.position();
            let n = self.input.skip(ntoskip);
            if start + n > self.total_handled {
                self.total_handled = start + n;
            }
            if self.input.status().is_eof() {
                self.finish(true);
            }
            n
        } else {
            let mut skipped: u64 = 0;
            while skipped < ntoskip {
                let want = std::cmp::min(ntoskip - skipped, 1 << 16) as usize;
                match ByteSource::read(self, 1, want) {
                    ResultS3::Found(data) => skipped += data.len() as u64,
                    ResultS3::Done | ResultS3::Err(_) => break,
                }
            }
            skipped
        };
        defx!("skipped {}", skipped);

        skipped
    }

    fn position(&self) -> FileOffset {
        self.input.position()
    }

    fn size(&self) -> Option<FileSz> {
        self.input.size()
    }

    fn status(&self) -> &StreamStatus {
        self.input.status()
    }
}

impl<'b, H: DataEventHandler> Drop for DataEventSource<'b, H> {
    fn drop(&mut self) {
        let complete = self.input.status().is_eof();
        self.finish(complete);
    }
}
