// src/readers/streambuffer.rs

//! Implements [`StreamBuffer`], the growable byte window behind a
//! [`BufferedSource`].
//!
//! A `StreamBuffer` is one allocation with a read cursor and a count of
//! bytes available after the cursor:
//!
//! ```text
//! 0           read_pos            read_pos + avail        capacity
//! ├───────────┼───────────────────┼───────────────────────┤
//! │ consumed  │ available         │ free                  │
//! ```
//!
//! Consumed bytes are kept until more space is needed, so a reader may
//! step back over them; that is what makes [`BufferedSource::reset`] work.
//!
//! [`BufferedSource`]: crate::readers::bufferedsource::BufferedSource
//! [`BufferedSource::reset`]: crate::readers::bufferedsource::BufferedSource

use ::more_asserts::debug_assert_le;
use ::si_trace_print::defo;

#[derive(Debug, Default)]
pub struct StreamBuffer {
    buf: Vec<u8>,
    /// index of the next byte to hand out
    read_pos: usize,
    /// count of bytes available at `read_pos`
    avail: usize,
}

impl StreamBuffer {
    pub fn new() -> StreamBuffer {
        StreamBuffer::default()
    }

    pub fn with_capacity(capacity: usize) -> StreamBuffer {
        StreamBuffer {
            buf: vec![0; capacity],
            read_pos: 0,
            avail: 0,
        }
    }

    /// Total allocated bytes.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes available for reading.
    pub const fn avail(&self) -> usize {
        self.avail
    }

    /// Bytes already handed out and still held, i.e. how far a reader can
    /// step back.
    pub const fn consumed(&self) -> usize {
        self.read_pos
    }

    fn set_capacity(&mut self, capacity: usize) {
        defo!("resize {} → {}", self.buf.len(), capacity);
        self.buf.resize(capacity, 0);
    }

    /// Make room for writing at least `needed` bytes after the available
    /// bytes. Returns the count of bytes that may be written, which is at
    /// least `needed`.
    ///
    /// Consumed bytes are dropped only when the free space is too small. The
    /// allocation doubles when that covers the shortfall, otherwise grows to
    /// fit exactly.
    pub fn make_space(&mut self, needed: usize) -> usize {
        debug_assert_le!(self.read_pos + self.avail, self.buf.len());
        let mut space: usize = self.buf.len() - self.read_pos - self.avail;
        if space >= needed {
            return space;
        }
        if self.avail != 0 {
            if self.read_pos != 0 {
                // move available bytes to the start of the buffer
                self.buf.copy_within(self.read_pos..self.read_pos + self.avail, 0);
                space += self.read_pos;
                self.read_pos = 0;
            }
        } else {
            self.read_pos = 0;
            space = self.buf.len();
        }
        if space >= needed {
            return space;
        }
        let capacity = self.buf.len();
        if capacity > needed - space {
            self.set_capacity(capacity * 2);
            return space + capacity;
        }
        self.set_capacity(capacity + needed - space);

        needed
    }

    /// The free space after the available bytes, for a producer to fill.
    /// Call [`StreamBuffer::commit`] with the count of bytes written.
    pub fn write_slice(&mut self, max: usize) -> &mut [u8] {
        let at = self.read_pos + self.avail;
        let end = std::cmp::min(at + max, self.buf.len());
        &mut self.buf[at..end]
    }

    /// Mark `n` bytes written by a producer as available.
    pub fn commit(&mut self, n: usize) {
        self.avail += n;
        debug_assert_le!(self.read_pos + self.avail, self.buf.len());
    }

    /// Consume up to `max` available bytes (`0` means all). Returns the
    /// consumed range as `(start, len)` within [`StreamBuffer::data`].
    pub fn read(&mut self, max: usize) -> (usize, usize) {
        let n = if max == 0 || max > self.avail { self.avail } else { max };
        let start = self.read_pos;
        self.read_pos += n;
        self.avail -= n;

        (start, n)
    }

    /// Step back over `n` consumed bytes. Returns `false`, changing nothing,
    /// when fewer than `n` consumed bytes are held.
    pub fn unread(&mut self, n: usize) -> bool {
        if n > self.read_pos {
            return false;
        }
        self.read_pos -= n;
        self.avail += n;

        true
    }

    /// Drop `n` available bytes without handing them out. Returns `false`,
    /// changing nothing, when fewer than `n` bytes are available.
    pub fn advance(&mut self, n: usize) -> bool {
        if n > self.avail {
            return false;
        }
        self.read_pos += n;
        self.avail -= n;

        true
    }

    pub fn data(&self) -> &[u8] {
        &self.buf
    }
}
