// src/common.rs

//! Type aliases and constants shared by all of _dsalib_, and the
//! [`ResultS3`] returned by stream reads.

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// file-handling
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `F`ake `Path` or `F`ile `Path`.
///
/// A node nested inside a container has an `FPath` made of the container's
/// `FPath`, [`SUBPATH_SEP`], and the name of the embedded object,
/// e.g. `music.zip|track01.mp3|0`.
pub type FPath = String;

/// Offset into a stream in bytes.
pub type FileOffset = u64;

/// Size of a stream in bytes.
pub type FileSz = u64;

/// Counts of entries, nodes, and the like.
pub type Count = u64;

/// Recursion depth of a node. Top-level files are depth `0`, every level of
/// embedding adds one.
pub type Depth = usize;

/// Separates the path of a container node from the name of a node embedded
/// in it.
///
/// e.g. `path/logs.tar|logs/messages`<br/>
/// e.g. `song.mp3.gz|song.mp3`
pub const SUBPATH_SEP: char = '|';

/// Size of the header window peeked from every stream before format
/// detection.
pub const HEADER_SZ: usize = 1024;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// custom Results enums
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Outcome of a stream read: bytes were read, the stream is at its end, or
/// reading failed.
///
/// Like [`Result`] with a third state so that end of data is not an error.
#[derive(Debug, PartialEq)]
pub enum ResultS3<T, E> {
    /// The bytes read.
    Found(T),
    /// End of data; nothing was read.
    Done,
    /// Reading failed.
    Err(E),
}

impl<T, E> ResultS3<T, E> {
    #[inline(always)]
    pub const fn is_found(&self) -> bool {
        matches!(*self, ResultS3::Found(_))
    }

    #[inline(always)]
    pub const fn is_done(&self) -> bool {
        matches!(*self, ResultS3::Done)
    }
}
