// src/readers/mod.rs

//! Streams for _dsalib_.
//!
//! ## Overview of readers
//!
//! * A [`ByteSource`] is a readable stream that can step back over buffered
//!   bytes. Every unit reads from a `ByteSource`.
//! * A [`BufferedSource`] is the `ByteSource` over any [`std::io::Read`],
//!   backed by a growable [`StreamBuffer`].
//! * A [`DataEventSource`] wraps a `ByteSource` and hands each byte read
//!   through it to a [`DataEventHandler`] exactly once.
//! * A [`SourceReader`] turns a `ByteSource` back into a `std::io::Read`, so
//!   decoders from the ecosystem crates read embedded streams.
//!
//! [`ByteSource`]: crate::readers::bytesource::ByteSource
//! [`BufferedSource`]: crate::readers::bufferedsource::BufferedSource
//! [`StreamBuffer`]: crate::readers::streambuffer::StreamBuffer
//! [`DataEventSource`]: crate::readers::dataeventsource::DataEventSource
//! [`DataEventHandler`]: crate::readers::dataeventsource::DataEventHandler
//! [`SourceReader`]: crate::readers::bytesource::SourceReader

pub mod bufferedsource;
pub mod bytesource;
pub mod dataeventsource;
pub mod helpers;
pub mod streambuffer;
