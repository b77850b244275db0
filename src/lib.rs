// src/lib.rs

//! _dsalib_ extracts metadata and text from byte streams, recursing into
//! the streams embedded in them.
//!
//! See [`StreamAnalyzer`] for where analysis starts.
//!
//! [`StreamAnalyzer`]: crate::analyzers::streamanalyzer::StreamAnalyzer

pub mod analyzers;
pub mod common;
pub mod data;
pub mod debug;
pub mod libload;
pub mod readers;
pub mod units;
#[cfg(test)]
pub mod tests;
