// src/tests/bufferedsource_tests.rs

//! tests for `bufferedsource.rs` and `bytesource.rs`

use std::io::{Cursor, Read};

use crate::common::{ResultS3, HEADER_SZ};
use crate::debug::helpers::{create_temp_file_bytes, ntf_fpath};
use crate::readers::bufferedsource::{BufferedSource, ERR_LONGER_THAN_SPECIFIED};
use crate::readers::bytesource::{peek_bytes, ByteSource, SourceReader, StreamStatus};
use crate::readers::helpers::fpath_to_path;

use ::test_case::test_case;

/// `n` bytes of a repeating pattern.
fn pattern(n: usize) -> Vec<u8> {
    (0..n).map(|i| (i % 251) as u8).collect()
}

fn read_vec(source: &mut dyn ByteSource, min: usize, max: usize) -> Vec<u8> {
    match source.read(min, max) {
        ResultS3::Found(data) => data.to_vec(),
        ResultS3::Done => Vec::new(),
        ResultS3::Err(err) => panic!("read({}, {}) failed {}", min, max, err),
    }
}

#[test]
fn test_bufferedsource_read_exact() {
    let mut source = BufferedSource::from_bytes(b"hello world".to_vec());
    assert_eq!(read_vec(&mut source, 5, 5), b"hello");
    assert_eq!(source.position(), 5);
    assert_eq!(source.status(), &StreamStatus::Ok);
    assert_eq!(source.size(), Some(11));
}

#[test]
fn test_bufferedsource_min_zero_reads_one() {
    let mut source = BufferedSource::from_bytes(b"abc".to_vec());
    let data = read_vec(&mut source, 0, 1);
    assert_eq!(data, b"a");
}

#[test]
fn test_bufferedsource_short_at_end() {
    let mut source = BufferedSource::from_bytes(b"abc".to_vec());
    assert_eq!(read_vec(&mut source, 10, 10), b"abc");
    assert_eq!(source.status(), &StreamStatus::Eof);
    assert!(matches!(source.read(1, 0), ResultS3::Done));
    assert_eq!(source.position(), 3);
}

#[test]
fn test_bufferedsource_empty() {
    let mut source = BufferedSource::from_bytes(Vec::new());
    assert!(source.read(1, 0).is_done());
    assert!(source.status().is_eof());
    assert_eq!(source.size(), Some(0));
}

#[test]
fn test_bufferedsource_size_learned_at_eof() {
    let mut source = BufferedSource::new(Cursor::new(pattern(300)));
    assert_eq!(source.size(), None);
    assert_eq!(read_vec(&mut source, 100, 100).len(), 100);
    assert_eq!(source.size(), None);
    while source.read(1, 0).is_found() {}
    assert_eq!(source.size(), Some(300));
    assert_eq!(source.position(), 300);
}

#[test]
fn test_bufferedsource_header_stable_after_reset() {
    let data = pattern(3000);
    let mut source = BufferedSource::from_bytes(data.clone());
    let first = read_vec(&mut source, HEADER_SZ, HEADER_SZ);
    assert_eq!(first.len(), HEADER_SZ);
    assert_eq!(source.reset(0), 0);
    let second = read_vec(&mut source, HEADER_SZ, HEADER_SZ);
    assert_eq!(first, second);
    assert_eq!(first, data[..HEADER_SZ].to_vec());
}

#[test_case(5, 2, 2; "back")]
#[test_case(5, 5, 5; "same")]
#[test_case(2, 4, 4; "ahead within buffer")]
fn test_bufferedsource_reset(read: usize, pos: u64, expect: u64) {
    let mut source = BufferedSource::from_bytes(b"0123456789".to_vec());
    // buffer all ten bytes, then step back to `read`
    assert_eq!(read_vec(&mut source, 10, 10).len(), 10);
    assert_eq!(source.reset(read as u64), read as u64);
    assert_eq!(source.reset(pos), expect);
    let rest = read_vec(&mut source, 1, 0);
    assert_eq!(rest, b"0123456789"[expect as usize..].to_vec());
}

#[test]
fn test_bufferedsource_reset_beyond_buffer_fails() {
    let mut source = BufferedSource::from_bytes(b"abcdefghij".to_vec());
    read_vec(&mut source, 5, 5);
    read_vec(&mut source, 0, 0);
    // the consumed bytes were dropped to make room
    assert_eq!(source.position(), 10);
    assert_eq!(source.reset(0), 10);
}

#[test]
fn test_bufferedsource_reset_after_eof() {
    let mut source = BufferedSource::from_bytes(b"abc".to_vec());
    assert_eq!(read_vec(&mut source, 10, 10), b"abc");
    assert!(source.status().is_eof());
    assert_eq!(source.reset(0), 0);
    assert!(source.status().is_ok());
    assert_eq!(read_vec(&mut source, 3, 3), b"abc");
}

#[test]
fn test_bufferedsource_longer_than_specified() {
    let mut source = BufferedSource::with_size(Cursor::new(pattern(10)), Some(5));
    match source.read(10, 10) {
        ResultS3::Err(err) => assert!(err.to_string().contains(ERR_LONGER_THAN_SPECIFIED)),
        _ => panic!("expected Err"),
    }
    assert!(source.status().is_error());
    assert!(matches!(source.read(1, 1), ResultS3::Err(_)));
    assert_eq!(source.reset(0), 10);
}

#[test_case(100, 4096, 100, true; "skip all")]
#[test_case(10000, 4096, 4096, false; "skip some")]
#[test_case(0, 10, 0, true; "skip nothing")]
fn test_bufferedsource_skip(len: usize, n: u64, expect: u64, eof: bool) {
    let mut source = BufferedSource::from_bytes(pattern(len));
    assert_eq!(source.skip(n), expect);
    assert_eq!(source.position(), expect);
    assert_eq!(source.status().is_eof(), eof);
}

#[test]
fn test_bufferedsource_open() {
    let data = pattern(5000);
    let ntf = create_temp_file_bytes(&data);
    let fpath = ntf_fpath(&ntf);
    let mut source = BufferedSource::open(fpath_to_path(&fpath)).unwrap();
    assert_eq!(source.size(), Some(5000));
    assert_eq!(read_vec(&mut source, 5000, 5000), data);
}

#[test]
fn test_bufferedsource_open_missing() {
    let ntf = create_temp_file_bytes(b"");
    let fpath = ntf_fpath(&ntf) + ".missing";
    assert!(BufferedSource::open(fpath_to_path(&fpath)).is_err());
}

#[test]
fn test_sourcereader_read_to_end() {
    let data = pattern(20000);
    let mut source = BufferedSource::from_bytes(data.clone());
    let mut out: Vec<u8> = Vec::new();
    let mut reader = SourceReader::new(&mut source);
    reader.read_to_end(&mut out).unwrap();
    assert_eq!(reader.position(), 20000);
    assert_eq!(out, data);
}

#[test]
fn test_peek_bytes() {
    let mut source = BufferedSource::from_bytes(b"abcdef".to_vec());
    read_vec(&mut source, 1, 1);
    assert_eq!(peek_bytes(&mut source, 3).unwrap(), b"bcd");
    assert_eq!(source.position(), 1);
    assert_eq!(peek_bytes(&mut source, 100).unwrap(), b"bcdef");
    assert_eq!(source.position(), 1);
}

#[test]
fn test_streamstatus_display() {
    assert_eq!(StreamStatus::Ok.to_string(), "Ok");
    assert_eq!(StreamStatus::Eof.to_string(), "Eof");
}
