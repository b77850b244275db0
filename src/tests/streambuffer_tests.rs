// src/tests/streambuffer_tests.rs

//! tests for `streambuffer.rs`

use crate::readers::streambuffer::StreamBuffer;

use ::test_case::test_case;

/// Write `data` into `buffer` through `make_space`, `write_slice`, `commit`.
fn fill(buffer: &mut StreamBuffer, data: &[u8]) {
    let space = buffer.make_space(data.len());
    assert!(space >= data.len());
    buffer.write_slice(data.len())[..data.len()].copy_from_slice(data);
    buffer.commit(data.len());
}

fn read_bytes(buffer: &mut StreamBuffer, max: usize) -> Vec<u8> {
    let (start, n) = buffer.read(max);
    buffer.data()[start..start + n].to_vec()
}

#[test]
fn test_streambuffer_new_empty() {
    let buffer = StreamBuffer::new();
    assert_eq!(buffer.capacity(), 0);
    assert_eq!(buffer.avail(), 0);
    assert_eq!(buffer.consumed(), 0);
}

#[test_case(0, 10, 10; "empty grows to fit")]
#[test_case(8, 4, 8; "enough space")]
#[test_case(8, 12, 16; "doubles")]
#[test_case(8, 100, 100; "grows to fit")]
fn test_streambuffer_make_space(capacity: usize, needed: usize, expect_capacity: usize) {
    let mut buffer = StreamBuffer::with_capacity(capacity);
    let space = buffer.make_space(needed);
    assert!(space >= needed);
    assert_eq!(buffer.capacity(), expect_capacity);
}

#[test]
fn test_streambuffer_read_unread() {
    let mut buffer = StreamBuffer::new();
    fill(&mut buffer, b"abcdef");
    assert_eq!(read_bytes(&mut buffer, 4), b"abcd");
    assert_eq!(buffer.avail(), 2);
    assert_eq!(buffer.consumed(), 4);
    assert!(buffer.unread(3));
    assert_eq!(read_bytes(&mut buffer, 0), b"bcdef");
    assert!(!buffer.unread(7));
    assert_eq!(buffer.consumed(), 6);
}

#[test]
fn test_streambuffer_advance() {
    let mut buffer = StreamBuffer::new();
    fill(&mut buffer, b"abcdef");
    assert!(buffer.advance(2));
    assert_eq!(read_bytes(&mut buffer, 2), b"cd");
    assert!(!buffer.advance(3));
    assert_eq!(buffer.avail(), 2);
}

#[test]
fn test_streambuffer_keeps_consumed_when_space() {
    let mut buffer = StreamBuffer::with_capacity(16);
    fill(&mut buffer, b"abcd");
    read_bytes(&mut buffer, 2);
    fill(&mut buffer, b"ef");
    assert_eq!(buffer.consumed(), 2);
    assert!(buffer.unread(2));
    assert_eq!(read_bytes(&mut buffer, 0), b"abcdef");
}

#[test]
fn test_streambuffer_compacts() {
    let mut buffer = StreamBuffer::with_capacity(8);
    fill(&mut buffer, b"abcdefgh");
    read_bytes(&mut buffer, 6);
    // 2 available, 0 free; dropping the 6 consumed bytes makes room
    fill(&mut buffer, b"ijkl");
    assert_eq!(buffer.consumed(), 0);
    assert_eq!(buffer.capacity(), 8);
    assert_eq!(read_bytes(&mut buffer, 0), b"ghijkl");
}

#[test]
fn test_streambuffer_drops_consumed_when_empty() {
    let mut buffer = StreamBuffer::with_capacity(4);
    fill(&mut buffer, b"abcd");
    read_bytes(&mut buffer, 0);
    fill(&mut buffer, b"ef");
    assert_eq!(buffer.consumed(), 0);
    assert!(!buffer.unread(1));
    assert_eq!(read_bytes(&mut buffer, 0), b"ef");
}
