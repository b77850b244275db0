// src/tests/dataeventsource_tests.rs

//! tests for `dataeventsource.rs`

use std::cell::RefCell;
use std::rc::Rc;

use crate::common::ResultS3;
use crate::readers::bufferedsource::BufferedSource;
use crate::readers::bytesource::ByteSource;
use crate::readers::dataeventsource::{DataEventHandler, DataEventSource};

use ::test_case::test_case;

/// What a [`Recorder`] was handed.
#[derive(Debug, Default)]
struct Recorded {
    data: Vec<u8>,
    chunks: usize,
    ends: Vec<bool>,
}

/// Handler recording everything; wants at most `want` bytes.
struct Recorder {
    recorded: Rc<RefCell<Recorded>>,
    want: usize,
}

impl DataEventHandler for Recorder {
    fn handle_data(&mut self, data: &[u8]) -> bool {
        let mut recorded = self.recorded.borrow_mut();
        recorded.data.extend_from_slice(data);
        recorded.chunks += 1;

        recorded.data.len() < self.want
    }

    fn handle_end(&mut self, complete: bool) {
        self.recorded.borrow_mut().ends.push(complete);
    }
}

fn new_source<'b>(
    data: &[u8],
    want: usize,
) -> (DataEventSource<'b, Recorder>, Rc<RefCell<Recorded>>) {
    let recorded = Rc::new(RefCell::new(Recorded::default()));
    let handler = Recorder {
        recorded: recorded.clone(),
        want,
    };
    let input = Box::new(BufferedSource::from_bytes(data.to_vec()));

    (DataEventSource::new(input, handler), recorded)
}

#[test_case(1; "one")]
#[test_case(3; "three")]
#[test_case(100; "all")]
fn test_dataeventsource_read_all(step: usize) {
    let (mut source, recorded) = new_source(b"abcdefgh", usize::MAX);
    loop {
        match source.read(step, step) {
            ResultS3::Found(_) => {}
            ResultS3::Done => break,
            ResultS3::Err(err) => panic!("{}", err),
        }
    }
    assert_eq!(source.total_handled(), 8);
    assert_eq!(recorded.borrow().data, b"abcdefgh");
    assert_eq!(recorded.borrow().ends, vec![true]);
    drop(source);
    assert_eq!(recorded.borrow().ends, vec![true]);
}

#[test]
fn test_dataeventsource_reread_once() {
    let (mut source, recorded) = new_source(b"abcdefgh", usize::MAX);
    assert!(source.read(4, 4).is_found());
    assert_eq!(source.reset(0), 0);
    match source.read(6, 6) {
        ResultS3::Found(data) => assert_eq!(data, b"abcdef"),
        _ => panic!("expected Found"),
    }
    assert_eq!(recorded.borrow().data, b"abcdef");
    assert_eq!(source.total_handled(), 6);
    assert_eq!(source.reset(2), 2);
    assert!(source.read(2, 2).is_found());
    assert_eq!(recorded.borrow().data, b"abcdef");
    assert_eq!(recorded.borrow().chunks, 2);
}

#[test]
fn test_dataeventsource_satisfied() {
    let (mut source, recorded) = new_source(b"abcdefgh", 2);
    assert!(source.read(3, 3).is_found());
    assert!(source.read(3, 3).is_found());
    assert_eq!(recorded.borrow().data, b"abc");
    assert_eq!(source.total_handled(), 6);
    assert_eq!(recorded.borrow().chunks, 1);
}

#[test]
fn test_dataeventsource_drop_incomplete() {
    let (mut source, recorded) = new_source(b"abcdefgh", usize::MAX);
    assert!(source.read(3, 3).is_found());
    drop(source);
    assert_eq!(recorded.borrow().ends, vec![false]);
}

#[test]
fn test_dataeventsource_drop_after_eof() {
    let (mut source, recorded) = new_source(b"abc", usize::MAX);
    assert!(source.read(10, 10).is_found());
    assert!(source.status().is_eof());
    assert!(recorded.borrow().ends.is_empty());
    drop(source);
    assert_eq!(recorded.borrow().ends, vec![true]);
}

#[test]
fn test_dataeventsource_skip_handles_bytes() {
    let data: Vec<u8> = (0..10000).map(|i| (i % 256) as u8).collect();
    let (mut source, recorded) = new_source(&data, usize::MAX);
    assert_eq!(source.skip(20000), 10000);
    assert_eq!(recorded.borrow().data, data);
    assert_eq!(source.size(), Some(10000));
    assert_eq!(recorded.borrow().ends, vec![true]);
}

#[test]
fn test_dataeventsource_skip_when_satisfied() {
    let data: Vec<u8> = vec![b'x'; 5000];
    let (mut source, recorded) = new_source(&data, 10);
    assert!(source.read(10, 10).is_found());
    assert_eq!(source.skip(100000), 4990);
    assert_eq!(recorded.borrow().data.len(), 10);
    assert_eq!(source.total_handled(), 5000);
    assert_eq!(recorded.borrow().ends, vec![true]);
}
