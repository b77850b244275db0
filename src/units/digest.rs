// src/units/digest.rs

//! Content digest of a whole stream.
//!
//! A node read to its end gets a `hasHash` value: an anonymous URI with
//! triplets for its type, algorithm, and hex value. A node not read to its
//! end, or without content, gets nothing.

use crate::analyzers::units::{EventUnit, EventUnitFactory, UnitFactory};
use crate::data::analysisresult::SinkHandle;
use crate::data::fieldregister::{FieldP, FieldRegister};

use ::sha2::{Digest, Sha256};
use ::si_trace_print::defñ;

pub const NAME_DIGEST: &str = "DigestEventUnit";

pub const PREDICATE_TYPE: &str = "type";
pub const PREDICATE_HASH_ALGORITHM: &str = "hashAlgorithm";
pub const PREDICATE_HASH_VALUE: &str = "hashValue";
pub const TYPE_FILE_HASH: &str = "FileHash";
pub const ALGORITHM_SHA256: &str = "SHA256";

/// Lower-case hex of `bytes`.
pub fn to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes.iter() {
        s.push_str(&format!("{:02x}", b));
    }

    s
}

pub struct DigestEventUnit {
    hashash_field: FieldP,
    sink: Option<SinkHandle>,
    hasher: Sha256,
    count: u64,
}

impl EventUnit for DigestEventUnit {
    fn name(&self) -> &str {
        NAME_DIGEST
    }

    fn start_analysis(&mut self, sink: SinkHandle) {
        self.sink = Some(sink);
        self.hasher = Sha256::new();
        self.count = 0;
    }

    fn handle_data(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.count += data.len() as u64;
    }

    fn end_analysis(&mut self, complete: bool) {
        let sink = match self.sink.take() {
            Some(val) => val,
            None => return,
        };
        let hasher = std::mem::take(&mut self.hasher);
        defñ!("complete {}, count {}", complete, self.count);
        if !complete || self.count == 0 {
            return;
        }
        let value = to_hex(&hasher.finalize());
        let uri = sink.new_anonymous_uri();
        sink.add_value(&self.hashash_field, uri.as_str());
        sink.add_triplet(&uri, PREDICATE_TYPE, TYPE_FILE_HASH);
        sink.add_triplet(&uri, PREDICATE_HASH_ALGORITHM, ALGORITHM_SHA256);
        sink.add_triplet(&uri, PREDICATE_HASH_VALUE, &value);
    }

    /// Never ready; a digest needs every byte.
    fn is_ready_with_stream(&self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
pub struct DigestEventUnitFactory {}

impl DigestEventUnitFactory {
    pub fn new() -> DigestEventUnitFactory {
        DigestEventUnitFactory {}
    }
}

impl UnitFactory for DigestEventUnitFactory {
    fn name(&self) -> &str {
        NAME_DIGEST
    }

    fn register_fields(&self, _register: &FieldRegister) {}
}

impl EventUnitFactory for DigestEventUnitFactory {
    fn new_instance(&self, register: &FieldRegister) -> Box<dyn EventUnit> {
        Box::new(DigestEventUnit {
            hashash_field: register.hashash_field.clone(),
            sink: None,
            hasher: Sha256::new(),
            count: 0,
        })
    }
}
