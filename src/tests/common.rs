// src/tests/common.rs

//! Common fixtures for tests: analyzers, configurations, and units that
//! misbehave on purpose.

use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::analyzers::config::{AnalyzerConfig, AnalyzerConfiguration};
use crate::analyzers::error::{AnalysisStatus, AnalyzerError, ResultAnalyzer};
use crate::analyzers::streamanalyzer::StreamAnalyzer;
use crate::analyzers::units::{
    AnalyzerFactories,
    TerminalUnit,
    TerminalUnitFactory,
    TransformUnit,
    TransformUnitFactory,
    UnitFactory,
};
use crate::common::ResultS3;
use crate::data::analysisresult::{AnalysisResult, IndexedNode, MemoryIndexWriter, SinkHandle};
use crate::data::fieldregister::{FieldP, FieldRegister};
use crate::readers::bufferedsource::BufferedSource;
use crate::readers::bytesource::ByteSource;

/// Key of the field recorded by [`TagUnit`].
pub const FIELD_TAG: &str = "testTag";

/// A `StreamAnalyzer` with the built-in units only.
pub fn new_analyzer(conf: AnalyzerConfig) -> StreamAnalyzer {
    StreamAnalyzer::with_plugins(Arc::new(conf), &AnalyzerFactories::new())
}

/// Analyze `data` as a top-level node `name`. Returns the status and the
/// nodes in finishing order; the top-level node is last.
pub fn analyze_bytes(
    analyzer: &StreamAnalyzer,
    name: &str,
    data: &[u8],
) -> (AnalysisStatus, Vec<IndexedNode>) {
    let writer = RefCell::new(MemoryIndexWriter::new());
    let source = BufferedSource::from_bytes(data.to_vec());
    let status = analyzer.index_stream(name, 0, Box::new(source), &writer);

    (status, writer.into_inner().take_nodes())
}

/// The node at `path` in `nodes`; panics if missing.
pub fn find_node<'a>(nodes: &'a [IndexedNode], path: &str) -> &'a IndexedNode {
    match nodes.iter().find(|n| n.info.path == path) {
        Some(node) => node,
        None => panic!(
            "no node {:?} in {:?}",
            path,
            nodes.iter().map(|n| n.info.path.as_str()).collect::<Vec<&str>>()
        ),
    }
}

/// String values of field `key` of `node`.
pub fn strings_of(node: &IndexedNode, key: &str) -> Vec<String> {
    node.values_of(key).iter().map(|v| v.s()).collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// test units
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Terminal unit accepting headers starting with `magic`. Records
/// `testTag = tag`, reads `read` bytes, then succeeds or fails. Every header
/// offered to it is kept in `headers`.
pub struct TagUnit {
    name: String,
    magic: Vec<u8>,
    tag: String,
    read: usize,
    fail: bool,
    tag_field: FieldP,
    calls: Arc<AtomicUsize>,
    headers: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl TerminalUnit for TagUnit {
    fn name(&self) -> &str {
        self.name.as_str()
    }

    fn check_header(&self, header: &[u8]) -> bool {
        self.headers.lock().unwrap().push(header.to_vec());
        header.starts_with(&self.magic)
    }

    fn analyze(
        &mut self,
        result: &mut AnalysisResult<'_>,
        input: &mut dyn ByteSource,
    ) -> ResultAnalyzer<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.read > 0 {
            match input.read(self.read, self.read) {
                ResultS3::Found(_) | ResultS3::Done => {}
                ResultS3::Err(err) => return Err(AnalyzerError::Stream(err)),
            }
        }
        if self.fail {
            return Err(AnalyzerError::format(self.name.as_str(), "test failure"));
        }
        result.add_value(&self.tag_field, self.tag.as_str());

        Ok(())
    }
}

/// Factory of [`TagUnit`]s; `calls` counts `analyze` calls of all its
/// instances and `headers` collects the headers offered to them.
pub struct TagUnitFactory {
    pub name: String,
    pub magic: Vec<u8>,
    pub tag: String,
    pub read: usize,
    pub fail: bool,
    pub calls: Arc<AtomicUsize>,
    pub headers: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl TagUnitFactory {
    pub fn new(name: &str, magic: &[u8], tag: &str) -> TagUnitFactory {
        TagUnitFactory {
            name: String::from(name),
            magic: magic.to_vec(),
            tag: String::from(tag),
            read: 0,
            fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
            headers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(name: &str, magic: &[u8], read: usize) -> TagUnitFactory {
        let mut factory = TagUnitFactory::new(name, magic, "");
        factory.read = read;
        factory.fail = true;

        factory
    }
}

impl UnitFactory for TagUnitFactory {
    fn name(&self) -> &str {
        self.name.as_str()
    }

    fn register_fields(&self, register: &FieldRegister) {
        register.register_field(FIELD_TAG);
    }
}

impl TerminalUnitFactory for TagUnitFactory {
    fn new_instance(&self, register: &FieldRegister) -> Box<dyn TerminalUnit> {
        Box::new(TagUnit {
            name: self.name.clone(),
            magic: self.magic.clone(),
            tag: self.tag.clone(),
            read: self.read,
            fail: self.fail,
            tag_field: register.register_field(FIELD_TAG),
            calls: self.calls.clone(),
            headers: self.headers.clone(),
        })
    }
}

/// Transform unit that reads ahead `read` bytes and does not rewind.
pub struct ReadAheadUnit {
    read: usize,
}

impl TransformUnit for ReadAheadUnit {
    fn name(&self) -> &str {
        "ReadAheadUnit"
    }

    fn set_indexable(&mut self, _sink: Option<SinkHandle>) {}

    fn connect_input_stream<'b>(
        &mut self,
        mut input: Box<dyn ByteSource + 'b>,
    ) -> Box<dyn ByteSource + 'b> {
        let _ = input.read(self.read, self.read);

        input
    }

    fn is_ready_with_stream(&self) -> bool {
        true
    }
}

pub struct ReadAheadUnitFactory {
    pub read: usize,
}

impl UnitFactory for ReadAheadUnitFactory {
    fn name(&self) -> &str {
        "ReadAheadUnit"
    }

    fn register_fields(&self, _register: &FieldRegister) {}
}

impl TransformUnitFactory for ReadAheadUnitFactory {
    fn new_instance(&self, _register: &FieldRegister) -> Box<dyn TransformUnit> {
        Box::new(ReadAheadUnit { read: self.read })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// test configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuration whose `index_more` turns `false` after `limit` calls.
pub struct CountdownConfig {
    pub inner: AnalyzerConfig,
    pub limit: usize,
    pub calls: AtomicUsize,
}

impl CountdownConfig {
    pub fn new(limit: usize) -> CountdownConfig {
        CountdownConfig {
            inner: AnalyzerConfig::new(),
            limit,
            calls: AtomicUsize::new(0),
        }
    }
}

impl AnalyzerConfiguration for CountdownConfig {
    fn index_more(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst) < self.limit
    }

    fn unit_order(&self) -> &crate::analyzers::config::UnitOrder {
        self.inner.unit_order()
    }

    fn field_register(&self) -> &crate::data::fieldregister::FieldRegisterP {
        self.inner.field_register()
    }
}
