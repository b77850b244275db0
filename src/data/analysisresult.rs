// src/data/analysisresult.rs

//! Implements [`AnalysisResult`], the recording context of one node, and
//! [`IndexWriter`], the consumer of recorded facts.
//!
//! An `AnalysisResult` is created by the caller for a top-level file, or by
//! a [`TerminalUnit`] with [`AnalysisResult::index_child`] for an embedded
//! object. It collects, in order:
//!
//! * field values, `(`[`FieldP`]`, `[`Variant`]`)`
//! * triplets `(subject, predicate, object)` linking non-literal facts
//!   through anonymous URIs, see [`AnalysisResult::new_anonymous_uri`]
//! * blocks of indexable text
//!
//! When the node finishes the facts are handed to the [`IndexWriter`]: one
//! `start_analysis`, one call per fact, one `finish_analysis`. A child node
//! always finishes before its parent.
//!
//! Units that only observe the stream ([`TransformUnit`], [`EventUnit`])
//! get a [`SinkHandle`]: a non-owning handle that records into the node
//! while it is alive and silently does nothing afterwards.
//!
//! [`TerminalUnit`]: crate::analyzers::units::TerminalUnit
//! [`TransformUnit`]: crate::analyzers::units::TransformUnit
//! [`EventUnit`]: crate::analyzers::units::EventUnit

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::analyzers::config::AnalyzerConfiguration;
use crate::analyzers::error::AnalysisStatus;
use crate::analyzers::streamanalyzer::StreamAnalyzer;
use crate::common::{Depth, FPath};
use crate::data::fieldregister::{FieldP, FieldRegister, RegisteredField};
use crate::data::variant::Variant;
use crate::readers::bytesource::ByteSource;
use crate::readers::helpers::{basename, child_fpath, extension};
use crate::{de_err, de_wrn};

use ::si_trace_print::{defn, defo, defx};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// node facts
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Identity of a node as seen by an [`IndexWriter`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NodeInfo {
    /// e.g. `music.zip|track01.mp3`
    pub path: FPath,
    /// last component of `path`
    pub name: String,
    pub depth: Depth,
    /// modification time, seconds since the Unix epoch
    pub mtime: u64,
    pub parent_path: Option<FPath>,
    pub mime_type: Option<String>,
}

/// One recorded fact.
#[derive(Clone, Debug)]
pub enum Fact {
    Value { field: FieldP, value: Variant },
    Triplet { subject: String, predicate: String, object: String },
    Text(String),
}

/// Facts of one node. Shared between the [`AnalysisResult`] that owns it
/// and the [`SinkHandle`]s that point at it.
#[derive(Debug)]
pub struct NodeRecord {
    info: NodeInfo,
    facts: Vec<Fact>,
    /// the node has been handed to the `IndexWriter`
    ended: bool,
}

impl NodeRecord {
    fn push(&mut self, fact: Fact) {
        if self.ended {
            de_wrn!("fact recorded after node {:?} ended; dropped: {:?}", self.info.path, fact);
            return;
        }
        self.facts.push(fact);
    }
}

/// Process-unique counter for anonymous URIs.
static ANONYMOUS_URI_COUNT: AtomicU64 = AtomicU64::new(0);

/// Mint a process-unique opaque URI.
pub fn new_anonymous_uri() -> String {
    let n = ANONYMOUS_URI_COUNT.fetch_add(1, Ordering::Relaxed);

    format!("_:b{}", n)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// IndexWriter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Consumer of the facts of finished nodes, e.g. a search index.
///
/// For each node the calls are one `start_analysis`, the facts in the order
/// they were recorded, then one `finish_analysis`. Calls for different nodes
/// never interleave.
pub trait IndexWriter {
    fn start_analysis(&mut self, node: &NodeInfo);
    fn add_value(&mut self, node: &NodeInfo, field: &RegisteredField, value: &Variant);
    fn add_triplet(&mut self, node: &NodeInfo, subject: &str, predicate: &str, object: &str);
    fn add_text(&mut self, node: &NodeInfo, text: &str);
    fn finish_analysis(&mut self, node: &NodeInfo);
}

/// All facts of one finished node.
#[derive(Clone, Debug, Default)]
pub struct IndexedNode {
    pub info: NodeInfo,
    pub values: Vec<(String, Variant)>,
    pub triplets: Vec<(String, String, String)>,
    pub text: String,
}

impl IndexedNode {
    /// First value recorded for the field `key`.
    pub fn value(&self, key: &str) -> Option<&Variant> {
        self.values.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// All values recorded for the field `key`, in order.
    pub fn values_of(&self, key: &str) -> Vec<&Variant> {
        self.values.iter().filter(|(k, _)| k == key).map(|(_, v)| v).collect()
    }

    /// Objects of the triplets with `subject` and `predicate`.
    pub fn objects(&self, subject: &str, predicate: &str) -> Vec<&str> {
        self.triplets
            .iter()
            .filter(|(s, p, _)| s == subject && p == predicate)
            .map(|(_, _, o)| o.as_str())
            .collect()
    }
}

/// An [`IndexWriter`] keeping finished nodes in memory, in finishing order.
#[derive(Debug, Default)]
pub struct MemoryIndexWriter {
    nodes: Vec<IndexedNode>,
    current: Option<IndexedNode>,
}

impl MemoryIndexWriter {
    pub fn new() -> MemoryIndexWriter {
        MemoryIndexWriter::default()
    }

    pub fn nodes(&self) -> &[IndexedNode] {
        &self.nodes
    }

    /// The finished node at `path`.
    pub fn node(&self, path: &str) -> Option<&IndexedNode> {
        self.nodes.iter().find(|n| n.info.path == path)
    }

    /// Remove and return all finished nodes.
    pub fn take_nodes(&mut self) -> Vec<IndexedNode> {
        std::mem::take(&mut self.nodes)
    }
}

impl IndexWriter for MemoryIndexWriter {
    fn start_analysis(&mut self, node: &NodeInfo) {
        if let Some(current) = self.current.take() {
            de_err!("node {:?} started before node {:?} finished", node.path, current.info.path);
            self.nodes.push(current);
        }
        self.current = Some(IndexedNode {
            info: node.clone(),
            ..Default::default()
        });
    }

    fn add_value(&mut self, _node: &NodeInfo, field: &RegisteredField, value: &Variant) {
        if let Some(current) = self.current.as_mut() {
            current.values.push((String::from(field.key()), value.clone()));
        }
    }

    fn add_triplet(&mut self, _node: &NodeInfo, subject: &str, predicate: &str, object: &str) {
        if let Some(current) = self.current.as_mut() {
            current.triplets.push((
                String::from(subject),
                String::from(predicate),
                String::from(object),
            ));
        }
    }

    fn add_text(&mut self, _node: &NodeInfo, text: &str) {
        if let Some(current) = self.current.as_mut() {
            current.text.push_str(text);
        }
    }

    fn finish_analysis(&mut self, _node: &NodeInfo) {
        if let Some(current) = self.current.take() {
            self.nodes.push(current);
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SinkHandle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Non-owning handle to the node an [`AnalysisResult`] records into.
///
/// Recording through a handle whose node has ended does nothing and returns
/// `false`.
#[derive(Clone, Debug)]
pub struct SinkHandle {
    record: Weak<RefCell<NodeRecord>>,
}

impl SinkHandle {
    fn with_record<F: FnOnce(&mut NodeRecord)>(&self, f: F) -> bool {
        let record = match self.record.upgrade() {
            Some(val) => val,
            None => return false,
        };
        let result = match record.try_borrow_mut() {
            Ok(mut record) => {
                if record.ended {
                    return false;
                }
                f(&mut record);
                true
            }
            Err(_) => {
                de_err!("node record is borrowed; fact dropped");
                false
            }
        };

        result
    }

    /// The node is alive and accepting facts.
    pub fn is_bound(&self) -> bool {
        match self.record.upgrade() {
            Some(record) => match record.try_borrow() {
                Ok(record) => !record.ended,
                Err(_) => true,
            },
            None => false,
        }
    }

    pub fn add_value<V: Into<Variant>>(&self, field: &FieldP, value: V) -> bool {
        let value: Variant = value.into();
        self.with_record(|record| {
            record.push(Fact::Value { field: field.clone(), value })
        })
    }

    pub fn add_triplet(&self, subject: &str, predicate: &str, object: &str) -> bool {
        self.with_record(|record| {
            record.push(Fact::Triplet {
                subject: String::from(subject),
                predicate: String::from(predicate),
                object: String::from(object),
            })
        })
    }

    pub fn add_text(&self, text: &str) -> bool {
        self.with_record(|record| record.push(Fact::Text(String::from(text))))
    }

    pub fn new_anonymous_uri(&self) -> String {
        new_anonymous_uri()
    }

    pub fn set_mime_type(&self, mime_type: &str) -> bool {
        self.with_record(|record| record.info.mime_type = Some(String::from(mime_type)))
    }

    /// Name of the node, if it is alive.
    pub fn name(&self) -> Option<String> {
        let record = self.record.upgrade()?;
        let record = record.try_borrow().ok()?;

        Some(record.info.name.clone())
    }

    /// Path of the node, if it is alive.
    pub fn path(&self) -> Option<FPath> {
        let record = self.record.upgrade()?;
        let record = record.try_borrow().ok()?;

        Some(record.info.path.clone())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AnalysisResult
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The recording context of one node.
pub struct AnalysisResult<'a> {
    analyzer: &'a StreamAnalyzer,
    writer: &'a RefCell<dyn IndexWriter>,
    record: Rc<RefCell<NodeRecord>>,
    /// name of the `TerminalUnit` analyzing this node, for error attribution
    end_analyzer: Option<String>,
    child: Option<Box<AnalysisResult<'a>>>,
    finished: bool,
}

impl fmt::Debug for AnalysisResult<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = self.record.borrow();
        f.debug_struct("AnalysisResult")
            .field("path", &record.info.path)
            .field("depth", &record.info.depth)
            .field("facts", &record.facts.len())
            .field("end_analyzer", &self.end_analyzer)
            .field("child", &self.child.is_some())
            .finish()
    }
}

impl<'a> AnalysisResult<'a> {
    /// Create the context of a top-level node at `path`, depth `0`.
    pub fn new(
        path: &str,
        mtime: u64,
        writer: &'a RefCell<dyn IndexWriter>,
        analyzer: &'a StreamAnalyzer,
    ) -> AnalysisResult<'a> {
        let info = NodeInfo {
            path: FPath::from(path),
            name: basename(path),
            depth: 0,
            mtime,
            parent_path: None,
            mime_type: None,
        };

        Self::from_info(info, writer, analyzer)
    }

    fn from_info(
        info: NodeInfo,
        writer: &'a RefCell<dyn IndexWriter>,
        analyzer: &'a StreamAnalyzer,
    ) -> AnalysisResult<'a> {
        AnalysisResult {
            analyzer,
            writer,
            record: Rc::new(RefCell::new(NodeRecord {
                info,
                facts: Vec::new(),
                ended: false,
            })),
            end_analyzer: None,
            child: None,
            finished: false,
        }
    }

    pub fn path(&self) -> FPath {
        self.record.borrow().info.path.clone()
    }

    pub fn file_name(&self) -> String {
        self.record.borrow().info.name.clone()
    }

    /// Lower-case extension of the node name.
    pub fn extension(&self) -> Option<String> {
        extension(self.record.borrow().info.name.as_str())
    }

    pub fn depth(&self) -> Depth {
        self.record.borrow().info.depth
    }

    pub fn mtime(&self) -> u64 {
        self.record.borrow().info.mtime
    }

    pub fn parent_path(&self) -> Option<FPath> {
        self.record.borrow().info.parent_path.clone()
    }

    pub fn info(&self) -> NodeInfo {
        self.record.borrow().info.clone()
    }

    pub fn analyzer(&self) -> &'a StreamAnalyzer {
        self.analyzer
    }

    pub fn config(&self) -> &'a dyn AnalyzerConfiguration {
        self.analyzer.config()
    }

    pub fn field_register(&self) -> &'a FieldRegister {
        self.analyzer.config().field_register()
    }

    /// Handle for units that record without owning the node.
    pub fn sink_handle(&self) -> SinkHandle {
        SinkHandle {
            record: Rc::downgrade(&self.record),
        }
    }

    pub fn add_value<V: Into<Variant>>(&self, field: &FieldP, value: V) {
        self.record.borrow_mut().push(Fact::Value {
            field: field.clone(),
            value: value.into(),
        });
    }

    pub fn add_triplet(&self, subject: &str, predicate: &str, object: &str) {
        self.record.borrow_mut().push(Fact::Triplet {
            subject: String::from(subject),
            predicate: String::from(predicate),
            object: String::from(object),
        });
    }

    pub fn add_text(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.record.borrow_mut().push(Fact::Text(String::from(text)));
    }

    pub fn new_anonymous_uri(&self) -> String {
        new_anonymous_uri()
    }

    pub fn set_mime_type(&self, mime_type: &str) {
        self.record.borrow_mut().info.mime_type = Some(String::from(mime_type));
    }

    pub fn mime_type(&self) -> Option<String> {
        self.record.borrow().info.mime_type.clone()
    }

    /// Copy of the facts recorded so far.
    pub fn facts(&self) -> Vec<Fact> {
        self.record.borrow().facts.clone()
    }

    pub fn set_end_analyzer(&mut self, name: Option<&str>) {
        self.end_analyzer = name.map(String::from);
    }

    pub fn end_analyzer(&self) -> Option<&str> {
        self.end_analyzer.as_deref()
    }

    /// Analyze `input` as the content of this node.
    pub fn index<'b>(&mut self, input: Option<Box<dyn ByteSource + 'b>>) -> AnalysisStatus {
        let analyzer = self.analyzer;

        analyzer.analyze(self, input)
    }

    /// Create a child node `name` at depth + 1 and analyze `input` as its
    /// content. The child stays available through
    /// [`AnalysisResult::child`] until [`AnalysisResult::finish_index_child`]
    /// or the next `index_child`.
    pub fn index_child<'b>(
        &mut self,
        name: &str,
        mtime: u64,
        input: Option<Box<dyn ByteSource + 'b>>,
    ) -> AnalysisStatus {
        defn!("({:?})", name);
        self.finish_index_child();
        let (path, depth) = {
            let record = self.record.borrow();
            (record.info.path.clone(), record.info.depth)
        };
        let info = NodeInfo {
            path: child_fpath(&path, name),
            name: String::from(name),
            depth: depth + 1,
            mtime,
            parent_path: Some(path.clone()),
            mime_type: None,
        };
        let mut child = Box::new(Self::from_info(info, self.writer, self.analyzer));
        let register = self.field_register();
        child.add_value(&register.parentlocation_field, path);
        child.add_value(&register.filename_field, name);
        child.add_value(&register.depth_field, (depth + 1) as u32);
        let status = child.index(input);
        self.child = Some(child);
        defx!("({:?}) {}", name, status);

        status
    }

    /// The child node created by the last [`AnalysisResult::index_child`].
    pub fn child(&mut self) -> Option<&mut AnalysisResult<'a>> {
        self.child.as_deref_mut()
    }

    /// Finish the child node, handing its facts to the writer.
    pub fn finish_index_child(&mut self) {
        if let Some(mut child) = self.child.take() {
            child.finish();
        }
    }

    /// Finish this node: finish its child, then hand all facts to the
    /// writer. Later calls do nothing.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finish_index_child();
        self.finished = true;
        let mut record = self.record.borrow_mut();
        record.ended = true;
        defo!("flush {:?} facts {}", record.info.path, record.facts.len());
        let mut writer = match self.writer.try_borrow_mut() {
            Ok(val) => val,
            Err(_) => {
                de_err!("IndexWriter is borrowed; node {:?} lost", record.info.path);
                return;
            }
        };
        let info = &record.info;
        writer.start_analysis(info);
        for fact in record.facts.iter() {
            match fact {
                Fact::Value { field, value } => writer.add_value(info, field, value),
                Fact::Triplet { subject, predicate, object } => {
                    writer.add_triplet(info, subject, predicate, object)
                }
                Fact::Text(text) => writer.add_text(info, text),
            }
        }
        writer.finish_analysis(info);
    }
}

impl Drop for AnalysisResult<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}
