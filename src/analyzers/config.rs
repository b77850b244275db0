// src/analyzers/config.rs

//! The configuration consulted by a [`StreamAnalyzer`]: which units to use,
//! in which order, whether to keep going, and how much of a stream to read.
//!
//! [`StreamAnalyzer`]: crate::analyzers::streamanalyzer::StreamAnalyzer

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::data::analysisresult::AnalysisResult;
use crate::data::fieldregister::{FieldRegister, FieldRegisterP};

use ::regex::Regex;

/// Environment variable holding the plugin search path, a list of
/// directories joined like `PATH`.
pub const ENV_PLUGIN_PATH: &str = "DSA_PLUGIN_PATH";

/// Kind of a unit factory.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum UnitKind {
    Transform,
    Terminal,
    Event,
    Line,
    Markup,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitKind::Transform => "transform",
            UnitKind::Terminal => "terminal",
            UnitKind::Event => "event",
            UnitKind::Line => "line",
            UnitKind::Markup => "markup",
        };
        write!(f, "{}", s)
    }
}

/// What a configuration knows about a factory when deciding to use it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FactoryInfo {
    pub name: String,
    pub kind: UnitKind,
    /// compiled in, as opposed to supplied by a plugin
    pub builtin: bool,
}

/// Whether plugin-supplied or built-in factories come first within one
/// kind.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Precedence {
    PluginsFirst,
    BuiltinsFirst,
}

/// Order of plugin-supplied and built-in factories, per kind.
///
/// The default puts built-in event units (MIME sniffing, content digest)
/// ahead of plugins, so their output is recorded before any plugin event
/// unit runs. Every other kind puts plugins first, so a plugin can take over
/// a format that a built-in unit also accepts.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnitOrder {
    pub transform: Precedence,
    pub terminal: Precedence,
    pub event: Precedence,
    pub line: Precedence,
    pub markup: Precedence,
}

impl Default for UnitOrder {
    fn default() -> Self {
        UnitOrder {
            transform: Precedence::PluginsFirst,
            terminal: Precedence::PluginsFirst,
            event: Precedence::BuiltinsFirst,
            line: Precedence::PluginsFirst,
            markup: Precedence::PluginsFirst,
        }
    }
}

impl UnitOrder {
    pub fn precedence(&self, kind: UnitKind) -> Precedence {
        match kind {
            UnitKind::Transform => self.transform,
            UnitKind::Terminal => self.terminal,
            UnitKind::Event => self.event,
            UnitKind::Line => self.line,
            UnitKind::Markup => self.markup,
        }
    }

    /// Merge `plugins` and `builtins` of `kind` in the configured order.
    pub fn merge<T>(&self, kind: UnitKind, plugins: Vec<T>, builtins: Vec<T>) -> Vec<T> {
        let (first, second) = match self.precedence(kind) {
            Precedence::PluginsFirst => (plugins, builtins),
            Precedence::BuiltinsFirst => (builtins, plugins),
        };
        let mut merged = first;
        merged.extend(second);

        merged
    }
}

/// Policy consulted by a [`StreamAnalyzer`] while analyzing.
///
/// Shared by all worker threads.
///
/// [`StreamAnalyzer`]: crate::analyzers::streamanalyzer::StreamAnalyzer
pub trait AnalyzerConfiguration: Send + Sync {
    /// Use units made by this factory.
    fn use_factory(&self, _info: &FactoryInfo) -> bool {
        true
    }

    /// Keep going? Checked after every terminal unit attempt and before
    /// every drain step. Returning `false` stops the current node, keeping
    /// what was recorded.
    fn index_more(&self) -> bool {
        true
    }

    /// Abort a node when a terminal unit fails instead of trying the next
    /// unit.
    fn stop_on_error(&self) -> bool {
        false
    }

    /// Read at most this many bytes of the stream of `result`. `None` is no
    /// limit.
    fn max_stream_read_length(&self, _result: &AnalysisResult<'_>) -> Option<u64> {
        None
    }

    fn unit_order(&self) -> &UnitOrder;

    fn field_register(&self) -> &FieldRegisterP;
}

/// The default [`AnalyzerConfiguration`].
#[derive(Debug)]
pub struct AnalyzerConfig {
    pub max_stream_read_length: Option<u64>,
    pub stop_on_error: bool,
    /// units with a name matching any of these are not used
    pub exclude_units: Vec<Regex>,
    pub unit_order: UnitOrder,
    field_register: FieldRegisterP,
    /// set to stop all analysis, e.g. from a Ctrl-C handler
    cancel: Arc<AtomicBool>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig::new()
    }
}

impl AnalyzerConfig {
    pub fn new() -> AnalyzerConfig {
        AnalyzerConfig {
            max_stream_read_length: None,
            stop_on_error: false,
            exclude_units: Vec::with_capacity(0),
            unit_order: UnitOrder::default(),
            field_register: Arc::new(FieldRegister::new()),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_max_stream_read_length(mut self, max: Option<u64>) -> Self {
        self.max_stream_read_length = max;
        self
    }

    pub fn with_stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }

    pub fn with_exclude_units(mut self, exclude: Vec<Regex>) -> Self {
        self.exclude_units = exclude;
        self
    }

    pub fn with_unit_order(mut self, order: UnitOrder) -> Self {
        self.unit_order = order;
        self
    }

    /// Shared flag; storing `true` makes [`AnalyzerConfiguration::index_more`]
    /// return `false`.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

impl AnalyzerConfiguration for AnalyzerConfig {
    fn use_factory(&self, info: &FactoryInfo) -> bool {
        !self.exclude_units.iter().any(|re| re.is_match(info.name.as_str()))
    }

    fn index_more(&self) -> bool {
        !self.cancel.load(Ordering::SeqCst)
    }

    fn stop_on_error(&self) -> bool {
        self.stop_on_error
    }

    fn max_stream_read_length(&self, _result: &AnalysisResult<'_>) -> Option<u64> {
        self.max_stream_read_length
    }

    fn unit_order(&self) -> &UnitOrder {
        &self.unit_order
    }

    fn field_register(&self) -> &FieldRegisterP {
        &self.field_register
    }
}
