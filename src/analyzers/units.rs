// src/analyzers/units.rs

//! The capabilities a pluggable unit may implement, and their factories.
//!
//! * A [`TransformUnit`] sits in front of the stream of every node and may
//!   replace it, e.g. with a [`DataEventSource`]. It must hand back a stream
//!   at position `0`.
//! * A [`TerminalUnit`] accepts a node by its header window, then consumes
//!   the stream and records facts. It may create child nodes.
//! * An [`EventUnit`] sees every chunk of the stream, in order, without
//!   being able to change it. The [`EventDispatcher`] fans one stream out to
//!   all event units, plus the [`LineUnit`]s and [`MarkupUnit`]s through
//!   their own dispatchers.
//!
//! Units are stateful. A [`StreamAnalyzer`] creates one instance of every
//! unit per recursion depth through the unit factories. Factories are
//! shared between threads; instances never are.
//!
//! [`DataEventSource`]: crate::readers::dataeventsource::DataEventSource
//! [`EventDispatcher`]: crate::analyzers::eventdispatcher::EventDispatcher
//! [`StreamAnalyzer`]: crate::analyzers::streamanalyzer::StreamAnalyzer

use std::fmt;
use std::sync::Arc;

use crate::analyzers::error::ResultAnalyzer;
use crate::data::analysisresult::{AnalysisResult, SinkHandle};
use crate::data::fieldregister::FieldRegister;
use crate::readers::bytesource::ByteSource;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// units
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub trait TransformUnit {
    fn name(&self) -> &str;

    /// Bind to the node being analyzed, or unbind with `None`.
    fn set_indexable(&mut self, sink: Option<SinkHandle>);

    /// Return the stream the following units read from: `input` itself or a
    /// wrapper around it, at position `0`.
    fn connect_input_stream<'b>(
        &mut self,
        input: Box<dyn ByteSource + 'b>,
    ) -> Box<dyn ByteSource + 'b>;

    /// This unit needs no more of the stream.
    fn is_ready_with_stream(&self) -> bool;
}

pub trait TerminalUnit {
    fn name(&self) -> &str;

    /// Accept the node by its header window. Must not have side effects.
    fn check_header(&self, header: &[u8]) -> bool;

    /// Consume `input`, recording into `result`. `input` is at position `0`.
    fn analyze(
        &mut self,
        result: &mut AnalysisResult<'_>,
        input: &mut dyn ByteSource,
    ) -> ResultAnalyzer<()>;

    /// This unit may create child nodes.
    fn handles_sub_streams(&self) -> bool {
        false
    }
}

pub trait EventUnit {
    fn name(&self) -> &str;
    fn start_analysis(&mut self, sink: SinkHandle);
    fn handle_data(&mut self, data: &[u8]);
    /// `complete` is `true` when every byte of the stream was handled.
    fn end_analysis(&mut self, complete: bool);
    fn is_ready_with_stream(&self) -> bool;
}

pub trait LineUnit {
    fn name(&self) -> &str;
    fn start_analysis(&mut self, sink: SinkHandle);
    /// One line, without its line terminator.
    fn handle_line(&mut self, line: &str);
    fn end_analysis(&mut self, complete: bool);
    fn is_ready_with_stream(&self) -> bool;
}

pub trait MarkupUnit {
    fn name(&self) -> &str;
    fn start_analysis(&mut self, sink: SinkHandle);
    fn start_element(&mut self, name: &str, attributes: &[(String, String)]);
    fn end_element(&mut self, name: &str);
    fn characters(&mut self, text: &str);
    fn end_analysis(&mut self, complete: bool);
    fn is_ready_with_stream(&self) -> bool;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// factories
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Factory methods shared by every kind of unit factory.
pub trait UnitFactory: Send + Sync {
    fn name(&self) -> &str;

    /// Register the fields units of this factory record. Called once per
    /// [`StreamAnalyzer`]; registration is idempotent.
    ///
    /// [`StreamAnalyzer`]: crate::analyzers::streamanalyzer::StreamAnalyzer
    fn register_fields(&self, register: &FieldRegister);
}

pub trait TransformUnitFactory: UnitFactory {
    fn new_instance(&self, register: &FieldRegister) -> Box<dyn TransformUnit>;
}

pub trait TerminalUnitFactory: UnitFactory {
    fn new_instance(&self, register: &FieldRegister) -> Box<dyn TerminalUnit>;
}

pub trait EventUnitFactory: UnitFactory {
    fn new_instance(&self, register: &FieldRegister) -> Box<dyn EventUnit>;
}

pub trait LineUnitFactory: UnitFactory {
    fn new_instance(&self, register: &FieldRegister) -> Box<dyn LineUnit>;
}

pub trait MarkupUnitFactory: UnitFactory {
    fn new_instance(&self, register: &FieldRegister) -> Box<dyn MarkupUnit>;
}

pub type TransformUnitFactoryP = Arc<dyn TransformUnitFactory>;
pub type TerminalUnitFactoryP = Arc<dyn TerminalUnitFactory>;
pub type EventUnitFactoryP = Arc<dyn EventUnitFactory>;
pub type LineUnitFactoryP = Arc<dyn LineUnitFactory>;
pub type MarkupUnitFactoryP = Arc<dyn MarkupUnitFactory>;

/// Factories of every kind, as supplied by one plugin source or compiled in.
#[derive(Clone, Default)]
pub struct AnalyzerFactories {
    pub transform: Vec<TransformUnitFactoryP>,
    pub terminal: Vec<TerminalUnitFactoryP>,
    pub event: Vec<EventUnitFactoryP>,
    pub line: Vec<LineUnitFactoryP>,
    pub markup: Vec<MarkupUnitFactoryP>,
}

impl AnalyzerFactories {
    pub fn new() -> AnalyzerFactories {
        AnalyzerFactories::default()
    }

    pub fn len(&self) -> usize {
        self.transform.len()
            + self.terminal.len()
            + self.event.len()
            + self.line.len()
            + self.markup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append all factories of `other`, keeping their order.
    pub fn extend(&mut self, other: &AnalyzerFactories) {
        self.transform.extend(other.transform.iter().cloned());
        self.terminal.extend(other.terminal.iter().cloned());
        self.event.extend(other.event.iter().cloned());
        self.line.extend(other.line.iter().cloned());
        self.markup.extend(other.markup.iter().cloned());
    }
}

impl fmt::Debug for AnalyzerFactories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |v: Vec<&str>| v.join(", ");
        f.debug_struct("AnalyzerFactories")
            .field("transform", &names(self.transform.iter().map(|x| x.name()).collect()))
            .field("terminal", &names(self.terminal.iter().map(|x| x.name()).collect()))
            .field("event", &names(self.event.iter().map(|x| x.name()).collect()))
            .field("line", &names(self.line.iter().map(|x| x.name()).collect()))
            .field("markup", &names(self.markup.iter().map(|x| x.name()).collect()))
            .finish()
    }
}
