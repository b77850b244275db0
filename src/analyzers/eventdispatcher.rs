// src/analyzers/eventdispatcher.rs

//! The [`EventDispatcher`] transform unit, which fans the stream of a node
//! out to every [`EventUnit`], and the two event units that dispatch
//! further: [`LineDispatcher`] to [`LineUnit`]s and [`MarkupDispatcher`] to
//! [`MarkupUnit`]s.
//!
//! ```text
//! stream ──▶ DataEventSource ──▶ EventDispatcher ─┬─▶ EventUnit …
//!                                                 ├─▶ MarkupDispatcher ─▶ MarkupUnit …
//!                                                 └─▶ LineDispatcher ───▶ LineUnit …
//! ```
//!
//! The dispatcher is ready with the stream once every fan-out target is.

use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

use crate::analyzers::units::{
    EventUnit,
    EventUnitFactoryP,
    LineUnit,
    LineUnitFactoryP,
    MarkupUnit,
    MarkupUnitFactoryP,
    TransformUnit,
    TransformUnitFactory,
    UnitFactory,
};
use crate::data::analysisresult::SinkHandle;
use crate::data::fieldregister::FieldRegister;
use crate::readers::bytesource::ByteSource;
use crate::readers::dataeventsource::{DataEventHandler, DataEventSource};

use ::memchr::{memchr, memchr_iter, memmem};
use ::si_trace_print::{defn, defo, defx};

pub const NAME_EVENT_DISPATCHER: &str = "EventDispatcher";
pub const NAME_LINE_DISPATCHER: &str = "LineDispatcher";
pub const NAME_MARKUP_DISPATCHER: &str = "MarkupDispatcher";

/// A line longer than this is handed to the line units in pieces.
const LINE_MAX: usize = 1 << 20;
/// A markup construct longer than this ends markup dispatching.
const MARKUP_PENDING_MAX: usize = 1 << 16;
/// Leading bytes checked for `NUL` to tell text from binary.
const TEXT_SNIFF_LEN: usize = 512;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EventDispatcher
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Event units and their shared state. Shared between the
/// [`EventDispatcher`] in the unit pool and the [`DataEventSource`] of the
/// node being analyzed.
struct EventFanout {
    units: Vec<Box<dyn EventUnit>>,
    ready: bool,
}

impl EventFanout {
    fn update_ready(&mut self) -> bool {
        self.ready = self.units.iter().all(|u| u.is_ready_with_stream());
        self.ready
    }
}

/// [`DataEventHandler`] feeding a shared [`EventFanout`].
struct FanoutHandler(Rc<RefCell<EventFanout>>);

impl DataEventHandler for FanoutHandler {
    fn handle_data(&mut self, data: &[u8]) -> bool {
        let mut fanout = match self.0.try_borrow_mut() {
            Ok(val) => val,
            Err(_) => return true,
        };
        for unit in fanout.units.iter_mut() {
            if !unit.is_ready_with_stream() {
                unit.handle_data(data);
            }
        }

        !fanout.update_ready()
    }

    fn handle_end(&mut self, complete: bool) {
        defo!("complete {}", complete);
        let mut fanout = match self.0.try_borrow_mut() {
            Ok(val) => val,
            Err(_) => return,
        };
        for unit in fanout.units.iter_mut() {
            unit.end_analysis(complete);
        }
        fanout.ready = true;
    }
}

pub struct EventDispatcher {
    fanout: Rc<RefCell<EventFanout>>,
    sink: Option<SinkHandle>,
}

impl EventDispatcher {
    pub fn new(units: Vec<Box<dyn EventUnit>>) -> EventDispatcher {
        EventDispatcher {
            fanout: Rc::new(RefCell::new(EventFanout { units, ready: true })),
            sink: None,
        }
    }

    /// Names of the event units, in dispatch order.
    pub fn unit_names(&self) -> Vec<String> {
        match self.fanout.try_borrow() {
            Ok(fanout) => fanout.units.iter().map(|u| String::from(u.name())).collect(),
            Err(_) => Vec::with_capacity(0),
        }
    }
}

impl TransformUnit for EventDispatcher {
    fn name(&self) -> &str {
        NAME_EVENT_DISPATCHER
    }

    fn set_indexable(&mut self, sink: Option<SinkHandle>) {
        self.sink = sink;
    }

    fn connect_input_stream<'b>(
        &mut self,
        input: Box<dyn ByteSource + 'b>,
    ) -> Box<dyn ByteSource + 'b> {
        defn!();
        let sink = match &self.sink {
            Some(sink) => sink.clone(),
            None => {
                defx!("not bound");
                return input;
            }
        };
        {
            let mut fanout = match self.fanout.try_borrow_mut() {
                Ok(val) => val,
                Err(_) => {
                    crate::de_err!("EventDispatcher is already dispatching");
                    return input;
                }
            };
            if fanout.units.is_empty() {
                defx!("no event units");
                return input;
            }
            for unit in fanout.units.iter_mut() {
                unit.start_analysis(sink.clone());
            }
            fanout.ready = false;
        }
        defx!();

        Box::new(DataEventSource::new(input, FanoutHandler(self.fanout.clone())))
    }

    fn is_ready_with_stream(&self) -> bool {
        match self.fanout.try_borrow() {
            Ok(fanout) => fanout.ready,
            Err(_) => false,
        }
    }
}

/// Factory of [`EventDispatcher`]s. Each instance gets its own instances of
/// the event, line, and markup units.
pub struct EventDispatcherFactory {
    event: Vec<EventUnitFactoryP>,
    line: Vec<LineUnitFactoryP>,
    markup: Vec<MarkupUnitFactoryP>,
}

impl EventDispatcherFactory {
    pub fn new(
        event: Vec<EventUnitFactoryP>,
        line: Vec<LineUnitFactoryP>,
        markup: Vec<MarkupUnitFactoryP>,
    ) -> EventDispatcherFactory {
        EventDispatcherFactory { event, line, markup }
    }
}

impl UnitFactory for EventDispatcherFactory {
    fn name(&self) -> &str {
        NAME_EVENT_DISPATCHER
    }

    fn register_fields(&self, register: &FieldRegister) {
        for f in self.event.iter() {
            f.register_fields(register);
        }
        for f in self.line.iter() {
            f.register_fields(register);
        }
        for f in self.markup.iter() {
            f.register_fields(register);
        }
    }
}

impl TransformUnitFactory for EventDispatcherFactory {
    fn new_instance(&self, register: &FieldRegister) -> Box<dyn TransformUnit> {
        let mut units: Vec<Box<dyn EventUnit>> = self
            .event
            .iter()
            .map(|f| f.new_instance(register))
            .collect();
        if !self.markup.is_empty() {
            let markup: Vec<Box<dyn MarkupUnit>> =
                self.markup.iter().map(|f| f.new_instance(register)).collect();
            units.push(Box::new(MarkupDispatcher::new(markup)));
        }
        if !self.line.is_empty() {
            let line: Vec<Box<dyn LineUnit>> =
                self.line.iter().map(|f| f.new_instance(register)).collect();
            units.push(Box::new(LineDispatcher::new(line)));
        }

        Box::new(EventDispatcher::new(units))
    }
}

/// Does the start of a stream look like text? No `NUL` in the first bytes.
pub fn looks_like_text(data: &[u8]) -> bool {
    let len = std::cmp::min(data.len(), TEXT_SNIFF_LEN);
    memchr(0, &data[..len]).is_none()
}

/// Decode `bytes` as UTF-8. Bytes that are not valid UTF-8 are decoded as
/// Windows-1252, which maps every byte; the valid UTF-8 around them is kept.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let mut rest: &[u8] = match std::str::from_utf8(bytes) {
        Ok(s) => return Cow::Borrowed(s),
        Err(_) => bytes,
    };
    let mut out = String::with_capacity(bytes.len() + 16);
    while !rest.is_empty() {
        match std::str::from_utf8(rest) {
            Ok(s) => {
                out.push_str(s);
                break;
            }
            Err(err) => {
                let valid = err.valid_up_to();
                // a cut character at the end has no `error_len`
                out.push_str(&String::from_utf8_lossy(&rest[..valid]));
                let bad = err.error_len().unwrap_or(rest.len() - valid);
                let (s, _had_errors) = ::encoding_rs::WINDOWS_1252
                    .decode_without_bom_handling(&rest[valid..valid + bad]);
                out.push_str(&s);
                rest = &rest[valid + bad..];
            }
        }
    }

    Cow::Owned(out)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LineDispatcher
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Splits the stream into lines for its [`LineUnit`]s. A stream whose first
/// bytes hold a `NUL` is not text and is not dispatched.
pub struct LineDispatcher {
    units: Vec<Box<dyn LineUnit>>,
    /// bytes of a line not yet terminated
    partial: Vec<u8>,
    started: bool,
    ready: bool,
}

impl LineDispatcher {
    pub fn new(units: Vec<Box<dyn LineUnit>>) -> LineDispatcher {
        LineDispatcher {
            units,
            partial: Vec::new(),
            started: false,
            ready: true,
        }
    }

    fn dispatch_line(&mut self, line: &[u8]) {
        let line = match line.last() {
            Some(b'\r') => &line[..line.len() - 1],
            _ => line,
        };
        let text = decode_text(line);
        for unit in self.units.iter_mut() {
            if !unit.is_ready_with_stream() {
                unit.handle_line(&text);
            }
        }
        self.ready = self.units.iter().all(|u| u.is_ready_with_stream());
    }
}

impl EventUnit for LineDispatcher {
    fn name(&self) -> &str {
        NAME_LINE_DISPATCHER
    }

    fn start_analysis(&mut self, sink: SinkHandle) {
        self.partial.clear();
        self.started = false;
        for unit in self.units.iter_mut() {
            unit.start_analysis(sink.clone());
        }
        self.ready = self.units.is_empty();
    }

    fn handle_data(&mut self, data: &[u8]) {
        if self.ready {
            return;
        }
        if !self.started {
            self.started = true;
            if !looks_like_text(data) {
                defo!("not text");
                self.ready = true;
                return;
            }
        }
        let mut at: usize = 0;
        for nl in memchr_iter(b'\n', data) {
            if self.partial.is_empty() {
                self.dispatch_line(&data[at..nl]);
            } else {
                let mut line = std::mem::take(&mut self.partial);
                line.extend_from_slice(&data[at..nl]);
                self.dispatch_line(&line);
            }
            at = nl + 1;
            if self.ready {
                return;
            }
        }
        self.partial.extend_from_slice(&data[at..]);
        if self.partial.len() > LINE_MAX {
            let line = std::mem::take(&mut self.partial);
            self.dispatch_line(&line);
        }
    }

    fn end_analysis(&mut self, complete: bool) {
        if !self.ready && !self.partial.is_empty() {
            let line = std::mem::take(&mut self.partial);
            self.dispatch_line(&line);
        }
        self.partial.clear();
        for unit in self.units.iter_mut() {
            unit.end_analysis(complete);
        }
        self.ready = true;
    }

    fn is_ready_with_stream(&self) -> bool {
        self.ready
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MarkupDispatcher
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Scans markup (XML, HTML) into element and character events for its
/// [`MarkupUnit`]s. A stream not starting with `<`, after an optional BOM
/// and whitespace, is not markup and is not dispatched.
///
/// The scanner is lenient: it does not check nesting, and entities are
/// passed through undecoded.
pub struct MarkupDispatcher {
    units: Vec<Box<dyn MarkupUnit>>,
    /// unscanned bytes, starting at an unterminated construct
    pending: Vec<u8>,
    started: bool,
    ready: bool,
}

/// One scanned markup construct.
#[derive(Debug, Eq, PartialEq)]
pub enum MarkupEvent {
    Start { name: String, attributes: Vec<(String, String)>, empty: bool },
    End { name: String },
    Text(String),
}

/// Index of the `>` closing the tag that starts at `buf[0] == b'<'`,
/// skipping `>` inside quoted attribute values.
fn find_tag_end(buf: &[u8]) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, c) in buf.iter().enumerate().skip(1) {
        match quote {
            Some(q) if *c == q => quote = None,
            Some(_) => {}
            None => match c {
                b'"' | b'\'' => quote = Some(*c),
                b'>' => return Some(i),
                _ => {}
            },
        }
    }

    None
}

/// Parse `name attr="value" …` of a start tag.
fn parse_start_tag(inner: &str) -> (String, Vec<(String, String)>) {
    let inner = inner.trim();
    let name_end = inner
        .find(|c: char| c.is_whitespace())
        .unwrap_or(inner.len());
    let name = String::from(&inner[..name_end]);
    let mut attributes: Vec<(String, String)> = Vec::new();
    let mut rest = inner[name_end..].trim_start();
    while !rest.is_empty() {
        let key_end = rest
            .find(|c: char| c.is_whitespace() || c == '=')
            .unwrap_or(rest.len());
        let key = String::from(&rest[..key_end]);
        rest = rest[key_end..].trim_start();
        let mut value = String::new();
        if let Some(after_eq) = rest.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            match after_eq.chars().next() {
                Some(q) if q == '"' || q == '\'' => {
                    let body = &after_eq[1..];
                    let end = body.find(q).unwrap_or(body.len());
                    value = String::from(&body[..end]);
                    rest = body.get(end + 1..).unwrap_or("");
                }
                _ => {
                    let end = after_eq
                        .find(|c: char| c.is_whitespace())
                        .unwrap_or(after_eq.len());
                    value = String::from(&after_eq[..end]);
                    rest = &after_eq[end..];
                }
            }
        }
        if !key.is_empty() {
            attributes.push((key, value));
        }
        rest = rest.trim_start();
    }

    (name, attributes)
}

/// Scan complete constructs from the front of `buf`. Returns the events and
/// the count of bytes consumed; an unterminated construct at the end is not
/// consumed.
pub fn scan_markup(buf: &[u8]) -> (Vec<MarkupEvent>, usize) {
    let mut events: Vec<MarkupEvent> = Vec::new();
    let mut at: usize = 0;
    while at < buf.len() {
        let lt = match memchr(b'<', &buf[at..]) {
            Some(i) => at + i,
            None => {
                // text up to the end may continue in the next chunk
                break;
            }
        };
        if lt > at {
            let text = decode_text(&buf[at..lt]);
            if !text.trim().is_empty() {
                events.push(MarkupEvent::Text(text.into_owned()));
            }
            at = lt;
        }
        let rest = &buf[lt..];
        let (end, skip): (Option<usize>, bool) = if rest.starts_with(b"<!--") {
            (memmem::find(rest, b"-->").map(|i| i + 2), true)
        } else if rest.starts_with(b"<![CDATA[") {
            match memmem::find(rest, b"]]>") {
                Some(i) => {
                    let text = decode_text(&rest[9..i]);
                    if !text.trim().is_empty() {
                        events.push(MarkupEvent::Text(text.into_owned()));
                    }
                    (Some(i + 2), true)
                }
                None => (None, true),
            }
        } else if rest.starts_with(b"<?") || rest.starts_with(b"<!") {
            (find_tag_end(rest), true)
        } else {
            (find_tag_end(rest), false)
        };
        let end = match end {
            Some(val) => val,
            None => break,
        };
        if !skip {
            let inner = decode_text(&rest[1..end]);
            if let Some(name) = inner.strip_prefix('/') {
                events.push(MarkupEvent::End { name: String::from(name.trim()) });
            } else {
                let (inner, empty) = match inner.strip_suffix('/') {
                    Some(val) => (val, true),
                    None => (inner.as_ref(), false),
                };
                let (name, attributes) = parse_start_tag(inner);
                if !name.is_empty() {
                    events.push(MarkupEvent::Start { name, attributes, empty });
                }
            }
        }
        at = lt + end + 1;
    }

    (events, at)
}

impl MarkupDispatcher {
    pub fn new(units: Vec<Box<dyn MarkupUnit>>) -> MarkupDispatcher {
        MarkupDispatcher {
            units,
            pending: Vec::new(),
            started: false,
            ready: true,
        }
    }

    fn dispatch(&mut self, events: Vec<MarkupEvent>) {
        for event in events.iter() {
            for unit in self.units.iter_mut() {
                if unit.is_ready_with_stream() {
                    continue;
                }
                match event {
                    MarkupEvent::Start { name, attributes, empty } => {
                        unit.start_element(name, attributes);
                        if *empty {
                            unit.end_element(name);
                        }
                    }
                    MarkupEvent::End { name } => unit.end_element(name),
                    MarkupEvent::Text(text) => unit.characters(text),
                }
            }
        }
        self.ready = self.units.iter().all(|u| u.is_ready_with_stream());
    }
}

/// Does `data` start like markup?
pub fn looks_like_markup(data: &[u8]) -> bool {
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    data.iter()
        .find(|c| !c.is_ascii_whitespace())
        .map(|c| *c == b'<')
        .unwrap_or(false)
}

impl EventUnit for MarkupDispatcher {
    fn name(&self) -> &str {
        NAME_MARKUP_DISPATCHER
    }

    fn start_analysis(&mut self, sink: SinkHandle) {
        self.pending.clear();
        self.started = false;
        for unit in self.units.iter_mut() {
            unit.start_analysis(sink.clone());
        }
        self.ready = self.units.is_empty();
    }

    fn handle_data(&mut self, data: &[u8]) {
        if self.ready {
            return;
        }
        if !self.started {
            self.started = true;
            if !looks_like_markup(data) || !looks_like_text(data) {
                defo!("not markup");
                self.ready = true;
                return;
            }
        }
        self.pending.extend_from_slice(data);
        let (events, consumed) = scan_markup(&self.pending);
        self.pending.drain(..consumed);
        self.dispatch(events);
        if self.pending.len() > MARKUP_PENDING_MAX {
            defo!("construct too long; stop");
            self.ready = true;
        }
    }

    fn end_analysis(&mut self, complete: bool) {
        if !self.ready && !self.pending.is_empty() {
            let text = decode_text(&self.pending).into_owned();
            if !text.trim().is_empty() && !text.contains('<') {
                self.dispatch(vec![MarkupEvent::Text(text)]);
            }
        }
        self.pending.clear();
        for unit in self.units.iter_mut() {
            unit.end_analysis(complete);
        }
        self.ready = true;
    }

    fn is_ready_with_stream(&self) -> bool {
        self.ready
    }
}
