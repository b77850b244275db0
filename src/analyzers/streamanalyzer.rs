// src/analyzers/streamanalyzer.rs

//! Implements [`StreamAnalyzer`], which drives the stream of one node
//! through the transform units and terminal units.
//!
//! ## Analyzing a node
//!
//! For a node at depth `d` with stream `S` and result `R`:
//!
//! 1. get the unit pool of depth `d`, creating it on first use
//! 2. read the header window of `S` ([`HEADER_SZ`] bytes), then rewind
//! 3. connect every transform unit in order; each may wrap `S`
//! 4. read the header window again, through the transform units
//! 5. offer the header to each terminal unit in order; the first that
//!    accepts it analyzes `S`. When that unit fails, rewind `S` and offer
//!    the header to the next unit
//! 6. drain `S` until every transform unit is ready and the size of `S` is
//!    known
//! 7. record the size of `S` in `R`
//! 8. drop `S` and unbind all transform units from `R`
//!
//! A terminal unit may create child nodes with
//! [`AnalysisResult::index_child`], which analyzes the child at depth
//! `d + 1` with the pool of depth `d + 1`. Units of depth `d` are never
//! touched while the child is analyzed.
//!
//! A `StreamAnalyzer` is not `Sync`; run one per worker thread.
//!
//! [`HEADER_SZ`]: crate::common::HEADER_SZ

use std::cell::RefCell;
use std::fmt;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use crate::analyzers::analyzerloader::AnalyzerLoader;
use crate::analyzers::config::{AnalyzerConfiguration, FactoryInfo, UnitKind};
use crate::analyzers::error::{AnalysisStatus, AnalyzerError};
use crate::analyzers::eventdispatcher::{EventDispatcherFactory, NAME_EVENT_DISPATCHER};
use crate::analyzers::units::{
    AnalyzerFactories,
    TerminalUnit,
    TerminalUnitFactoryP,
    TransformUnit,
    TransformUnitFactoryP,
    UnitFactory,
};
use crate::common::{Depth, FileSz, ResultS3, HEADER_SZ};
use crate::data::analysisresult::{AnalysisResult, IndexWriter};
use crate::data::fieldregister::FieldP;
use crate::data::variant::Variant;
use crate::readers::bufferedsource::BufferedSource;
use crate::readers::bytesource::{ByteSource, StreamStatus};
use crate::readers::helpers::{path_mtime, path_to_fpath};
use crate::units::builtin_factories;
use crate::{de_err, de_wrn, e_err, e_wrn};

use ::si_trace_print::{defn, defo, defx};

/// Drain step sizes: the first skip, and the cap after growing ×4 per step.
const SKIP_FIRST: u64 = 4096;
const SKIP_CAP: u64 = 131072;

/// Unit instances of one recursion depth.
struct DepthPool {
    transform: Vec<Box<dyn TransformUnit>>,
    terminal: Vec<Box<dyn TerminalUnit>>,
}

/// Unbind all transform units from the node that is ending.
fn remove_indexable(transform: &mut [Box<dyn TransformUnit>]) {
    for unit in transform.iter_mut() {
        unit.set_indexable(None);
    }
}

/// Register the fields of `factories` and keep those the configuration
/// wants.
fn select<F: ?Sized + UnitFactory>(
    conf: &dyn AnalyzerConfiguration,
    kind: UnitKind,
    builtin: bool,
    factories: &[Arc<F>],
) -> Vec<Arc<F>> {
    factories
        .iter()
        .filter(|f| {
            f.register_fields(conf.field_register());
            let info = FactoryInfo {
                name: String::from(f.name()),
                kind,
                builtin,
            };
            conf.use_factory(&info)
        })
        .cloned()
        .collect()
}

pub struct StreamAnalyzer {
    conf: Arc<dyn AnalyzerConfiguration>,
    transform_factories: Vec<TransformUnitFactoryP>,
    terminal_factories: Vec<TerminalUnitFactoryP>,
    /// unit pools indexed by depth, grown on demand
    pools: RefCell<Vec<Rc<RefCell<DepthPool>>>>,
    size_field: FieldP,
    parseerror_field: FieldP,
}

impl fmt::Debug for StreamAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamAnalyzer")
            .field("transform", &self.transform_unit_names())
            .field("terminal", &self.terminal_unit_names())
            .field("pools", &self.pool_count())
            .finish()
    }
}

impl StreamAnalyzer {
    /// Create a `StreamAnalyzer` with the built-in units and the plugins
    /// found in the directories of environment variable `DSA_PLUGIN_PATH`.
    pub fn new(conf: Arc<dyn AnalyzerConfiguration>) -> StreamAnalyzer {
        let mut loader = AnalyzerLoader::new();
        loader.load_plugins_from_env();

        Self::with_plugins(conf, loader.factories())
    }

    /// Create a `StreamAnalyzer` with the built-in units and `plugins`.
    pub fn with_plugins(
        conf: Arc<dyn AnalyzerConfiguration>,
        plugins: &AnalyzerFactories,
    ) -> StreamAnalyzer {
        Self::with_factories(conf, plugins, &builtin_factories())
    }

    /// Create a `StreamAnalyzer` with `plugins` and `builtins`, ordered per
    /// kind by [`AnalyzerConfiguration::unit_order`]. The
    /// [`EventDispatcher`] carrying the event, line, and markup units is the
    /// last transform unit.
    ///
    /// [`EventDispatcher`]: crate::analyzers::eventdispatcher::EventDispatcher
    pub fn with_factories(
        conf: Arc<dyn AnalyzerConfiguration>,
        plugins: &AnalyzerFactories,
        builtins: &AnalyzerFactories,
    ) -> StreamAnalyzer {
        defn!();
        let c: &dyn AnalyzerConfiguration = conf.as_ref();
        let order = c.unit_order();

        let markup = order.merge(
            UnitKind::Markup,
            select(c, UnitKind::Markup, false, &plugins.markup),
            select(c, UnitKind::Markup, true, &builtins.markup),
        );
        let line = order.merge(
            UnitKind::Line,
            select(c, UnitKind::Line, false, &plugins.line),
            select(c, UnitKind::Line, true, &builtins.line),
        );
        let event = order.merge(
            UnitKind::Event,
            select(c, UnitKind::Event, false, &plugins.event),
            select(c, UnitKind::Event, true, &builtins.event),
        );
        let mut transform_factories = order.merge(
            UnitKind::Transform,
            select(c, UnitKind::Transform, false, &plugins.transform),
            select(c, UnitKind::Transform, true, &builtins.transform),
        );
        let dispatcher: TransformUnitFactoryP =
            Arc::new(EventDispatcherFactory::new(event, line, markup));
        transform_factories.extend(select(c, UnitKind::Transform, true, &[dispatcher]));
        let terminal_factories = order.merge(
            UnitKind::Terminal,
            select(c, UnitKind::Terminal, false, &plugins.terminal),
            select(c, UnitKind::Terminal, true, &builtins.terminal),
        );
        let size_field = c.field_register().size_field.clone();
        let parseerror_field = c.field_register().parseerror_field.clone();
        defx!(
            "transform {}, terminal {}",
            transform_factories.len(),
            terminal_factories.len()
        );

        StreamAnalyzer {
            conf,
            transform_factories,
            terminal_factories,
            pools: RefCell::new(Vec::new()),
            size_field,
            parseerror_field,
        }
    }

    pub fn config(&self) -> &dyn AnalyzerConfiguration {
        self.conf.as_ref()
    }

    /// Names of the transform units, in connection order.
    pub fn transform_unit_names(&self) -> Vec<String> {
        self.transform_factories
            .iter()
            .map(|f| String::from(f.name()))
            .collect()
    }

    /// Names of the terminal units, in the order they are offered a header.
    pub fn terminal_unit_names(&self) -> Vec<String> {
        self.terminal_factories
            .iter()
            .map(|f| String::from(f.name()))
            .collect()
    }

    /// Count of depths that have a unit pool.
    pub fn pool_count(&self) -> usize {
        match self.pools.try_borrow() {
            Ok(pools) => pools.len(),
            Err(_) => 0,
        }
    }

    fn new_pool(&self) -> DepthPool {
        let register = self.conf.field_register();
        DepthPool {
            transform: self
                .transform_factories
                .iter()
                .map(|f| f.new_instance(register))
                .collect(),
            terminal: self
                .terminal_factories
                .iter()
                .map(|f| f.new_instance(register))
                .collect(),
        }
    }

    /// The unit pool of `depth`, creating pools up to `depth` as needed.
    fn pool(&self, depth: Depth) -> Option<Rc<RefCell<DepthPool>>> {
        let mut pools = self.pools.try_borrow_mut().ok()?;
        while pools.len() <= depth {
            defo!("create pool for depth {}", pools.len());
            let pool = self.new_pool();
            pools.push(Rc::new(RefCell::new(pool)));
        }

        Some(pools[depth].clone())
    }

    /// Analyze `input` as the content of the node of `result`.
    ///
    /// `input` of `None` is a node without content, e.g. a file that cannot
    /// be opened; transform units are still bound to it.
    pub fn analyze<'b>(
        &self,
        result: &mut AnalysisResult<'_>,
        input: Option<Box<dyn ByteSource + 'b>>,
    ) -> AnalysisStatus {
        let depth: Depth = result.depth();
        defn!("depth {}, {:?}", depth, result.path());
        let pool_rc = match self.pool(depth) {
            Some(val) => val,
            None => {
                de_err!("unit pools are busy; cannot analyze {:?}", result.path());
                return AnalysisStatus::Aborted;
            }
        };
        let mut pool = match pool_rc.try_borrow_mut() {
            Ok(val) => val,
            Err(_) => {
                de_err!("unit pool of depth {} is busy; cannot analyze {:?}", depth, result.path());
                return AnalysisStatus::Aborted;
            }
        };
        let DepthPool { transform, terminal } = &mut *pool;
        let conf: &dyn AnalyzerConfiguration = self.conf.as_ref();
        let mut input: Option<Box<dyn ByteSource + 'b>> = input;

        // read the header before connecting the transform units so the first
        // read is at least the header window, however small the transform
        // units read
        let mut finished: bool = false;
        if let Some(stream) = input.as_mut() {
            if !matches!(stream.read(HEADER_SZ, HEADER_SZ), ResultS3::Found(_)) {
                finished = true;
            }
            stream.reset(0);
        }

        // connect the transform units
        let sink = result.sink_handle();
        for unit in transform.iter_mut() {
            if let Some(stream) = input.as_ref() {
                if !stream.status().is_ok() {
                    break;
                }
            }
            unit.set_indexable(Some(sink.clone()));
            if let Some(stream) = input.take() {
                let stream = unit.connect_input_stream(stream);
                if stream.position() != 0 {
                    e_wrn!(
                        "unit {} left the stream of {:?} at position {}",
                        unit.name(),
                        result.path(),
                        stream.position()
                    );
                }
                input = Some(stream);
            }
        }

        // read the header again, through the transform units
        let mut header: Vec<u8> = Vec::with_capacity(0);
        match input.as_mut() {
            Some(stream) if !finished => {
                header = read_header(stream.as_mut());
                if header.is_empty() {
                    finished = true;
                } else if stream.reset(0) != 0 {
                    e_wrn!(
                        "cannot reset the stream of {:?}; at {}, status {}",
                        result.path(),
                        stream.position(),
                        stream.status()
                    );
                }
            }
            _ => {
                finished = true;
            }
        }

        // offer the header to the terminal units
        let mut es: usize = 0;
        while !finished && es < terminal.len() {
            let stream = match input.as_mut() {
                Some(val) => val,
                None => break,
            };
            let unit = &mut terminal[es];
            if unit.check_header(&header) {
                defo!("terminal unit {} accepts {:?}", unit.name(), result.path());
                result.set_end_analyzer(Some(unit.name()));
                match unit.analyze(result, stream.as_mut()) {
                    Ok(()) => {
                        finished = true;
                    }
                    Err(err) => {
                        let message: String = match &err {
                            AnalyzerError::Format { .. } => err.to_string(),
                            _ => format!("{}: {}", unit.name(), err),
                        };
                        de_wrn!("{:?}: {}", result.path(), message);
                        result.add_value(&self.parseerror_field, message);
                        if conf.stop_on_error() || !conf.index_more() {
                            result.set_end_analyzer(None);
                            drop(input);
                            remove_indexable(transform);
                            defx!("aborted by unit {}", unit.name());
                            return AnalysisStatus::Aborted;
                        }
                        if stream.reset(0) != 0 {
                            e_wrn!(
                                "cannot reset the stream of {:?} from {} to 0 after unit {} failed",
                                result.path(),
                                stream.position(),
                                unit.name()
                            );
                            finished = true;
                        } else {
                            header = read_header(stream.as_mut());
                            if stream.reset(0) != 0 {
                                e_wrn!(
                                    "cannot reset the stream of {:?} again; at {}, status {}",
                                    result.path(),
                                    stream.position(),
                                    stream.status()
                                );
                            }
                            if header.is_empty() {
                                finished = true;
                            }
                        }
                    }
                }
            }
            if !finished {
                finished = !conf.index_more();
            }
            es += 1;
        }
        result.set_end_analyzer(None);

        // drain the stream until the transform units are ready and the size
        // is known
        let mut status_error: Option<String> = None;
        let mut size: Option<FileSz> = None;
        if let Some(stream) = input.as_mut() {
            let mut skipsize: u64 = SKIP_FIRST;
            loop {
                let max = conf.max_stream_read_length(result);
                if !conf.index_more() || max.map_or(false, |m| stream.position() >= m) {
                    defo!("stop draining at {}", stream.position());
                    drop(input);
                    remove_indexable(transform);
                    defx!("return Ok, size not recorded");
                    return AnalysisStatus::Ok;
                }
                let ready: bool = stream.size().is_some()
                    && transform.iter().all(|u| u.is_ready_with_stream());
                if ready {
                    break;
                }
                stream.skip(skipsize);
                if skipsize < SKIP_CAP {
                    skipsize *= 4;
                }
                if !stream.status().is_ok() {
                    break;
                }
            }
            match stream.status() {
                StreamStatus::Error(msg) => status_error = Some(msg.clone()),
                _ => size = stream.size(),
            }
        }
        // end the stream before unbinding, so units see the end of data
        // while bound
        drop(input);

        if let Some(msg) = status_error {
            e_err!("{:?}: {}", result.path(), msg);
            remove_indexable(transform);
            defx!("return StreamError");
            return AnalysisStatus::StreamError;
        }
        if let Some(size) = size {
            let value: Variant = match u32::try_from(size) {
                Ok(val) => Variant::UInt(val),
                Err(_) => Variant::Str(size.to_string()),
            };
            result.add_value(&self.size_field, value);
        }
        remove_indexable(transform);
        defx!("return Ok");

        AnalysisStatus::Ok
    }

    /// Analyze the file at `path` as a top-level node, handing the facts of
    /// it and of all embedded nodes to `writer`.
    pub fn index_file(
        &self,
        path: &Path,
        writer: &RefCell<dyn IndexWriter>,
    ) -> AnalysisStatus {
        let fpath = path_to_fpath(path);
        defn!("({:?})", fpath);
        let mtime = path_mtime(path);
        let mut result = AnalysisResult::new(&fpath, mtime, writer, self);
        let status = match BufferedSource::open(path) {
            Ok(source) => result.index(Some(Box::new(source))),
            Err(err) => {
                e_err!("{:?}: {}", fpath, err);
                result.index(None)
            }
        };
        result.finish();
        defx!("({:?}) {}", fpath, status);

        status
    }

    /// Analyze `input` as a top-level node named `name`.
    pub fn index_stream<'b>(
        &self,
        name: &str,
        mtime: u64,
        input: Box<dyn ByteSource + 'b>,
        writer: &RefCell<dyn IndexWriter>,
    ) -> AnalysisStatus {
        let mut result = AnalysisResult::new(name, mtime, writer, self);
        let status = result.index(Some(input));
        result.finish();

        status
    }
}

/// Read the header window of `stream`. Empty at the end of data or on error.
fn read_header(stream: &mut dyn ByteSource) -> Vec<u8> {
    match stream.read(HEADER_SZ, HEADER_SZ) {
        ResultS3::Found(data) => data.to_vec(),
        ResultS3::Done | ResultS3::Err(_) => Vec::with_capacity(0),
    }
}
