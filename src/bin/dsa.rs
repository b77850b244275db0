// src/bin/dsa.rs

//! Driver program _dsa_ drives the [_dsalib_].
//!
//! Processes user-passed command-line arguments.
//! Then processes paths passed; directories are walked for files.
//!
//! Files are analyzed by a pool of worker threads. Each worker owns a
//! [`StreamAnalyzer`] and a [`MemoryIndexWriter`]; after each file it
//! sends the [`IndexedNode`]s of the file and of every node embedded in it
//! to the main thread.
//!
//! The main thread prints the nodes of each file in the order the paths
//! were found, whatever order the workers finish in. `dsa.rs` is the only
//! thread that prints to STDOUT.
//!
//! If passed CLI option `--summary`, a summary of all files is printed last.
//!
//! [_dsalib_]: dsalib
//! [`StreamAnalyzer`]: dsalib::analyzers::streamanalyzer::StreamAnalyzer
//! [`MemoryIndexWriter`]: dsalib::data::analysisresult::MemoryIndexWriter
//! [`IndexedNode`]: dsalib::data::analysisresult::IndexedNode

#![allow(non_camel_case_types)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use ::anyhow::Context;
use ::clap::{Parser, ValueEnum};
use ::const_format::concatcp;
use ::regex::Regex;
use ::si_trace_print::{defn, defo, defx};
use ::termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use ::walkdir::WalkDir;

use ::dsalib::analyzers::analyzerloader::AnalyzerLoader;
use ::dsalib::analyzers::config::{AnalyzerConfig, AnalyzerConfiguration, ENV_PLUGIN_PATH};
use ::dsalib::analyzers::error::AnalysisStatus;
use ::dsalib::analyzers::streamanalyzer::StreamAnalyzer;
use ::dsalib::analyzers::units::AnalyzerFactories;
use ::dsalib::common::{Count, FPath};
use ::dsalib::data::analysisresult::{IndexedNode, MemoryIndexWriter};
use ::dsalib::debug::printers::buffer_to_String_noraw_trunc;
use ::dsalib::{e_err, e_wrn};

/// CLI enum that maps to [`termcolor::ColorChoice`].
///
/// [`termcolor::ColorChoice`]: https://docs.rs/termcolor/1.4.1/termcolor/enum.ColorChoice.html
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    ValueEnum, // from `clap`
)]
enum CLI_Color_Choice {
    always,
    auto,
    never,
}

const CLI_HELP_AFTER: &str = concatcp!(
    "Plugin libraries named `libdsa_*` or `dsa_*` are loaded from each --plugin-dir\n",
    "and from each directory in environment variable ",
    ENV_PLUGIN_PATH,
    ".\n",
    "\n",
    "Unit names for --exclude-unit are listed by --list-units.",
);

/// Text longer than this is shown truncated.
const TEXT_SHOW_MAX: usize = 60;

// Note:
// * the `about` is taken from `Cargo.toml:[package]:description`.
#[derive(Parser, Debug)]
#[clap(
    about = env!("CARGO_PKG_DESCRIPTION"),
    author = env!("CARGO_PKG_AUTHORS"),
    name = "dsa",
    version = concatcp!(
        "(Deep Stream Analyzer)\n",
        "Version: ",
        env!("CARGO_PKG_VERSION_MAJOR"), ".",
        env!("CARGO_PKG_VERSION_MINOR"), ".",
        env!("CARGO_PKG_VERSION_PATCH"), "\n",
        "MSRV: ", env!("CARGO_PKG_RUST_VERSION"), "\n",
        "License: ", env!("CARGO_PKG_LICENSE"), "\n",
        "Repository: ", env!("CARGO_PKG_REPOSITORY"), "\n",
        "Author: ", env!("CARGO_PKG_AUTHORS"), "\n",
    ),
    after_help = CLI_HELP_AFTER,
    verbatim_doc_comment,
)]
struct CLI_Args {
    /// Path(s) of files or directories.
    /// Directories will be recursed. Symlinks will be followed.
    #[clap(
        required_unless_present = "list_units",
        verbatim_doc_comment,
    )]
    paths: Vec<String>,

    /// Stop reading a stream after this many bytes. The size of a stream
    /// cut short is not recorded.
    #[clap(
        short = 'm',
        long,
        verbatim_doc_comment,
    )]
    max_read: Option<u64>,

    /// Stop analyzing a file when a unit fails to parse it, instead of
    /// trying the next unit.
    #[clap(
        short = 'e',
        long,
        verbatim_doc_comment,
    )]
    stop_on_error: bool,

    /// Do not use units with a name matching this regular expression.
    /// May be passed more than once.
    #[clap(
        short = 'x',
        long,
        verbatim_doc_comment,
        value_parser = cli_parse_regex,
    )]
    exclude_unit: Vec<Regex>,

    /// Load plugin libraries from this directory.
    /// May be passed more than once.
    #[clap(
        short = 'p',
        long,
        verbatim_doc_comment,
    )]
    plugin_dir: Vec<PathBuf>,

    /// Count of worker threads.
    #[clap(
        short = 'j',
        long,
        verbatim_doc_comment,
        default_value_t = default_threads(),
        value_parser = clap::value_parser!(usize),
    )]
    threads: usize,

    /// Print the text recorded for each node, truncated.
    #[clap(
        short = 't',
        long,
        verbatim_doc_comment,
    )]
    text: bool,

    /// Print the units in the order they are tried, then exit.
    #[clap(
        long,
        verbatim_doc_comment,
    )]
    list_units: bool,

    /// Choose to print to terminal using colors.
    #[clap(
        required = false,
        short = 'c',
        long = "color",
        verbatim_doc_comment,
        value_enum,
        default_value_t=CLI_Color_Choice::auto,
    )]
    color_choice: CLI_Color_Choice,

    /// Print a summary of files and nodes after all files.
    #[clap(
        short = 's',
        long,
        verbatim_doc_comment,
    )]
    summary: bool,
}

fn default_threads() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn cli_parse_regex(s: &str) -> std::result::Result<Regex, String> {
    Regex::new(s).map_err(|err| format!("bad regular expression {:?}: {}", s, err))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// paths
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Files under `path`, sorted within each directory. A path that does not
/// exist is reported and yields nothing.
fn process_path(path: &str) -> Vec<PathBuf> {
    defn!("({:?})", path);
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(path)
        .follow_links(true)
        .sort_by_file_name()
    {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
            Ok(_entry) => {
                defo!("skip non-file {:?}", _entry.path());
            }
            Err(err) => e_wrn!("{}", err),
        }
    }
    defx!("{} files", files.len());

    files
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// worker threads
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Index of a file in the order paths were found.
type FileId = usize;

/// Sent from the main thread to a worker.
type ChanDatumJob = (FileId, PathBuf);
/// Sent from a worker to the main thread: the file, how it went, and its
/// nodes in the order they finished.
type ChanDatumDone = (FileId, AnalysisStatus, Vec<IndexedNode>);

fn exec_analyzer_thread(
    conf: Arc<dyn AnalyzerConfiguration>,
    plugins: AnalyzerFactories,
    recv_job: crossbeam_channel::Receiver<ChanDatumJob>,
    send_done: crossbeam_channel::Sender<ChanDatumDone>,
) {
    defn!();
    let analyzer = StreamAnalyzer::with_plugins(conf, &plugins);
    let writer = RefCell::new(MemoryIndexWriter::new());
    for (fileid, path) in recv_job.iter() {
        defo!("fileid {} path {:?}", fileid, path);
        let status = match analyzer.config().index_more() {
            true => analyzer.index_file(&path, &writer),
            false => AnalysisStatus::Aborted,
        };
        let nodes = writer.borrow_mut().take_nodes();
        if send_done.send((fileid, status, nodes)).is_err() {
            defo!("main thread is gone");
            break;
        }
    }
    defx!();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// printing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Default)]
struct Summary {
    files: Count,
    nodes: Count,
    values: Count,
    triplets: Count,
    aborted: Count,
    stream_errors: Count,
}

/// Print one node, indented by its depth.
fn print_node(
    out: &mut StandardStream,
    node: &IndexedNode,
    show_text: bool,
) -> std::io::Result<()> {
    let indent: String = "    ".repeat(node.info.depth);
    out.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
    write!(out, "{}{}", indent, node.info.path)?;
    out.reset()?;
    match node.info.mime_type.as_ref() {
        Some(mime) => writeln!(out, " ({})", mime)?,
        None => writeln!(out)?,
    }
    for (key, value) in node.values.iter() {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
        write!(out, "{}  {}", indent, key)?;
        out.reset()?;
        writeln!(out, " = {}", value)?;
    }
    for (subject, predicate, object) in node.triplets.iter() {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
        write!(out, "{}  {} {}", indent, subject, predicate)?;
        out.reset()?;
        writeln!(out, " {}", object)?;
    }
    if show_text && !node.text.is_empty() {
        let shown: String = buffer_to_String_noraw_trunc(node.text.as_bytes(), TEXT_SHOW_MAX);
        writeln!(out, "{}  text: {}", indent, shown)?;
    }

    Ok(())
}

/// Print `node` then, in the order they finished, its children.
fn print_tree(
    out: &mut StandardStream,
    nodes: &[IndexedNode],
    node: &IndexedNode,
    show_text: bool,
) -> std::io::Result<()> {
    print_node(out, node, show_text)?;
    for child in nodes
        .iter()
        .filter(|n| n.info.parent_path.as_ref() == Some(&node.info.path))
    {
        print_tree(out, nodes, child, show_text)?;
    }

    Ok(())
}

fn print_summary(out: &mut StandardStream, summary: &Summary, start_time: Instant) -> std::io::Result<()> {
    out.set_color(ColorSpec::new().set_bold(true))?;
    writeln!(out, "\nSummary:")?;
    out.reset()?;
    writeln!(out, "  files       : {}", summary.files)?;
    writeln!(out, "  nodes       : {}", summary.nodes)?;
    writeln!(out, "  values      : {}", summary.values)?;
    writeln!(out, "  triplets    : {}", summary.triplets)?;
    writeln!(out, "  aborted     : {}", summary.aborted)?;
    writeln!(out, "  stream errors: {}", summary.stream_errors)?;
    writeln!(out, "  duration    : {:?}", start_time.elapsed())?;

    Ok(())
}

fn print_units(out: &mut StandardStream, analyzer: &StreamAnalyzer) -> std::io::Result<()> {
    writeln!(out, "transform units:")?;
    for name in analyzer.transform_unit_names().iter() {
        writeln!(out, "  {}", name)?;
    }
    writeln!(out, "terminal units:")?;
    for name in analyzer.terminal_unit_names().iter() {
        writeln!(out, "  {}", name)?;
    }

    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// main
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Analyze all files, printing as they complete in path order. Returns
/// `true` if every file was analyzed without a stream error.
fn processing_loop(args: CLI_Args, start_time: Instant) -> anyhow::Result<bool> {
    defn!();
    let color_choice: ColorChoice = match args.color_choice {
        CLI_Color_Choice::always => ColorChoice::Always,
        CLI_Color_Choice::auto => ColorChoice::Auto,
        CLI_Color_Choice::never => ColorChoice::Never,
    };
    let mut out = StandardStream::stdout(color_choice);

    let config = AnalyzerConfig::new()
        .with_max_stream_read_length(args.max_read)
        .with_stop_on_error(args.stop_on_error)
        .with_exclude_units(args.exclude_unit);
    let cancel = config.cancel_flag();
    ctrlc::set_handler(move || {
        cancel.store(true, std::sync::atomic::Ordering::SeqCst);
    })
    .context("cannot set the Ctrl-C handler")?;
    let conf: Arc<dyn AnalyzerConfiguration> = Arc::new(config);

    let mut loader = AnalyzerLoader::new();
    loader.load_plugins_from_env();
    for dir in args.plugin_dir.iter() {
        loader.load_plugins(dir);
    }
    let plugins: AnalyzerFactories = loader.factories().clone();
    defo!("plugins {:?}", plugins);

    if args.list_units {
        let analyzer = StreamAnalyzer::with_plugins(conf, &plugins);
        print_units(&mut out, &analyzer)?;
        defx!("list units");
        return Ok(true);
    }

    let files: Vec<PathBuf> = args
        .paths
        .iter()
        .flat_map(|path| process_path(path))
        .collect();
    if files.is_empty() {
        e_err!("no files found");
        return Ok(false);
    }

    let (send_job, recv_job) = crossbeam_channel::unbounded::<ChanDatumJob>();
    let (send_done, recv_done) = crossbeam_channel::unbounded::<ChanDatumDone>();
    let thread_count = std::cmp::max(1, std::cmp::min(args.threads, files.len()));
    let mut handles: Vec<thread::JoinHandle<()>> = Vec::with_capacity(thread_count);
    for i in 0..thread_count {
        let conf = conf.clone();
        let plugins = plugins.clone();
        let recv_job = recv_job.clone();
        let send_done = send_done.clone();
        let handle = thread::Builder::new()
            .name(format!("dsa-{}", i))
            .spawn(move || exec_analyzer_thread(conf, plugins, recv_job, send_done))
            .with_context(|| format!("cannot spawn worker thread {}", i))?;
        handles.push(handle);
    }
    drop(recv_job);
    drop(send_done);
    let paths: Vec<FPath> = files
        .iter()
        .map(|path| path.to_string_lossy().into_owned())
        .collect();
    for (fileid, path) in files.into_iter().enumerate() {
        if send_job.send((fileid, path)).is_err() {
            break;
        }
    }
    drop(send_job);

    let mut summary = Summary::default();
    let mut ok = true;
    // finished files waiting for an earlier file to be printed
    let mut pending: BTreeMap<FileId, (AnalysisStatus, Vec<IndexedNode>)> = BTreeMap::new();
    let mut next: FileId = 0;
    for (fileid, status, nodes) in recv_done.iter() {
        pending.insert(fileid, (status, nodes));
        while let Some((status, nodes)) = pending.remove(&next) {
            summary.files += 1;
            match status {
                AnalysisStatus::Ok => {}
                AnalysisStatus::Aborted => summary.aborted += 1,
                AnalysisStatus::StreamError => {
                    summary.stream_errors += 1;
                    ok = false;
                    e_err!("{}: stream error", paths[next]);
                }
            }
            for node in nodes.iter() {
                summary.nodes += 1;
                summary.values += node.values.len() as Count;
                summary.triplets += node.triplets.len() as Count;
            }
            // the file node finishes last
            if let Some(root) = nodes.last() {
                print_tree(&mut out, &nodes, root, args.text)?;
            }
            next += 1;
        }
    }
    for handle in handles.into_iter() {
        if handle.join().is_err() {
            e_err!("worker thread panicked");
            ok = false;
        }
    }
    if next != paths.len() {
        e_wrn!("{} of {} files were not analyzed", paths.len() - next, paths.len());
    }
    if args.summary {
        print_summary(&mut out, &summary, start_time)?;
    }
    out.flush()?;
    defx!("ok {}", ok);

    Ok(ok)
}

pub fn main() -> ExitCode {
    let start_time = Instant::now();
    defn!();
    let args = CLI_Args::parse();
    defo!("args {:?}", args);

    let exitcode = match processing_loop(args, start_time) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            e_err!("{:#}", err);
            ExitCode::FAILURE
        }
    };
    defx!("exitcode {:?}", exitcode);

    exitcode
}
