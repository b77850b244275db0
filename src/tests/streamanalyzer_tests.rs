// src/tests/streamanalyzer_tests.rs

//! tests for `src/analyzers/streamanalyzer.rs`

use std::cell::RefCell;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::analyzers::config::{AnalyzerConfig, Precedence, UnitOrder};
use crate::analyzers::error::AnalysisStatus;
use crate::analyzers::streamanalyzer::StreamAnalyzer;
use crate::analyzers::units::AnalyzerFactories;
use crate::data::analysisresult::MemoryIndexWriter;
use crate::data::variant::Variant;
use crate::common::HEADER_SZ;
use crate::debug::helpers::{
    create_temp_dir,
    create_temp_file_bytes_with_suffix,
    gzip_bytes,
    ntf_fpath,
    tar_bytes,
    zip_bytes,
};
use crate::tests::common::{
    analyze_bytes,
    find_node,
    new_analyzer,
    strings_of,
    CountdownConfig,
    ReadAheadUnitFactory,
    TagUnitFactory,
    FIELD_TAG,
};

use ::regex::Regex;
use ::test_case::test_case;

const HELLO: &[u8] = b"hello\nworld\n";

fn plugins_terminal(factory: TagUnitFactory) -> AnalyzerFactories {
    let mut plugins = AnalyzerFactories::new();
    plugins.terminal.push(Arc::new(factory));

    plugins
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// unit selection and order
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn test_builtin_unit_order() {
    let analyzer = new_analyzer(AnalyzerConfig::new());
    assert_eq!(
        analyzer.terminal_unit_names(),
        vec![
            "Bz2Unit", "GzipUnit", "TarUnit", "ZipUnit", "Lz4Unit", "XzUnit", "Id3Unit", "TextUnit",
        ]
    );
    assert_eq!(
        analyzer.transform_unit_names(),
        vec!["GifTransformUnit", "EventDispatcher"]
    );
    assert_eq!(analyzer.pool_count(), 0);
}

#[test]
fn test_plugin_terminal_first() {
    let factory = TagUnitFactory::new("PluginUnit", b"hello", "plugin");
    let calls = factory.calls.clone();
    let analyzer = StreamAnalyzer::with_plugins(
        Arc::new(AnalyzerConfig::new()),
        &plugins_terminal(factory),
    );
    assert_eq!(analyzer.terminal_unit_names()[0], "PluginUnit");
    let (status, nodes) = analyze_bytes(&analyzer, "a.txt", HELLO);
    assert_eq!(status, AnalysisStatus::Ok);
    let node = &nodes[0];
    assert_eq!(strings_of(node, FIELD_TAG), vec!["plugin"]);
    assert!(node.text.is_empty(), "TextUnit is not offered a claimed header");
    assert_eq!(node.value("size"), Some(&Variant::UInt(12)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_builtins_first() {
    let factory = TagUnitFactory::new("PluginUnit", b"hello", "plugin");
    let calls = factory.calls.clone();
    let order = UnitOrder {
        terminal: Precedence::BuiltinsFirst,
        ..UnitOrder::default()
    };
    let conf = AnalyzerConfig::new().with_unit_order(order);
    let analyzer = StreamAnalyzer::with_plugins(Arc::new(conf), &plugins_terminal(factory));
    assert_eq!(analyzer.terminal_unit_names().last().unwrap(), "PluginUnit");
    let (_, nodes) = analyze_bytes(&analyzer, "a.txt", HELLO);
    assert_eq!(nodes[0].text, "hello\nworld\n");
    assert!(nodes[0].value(FIELD_TAG).is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test_case("^TextUnit$", "TextUnit"; "terminal")]
#[test_case("^Gif", "GifTransformUnit"; "transform")]
#[test_case("Zip|Tar", "ZipUnit"; "alternation")]
fn test_exclude_units(pattern: &str, excluded: &str) {
    let conf = AnalyzerConfig::new().with_exclude_units(vec![Regex::new(pattern).unwrap()]);
    let analyzer = new_analyzer(conf);
    let mut names = analyzer.terminal_unit_names();
    names.extend(analyzer.transform_unit_names());
    assert!(!names.iter().any(|n| n == excluded), "{:?}", names);
    assert!(names.iter().any(|n| n == "EventDispatcher"));
}

#[test]
fn test_exclude_text_unit() {
    let conf = AnalyzerConfig::new().with_exclude_units(vec![Regex::new("^TextUnit$").unwrap()]);
    let analyzer = new_analyzer(conf);
    let (_, nodes) = analyze_bytes(&analyzer, "a.txt", HELLO);
    let node = &nodes[0];
    assert!(node.text.is_empty());
    // line and event units still see the stream
    assert_eq!(node.value("lineCount"), Some(&Variant::UInt(2)));
    assert_eq!(node.value("size"), Some(&Variant::UInt(12)));
}

#[test]
fn test_exclude_event_unit() {
    let conf = AnalyzerConfig::new().with_exclude_units(vec![Regex::new("^MimeEventUnit$").unwrap()]);
    let analyzer = new_analyzer(conf);
    let (_, nodes) = analyze_bytes(&analyzer, "a.txt", HELLO);
    let node = &nodes[0];
    assert!(node.value("mimeType").is_none());
    assert_eq!(node.info.mime_type, None);
    assert_eq!(strings_of(node, "hasHash").len(), 1);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// one node
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn test_text_node() {
    let analyzer = new_analyzer(AnalyzerConfig::new());
    let (status, nodes) = analyze_bytes(&analyzer, "a.txt", HELLO);
    assert_eq!(status, AnalysisStatus::Ok);
    assert_eq!(nodes.len(), 1);
    let node = &nodes[0];
    assert_eq!(node.info.path, "a.txt");
    assert_eq!(node.info.depth, 0);
    assert_eq!(node.info.parent_path, None);
    let keys: Vec<&str> = node.values.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(
        keys,
        vec!["mimeType", "hasHash", "lineCount", "maxLineLength", "size"]
    );
    assert_eq!(node.value("size"), Some(&Variant::UInt(12)));
    assert_eq!(node.text, "hello\nworld\n");
    assert_eq!(analyzer.pool_count(), 1);
}

#[test]
fn test_empty_stream() {
    let analyzer = new_analyzer(AnalyzerConfig::new());
    let (status, nodes) = analyze_bytes(&analyzer, "empty", b"");
    assert_eq!(status, AnalysisStatus::Ok);
    let node = &nodes[0];
    assert_eq!(node.values, vec![(String::from("size"), Variant::UInt(0))]);
    assert!(node.text.is_empty());
}

#[test]
fn test_max_stream_read_length() {
    let conf = AnalyzerConfig::new().with_max_stream_read_length(Some(4));
    let analyzer = new_analyzer(conf);
    let (status, nodes) = analyze_bytes(&analyzer, "a.txt", HELLO);
    assert_eq!(status, AnalysisStatus::Ok);
    assert!(nodes[0].value("size").is_none());
}

#[test]
fn test_index_more_false() {
    let analyzer = StreamAnalyzer::with_plugins(
        Arc::new(CountdownConfig::new(0)),
        &AnalyzerFactories::new(),
    );
    let (status, nodes) = analyze_bytes(&analyzer, "a.txt", HELLO);
    assert_eq!(status, AnalysisStatus::Ok);
    assert_eq!(nodes.len(), 1);
    assert!(nodes[0].text.is_empty());
    assert!(nodes[0].value("size").is_none());
}

#[test]
fn test_cancelled() {
    let conf = AnalyzerConfig::new();
    conf.cancel();
    let analyzer = new_analyzer(conf);
    let (_, nodes) = analyze_bytes(&analyzer, "a.txt", HELLO);
    assert!(nodes[0].text.is_empty());
    assert!(nodes[0].value("size").is_none());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// failing units
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn test_failing_unit_then_next() {
    let factory = TagUnitFactory::failing("Failing", b"hello", 0);
    let calls = factory.calls.clone();
    let analyzer = StreamAnalyzer::with_plugins(
        Arc::new(AnalyzerConfig::new()),
        &plugins_terminal(factory),
    );
    let (status, nodes) = analyze_bytes(&analyzer, "a.txt", HELLO);
    assert_eq!(status, AnalysisStatus::Ok);
    let node = &nodes[0];
    assert_eq!(strings_of(node, "parseError"), vec!["Failing: test failure"]);
    assert_eq!(node.text, "hello\nworld\n");
    assert_eq!(node.value("size"), Some(&Variant::UInt(12)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failing_unit_after_reading() {
    let mut data: Vec<u8> = b"FAIL".to_vec();
    data.extend_from_slice(&[b'a'; 2996]);
    let factory = TagUnitFactory::failing("Failing", b"FAIL", 2000);
    let analyzer = StreamAnalyzer::with_plugins(
        Arc::new(AnalyzerConfig::new()),
        &plugins_terminal(factory),
    );
    let (status, nodes) = analyze_bytes(&analyzer, "a.txt", &data);
    assert_eq!(status, AnalysisStatus::Ok);
    let node = &nodes[0];
    assert_eq!(strings_of(node, "parseError").len(), 1);
    assert_eq!(node.text.len(), 3000);
    assert!(node.text.starts_with("FAILaaa"));
    assert_eq!(node.value("size"), Some(&Variant::UInt(3000)));
}

#[test]
fn test_failing_unit_next_unit_gets_same_header() {
    let data: Vec<u8> = (0..3000u32).map(|i| b'a' + (i % 26) as u8).collect();
    let failing = TagUnitFactory::failing("Failing", b"abc", 2000);
    let failing_headers = failing.headers.clone();
    let second = TagUnitFactory::new("Second", b"abc", "second");
    let second_headers = second.headers.clone();
    let second_calls = second.calls.clone();
    let mut plugins = AnalyzerFactories::new();
    plugins.terminal.push(Arc::new(failing));
    plugins.terminal.push(Arc::new(second));
    let analyzer = StreamAnalyzer::with_plugins(Arc::new(AnalyzerConfig::new()), &plugins);
    let (status, nodes) = analyze_bytes(&analyzer, "a.txt", &data);
    assert_eq!(status, AnalysisStatus::Ok);
    let node = &nodes[0];
    assert_eq!(strings_of(node, "parseError"), vec!["Failing: test failure"]);
    assert_eq!(strings_of(node, FIELD_TAG), vec!["second"]);
    assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    let failing_headers = failing_headers.lock().unwrap();
    let second_headers = second_headers.lock().unwrap();
    assert_eq!(failing_headers.len(), 1);
    assert_eq!(second_headers.len(), 1);
    assert_eq!(failing_headers[0], &data[..HEADER_SZ]);
    assert_eq!(second_headers[0], &data[..HEADER_SZ]);
    // the second unit read from the start
    assert!(node.text.is_empty());
    assert_eq!(node.value("size"), Some(&Variant::UInt(3000)));
}

#[test]
fn test_stop_on_error() {
    let factory = TagUnitFactory::failing("Failing", b"hello", 0);
    let conf = AnalyzerConfig::new().with_stop_on_error(true);
    let analyzer = StreamAnalyzer::with_plugins(Arc::new(conf), &plugins_terminal(factory));
    let (status, nodes) = analyze_bytes(&analyzer, "a.txt", HELLO);
    assert_eq!(status, AnalysisStatus::Aborted);
    assert_eq!(nodes.len(), 1);
    let node = &nodes[0];
    assert_eq!(strings_of(node, "parseError"), vec!["Failing: test failure"]);
    assert!(node.text.is_empty());
    assert!(node.value("size").is_none());
}

#[test]
fn test_transform_reading_ahead() {
    let mut plugins = AnalyzerFactories::new();
    plugins.transform.push(Arc::new(ReadAheadUnitFactory { read: 4 }));
    let analyzer = StreamAnalyzer::with_plugins(Arc::new(AnalyzerConfig::new()), &plugins);
    assert_eq!(
        analyzer.transform_unit_names(),
        vec!["ReadAheadUnit", "GifTransformUnit", "EventDispatcher"]
    );
    let (status, nodes) = analyze_bytes(&analyzer, "a.txt", HELLO);
    assert_eq!(status, AnalysisStatus::Ok);
    // terminal units still read from the start
    assert_eq!(nodes[0].text, "hello\nworld\n");
    assert_eq!(nodes[0].value("size"), Some(&Variant::UInt(12)));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// embedded nodes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn test_child_node() {
    let data = zip_bytes(&[("inner.txt", HELLO)]);
    let analyzer = new_analyzer(AnalyzerConfig::new());
    let (status, nodes) = analyze_bytes(&analyzer, "outer.zip", &data);
    assert_eq!(status, AnalysisStatus::Ok);
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].info.path, "outer.zip|inner.txt");
    assert_eq!(nodes[1].info.path, "outer.zip");
    let child = find_node(&nodes, "outer.zip|inner.txt");
    assert_eq!(strings_of(child, "parentLocation"), vec!["outer.zip"]);
    assert_eq!(strings_of(child, "fileName"), vec!["inner.txt"]);
    assert_eq!(child.value("depth"), Some(&Variant::UInt(1)));
    assert_eq!(child.text, "hello\nworld\n");
    assert_eq!(analyzer.pool_count(), 2);
}

#[test]
fn test_siblings_after_recursion() {
    let inner_zip = zip_bytes(&[("x.txt", b"x\n"), ("y.txt", b"y\n")]);
    let tgz = gzip_bytes(&tar_bytes(&[("t1.txt", b"t1\n"), ("t2.txt", b"t2\n")]));
    let data = zip_bytes(&[
        ("a.zip", &inner_zip[..]),
        ("b.txt", &b"bee\nbee\n"[..]),
        ("c.tgz", &tgz[..]),
        ("d.txt", &b"dee\n"[..]),
    ]);
    let analyzer = new_analyzer(AnalyzerConfig::new());
    let (status, nodes) = analyze_bytes(&analyzer, "o.zip", &data);
    assert_eq!(status, AnalysisStatus::Ok);
    let paths: Vec<&str> = nodes.iter().map(|n| n.info.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "o.zip|a.zip|x.txt",
            "o.zip|a.zip|y.txt",
            "o.zip|a.zip",
            "o.zip|b.txt",
            "o.zip|c.tgz|c.tar|t1.txt",
            "o.zip|c.tgz|c.tar|t2.txt",
            "o.zip|c.tgz|c.tar",
            "o.zip|c.tgz",
            "o.zip|d.txt",
            "o.zip",
        ]
    );
    // siblings analyzed after a deeper node are whole
    let b = find_node(&nodes, "o.zip|b.txt");
    assert_eq!(b.text, "bee\nbee\n");
    assert_eq!(b.value("lineCount"), Some(&Variant::UInt(2)));
    assert_eq!(b.value("size"), Some(&Variant::UInt(8)));
    assert_eq!(b.value("depth"), Some(&Variant::UInt(1)));
    let d = find_node(&nodes, "o.zip|d.txt");
    assert_eq!(d.text, "dee\n");
    assert_eq!(d.value("size"), Some(&Variant::UInt(4)));
    assert_eq!(strings_of(d, "parentLocation"), vec!["o.zip"]);
    let t2 = find_node(&nodes, "o.zip|c.tgz|c.tar|t2.txt");
    assert_eq!(t2.text, "t2\n");
    assert_eq!(t2.value("depth"), Some(&Variant::UInt(3)));
    let top = find_node(&nodes, "o.zip");
    assert!(top.value("parseError").is_none());
    assert_eq!(top.value("size"), Some(&Variant::UInt(data.len() as u32)));
    for node in nodes.iter() {
        assert!(node.value("parseError").is_none(), "{:?}", node.info.path);
    }
    assert_eq!(analyzer.pool_count(), 4);
}

#[test]
fn test_analyzer_reused() {
    let analyzer = new_analyzer(AnalyzerConfig::new());
    let data = zip_bytes(&[("inner.txt", HELLO)]);
    for _ in 0..3 {
        let (_, nodes) = analyze_bytes(&analyzer, "outer.zip", &data);
        assert_eq!(nodes.len(), 2);
        let (_, nodes) = analyze_bytes(&analyzer, "a.txt", HELLO);
        assert_eq!(nodes[0].text, "hello\nworld\n");
    }
    assert_eq!(analyzer.pool_count(), 2);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// index_file
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[test]
fn test_index_file() {
    let ntf = create_temp_file_bytes_with_suffix(HELLO, ".txt");
    let path = ntf_fpath(&ntf);
    let analyzer = new_analyzer(AnalyzerConfig::new());
    let writer = RefCell::new(MemoryIndexWriter::new());
    let status = analyzer.index_file(ntf.path(), &writer);
    assert_eq!(status, AnalysisStatus::Ok);
    let writer = writer.into_inner();
    let node = writer.node(&path).unwrap();
    assert_eq!(node.text, "hello\nworld\n");
    assert_eq!(node.value("size"), Some(&Variant::UInt(12)));
    assert!(node.info.mtime > 0);
}

#[test]
fn test_index_file_missing() {
    let dir = create_temp_dir();
    let path = dir.path().join("missing.txt");
    let analyzer = new_analyzer(AnalyzerConfig::new());
    let writer = RefCell::new(MemoryIndexWriter::new());
    analyzer.index_file(&path, &writer);
    let writer = writer.into_inner();
    assert_eq!(writer.nodes().len(), 1);
    let node = &writer.nodes()[0];
    assert!(node.value("size").is_none());
    assert!(node.text.is_empty());
}
