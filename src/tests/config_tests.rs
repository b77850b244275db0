// src/tests/config_tests.rs

//! tests for `src/analyzers/config.rs`

use std::sync::atomic::Ordering;

use crate::analyzers::config::{
    AnalyzerConfig,
    AnalyzerConfiguration,
    FactoryInfo,
    Precedence,
    UnitKind,
    UnitOrder,
};

use ::regex::Regex;
use ::test_case::test_case;

#[test_case(UnitKind::Transform, Precedence::PluginsFirst)]
#[test_case(UnitKind::Terminal, Precedence::PluginsFirst)]
#[test_case(UnitKind::Event, Precedence::BuiltinsFirst)]
#[test_case(UnitKind::Line, Precedence::PluginsFirst)]
#[test_case(UnitKind::Markup, Precedence::PluginsFirst)]
fn test_unit_order_default(kind: UnitKind, expect: Precedence) {
    assert_eq!(UnitOrder::default().precedence(kind), expect);
}

#[test]
fn test_unit_order_merge() {
    let order = UnitOrder::default();
    assert_eq!(
        order.merge(UnitKind::Terminal, vec!["p1", "p2"], vec!["b1"]),
        vec!["p1", "p2", "b1"]
    );
    assert_eq!(
        order.merge(UnitKind::Event, vec!["p1"], vec!["b1", "b2"]),
        vec!["b1", "b2", "p1"]
    );
    assert_eq!(
        order.merge::<&str>(UnitKind::Line, vec![], vec![]),
        Vec::<&str>::new()
    );
}

#[test]
fn test_unit_order_changed() {
    let order = UnitOrder {
        terminal: Precedence::BuiltinsFirst,
        ..UnitOrder::default()
    };
    assert_eq!(
        order.merge(UnitKind::Terminal, vec!["p"], vec!["b"]),
        vec!["b", "p"]
    );
    let conf = AnalyzerConfig::new().with_unit_order(order.clone());
    assert_eq!(conf.unit_order(), &order);
}

#[test_case(UnitKind::Transform, "transform")]
#[test_case(UnitKind::Terminal, "terminal")]
#[test_case(UnitKind::Event, "event")]
#[test_case(UnitKind::Line, "line")]
#[test_case(UnitKind::Markup, "markup")]
fn test_unit_kind_display(kind: UnitKind, expect: &str) {
    assert_eq!(kind.to_string(), expect);
}

fn info(name: &str) -> FactoryInfo {
    FactoryInfo {
        name: String::from(name),
        kind: UnitKind::Terminal,
        builtin: true,
    }
}

#[test]
fn test_defaults() {
    let conf = AnalyzerConfig::default();
    assert!(conf.index_more());
    assert!(!conf.stop_on_error());
    assert!(conf.use_factory(&info("ZipUnit")));
    assert_eq!(conf.max_stream_read_length, None);
}

#[test_case(&["^Zip"], "ZipUnit", false; "anchored match")]
#[test_case(&["^Zip"], "GzipUnit", true; "anchored miss")]
#[test_case(&["zip"], "ZipUnit", true; "case sensitive")]
#[test_case(&["Tar", "Unit$"], "Id3Unit", false; "second pattern")]
#[test_case(&[], "Id3Unit", true; "no patterns")]
fn test_use_factory_exclude(patterns: &[&str], name: &str, expect: bool) {
    let exclude: Vec<Regex> = patterns.iter().map(|p| Regex::new(p).unwrap()).collect();
    let conf = AnalyzerConfig::new().with_exclude_units(exclude);
    assert_eq!(conf.use_factory(&info(name)), expect);
}

#[test]
fn test_cancel() {
    let conf = AnalyzerConfig::new();
    let flag = conf.cancel_flag();
    assert!(conf.index_more());
    flag.store(true, Ordering::SeqCst);
    assert!(!conf.index_more());
    flag.store(false, Ordering::SeqCst);
    assert!(conf.index_more());
    conf.cancel();
    assert!(!conf.index_more());
}

#[test]
fn test_field_register_shared() {
    let conf = AnalyzerConfig::new();
    let a = conf.field_register().register_field("shared");
    let b = conf.field_register().register_field("shared");
    assert_eq!(a.key(), b.key());
}
