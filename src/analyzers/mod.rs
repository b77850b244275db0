// src/analyzers/mod.rs

//! The `analyzers` module drives streams through pluggable units.
//!
//! A [`StreamAnalyzer`] owns the unit factories, selected and ordered by an
//! [`AnalyzerConfiguration`]. Factories are compiled in (see
//! [`crate::units`]) or loaded by an [`AnalyzerLoader`] from plugin
//! libraries.
//!
//! [`StreamAnalyzer`]: crate::analyzers::streamanalyzer::StreamAnalyzer
//! [`AnalyzerConfiguration`]: crate::analyzers::config::AnalyzerConfiguration
//! [`AnalyzerLoader`]: crate::analyzers::analyzerloader::AnalyzerLoader

pub mod analyzerloader;
pub mod config;
pub mod error;
pub mod eventdispatcher;
pub mod streamanalyzer;
pub mod units;
