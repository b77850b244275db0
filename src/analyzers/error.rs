// src/analyzers/error.rs

//! Error and status types of the analysis pipeline.

use std::fmt;

use ::thiserror::Error;

/// Failure of a unit or of a plugin source.
#[derive(Error, Debug)]
pub enum AnalyzerError {
    /// I/O failure of the stream being analyzed.
    #[error("stream error: {0}")]
    Stream(#[from] std::io::Error),

    /// A unit accepted a header but could not parse the content.
    #[error("{unit}: {reason}")]
    Format { unit: String, reason: String },

    /// A stream could not be rewound to its start after a failed unit.
    #[error("stream cannot be reset to 0, at position {position}")]
    NotReseekable { position: u64 },

    /// A plugin source could not be loaded.
    #[error("cannot load plugin {source_id}: {reason}")]
    PluginLoad { source_id: String, reason: String },

    /// The configuration asked to stop.
    #[error("analysis stopped by configuration")]
    PolicyAbort,
}

impl AnalyzerError {
    /// Shorthand for [`AnalyzerError::Format`].
    pub fn format<U: Into<String>, R: Into<String>>(unit: U, reason: R) -> AnalyzerError {
        AnalyzerError::Format {
            unit: unit.into(),
            reason: reason.into(),
        }
    }
}

pub type ResultAnalyzer<T> = Result<T, AnalyzerError>;

/// Outcome of analyzing one node.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum AnalysisStatus {
    #[default]
    Ok,
    /// stopped by the configuration, or a unit failed with
    /// `stop_on_error` set
    Aborted,
    /// the stream failed
    StreamError,
}

impl AnalysisStatus {
    /// Numeric code: `0`, `-1`, `-2`.
    pub const fn code(&self) -> i8 {
        match self {
            AnalysisStatus::Ok => 0,
            AnalysisStatus::Aborted => -1,
            AnalysisStatus::StreamError => -2,
        }
    }

    pub const fn is_ok(&self) -> bool {
        matches!(self, AnalysisStatus::Ok)
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisStatus::Ok => write!(f, "Ok"),
            AnalysisStatus::Aborted => write!(f, "Aborted"),
            AnalysisStatus::StreamError => write!(f, "StreamError"),
        }
    }
}
