//! Error taxonomy for analysis runs
//!
//! Three families with different propagation rules:
//! - [`ConfigError`] is fatal: the run is refused before any record is read.
//! - [`InputError`] is local: it fails one component, which the pipeline
//!   reports as "could not compute" while the other components proceed.
//! - [`IngestError`] belongs to the loading edge (CSV/JSON files).
//!
//! Undefined statistics (zero variance, empty groups, short history) are not
//! errors at all; see [`crate::stats::Statistic`].

use thiserror::Error;

/// Invalid analysis configuration (fatal for the whole run)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be a positive window size, got {value}")]
    NonPositiveWindow { name: &'static str, value: usize },

    #[error("{name} must contain at least one window size")]
    EmptyWindowList { name: &'static str },

    #[error("{name} must be a finite value > 0, got {value}")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("{name} must be >= 1, got {value}")]
    InvalidMinimum { name: &'static str, value: usize },

    #[error("bin edges for {condition} must be finite and strictly increasing")]
    InvalidBins { condition: String },

    #[error("error code '{code}' is not a valid identifier")]
    InvalidErrorCode { code: String },

    #[error("error code '{code}' is mapped twice ({first} and {second})")]
    DuplicateErrorCode {
        code: String,
        first: String,
        second: String,
    },

    #[error("device outlier detection needs at least one dimension")]
    NoDeviceDimensions,

    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

/// A record cannot be used by the analysis step that needs it
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("record {index}: required field '{field}' is missing")]
    MissingField { index: usize, field: &'static str },

    #[error("record {index}: field '{field}' is not a finite number ({value})")]
    NonFinite {
        index: usize,
        field: &'static str,
        value: f64,
    },

    #[error("record {index}: field '{field}' is empty")]
    EmptyIdentifier { index: usize, field: &'static str },

    #[error("no records to analyze")]
    EmptyInput,
}

/// Failure while loading records from a file
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("line {line}: missing column '{column}' in header")]
    MissingColumn { line: usize, column: &'static str },

    #[error("line {line}: unknown test type '{value}'")]
    UnknownTestType { line: usize, value: String },

    #[error("line {line}: invalid timestamp '{value}'")]
    InvalidTimestamp { line: usize, value: String },

    #[error("line {line}: invalid result '{value}' (expected PASS or FAIL)")]
    InvalidOutcome { line: usize, value: String },

    #[error("line {line}: column '{column}' is not numeric ('{value}')")]
    NonNumeric {
        line: usize,
        column: &'static str,
        value: String,
    },

    #[error("invalid JSON records: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
