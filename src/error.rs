//! Error handling for MAGDA flat-file operations.
//!
//! Provides error types with context for file-name matching, header
//! parsing, binary decoding, external header tools and Parquet export.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MagdaError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Input not found at path: {path}")]
    InputNotFound { path: PathBuf },

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("File name does not follow the MAGDA naming convention: {path}")]
    InvalidFileName { path: PathBuf },

    #[error("Invalid column definition '{line}': {reason}")]
    InvalidColumnDefinition { line: String, reason: String },

    #[error("Invalid header line '{line}': {reason}")]
    InvalidHeaderLine { line: String, reason: String },

    #[error("Invalid schema in header {path}: {reason}")]
    InvalidSchema { path: PathBuf, reason: String },

    #[error("Header {path} is missing required field {field}")]
    MissingHeaderField { path: PathBuf, field: &'static str },

    #[error("Could not parse timestamp '{value}': {source}")]
    DateTimeParsing {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Non-finite relative time {value} at row {row}")]
    InvalidTimeValue { row: usize, value: f64 },

    #[error("Timebase {timebase} is outside the representable time range")]
    TimebaseOutOfRange { timebase: String },

    #[error("Unknown epoch key '{key}'")]
    UnknownEpoch { key: String },

    #[error("Header {path} declares no EPOCH")]
    MissingEpoch { path: PathBuf },

    #[error("No column named {name} in datafile")]
    ColumnNotFound { name: String },

    #[error(
        "Misaligned data in {path}: {byte_len} bytes is not a multiple of the {row_width}-byte row width"
    )]
    MisalignedData {
        path: PathBuf,
        byte_len: usize,
        row_width: usize,
    },

    #[error("Header tool '{program}' failed ({status}): {stderr}")]
    Communication {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("Header tool '{program}' did not finish within {timeout:?}")]
    ToolTimeout { program: String, timeout: Duration },

    #[error("Could not launch header tool '{program}': {source}")]
    ToolLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed header tool output line '{line}': {reason}")]
    MalformedToolOutput { line: String, reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Coarse error taxonomy for callers that only need to know which class of
/// failure aborted construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Format,
    Lookup,
    Alignment,
    Communication,
    Io,
    Export,
    Configuration,
}

impl MagdaError {
    /// Create an I/O error tied to the path that failed
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid column definition error
    pub fn invalid_column(line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidColumnDefinition {
            line: line.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid header line error
    pub fn invalid_header_line(line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidHeaderLine {
            line: line.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid schema error
    pub fn invalid_schema(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidSchema {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed tool output error
    pub fn malformed_output(line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedToolOutput {
            line: line.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidFileName { .. }
            | Self::InvalidColumnDefinition { .. }
            | Self::InvalidHeaderLine { .. }
            | Self::InvalidSchema { .. }
            | Self::MissingHeaderField { .. }
            | Self::DateTimeParsing { .. }
            | Self::InvalidTimeValue { .. }
            | Self::TimebaseOutOfRange { .. }
            | Self::MalformedToolOutput { .. } => ErrorCategory::Format,
            Self::UnknownEpoch { .. } | Self::MissingEpoch { .. } | Self::ColumnNotFound { .. } => {
                ErrorCategory::Lookup
            }
            Self::MisalignedData { .. } => ErrorCategory::Alignment,
            Self::Communication { .. } | Self::ToolTimeout { .. } | Self::ToolLaunch { .. } => {
                ErrorCategory::Communication
            }
            Self::Io { .. } | Self::InputNotFound { .. } => ErrorCategory::Io,
            Self::Polars(_) => ErrorCategory::Export,
            Self::Configuration { .. } => ErrorCategory::Configuration,
        }
    }
}

pub type Result<T> = std::result::Result<T, MagdaError>;
