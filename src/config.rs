//! Configuration management and validation.
//!
//! Holds the data root used for archive path matching, the header source
//! selection, file extensions, and Parquet export settings for batch
//! conversion.

use crate::constants::{
    DATA_EXTENSION, DATA_ROOT_ENV, DEFAULT_TOOL_TIMEOUT_SECS, HEADER_EXTENSION, HEADER_TOOL_ENV,
};
use crate::error::{MagdaError, Result};
use polars::prelude::ParquetCompression;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Supported compression algorithms for parquet files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionAlgorithm {
    /// Snappy compression - good balance of speed and compression
    Snappy,
    /// ZSTD compression - better compression ratio, slower
    Zstd,
    /// LZ4 compression - fastest, lower compression ratio
    Lz4,
    /// No compression
    Uncompressed,
}

impl CompressionAlgorithm {
    /// Convert to polars ParquetCompression type
    pub fn to_polars_compression(&self) -> ParquetCompression {
        match self {
            CompressionAlgorithm::Snappy => ParquetCompression::Snappy,
            CompressionAlgorithm::Zstd => ParquetCompression::Zstd(None),
            CompressionAlgorithm::Lz4 => ParquetCompression::Lz4Raw,
            CompressionAlgorithm::Uncompressed => ParquetCompression::Uncompressed,
        }
    }
}

/// Parquet output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParquetConfig {
    pub compression: CompressionAlgorithm,

    /// Enable column statistics for query pruning
    pub statistics: bool,
}

impl Default for ParquetConfig {
    fn default() -> Self {
        Self {
            compression: CompressionAlgorithm::Snappy,
            statistics: true,
        }
    }
}

/// Out-of-process header tool, invoked as `<program> <args...> <header-path>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalToolConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

impl ExternalToolConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
        }
    }

    /// Split a whole command line on whitespace into program and arguments
    pub fn from_command_line(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| MagdaError::configuration("header tool command is empty"))?;
        Ok(Self {
            program,
            args: parts.collect(),
            timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
        })
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Where header metadata comes from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaderSource {
    /// Parse the `.ffh` file in-process
    #[default]
    Local,
    /// Ask an external tool for the normalized fields
    External(ExternalToolConfig),
}

/// Global configuration for MAGDA flat-file reading and conversion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MagdaConfig {
    /// Archive root; when set, file paths must follow the archive layout
    pub data_root: Option<PathBuf>,

    pub header_extension: String,

    pub data_extension: String,

    pub header_source: HeaderSource,

    /// Number of files converted concurrently
    pub workers: usize,

    pub parquet: ParquetConfig,
}

impl Default for MagdaConfig {
    fn default() -> Self {
        Self {
            data_root: None,
            header_extension: HEADER_EXTENSION.to_string(),
            data_extension: DATA_EXTENSION.to_string(),
            header_source: HeaderSource::Local,
            workers: num_cpus::get(),
            parquet: ParquetConfig::default(),
        }
    }
}

impl MagdaConfig {
    /// Default configuration overlaid with `CASDATA` and `MAGDA_HEADER_TOOL`
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(root) = std::env::var_os(DATA_ROOT_ENV).filter(|v| !v.is_empty()) {
            debug!("Using data root from {}: {:?}", DATA_ROOT_ENV, root);
            config.data_root = Some(PathBuf::from(root));
        }

        if let Ok(command) = std::env::var(HEADER_TOOL_ENV) {
            if !command.trim().is_empty() {
                debug!("Using header tool from {}: {}", HEADER_TOOL_ENV, command);
                config.header_source =
                    HeaderSource::External(ExternalToolConfig::from_command_line(&command)?);
            }
        }

        Ok(config)
    }

    /// Create configuration with custom worker count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Require paths to sit below an archive root
    pub fn with_data_root(mut self, data_root: impl Into<PathBuf>) -> Self {
        self.data_root = Some(data_root.into());
        self
    }

    pub fn with_header_source(mut self, header_source: HeaderSource) -> Self {
        self.header_source = header_source;
        self
    }

    pub fn with_extensions(
        mut self,
        header_extension: impl Into<String>,
        data_extension: impl Into<String>,
    ) -> Self {
        self.header_extension = header_extension.into();
        self.data_extension = data_extension.into();
        self
    }

    pub fn with_compression(mut self, compression: CompressionAlgorithm) -> Self {
        self.parquet.compression = compression;
        self
    }

    /// Configure parquet output settings
    pub fn with_parquet(mut self, parquet: ParquetConfig) -> Self {
        self.parquet = parquet;
        self
    }

    /// Reject settings no reader could work with
    pub fn validate(&self) -> Result<()> {
        if self.header_extension.is_empty() || self.data_extension.is_empty() {
            return Err(MagdaError::configuration("file extensions must not be empty"));
        }
        if self.header_extension == self.data_extension {
            return Err(MagdaError::configuration(
                "header and data extensions must differ",
            ));
        }
        if self.workers == 0 {
            return Err(MagdaError::configuration("workers must be at least 1"));
        }
        if let HeaderSource::External(tool) = &self.header_source {
            if tool.program.is_empty() {
                return Err(MagdaError::configuration("header tool program is empty"));
            }
            if tool.timeout_secs == 0 {
                return Err(MagdaError::configuration(
                    "header tool timeout must be at least one second",
                ));
            }
        }
        Ok(())
    }
}
