//! Parquet writing module for decoded MAGDA tables
//!
//! One Parquet file is written per data file, named after its stem.

use crate::config::ParquetConfig;
use crate::error::{MagdaError, Result};

use polars::prelude::{DataFrame, ParquetWriter as PolarsParquetWriter, StatisticsOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Writes DataFrames into an output directory
#[derive(Debug, Clone)]
pub struct ParquetWriter {
    output_dir: PathBuf,
    config: ParquetConfig,
}

impl ParquetWriter {
    /// Create a new Parquet writer
    pub fn new(output_dir: PathBuf, config: ParquetConfig) -> Self {
        Self { output_dir, config }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `<output_dir>/<stem>.parquet` for a data file
    pub fn output_path_for(&self, data_path: &Path) -> PathBuf {
        let mut name = data_path
            .file_stem()
            .unwrap_or(data_path.as_os_str())
            .to_os_string();
        name.push(".parquet");
        self.output_dir.join(name)
    }

    /// Write a DataFrame with the configured compression and statistics
    pub fn write(&self, df: &mut DataFrame, output_path: &Path) -> Result<u64> {
        let file =
            std::fs::File::create(output_path).map_err(|e| MagdaError::io(output_path, e))?;

        let statistics = if self.config.statistics {
            StatisticsOptions::full()
        } else {
            StatisticsOptions::empty()
        };

        let bytes = PolarsParquetWriter::new(file)
            .with_compression(self.config.compression.to_polars_compression())
            .with_statistics(statistics)
            .finish(df)?;

        debug!(
            "Wrote {} rows ({} bytes) to {}",
            df.height(),
            bytes,
            output_path.display()
        );
        Ok(bytes)
    }
}
