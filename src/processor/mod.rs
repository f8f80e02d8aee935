//! Batch conversion of MAGDA data files to Parquet.
//!
//! Discovers data files, decodes each one on a blocking task with bounded
//! concurrency, and writes one Parquet file per input. A failing file is
//! recorded in the statistics and does not stop the batch.

pub mod discovery;
pub mod writer;

use self::{discovery::FileDiscovery, writer::ParquetWriter};

use crate::config::MagdaConfig;
use crate::data_file::{DataFile, header_path_for};
use crate::error::{MagdaError, Result};
use crate::models::ConversionStats;
use crate::provider::{HeaderMetadataProvider, provider_from_config};

use colored::*;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::fs;
use tokio::task;
use tracing::{debug, error};

/// Result of converting one data file
#[derive(Debug, Clone, PartialEq)]
pub struct FileOutcome {
    pub output_path: PathBuf,
    pub rows: usize,
    pub row_count_mismatch: bool,
}

/// Decode one data file and write it as Parquet
pub fn convert_file(
    data_path: &Path,
    header_extension: &str,
    provider: &dyn HeaderMetadataProvider,
    writer: &ParquetWriter,
) -> Result<FileOutcome> {
    let header_path = header_path_for(data_path, header_extension);
    let file = DataFile::from_provider(data_path, &header_path, provider)?;
    let mut df = file.to_dataframe()?;

    let output_path = writer.output_path_for(data_path);
    writer.write(&mut df, &output_path)?;

    Ok(FileOutcome {
        output_path,
        rows: file.n_rows(),
        row_count_mismatch: file.row_count_mismatch(),
    })
}

/// Main processor for MAGDA batch conversion
#[derive(Debug)]
pub struct DatasetProcessor {
    input_path: PathBuf,
    output_dir: PathBuf,
    config: MagdaConfig,
    provider: Arc<dyn HeaderMetadataProvider>,
    show_progress: bool,
}

impl DatasetProcessor {
    /// Create a new processor. Without an explicit output directory,
    /// Parquet files go to `parquet/` next to the input.
    pub fn new(input_path: PathBuf, output_dir: Option<PathBuf>, config: MagdaConfig) -> Result<Self> {
        config.validate()?;

        if !input_path.exists() {
            return Err(MagdaError::InputNotFound { path: input_path });
        }

        let output_dir = output_dir.unwrap_or_else(|| {
            let base = if input_path.is_dir() {
                input_path.as_path()
            } else {
                input_path.parent().unwrap_or_else(|| Path::new("."))
            };
            base.join("parquet")
        });

        let provider = provider_from_config(&config)?;

        Ok(Self {
            input_path,
            output_dir,
            config,
            provider,
            show_progress: true,
        })
    }

    /// Enable or disable console output and the progress bar
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Main processing entry point
    pub async fn process(&self) -> Result<ConversionStats> {
        let start_time = Instant::now();
        if self.show_progress {
            println!("{}", "Starting MAGDA conversion".bright_green().bold());
            println!("  {} {}", "Input:".bright_cyan(), self.input_path.display());
            println!("  {} {}", "Output:".bright_cyan(), self.output_dir.display());
        }

        let mut discovery =
            FileDiscovery::new(self.input_path.clone(), self.config.data_extension.clone());
        let files = discovery.discover_data_files().await?;
        if self.show_progress {
            println!(
                "  {} {} data files in {} directories",
                "Found".bright_green(),
                files.len().to_string().bright_white().bold(),
                discovery.directory_count().to_string().bright_white().bold()
            );
        }

        let mut stats = ConversionStats {
            output_path: self.output_dir.clone(),
            ..Default::default()
        };

        if files.is_empty() {
            stats.processing_time_ms = start_time.elapsed().as_millis();
            return Ok(stats);
        }

        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| MagdaError::io(&self.output_dir, e))?;

        let pb = self.progress_bar(files.len());
        let writer = Arc::new(ParquetWriter::new(
            self.output_dir.clone(),
            self.config.parquet.clone(),
        ));
        let concurrent_limit = self.config.workers.min(files.len()).max(1);
        debug!(
            "Converting {} files with {} workers",
            files.len(),
            concurrent_limit
        );

        let mut results = stream::iter(files)
            .map(|data_path| {
                let provider = Arc::clone(&self.provider);
                let writer = Arc::clone(&writer);
                let header_extension = self.config.header_extension.clone();
                async move {
                    let task_path = data_path.clone();
                    let result = task::spawn_blocking(move || {
                        convert_file(&task_path, &header_extension, provider.as_ref(), &writer)
                    })
                    .await;
                    (data_path, result)
                }
            })
            .buffer_unordered(concurrent_limit);

        while let Some((data_path, result)) = results.next().await {
            if let Some(file_name) = data_path.file_name() {
                pb.set_message(format!("Converted: {}", file_name.to_string_lossy()));
            }
            pb.inc(1);

            match result {
                Ok(Ok(outcome)) => {
                    debug!(
                        "Converted {} -> {}",
                        data_path.display(),
                        outcome.output_path.display()
                    );
                    stats.files_converted += 1;
                    stats.rows_written += outcome.rows;
                    if outcome.row_count_mismatch {
                        stats.row_count_mismatches += 1;
                    }
                }
                Ok(Err(e)) => {
                    error!("Failed to convert {}: {}", data_path.display(), e);
                    stats.files_failed += 1;
                    stats.failures.push((data_path, e.to_string()));
                }
                Err(e) => {
                    error!("Conversion task for {} aborted: {}", data_path.display(), e);
                    stats.files_failed += 1;
                    stats.failures.push((data_path, e.to_string()));
                }
            }
        }

        pb.finish_with_message("Conversion complete");
        stats.processing_time_ms = start_time.elapsed().as_millis();

        if self.show_progress {
            self.print_summary(&stats);
        }
        Ok(stats)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
            )
            .map(|style| style.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb.set_message("Converting files");
        pb
    }

    fn print_summary(&self, stats: &ConversionStats) {
        println!("\n{}", "Conversion Summary".bright_green().bold());
        println!(
            "  {} {}ms",
            "Time elapsed:".bright_cyan(),
            stats.processing_time_ms.to_string().bright_white()
        );
        println!(
            "  {} {}",
            "Files converted:".bright_cyan(),
            stats.files_converted.to_string().bright_white()
        );
        println!(
            "  {} {}",
            "Rows written:".bright_cyan(),
            stats.rows_written.to_string().bright_white()
        );
        if stats.row_count_mismatches > 0 {
            println!(
                "  {} {}",
                "Header row-count mismatches:".bright_yellow(),
                stats.row_count_mismatches.to_string().bright_white()
            );
        }
        if stats.files_failed > 0 {
            println!(
                "  {} {}",
                "Files failed:".bright_red(),
                stats.files_failed.to_string().bright_white()
            );
            for (path, reason) in &stats.failures {
                println!("    {} {}", path.display(), reason.red());
            }
        }
    }
}
