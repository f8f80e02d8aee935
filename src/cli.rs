//! Command-line interface components.

use crate::config::{CompressionAlgorithm, ExternalToolConfig, HeaderSource, MagdaConfig};
use crate::data_file::DataFile;
use crate::models::HeaderMetadata;
use crate::processor::DatasetProcessor;
use crate::provider::provider_from_config;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "magda")]
#[command(about = "Read MAGDA flat files (.ffh/.ffd) and convert them to Parquet")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Archive root; file paths must then follow <root>/yNN/NNNNN/processed/
    /// (defaults to $CASDATA)
    #[arg(long, global = true, value_name = "DIR")]
    pub data_root: Option<PathBuf>,

    /// External header tool command line, run as `<CMD> <header-path>`
    /// (defaults to $MAGDA_HEADER_TOOL)
    #[arg(long, global = true, value_name = "CMD")]
    pub header_tool: Option<String>,

    /// Timeout for the external header tool in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub header_tool_timeout: Option<u64>,

    /// Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the normalized metadata of a header file
    Metadata {
        /// Header file (.ffh)
        header: PathBuf,
    },
    /// Decode a data file and summarize its contents
    Inspect {
        /// Data file (.ffd)
        data: PathBuf,

        /// Header file, when not the data file's .ffh sibling
        #[arg(long)]
        header: Option<PathBuf>,
    },
    /// Convert a data file, or every data file below a directory, to Parquet
    Convert {
        /// Data file or directory
        input: PathBuf,

        /// Output directory for Parquet files
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Parquet compression algorithm
        #[arg(long, value_enum, default_value_t = CompressionArg::Snappy)]
        compression: CompressionArg,

        /// Number of files converted concurrently
        #[arg(short, long)]
        workers: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CompressionArg {
    Snappy,
    Zstd,
    Lz4,
    None,
}

impl From<CompressionArg> for CompressionAlgorithm {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::Snappy => CompressionAlgorithm::Snappy,
            CompressionArg::Zstd => CompressionAlgorithm::Zstd,
            CompressionArg::Lz4 => CompressionAlgorithm::Lz4,
            CompressionArg::None => CompressionAlgorithm::Uncompressed,
        }
    }
}

impl Args {
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// Environment configuration overridden by the global flags
    pub fn config(&self) -> Result<MagdaConfig> {
        let mut config = MagdaConfig::from_env()?;
        if let Some(root) = &self.data_root {
            config = config.with_data_root(root);
        }
        if let Some(command) = self.header_tool.as_deref().filter(|c| !c.trim().is_empty()) {
            config = config.with_header_source(HeaderSource::External(
                ExternalToolConfig::from_command_line(command)?,
            ));
        }
        if let (Some(secs), HeaderSource::External(tool)) =
            (self.header_tool_timeout, &mut config.header_source)
        {
            tool.timeout_secs = secs;
        }
        Ok(config)
    }
}

/// Set up structured logging based on CLI arguments
pub fn setup_logging(args: &Args) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("magda_flatfile={log_level}")));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr),
        )
        .init();

    debug!("Logging initialized at level: {}", log_level);
}

/// Run the selected command
pub fn run(args: Args) -> Result<()> {
    let config = args.config()?;
    config.validate()?;

    match args.command {
        Commands::Metadata { header } => print_metadata(&header, &config),
        Commands::Inspect { data, header } => inspect(&data, header, &config),
        Commands::Convert {
            input,
            output,
            compression,
            workers,
        } => {
            let mut config = config.with_compression(compression.into());
            if let Some(workers) = workers {
                config = config.with_workers(workers);
            }
            convert(input, output, config)
        }
    }
}

fn print_metadata(header: &Path, config: &MagdaConfig) -> Result<()> {
    let provider = provider_from_config(config)?;
    let metadata = provider
        .header_metadata(header)
        .with_context(|| format!("Failed to read header {}", header.display()))?;

    println!("{}", "Header Metadata".bright_green().bold());
    print_metadata_fields(&metadata);
    println!("\n{}", "Columns".bright_green().bold());
    for column in &metadata.columns {
        println!(
            "  {:>3} {:<10} {:<8} {:<20} {}",
            column.index,
            column.name.bright_white(),
            column.units,
            column.source,
            column.type_code.letter()
        );
    }
    Ok(())
}

fn print_metadata_fields(metadata: &HeaderMetadata) {
    let optional = |t: Option<chrono::NaiveDateTime>| {
        t.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string())
    };

    println!("  {} {}", "Header:".bright_cyan(), metadata.header_path.display());
    println!("  {} {}", "Telemetry:".bright_cyan(), metadata.telemetry());
    println!("  {} {}", "Sensor:".bright_cyan(), metadata.sensor());
    println!("  {} {}", "Coordinate frame:".bright_cyan(), metadata.coordinate_frame());
    println!("  {} {}", "Resolution:".bright_cyan(), metadata.resolution());
    println!("  {} {}", "Declared rows:".bright_cyan(), metadata.row_count);
    println!("  {} {}", "Timebase:".bright_cyan(), metadata.timebase);
    println!("  {} {}", "First time:".bright_cyan(), optional(metadata.first_timestamp));
    println!("  {} {}", "Last time:".bright_cyan(), optional(metadata.last_timestamp));
    println!("  {} {}", "Last modified:".bright_cyan(), metadata.last_modified);
}

fn inspect(data: &Path, header: Option<PathBuf>, config: &MagdaConfig) -> Result<()> {
    let file = DataFile::open_with_config(data, header.as_deref(), config)
        .with_context(|| format!("Failed to open {}", data.display()))?;

    println!("{}", "Data File".bright_green().bold());
    println!("  {} {}", "Data:".bright_cyan(), file.data_path().display());
    print_metadata_fields(file.metadata());

    let rows = file.n_rows().to_string();
    if file.row_count_mismatch() {
        println!(
            "  {} {} (header declares {})",
            "Rows:".bright_cyan(),
            rows.bright_yellow(),
            file.declared_row_count()
        );
    } else {
        println!("  {} {}", "Rows:".bright_cyan(), rows.bright_white());
    }
    println!("  {} {}", "Columns:".bright_cyan(), file.n_cols());

    if let Some((first, last)) = file.time_bounds() {
        println!("  {} {} UTC", "Starts:".bright_cyan(), first.to_utc().naive_utc());
        println!("  {} {} UTC", "Ends:".bright_cyan(), last.to_utc().naive_utc());
    }

    println!("\n{}", "Columns".bright_green().bold());
    for column in file.columns() {
        println!(
            "  {:<10} {:<8} {}",
            column.name().bright_white(),
            column.definition.units,
            column.definition.type_code.letter()
        );
    }
    Ok(())
}

fn convert(input: PathBuf, output: Option<PathBuf>, config: MagdaConfig) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
    let processor = DatasetProcessor::new(input, output, config)?;
    let stats = runtime.block_on(processor.process())?;

    debug!("Conversion finished: {}", stats);
    if stats.files_failed > 0 {
        anyhow::bail!(
            "{} of {} files failed to convert",
            stats.files_failed,
            stats.files_failed + stats.files_converted
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_convert() {
        let args = Args::try_parse_from([
            "magda",
            "-vv",
            "convert",
            "/data",
            "--compression",
            "zstd",
            "--workers",
            "3",
        ])
        .unwrap();
        assert_eq!(args.log_level(), "debug");
        match args.command {
            Commands::Convert {
                input,
                compression,
                workers,
                output,
            } => {
                assert_eq!(input, PathBuf::from("/data"));
                assert_eq!(compression, CompressionArg::Zstd);
                assert_eq!(workers, Some(3));
                assert!(output.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_header_tool_flag() {
        let args = Args::try_parse_from([
            "magda",
            "--header-tool",
            "java -jar HeaderFileParser.jar",
            "--header-tool-timeout",
            "5",
            "metadata",
            "a.ffh",
        ])
        .unwrap();
        let config = args.config().unwrap();
        let HeaderSource::External(tool) = config.header_source else {
            panic!("expected an external header source");
        };
        assert_eq!(tool.program, "java");
        assert_eq!(tool.timeout_secs, 5);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Args::try_parse_from(["magda", "-q", "-v", "metadata", "a.ffh"]).is_err());
        let args = Args::try_parse_from(["magda", "-q", "metadata", "a.ffh"]).unwrap();
        assert_eq!(args.log_level(), "error");
    }
}
