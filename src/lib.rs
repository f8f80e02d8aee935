//! MAGDA flat-file reader
//!
//! Reads paired MAGDA flat files: a fixed-width `.ffh` header describing a
//! column schema and epoch, and a big-endian `.ffd` data file holding the
//! rows. The crate provides:
//! - A block-wise header grammar and file-name attribute extraction
//! - Local and external-process header metadata providers
//! - Binary table decoding with header row-count reconciliation
//! - Absolute time axes with explicit TAI/UTC handling
//! - Sensor status word decoding
//! - DataFrame export and batch conversion to Parquet

pub mod attributes;
pub mod cli;
pub mod config;
pub mod constants;
pub mod data_file;
pub mod decoder;
pub mod error;
pub mod header;
pub mod models;
pub mod processor;
pub mod provider;
pub mod status;
pub mod time;

pub use attributes::NameAttributeExtractor;
pub use config::{HeaderSource, MagdaConfig};
pub use data_file::DataFile;
pub use error::{ErrorCategory, MagdaError, Result};
pub use models::{Column, ColumnDefinition, ColumnValues, HeaderMetadata, TypeCode};
pub use provider::{
    ExternalHeaderProvider, HeaderMetadataProvider, LocalHeaderProvider, provider_from_config,
};
pub use status::decode_status;
pub use time::{AbsoluteTime, TimeScale, Timebase};
