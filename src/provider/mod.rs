//! Header metadata providers.
//!
//! A provider turns a header file path into normalized [`HeaderMetadata`].
//! Two interchangeable variants exist: [`LocalHeaderProvider`] parses the
//! header in-process and [`ExternalHeaderProvider`] asks an out-of-process
//! tool. The variant is chosen once from configuration.

pub mod external;
pub mod local;

pub use external::ExternalHeaderProvider;
pub use local::LocalHeaderProvider;

use crate::attributes::NameAttributeExtractor;
use crate::config::{HeaderSource, MagdaConfig};
use crate::error::{MagdaError, Result};
use crate::models::HeaderMetadata;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// Source of normalized header metadata
pub trait HeaderMetadataProvider: Send + Sync + std::fmt::Debug {
    fn header_metadata(&self, header_path: &Path) -> Result<HeaderMetadata>;
}

/// Build the provider selected by `config.header_source`
pub fn provider_from_config(config: &MagdaConfig) -> Result<Arc<dyn HeaderMetadataProvider>> {
    let extractor = NameAttributeExtractor::new(
        config.data_root.as_deref(),
        &config.header_extension,
    )?;

    let provider: Arc<dyn HeaderMetadataProvider> = match &config.header_source {
        HeaderSource::Local => {
            debug!("Using local header provider");
            Arc::new(LocalHeaderProvider::new(extractor, &config.data_extension))
        }
        HeaderSource::External(tool) => {
            debug!("Using external header provider: {}", tool.program);
            Arc::new(ExternalHeaderProvider::from_config(tool, &config.data_extension))
        }
    };
    Ok(provider)
}

/// Newer of the header's and its sibling data file's modification times.
/// Falls back to the header alone when the data file is missing.
pub(crate) fn last_modified(header_path: &Path, data_extension: &str) -> Result<DateTime<Utc>> {
    let header_mtime = modified(header_path).map_err(|e| MagdaError::io(header_path, e))?;

    let data_path = header_path.with_extension(data_extension);
    let newest = match modified(&data_path) {
        Ok(data_mtime) => header_mtime.max(data_mtime),
        Err(e) => {
            debug!(
                "No modification time for {} ({}), using header only",
                data_path.display(),
                e
            );
            header_mtime
        }
    };

    Ok(DateTime::<Utc>::from(newest))
}

fn modified(path: &Path) -> std::io::Result<SystemTime> {
    std::fs::metadata(path)?.modified()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_last_modified_uses_newest_file() {
        let dir = TempDir::new().unwrap();
        let header = dir.path().join("17051_mrdcd_sdfgmc_krtp_1m.ffh");
        let data = dir.path().join("17051_mrdcd_sdfgmc_krtp_1m.ffd");
        std::fs::write(&header, b"").unwrap();
        std::fs::write(&data, b"").unwrap();

        let header_mtime = DateTime::<Utc>::from(modified(&header).unwrap());
        let data_mtime = DateTime::<Utc>::from(modified(&data).unwrap());

        let newest = last_modified(&header, "ffd").unwrap();
        assert_eq!(newest, header_mtime.max(data_mtime));
    }

    #[test]
    fn test_last_modified_without_data_file() {
        let dir = TempDir::new().unwrap();
        let header = dir.path().join("17051_mrdcd_sdfgmc_krtp_1m.ffh");
        std::fs::write(&header, b"").unwrap();

        let header_mtime = DateTime::<Utc>::from(modified(&header).unwrap());
        assert_eq!(last_modified(&header, "ffd").unwrap(), header_mtime);
    }

    #[test]
    fn test_last_modified_missing_header() {
        let dir = TempDir::new().unwrap();
        let err = last_modified(&dir.path().join("absent.ffh"), "ffd").unwrap_err();
        assert!(matches!(err, MagdaError::Io { .. }));
    }

    #[test]
    fn test_provider_selection() {
        let provider = provider_from_config(&MagdaConfig::default()).unwrap();
        assert!(format!("{provider:?}").starts_with("LocalHeaderProvider"));

        let tool = crate::config::ExternalToolConfig::new("header-tool");
        let config = MagdaConfig::default().with_header_source(HeaderSource::External(tool));
        let provider = provider_from_config(&config).unwrap();
        assert!(format!("{provider:?}").starts_with("ExternalHeaderProvider"));
    }
}
