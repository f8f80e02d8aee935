//! File discovery module for MAGDA archives
//!
//! Finds data files below an input directory, or accepts a single data
//! file, and counts the distinct day directories they come from.

use crate::error::{MagdaError, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// File discovery component for MAGDA archives
#[derive(Debug)]
pub struct FileDiscovery {
    input_path: PathBuf,
    data_extension: String,
    directory_count: usize,
}

impl FileDiscovery {
    /// Create a new file discovery instance
    pub fn new(input_path: PathBuf, data_extension: impl Into<String>) -> Self {
        Self {
            input_path,
            data_extension: data_extension.into(),
            directory_count: 0,
        }
    }

    /// Number of distinct directories holding discovered files
    pub fn directory_count(&self) -> usize {
        self.directory_count
    }

    /// Discover every data file at or below the input path, sorted.
    ///
    /// An archive typically looks like:
    /// ```text
    /// root/
    ///   y17/
    ///     17051/
    ///       processed/
    ///         17051_mrdcd_sdfgmc_krtp_1m.ffh
    ///         17051_mrdcd_sdfgmc_krtp_1m.ffd
    /// ```
    /// but any nesting is accepted.
    pub async fn discover_data_files(&mut self) -> Result<Vec<PathBuf>> {
        let metadata = fs::metadata(&self.input_path)
            .await
            .map_err(|_| MagdaError::InputNotFound {
                path: self.input_path.clone(),
            })?;

        let files = if metadata.is_file() {
            vec![self.input_path.clone()]
        } else {
            self.glob_data_files()?
        };

        self.directory_count = files
            .iter()
            .filter_map(|f| f.parent())
            .collect::<HashSet<_>>()
            .len();

        debug!(
            "Found {} data files in {} directories below {}",
            files.len(),
            self.directory_count,
            self.input_path.display()
        );

        Ok(files)
    }

    fn glob_data_files(&self) -> Result<Vec<PathBuf>> {
        let root = glob::Pattern::escape(&self.input_path.to_string_lossy());
        let pattern = format!("{}/**/*.{}", root, self.data_extension);
        debug!("Searching for data files matching: {}", pattern);

        let entries = glob::glob(&pattern)
            .map_err(|e| MagdaError::configuration(format!("invalid search pattern: {e}")))?;

        let mut files = Vec::new();
        for entry in entries {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable path {}: {}", e.path().display(), e),
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Check if a path carries the data file extension
pub fn is_data_file(path: &Path, data_extension: &str) -> bool {
    path.extension().is_some_and(|ext| ext == data_extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// Helper to create a small archive layout
    fn create_test_archive(temp_dir: &TempDir) -> PathBuf {
        let root = temp_dir.path().join("archive");

        let day1 = root.join("y17").join("17051").join("processed");
        fs::create_dir_all(&day1).unwrap();
        fs::write(day1.join("17051_mrdcd_sdfgmc_krtp_1m.ffd"), "data").unwrap();
        fs::write(day1.join("17051_mrdcd_sdfgmc_krtp_1m.ffh"), "header").unwrap();
        fs::write(day1.join("17051_mrdcd_sdfgmc_ksm_1s.ffd"), "data").unwrap();

        let day2 = root.join("y17").join("17052").join("processed");
        fs::create_dir_all(&day2).unwrap();
        fs::write(day2.join("17052_mrdcd_sdfgmc_krtp_1m.ffd"), "data").unwrap();
        fs::write(day2.join("notes.txt"), "ignored").unwrap();

        root
    }

    #[tokio::test]
    async fn test_discover_data_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = create_test_archive(&temp_dir);

        let mut discovery = FileDiscovery::new(root, "ffd");
        let files = discovery.discover_data_files().await.unwrap();

        assert_eq!(files.len(), 3);
        assert_eq!(discovery.directory_count(), 2);
        assert!(files.iter().all(|f| is_data_file(f, "ffd")));

        // sorted, so day 1 comes first
        assert!(files[0].to_string_lossy().contains("17051"));
        assert!(files[2].to_string_lossy().contains("17052"));
    }

    #[tokio::test]
    async fn test_single_file_input() {
        let temp_dir = TempDir::new().unwrap();
        let root = create_test_archive(&temp_dir);
        let file = root
            .join("y17")
            .join("17052")
            .join("processed")
            .join("17052_mrdcd_sdfgmc_krtp_1m.ffd");

        let mut discovery = FileDiscovery::new(file.clone(), "ffd");
        let files = discovery.discover_data_files().await.unwrap();
        assert_eq!(files, vec![file]);
        assert_eq!(discovery.directory_count(), 1);
    }

    #[tokio::test]
    async fn test_discover_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let mut discovery = FileDiscovery::new(temp_dir.path().to_path_buf(), "ffd");
        let files = discovery.discover_data_files().await.unwrap();
        assert!(files.is_empty());
        assert_eq!(discovery.directory_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_input() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");

        let mut discovery = FileDiscovery::new(missing.clone(), "ffd");
        match discovery.discover_data_files().await.unwrap_err() {
            MagdaError::InputNotFound { path } => assert_eq!(path, missing),
            other => panic!("Expected InputNotFound error, got {other:?}"),
        }
    }

    #[test]
    fn test_is_data_file() {
        assert!(is_data_file(Path::new("a.ffd"), "ffd"));
        assert!(!is_data_file(Path::new("a.ffh"), "ffd"));
        assert!(!is_data_file(Path::new("a.FFD"), "ffd"));
        assert!(!is_data_file(Path::new("ffd"), "ffd"));
    }
}
