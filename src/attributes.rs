//! Schema attributes derived from MAGDA file names.
//!
//! The telemetry kind, sensor, coordinate frame and resolution of a dataset
//! are encoded in its file name and never repeated in the header.

use crate::error::{MagdaError, Result};
use crate::models::FileAttributes;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

const NAME_PATTERN: &str = r"mrdcd_(?P<telem>hk|sd|sh)(?P<sensor>fgm|vhm|shm)(?:n|c)?_(?P<coord>c|krtp|kso|ksm|kg|tiis|enis|iais|j3|jmxyz|gse|gsm|rtn|sc)(?:_(?P<res>ssd|\d{1,2}[ms]))?";

static NAME_ATTRIBUTES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(NAME_PATTERN).expect("file name pattern is valid"));

/// Extracts [`FileAttributes`] from file paths.
///
/// Without a data root the pattern is searched for anywhere in the path.
/// With one, the whole path must sit in the archive layout
/// `<root>/yNN/NNNNN/processed/NNNNN_mrdcd_....<extension>`.
#[derive(Debug, Clone)]
pub struct NameAttributeExtractor {
    rooted: Option<Regex>,
}

impl NameAttributeExtractor {
    /// `extension` is the one header paths carry; rooted matching rejects others
    pub fn new(data_root: Option<&Path>, extension: &str) -> Result<Self> {
        let rooted = match data_root {
            Some(root) => {
                let root = root.to_string_lossy();
                let root = regex::escape(root.trim_end_matches('/'));
                let extension = regex::escape(extension.trim_start_matches('.'));
                let pattern = format!(
                    r"^{root}/y\d{{2}}/\d{{5}}/processed/\d{{5}}_{NAME_PATTERN}[.]{extension}$"
                );
                let regex = Regex::new(&pattern).map_err(|e| {
                    MagdaError::configuration(format!("invalid data root pattern: {e}"))
                })?;
                Some(regex)
            }
            None => None,
        };
        Ok(Self { rooted })
    }

    /// Extractor that only looks at file names
    pub fn unrooted() -> Self {
        Self { rooted: None }
    }

    /// Derive attributes from a header or data file path
    pub fn extract(&self, path: &Path) -> Result<FileAttributes> {
        let text = path.to_string_lossy();
        let caps = match &self.rooted {
            Some(rooted) => rooted.captures(&text),
            None => NAME_ATTRIBUTES.captures(&text),
        };
        let caps = caps.ok_or_else(|| MagdaError::InvalidFileName {
            path: path.to_path_buf(),
        })?;

        let attributes = attributes_from_captures(&caps);
        debug!(
            "Attributes of {}: {}/{}/{} resolution '{}'",
            path.display(),
            attributes.telemetry,
            attributes.sensor,
            attributes.coordinate_frame,
            attributes.resolution
        );
        Ok(attributes)
    }

    /// Derive attributes from a bare file name, ignoring any data root
    pub fn extract_from_name(&self, name: &str) -> Result<FileAttributes> {
        NAME_ATTRIBUTES
            .captures(name)
            .map(|caps| attributes_from_captures(&caps))
            .ok_or_else(|| MagdaError::InvalidFileName {
                path: PathBuf::from(name),
            })
    }
}

impl Default for NameAttributeExtractor {
    fn default() -> Self {
        Self::unrooted()
    }
}

fn attributes_from_captures(caps: &regex::Captures<'_>) -> FileAttributes {
    FileAttributes {
        telemetry: caps["telem"].to_uppercase(),
        sensor: caps["sensor"].to_uppercase(),
        coordinate_frame: caps["coord"].to_uppercase(),
        resolution: caps
            .name("res")
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_name() {
        let extractor = NameAttributeExtractor::unrooted();
        let attrs = extractor
            .extract(Path::new("17051_mrdcd_sdfgmc_ksm_1m.ffd"))
            .unwrap();
        assert_eq!(attrs.telemetry, "SD");
        assert_eq!(attrs.sensor, "FGM");
        assert_eq!(attrs.coordinate_frame, "KSM");
        assert_eq!(attrs.resolution, "1m");
    }

    #[test]
    fn test_optional_resolution() {
        let extractor = NameAttributeExtractor::unrooted();
        let attrs = extractor
            .extract(Path::new("/data/04001_mrdcd_hkvhmn_c.ffh"))
            .unwrap();
        assert_eq!(attrs.telemetry, "HK");
        assert_eq!(attrs.sensor, "VHM");
        assert_eq!(attrs.coordinate_frame, "C");
        assert_eq!(attrs.resolution, "");

        let attrs = extractor
            .extract_from_name("99365_mrdcd_shshm_rtn_ssd")
            .unwrap();
        assert_eq!(attrs.resolution, "ssd");
    }

    #[test]
    fn test_unmatched_name() {
        let extractor = NameAttributeExtractor::unrooted();
        let err = extractor.extract(Path::new("notes.ffh")).unwrap_err();
        assert!(matches!(err, MagdaError::InvalidFileName { .. }));

        // unknown coordinate frame
        assert!(extractor.extract_from_name("17051_mrdcd_sdfgm_xyz").is_err());
    }

    #[test]
    fn test_rooted_layout() {
        let extractor =
            NameAttributeExtractor::new(Some(Path::new("/cassini/data/")), "ffh").unwrap();

        let ok = Path::new("/cassini/data/y17/17051/processed/17051_mrdcd_sdfgmc_krtp_1s.ffh");
        let attrs = extractor.extract(ok).unwrap();
        assert_eq!(attrs.coordinate_frame, "KRTP");
        assert_eq!(attrs.resolution, "1s");

        // right place, data extension instead of the header one
        let data = Path::new("/cassini/data/y17/17051/processed/17051_mrdcd_sdfgmc_krtp_1s.ffd");
        assert!(matches!(
            extractor.extract(data),
            Err(MagdaError::InvalidFileName { .. })
        ));

        // right name, wrong place
        let misplaced = Path::new("/tmp/17051_mrdcd_sdfgmc_krtp_1s.ffh");
        assert!(extractor.extract(misplaced).is_err());

        // bare names bypass the layout check
        assert!(extractor.extract_from_name("17051_mrdcd_sdfgmc_krtp_1s").is_ok());
    }
}
