//! In-process header provider built on the header grammar.

use super::{HeaderMetadataProvider, last_modified};
use crate::attributes::NameAttributeExtractor;
use crate::constants::DATA_EXTENSION;
use crate::error::Result;
use crate::header::parse_header_file;
use crate::models::HeaderMetadata;
use std::path::Path;

/// Parses `.ffh` files directly and takes attributes from the header path
#[derive(Debug, Clone)]
pub struct LocalHeaderProvider {
    extractor: NameAttributeExtractor,
    data_extension: String,
}

impl LocalHeaderProvider {
    pub fn new(extractor: NameAttributeExtractor, data_extension: impl Into<String>) -> Self {
        Self {
            extractor,
            data_extension: data_extension.into(),
        }
    }
}

impl Default for LocalHeaderProvider {
    fn default() -> Self {
        Self::new(NameAttributeExtractor::unrooted(), DATA_EXTENSION)
    }
}

impl HeaderMetadataProvider for LocalHeaderProvider {
    fn header_metadata(&self, header_path: &Path) -> Result<HeaderMetadata> {
        let attributes = self.extractor.extract(header_path)?;
        let fields = parse_header_file(header_path)?;
        let last_modified = last_modified(header_path, &self.data_extension)?;

        Ok(HeaderMetadata {
            header_path: header_path.to_path_buf(),
            columns: fields.columns,
            row_count: fields.row_count,
            timebase: fields.timebase,
            attributes,
            first_timestamp: fields.first_timestamp,
            last_timestamp: fields.last_timestamp,
            last_modified,
        })
    }
}
