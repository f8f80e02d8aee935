//! MAGDA `.ffh` header parsing.
//!
//! A header file has no line breaks: its text is re-wrapped into fixed
//! 72-byte blocks, each block is classified on its own into a
//! [`HeaderRecord`], and the records are merged into a [`ParsedHeader`].
//! Blocks that match no rule are prose or comments and are skipped.

use crate::constants::{FFH_BLOCK_WIDTH, LEGACY_YEAR_PREFIX, MAGDA_TIME_FORMAT, keywords};
use crate::error::{MagdaError, Result};
use crate::models::{ColumnDefinition, HeaderMetadata, TypeCode};
use crate::time::Timebase;
use chrono::NaiveDateTime;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, trace, warn};

/// `001 TIME      SEC       SCLK                    T     0`
static COLUMN_DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?P<index>[0-9]{3})\s+(?P<name>[A-Za-z0-9_/()]{1,10})\s*(?P<units>[A-Za-z]+)\s+(?P<source>[A-Za-z_]+(?:\s[A-Za-z_]+)?)\s+(?P<type>[IRT])\s+(?P<loc>[0-9]+)",
    )
    .expect("column definition pattern is valid")
});

static KEYWORD_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<key>NCOLS|NROWS|EPOCH|FIRST TIME|LAST TIME)\s*=\s*(?P<value>.*)$")
        .expect("keyword pattern is valid")
});

/// One classified header block
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderRecord {
    Column(ColumnDefinition),
    ColumnCount(usize),
    RowCount(usize),
    Epoch(String),
    FirstTime(NaiveDateTime),
    LastTime(NaiveDateTime),
}

/// Re-wrap raw header bytes into 72-byte blocks, dropping the space and
/// NUL padding at the end of each block
pub fn split_blocks(bytes: &[u8]) -> Vec<String> {
    bytes
        .chunks(FFH_BLOCK_WIDTH)
        .map(|chunk| {
            String::from_utf8_lossy(chunk)
                .trim_end_matches([' ', '\0'])
                .to_string()
        })
        .collect()
}

/// Classify a single block. `Ok(None)` means the block is not part of the
/// grammar; an error means it claimed to be (keyword or column line) but
/// its value could not be parsed.
pub fn classify_line(line: &str) -> Result<Option<HeaderRecord>> {
    if let Some(caps) = KEYWORD_VALUE.captures(line) {
        let value = caps["value"].trim_matches([' ', '\0']);
        let record = match &caps["key"] {
            keywords::NCOLS => HeaderRecord::ColumnCount(parse_count(line, value)?),
            keywords::NROWS => HeaderRecord::RowCount(parse_count(line, value)?),
            keywords::EPOCH => HeaderRecord::Epoch(value.to_string()),
            keywords::FIRST_TIME => HeaderRecord::FirstTime(parse_header_time(value)?),
            keywords::LAST_TIME => HeaderRecord::LastTime(parse_header_time(value)?),
            _ => return Ok(None),
        };
        return Ok(Some(record));
    }

    if let Some(caps) = COLUMN_DEFINITION.captures(line) {
        return parse_column(line, &caps).map(|c| Some(HeaderRecord::Column(c)));
    }

    Ok(None)
}

fn parse_count(line: &str, value: &str) -> Result<usize> {
    value
        .split_whitespace()
        .next()
        .and_then(|token| token.parse::<usize>().ok())
        .ok_or_else(|| MagdaError::invalid_header_line(line, "expected a non-negative integer"))
}

fn parse_column(line: &str, caps: &regex::Captures<'_>) -> Result<ColumnDefinition> {
    let index = caps["index"]
        .parse::<usize>()
        .ok()
        .and_then(|one_based| one_based.checked_sub(1))
        .ok_or_else(|| MagdaError::invalid_column(line, "column indices start at 001"))?;

    let type_code = caps["type"]
        .chars()
        .next()
        .and_then(TypeCode::from_letter)
        .ok_or_else(|| MagdaError::invalid_column(line, "unknown type letter"))?;

    let byte_offset = caps["loc"]
        .parse::<usize>()
        .map_err(|_| MagdaError::invalid_column(line, "byte offset out of range"))?;

    Ok(ColumnDefinition::new(
        index,
        &caps["name"],
        &caps["units"],
        &caps["source"],
        type_code,
    )
    .with_byte_offset(byte_offset))
}

/// Parse a header timestamp such as `2017 051 Feb 20 00:00:30.000`.
/// Runs of whitespace are collapsed, and two-digit years (always 9x) are
/// widened to 19xx.
pub fn parse_header_time(value: &str) -> Result<NaiveDateTime> {
    let mut normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.starts_with('9') {
        normalized.insert_str(0, LEGACY_YEAR_PREFIX);
    }
    NaiveDateTime::parse_from_str(&normalized, MAGDA_TIME_FORMAT).map_err(|source| {
        MagdaError::DateTimeParsing {
            value: value.to_string(),
            source,
        }
    })
}

/// Header fields in the order the grammar found them, before validation
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParsedHeader {
    pub columns: Vec<ColumnDefinition>,
    pub declared_columns: Option<usize>,
    pub row_count: Option<usize>,
    pub epoch: Option<String>,
    pub first_timestamp: Option<NaiveDateTime>,
    pub last_timestamp: Option<NaiveDateTime>,
}

/// Validated header content, ready to be joined with file-name attributes
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderFields {
    pub columns: Vec<ColumnDefinition>,
    pub row_count: usize,
    pub timebase: Timebase,
    pub first_timestamp: Option<NaiveDateTime>,
    pub last_timestamp: Option<NaiveDateTime>,
}

impl ParsedHeader {
    /// Classify every block of a header text and merge the records
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut header = ParsedHeader::default();
        for line in split_blocks(bytes) {
            match classify_line(&line)? {
                Some(record) => header.apply(record),
                None => trace!("Skipping unclassified header block: {:?}", line),
            }
        }
        Ok(header)
    }

    /// Merge one record; later keyword records replace earlier ones
    pub fn apply(&mut self, record: HeaderRecord) {
        match record {
            HeaderRecord::Column(column) => self.columns.push(column),
            HeaderRecord::ColumnCount(n) => self.declared_columns = Some(n),
            HeaderRecord::RowCount(n) => self.row_count = Some(n),
            HeaderRecord::Epoch(key) => self.epoch = Some(key),
            HeaderRecord::FirstTime(t) => self.first_timestamp = Some(t),
            HeaderRecord::LastTime(t) => self.last_timestamp = Some(t),
        }
    }

    /// Bound the schema by NCOLS, check it, and resolve the epoch
    pub fn finish(self, path: &Path) -> Result<HeaderFields> {
        let mut columns = self.columns;

        if let Some(declared) = self.declared_columns {
            if columns.len() < declared {
                return Err(MagdaError::invalid_schema(
                    path,
                    format!(
                        "NCOLS declares {} columns but only {} are defined",
                        declared,
                        columns.len()
                    ),
                ));
            }
            if columns.len() > declared {
                debug!(
                    "Ignoring {} column-like lines past NCOLS={} in {}",
                    columns.len() - declared,
                    declared,
                    path.display()
                );
                columns.truncate(declared);
            }
        } else {
            warn!("Header {} has no NCOLS line", path.display());
        }

        columns.sort_by_key(|c| c.index);
        if let Some(reason) = HeaderMetadata::schema_violation(&columns) {
            return Err(MagdaError::invalid_schema(path, reason));
        }

        let row_count = self.row_count.ok_or_else(|| MagdaError::MissingHeaderField {
            path: path.to_path_buf(),
            field: keywords::NROWS,
        })?;

        let epoch = self.epoch.ok_or_else(|| MagdaError::MissingEpoch {
            path: path.to_path_buf(),
        })?;
        let timebase = Timebase::from_epoch_key(&epoch)?;

        Ok(HeaderFields {
            columns,
            row_count,
            timebase,
            first_timestamp: self.first_timestamp,
            last_timestamp: self.last_timestamp,
        })
    }
}

/// Read and parse a header file, closing it before parsing begins
pub fn parse_header_file(path: &Path) -> Result<HeaderFields> {
    let bytes = std::fs::read(path).map_err(|e| MagdaError::io(path, e))?;
    let fields = ParsedHeader::from_bytes(&bytes)?.finish(path)?;

    debug!(
        "Parsed header {}: {} columns, {} declared rows, epoch {}",
        path.display(),
        fields.columns.len(),
        fields.row_count,
        fields.timebase
    );

    Ok(fields)
}
