//! Core data structures for MAGDA flat files.
//!
//! Defines the column schema, the normalized header metadata shared by
//! both header providers, decoded column storage, and conversion statistics.

use crate::time::{AbsoluteTime, Timebase};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

/// Storage type of a column, as declared by its header type letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeCode {
    /// `T`: relative seconds, big-endian f64
    Time,
    /// `R`: measurement, big-endian f32
    Real,
    /// `I`: integer or packed status word, big-endian i32
    Integer,
}

impl TypeCode {
    /// Parse a header type letter
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'T' => Some(TypeCode::Time),
            'R' => Some(TypeCode::Real),
            'I' => Some(TypeCode::Integer),
            _ => None,
        }
    }

    pub fn letter(&self) -> char {
        match self {
            TypeCode::Time => 'T',
            TypeCode::Real => 'R',
            TypeCode::Integer => 'I',
        }
    }

    /// Bytes one value occupies in a data file row
    pub fn byte_width(&self) -> usize {
        match self {
            TypeCode::Time => 8,
            TypeCode::Real | TypeCode::Integer => 4,
        }
    }
}

/// One schema entry of a header file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    /// 0-based position within a row
    pub index: usize,
    pub name: String,
    pub units: String,
    pub source: String,
    pub type_code: TypeCode,
    /// Byte offset declared in the header, when the header carries one
    pub byte_offset: Option<usize>,
}

impl ColumnDefinition {
    pub fn new(
        index: usize,
        name: impl Into<String>,
        units: impl Into<String>,
        source: impl Into<String>,
        type_code: TypeCode,
    ) -> Self {
        Self {
            index,
            name: name.into(),
            units: units.into(),
            source: source.into(),
            type_code,
            byte_offset: None,
        }
    }

    pub fn with_byte_offset(mut self, offset: usize) -> Self {
        self.byte_offset = Some(offset);
        self
    }
}

/// Schema attributes encoded in a MAGDA file name
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileAttributes {
    /// `HK`, `SD` or `SH`
    pub telemetry: String,
    /// `FGM`, `VHM` or `SHM`
    pub sensor: String,
    /// Coordinate frame code, e.g. `KSM`
    pub coordinate_frame: String,
    /// `ssd`, `1m`, `60m`, ...; empty when the name carries none
    pub resolution: String,
}

/// Normalized header metadata, identical whichever provider produced it
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderMetadata {
    /// Header file this metadata describes
    pub header_path: PathBuf,
    /// Schema in on-disk column order
    pub columns: Vec<ColumnDefinition>,
    /// Row count the header claims; advisory only
    pub row_count: usize,
    pub timebase: Timebase,
    pub attributes: FileAttributes,
    pub first_timestamp: Option<NaiveDateTime>,
    pub last_timestamp: Option<NaiveDateTime>,
    /// Newer of the header and data file modification times
    pub last_modified: DateTime<Utc>,
}

impl HeaderMetadata {
    pub fn telemetry(&self) -> &str {
        &self.attributes.telemetry
    }

    pub fn sensor(&self) -> &str {
        &self.attributes.sensor
    }

    pub fn coordinate_frame(&self) -> &str {
        &self.attributes.coordinate_frame
    }

    pub fn resolution(&self) -> &str {
        &self.attributes.resolution
    }

    /// Byte width of one data file row
    pub fn row_width(&self) -> usize {
        self.columns.iter().map(|c| c.type_code.byte_width()).sum()
    }

    /// Check that indices are exactly `0..n` in order and names are unique.
    /// Returns a description of the first violation.
    pub fn schema_violation(columns: &[ColumnDefinition]) -> Option<String> {
        let mut names = HashSet::new();
        for (position, column) in columns.iter().enumerate() {
            if column.index != position {
                return Some(format!(
                    "column {} has index {} but appears at position {}",
                    column.name, column.index, position
                ));
            }
            if !names.insert(column.name.as_str()) {
                return Some(format!("duplicate column name {}", column.name));
            }
        }
        None
    }
}

/// Materialized values of one column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    /// Relative seconds, before the time axis is built
    Time(Vec<f64>),
    Real(Vec<f32>),
    Integer(Vec<i32>),
    /// Absolute instants, after the time axis is built
    Absolute(Vec<AbsoluteTime>),
}

impl ColumnValues {
    /// Empty storage matching a type code
    pub fn with_capacity(type_code: TypeCode, capacity: usize) -> Self {
        match type_code {
            TypeCode::Time => ColumnValues::Time(Vec::with_capacity(capacity)),
            TypeCode::Real => ColumnValues::Real(Vec::with_capacity(capacity)),
            TypeCode::Integer => ColumnValues::Integer(Vec::with_capacity(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Time(v) => v.len(),
            ColumnValues::Real(v) => v.len(),
            ColumnValues::Integer(v) => v.len(),
            ColumnValues::Absolute(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_f64(&self) -> Option<&[f64]> {
        match self {
            ColumnValues::Time(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            ColumnValues::Real(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<&[i32]> {
        match self {
            ColumnValues::Integer(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_absolute(&self) -> Option<&[AbsoluteTime]> {
        match self {
            ColumnValues::Absolute(v) => Some(v),
            _ => None,
        }
    }
}

/// A decoded column: its schema entry plus its values
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub definition: ColumnDefinition,
    pub values: ColumnValues,
}

impl Column {
    pub fn new(definition: ColumnDefinition, values: ColumnValues) -> Self {
        Self { definition, values }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Batch conversion statistics
#[derive(Debug, Default)]
pub struct ConversionStats {
    pub files_converted: usize,
    pub files_failed: usize,
    pub rows_written: usize,
    /// Files whose data length disagreed with the header's NROWS
    pub row_count_mismatches: usize,
    /// Data files that could not be converted, with the reason
    pub failures: Vec<(PathBuf, String)>,
    pub output_path: PathBuf,
    pub processing_time_ms: u128,
}

impl fmt::Display for ConversionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} converted, {} failed, {} rows, {} row-count mismatches in {}ms",
            self.files_converted,
            self.files_failed,
            self.rows_written,
            self.row_count_mismatches,
            self.processing_time_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_code_letters() {
        assert_eq!(TypeCode::from_letter('T'), Some(TypeCode::Time));
        assert_eq!(TypeCode::from_letter('R'), Some(TypeCode::Real));
        assert_eq!(TypeCode::from_letter('I'), Some(TypeCode::Integer));
        assert_eq!(TypeCode::from_letter('X'), None);
        assert_eq!(TypeCode::Integer.letter(), 'I');
    }

    #[test]
    fn test_byte_widths() {
        assert_eq!(TypeCode::Time.byte_width(), 8);
        assert_eq!(TypeCode::Real.byte_width(), 4);
        assert_eq!(TypeCode::Integer.byte_width(), 4);
    }

    #[test]
    fn test_schema_violation() {
        let good = vec![
            ColumnDefinition::new(0, "TIME", "SEC", "SCLK", TypeCode::Time),
            ColumnDefinition::new(1, "BX", "nT", "MAG", TypeCode::Real),
        ];
        assert_eq!(HeaderMetadata::schema_violation(&good), None);

        let gap = vec![
            ColumnDefinition::new(0, "TIME", "SEC", "SCLK", TypeCode::Time),
            ColumnDefinition::new(2, "BX", "nT", "MAG", TypeCode::Real),
        ];
        assert!(HeaderMetadata::schema_violation(&gap).is_some());

        let duplicate = vec![
            ColumnDefinition::new(0, "BX", "nT", "MAG", TypeCode::Real),
            ColumnDefinition::new(1, "BX", "nT", "MAG", TypeCode::Real),
        ];
        let violation = HeaderMetadata::schema_violation(&duplicate).unwrap();
        assert!(violation.contains("duplicate"));
    }

    #[test]
    fn test_column_values_accessors() {
        let values = ColumnValues::with_capacity(TypeCode::Integer, 4);
        assert!(values.is_empty());
        assert!(values.as_i32().is_some());
        assert!(values.as_f32().is_none());
    }
}
