//! Big-endian binary table decoding.
//!
//! A data file is a row-major sequence of fixed-width big-endian fields laid
//! out contiguously in schema order. The row count is whatever the byte
//! length implies; the header's NROWS is only checked against it.

use crate::error::{MagdaError, Result};
use crate::models::{Column, ColumnDefinition, ColumnValues, HeaderMetadata};
use std::path::Path;
use tracing::{debug, warn};

/// Columns decoded from one data file
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTable {
    pub columns: Vec<Column>,
    /// Rows actually present in the data
    pub n_rows: usize,
    /// Rows the header claimed
    pub declared_rows: usize,
}

impl DecodedTable {
    pub fn row_count_mismatch(&self) -> bool {
        self.n_rows != self.declared_rows
    }
}

/// Byte offset of each column within a row, from type widths alone
pub fn column_offsets(columns: &[ColumnDefinition]) -> Vec<usize> {
    columns
        .iter()
        .scan(0, |offset, column| {
            let start = *offset;
            *offset += column.type_code.byte_width();
            Some(start)
        })
        .collect()
}

/// Decode a whole data file against its header metadata
pub fn decode_table(bytes: &[u8], metadata: &HeaderMetadata, path: &Path) -> Result<DecodedTable> {
    let definitions = &metadata.columns;
    let row_width = metadata.row_width();

    if row_width == 0 {
        if !bytes.is_empty() {
            return Err(MagdaError::MisalignedData {
                path: path.to_path_buf(),
                byte_len: bytes.len(),
                row_width,
            });
        }
    } else if bytes.len() % row_width != 0 {
        return Err(MagdaError::MisalignedData {
            path: path.to_path_buf(),
            byte_len: bytes.len(),
            row_width,
        });
    }

    let n_rows = bytes.len().checked_div(row_width).unwrap_or(0);
    if n_rows != metadata.row_count {
        warn!(
            "Datafile {} contains {} rows but its header declares {}; using {}",
            path.display(),
            n_rows,
            metadata.row_count,
            n_rows
        );
    }

    let offsets = column_offsets(definitions);
    for (definition, computed) in definitions.iter().zip(&offsets) {
        if let Some(declared) = definition.byte_offset {
            if declared != *computed {
                debug!(
                    "Column {} declares offset {} but is decoded at {}",
                    definition.name, declared, computed
                );
            }
        }
    }

    let mut values: Vec<ColumnValues> = definitions
        .iter()
        .map(|d| ColumnValues::with_capacity(d.type_code, n_rows))
        .collect();

    if row_width > 0 {
        for row in bytes.chunks_exact(row_width) {
            for (column, offset) in values.iter_mut().zip(&offsets) {
                push_field(column, row, *offset);
            }
        }
    }

    debug!(
        "Decoded {}: {} rows x {} columns ({} bytes per row)",
        path.display(),
        n_rows,
        definitions.len(),
        row_width
    );

    let columns = definitions
        .iter()
        .cloned()
        .zip(values)
        .map(|(definition, values)| Column::new(definition, values))
        .collect();

    Ok(DecodedTable {
        columns,
        n_rows,
        declared_rows: metadata.row_count,
    })
}

fn push_field(column: &mut ColumnValues, row: &[u8], offset: usize) {
    match column {
        ColumnValues::Time(values) => values.push(f64::from_be_bytes(field(row, offset))),
        ColumnValues::Real(values) => values.push(f32::from_be_bytes(field(row, offset))),
        ColumnValues::Integer(values) => values.push(i32::from_be_bytes(field(row, offset))),
        // never produced by with_capacity
        ColumnValues::Absolute(_) => {}
    }
}

fn field<const N: usize>(row: &[u8], offset: usize) -> [u8; N] {
    let mut buf = [0u8; N];
    buf.copy_from_slice(&row[offset..offset + N]);
    buf
}
