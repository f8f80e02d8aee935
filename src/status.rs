//! Sensor status word decoding.
//!
//! The top two bits of a magnetometer status word give the sensitivity
//! range the sensor was operating in.

use crate::constants::{
    SENSOR_STATUS_SUFFIX, STATUS_DECODED_FRAME, STATUS_RANGE_MASK, STATUS_RANGE_SHIFT,
};
use crate::error::{MagdaError, Result};
use crate::models::{Column, ColumnValues, FileAttributes};
use tracing::{debug, warn};

/// Sensitivity range code (0-3) of a raw status word.
/// Works on the two's-complement bit pattern, so negative words decode too.
pub fn decode_status(raw: i32) -> i32 {
    ((raw as u32 & STATUS_RANGE_MASK) >> STATUS_RANGE_SHIFT) as i32
}

pub fn decode_status_values(raw: &[i32]) -> Vec<i32> {
    raw.iter().copied().map(decode_status).collect()
}

/// Name of the raw status column for a sensor, e.g. `FGMStatus`
pub fn status_column_name(sensor: &str) -> String {
    format!("{sensor}{SENSOR_STATUS_SUFFIX}")
}

/// Decode the `<SENSOR>Status` column in place when the frame is `C`.
/// Returns whether a column was decoded; a `C`-frame table without the
/// status column is a lookup error.
pub fn apply_status_decoding(columns: &mut [Column], attributes: &FileAttributes) -> Result<bool> {
    if attributes.coordinate_frame != STATUS_DECODED_FRAME {
        return Ok(false);
    }

    let name = status_column_name(&attributes.sensor);
    let column = columns
        .iter_mut()
        .find(|c| c.name() == name)
        .ok_or_else(|| MagdaError::ColumnNotFound { name: name.clone() })?;

    match &mut column.values {
        ColumnValues::Integer(values) => {
            values.iter_mut().for_each(|v| *v = decode_status(*v));
            debug!("Decoded {} status words in {}", values.len(), name);
            Ok(true)
        }
        _ => {
            warn!("Status column {} is not an integer column; left raw", name);
            Ok(false)
        }
    }
}
