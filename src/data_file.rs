//! The parsed MAGDA table.
//!
//! [`DataFile`] ties the pipeline together: header metadata from a
//! provider, binary decoding, time axis reconstruction and status decoding,
//! all performed eagerly at construction. The result is read-only.

use crate::config::MagdaConfig;
use crate::constants::HEADER_EXTENSION;
use crate::decoder::decode_table;
use crate::error::{MagdaError, Result};
use crate::models::{Column, ColumnValues, FileAttributes, HeaderMetadata};
use crate::provider::{HeaderMetadataProvider, LocalHeaderProvider, provider_from_config};
use crate::status::apply_status_decoding;
use crate::time::{AbsoluteTime, Timebase, build_time_axis};
use chrono::{DateTime, NaiveDateTime, Utc};
use polars::prelude::{DataFrame, DataType, IntoColumn, NamedFrom, Series, TimeUnit};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Header path for a data file: same base path, header extension
pub fn header_path_for(data_path: &Path, header_extension: &str) -> PathBuf {
    data_path.with_extension(header_extension)
}

/// A fully decoded header/data pair
#[derive(Debug, Clone)]
pub struct DataFile {
    data_path: PathBuf,
    metadata: HeaderMetadata,
    columns: Vec<Column>,
    n_rows: usize,
}

impl DataFile {
    /// Open a data file with its sibling `.ffh`, parsed locally.
    ///
    /// The table is decoded eagerly. A NaN or infinite value in the time
    /// column fails the whole open with [`MagdaError::InvalidTimeValue`]
    /// naming the row, rather than yielding a table with an unusable time.
    pub fn open(data_path: impl AsRef<Path>) -> Result<Self> {
        let data_path = data_path.as_ref();
        let header_path = header_path_for(data_path, HEADER_EXTENSION);
        Self::from_provider(data_path, &header_path, &LocalHeaderProvider::default())
    }

    /// Open a data file using the provider and extensions in `config`.
    /// Without `header_path` the header is the data path with the header
    /// extension.
    pub fn open_with_config(
        data_path: impl AsRef<Path>,
        header_path: Option<&Path>,
        config: &MagdaConfig,
    ) -> Result<Self> {
        config.validate()?;
        let data_path = data_path.as_ref();
        let header_path = header_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| header_path_for(data_path, &config.header_extension));
        let provider = provider_from_config(config)?;
        Self::from_provider(data_path, &header_path, provider.as_ref())
    }

    /// Build a table from an explicit header path and provider
    pub fn from_provider(
        data_path: &Path,
        header_path: &Path,
        provider: &dyn HeaderMetadataProvider,
    ) -> Result<Self> {
        let metadata = provider.header_metadata(header_path)?;

        let bytes = std::fs::read(data_path).map_err(|e| MagdaError::io(data_path, e))?;
        let table = decode_table(&bytes, &metadata, data_path)?;
        drop(bytes);

        let mut columns = table.columns;
        build_time_axis(&mut columns, &metadata.timebase)?;
        apply_status_decoding(&mut columns, &metadata.attributes)?;

        debug!(
            "Opened {}: {} rows, {} columns",
            data_path.display(),
            table.n_rows,
            columns.len()
        );

        Ok(Self {
            data_path: data_path.to_path_buf(),
            metadata,
            columns,
            n_rows: table.n_rows,
        })
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn header_path(&self) -> &Path {
        &self.metadata.header_path
    }

    pub fn metadata(&self) -> &HeaderMetadata {
        &self.metadata
    }

    /// Columns in on-disk order; the first holds absolute times named `TIME`
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Rows actually decoded from the data file
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Look up a column by name
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name() == name)
            .ok_or_else(|| MagdaError::ColumnNotFound {
                name: name.to_string(),
            })
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(Column::name)
    }

    /// Absolute times of every row
    pub fn time(&self) -> Option<&[AbsoluteTime]> {
        self.columns.first().and_then(|c| c.values.as_absolute())
    }

    /// First and last decoded instants
    pub fn time_bounds(&self) -> Option<(AbsoluteTime, AbsoluteTime)> {
        let times = self.time()?;
        Some((*times.first()?, *times.last()?))
    }

    pub fn attributes(&self) -> &FileAttributes {
        &self.metadata.attributes
    }

    pub fn telemetry(&self) -> &str {
        self.metadata.telemetry()
    }

    pub fn sensor(&self) -> &str {
        self.metadata.sensor()
    }

    pub fn coordinate_frame(&self) -> &str {
        self.metadata.coordinate_frame()
    }

    pub fn resolution(&self) -> &str {
        self.metadata.resolution()
    }

    pub fn timebase(&self) -> &Timebase {
        &self.metadata.timebase
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.metadata.first_timestamp
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.metadata.last_timestamp
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.metadata.last_modified
    }

    /// Row count the header claimed
    pub fn declared_row_count(&self) -> usize {
        self.metadata.row_count
    }

    pub fn row_count_mismatch(&self) -> bool {
        self.n_rows != self.metadata.row_count
    }

    /// Export to a polars DataFrame. The time column becomes a
    /// nanosecond datetime holding UTC instants.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let columns = self
            .columns
            .iter()
            .map(to_polars_column)
            .collect::<Result<Vec<_>>>()?;
        Ok(DataFrame::new(columns)?)
    }
}

fn to_polars_column(column: &Column) -> Result<polars::prelude::Column> {
    let name = column.name().into();
    let series = match &column.values {
        ColumnValues::Time(values) => Series::new(name, values.as_slice()),
        ColumnValues::Real(values) => Series::new(name, values.as_slice()),
        ColumnValues::Integer(values) => Series::new(name, values.as_slice()),
        ColumnValues::Absolute(values) => {
            let nanos: Vec<i64> = values.iter().map(AbsoluteTime::utc_nanos).collect();
            Series::new(name, nanos).cast(&DataType::Datetime(TimeUnit::Nanoseconds, None))?
        }
    };
    Ok(series.into_column())
}
