//! Absolute time axis reconstruction.
//!
//! MAGDA data files store time as seconds elapsed on the TAI scale since an
//! epoch named in the header. Instants are kept as a TAI nanosecond count so
//! the 10-37 s TAI-UTC offset is never silently dropped; conversion to UTC
//! goes through the IERS leap-second table.

use crate::constants::{TIME_COLUMN_NAME, epoch_seconds};
use crate::error::{MagdaError, Result};
use crate::models::{Column, ColumnValues};
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use std::fmt;
use tracing::debug;

const NANOS_PER_SECOND: i64 = 1_000_000_000;
const SECONDS_PER_DAY: f64 = 86_400.0;
const UNIX_EPOCH_MJD: f64 = 40_587.0;

/// Time scale a count of seconds is measured on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeScale {
    Tai,
    Utc,
}

impl fmt::Display for TimeScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeScale::Tai => write!(f, "TAI"),
            TimeScale::Utc => write!(f, "UTC"),
        }
    }
}

/// TAI-UTC in whole seconds, effective from the given Unix (UTC) second
const LEAP_SECONDS: &[(i64, i64)] = &[
    (63_072_000, 10),    // 1972-01-01
    (78_796_800, 11),    // 1972-07-01
    (94_694_400, 12),    // 1973-01-01
    (126_230_400, 13),   // 1974-01-01
    (157_766_400, 14),   // 1975-01-01
    (189_302_400, 15),   // 1976-01-01
    (220_924_800, 16),   // 1977-01-01
    (252_460_800, 17),   // 1978-01-01
    (283_996_800, 18),   // 1979-01-01
    (315_532_800, 19),   // 1980-01-01
    (362_793_600, 20),   // 1981-07-01
    (394_329_600, 21),   // 1982-07-01
    (425_865_600, 22),   // 1983-07-01
    (489_024_000, 23),   // 1985-07-01
    (567_993_600, 24),   // 1988-01-01
    (631_152_000, 25),   // 1990-01-01
    (662_688_000, 26),   // 1991-01-01
    (709_948_800, 27),   // 1992-07-01
    (741_484_800, 28),   // 1993-07-01
    (773_020_800, 29),   // 1994-07-01
    (820_454_400, 30),   // 1996-01-01
    (867_715_200, 31),   // 1997-07-01
    (915_148_800, 32),   // 1999-01-01
    (1_136_073_600, 33), // 2006-01-01
    (1_230_768_000, 34), // 2009-01-01
    (1_341_100_800, 35), // 2012-07-01
    (1_435_708_800, 36), // 2015-07-01
    (1_483_228_800, 37), // 2017-01-01
];

/// Pre-1972 UTC drifted against TAI at a fixed rate per segment:
/// `TAI-UTC = base + (MJD - reference_mjd) * rate`
struct DriftSegment {
    start: i64,
    base: f64,
    reference_mjd: f64,
    rate: f64,
}

const DRIFT_SEGMENTS: &[DriftSegment] = &[
    DriftSegment { start: -315_619_200, base: 1.417_818_0, reference_mjd: 37_300.0, rate: 0.001_296_0 },
    DriftSegment { start: -283_996_800, base: 1.422_818_0, reference_mjd: 37_300.0, rate: 0.001_296_0 },
    DriftSegment { start: -265_680_000, base: 1.372_818_0, reference_mjd: 37_300.0, rate: 0.001_296_0 },
    DriftSegment { start: -252_460_800, base: 1.845_858_0, reference_mjd: 37_665.0, rate: 0.001_123_2 },
    DriftSegment { start: -194_659_200, base: 1.945_858_0, reference_mjd: 37_665.0, rate: 0.001_123_2 },
    DriftSegment { start: -189_388_800, base: 3.240_130_0, reference_mjd: 38_761.0, rate: 0.001_296_0 },
    DriftSegment { start: -181_526_400, base: 3.340_130_0, reference_mjd: 38_761.0, rate: 0.001_296_0 },
    DriftSegment { start: -168_307_200, base: 3.440_130_0, reference_mjd: 38_761.0, rate: 0.001_296_0 },
    DriftSegment { start: -157_766_400, base: 3.540_130_0, reference_mjd: 38_761.0, rate: 0.001_296_0 },
    DriftSegment { start: -152_668_800, base: 3.640_130_0, reference_mjd: 38_761.0, rate: 0.001_296_0 },
    DriftSegment { start: -142_128_000, base: 3.740_130_0, reference_mjd: 38_761.0, rate: 0.001_296_0 },
    DriftSegment { start: -136_771_200, base: 3.840_130_0, reference_mjd: 38_761.0, rate: 0.001_296_0 },
    DriftSegment { start: -126_230_400, base: 4.313_170_0, reference_mjd: 39_126.0, rate: 0.002_592_0 },
    DriftSegment { start: -60_480_000, base: 4.213_170_0, reference_mjd: 39_126.0, rate: 0.002_592_0 },
];

/// TAI-UTC in nanoseconds at a UTC instant given as Unix nanoseconds.
/// Zero before 1960, where UTC and TAI are taken to coincide.
pub fn tai_minus_utc_nanos(utc_nanos: i64) -> i64 {
    let seconds = utc_nanos.div_euclid(NANOS_PER_SECOND);

    if let Some((_, offset)) = LEAP_SECONDS.iter().rev().find(|(start, _)| *start <= seconds) {
        return offset * NANOS_PER_SECOND;
    }

    match DRIFT_SEGMENTS.iter().rev().find(|s| s.start <= seconds) {
        Some(segment) => {
            let mjd = utc_nanos as f64 / (NANOS_PER_SECOND as f64 * SECONDS_PER_DAY) + UNIX_EPOCH_MJD;
            let offset = segment.base + (mjd - segment.reference_mjd) * segment.rate;
            (offset * NANOS_PER_SECOND as f64).round() as i64
        }
        None => 0,
    }
}

/// Convert a count of seconds to a nanosecond-precision delta.
/// `None` for non-finite input or values outside the representable range.
pub fn seconds_to_delta(seconds: f64) -> Option<TimeDelta> {
    if !seconds.is_finite() {
        return None;
    }
    let nanos = (seconds * NANOS_PER_SECOND as f64).round();
    if nanos.abs() >= i64::MAX as f64 {
        return None;
    }
    Some(TimeDelta::nanoseconds(nanos as i64))
}

/// An absolute instant, stored as TAI nanoseconds since 1970-01-01T00:00:00 TAI
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AbsoluteTime {
    tai_nanos: i64,
}

impl AbsoluteTime {
    /// Instant whose TAI label is `tai_nanos` after 1970-01-01T00:00:00
    pub fn from_tai_nanos(tai_nanos: i64) -> Self {
        Self { tai_nanos }
    }

    /// Instant `offset` after 1970-01-01T00:00:00 read on `scale`
    pub fn from_unix(offset: TimeDelta, scale: TimeScale) -> Option<Self> {
        let nanos = offset.num_nanoseconds()?;
        let tai_nanos = match scale {
            TimeScale::Tai => nanos,
            TimeScale::Utc => nanos.checked_add(tai_minus_utc_nanos(nanos))?,
        };
        Some(Self { tai_nanos })
    }

    pub fn from_utc(datetime: DateTime<Utc>) -> Option<Self> {
        Self::from_unix(TimeDelta::nanoseconds(datetime.timestamp_nanos_opt()?), TimeScale::Utc)
    }

    pub fn tai_nanos(&self) -> i64 {
        self.tai_nanos
    }

    /// The instant `delta` later, counting elapsed SI seconds
    pub fn checked_add(&self, delta: TimeDelta) -> Option<Self> {
        let tai_nanos = self.tai_nanos.checked_add(delta.num_nanoseconds()?)?;
        Some(Self { tai_nanos })
    }

    pub fn checked_add_seconds(&self, seconds: f64) -> Option<Self> {
        self.checked_add(seconds_to_delta(seconds)?)
    }

    /// Elapsed time between two instants
    pub fn signed_duration_since(&self, earlier: AbsoluteTime) -> TimeDelta {
        TimeDelta::nanoseconds(self.tai_nanos - earlier.tai_nanos)
    }

    /// Calendar label on the TAI scale
    pub fn to_tai(&self) -> NaiveDateTime {
        DateTime::from_timestamp_nanos(self.tai_nanos).naive_utc()
    }

    /// Unix nanoseconds of this instant on the UTC scale
    pub fn utc_nanos(&self) -> i64 {
        let guess = self.tai_nanos - tai_minus_utc_nanos(self.tai_nanos);
        self.tai_nanos - tai_minus_utc_nanos(guess)
    }

    /// The same instant labelled on the UTC scale
    pub fn to_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.utc_nanos())
    }
}

impl fmt::Display for AbsoluteTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} TAI", self.to_tai().format("%Y-%m-%dT%H:%M:%S%.6f"))
    }
}

/// Reference instant that relative time columns are measured from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timebase {
    offset: TimeDelta,
    scale: TimeScale,
}

impl Timebase {
    /// `offset` after 1970-01-01T00:00:00 on `scale`
    pub fn new(offset: TimeDelta, scale: TimeScale) -> Self {
        Self { offset, scale }
    }

    /// Resolve a header EPOCH key through the fixed epoch table
    pub fn from_epoch_key(key: &str) -> Result<Self> {
        let seconds = epoch_seconds(key).ok_or_else(|| MagdaError::UnknownEpoch {
            key: key.to_string(),
        })?;
        Ok(Self::new(TimeDelta::seconds(seconds), TimeScale::Utc))
    }

    /// Integer milliseconds since the Unix epoch, as reported by header tools.
    /// `None` when the instant falls outside the nanosecond range.
    pub fn from_unix_millis(millis: i64, scale: TimeScale) -> Option<Self> {
        let timebase = Self::new(TimeDelta::try_milliseconds(millis)?, scale);
        timebase.instant().ok()?;
        Some(timebase)
    }

    pub fn offset(&self) -> TimeDelta {
        self.offset
    }

    pub fn scale(&self) -> TimeScale {
        self.scale
    }

    /// The absolute instant this timebase names
    pub fn instant(&self) -> Result<AbsoluteTime> {
        AbsoluteTime::from_unix(self.offset, self.scale)
            .ok_or_else(|| MagdaError::TimebaseOutOfRange {
                timebase: self.to_string(),
            })
    }

    /// Absolute instant `seconds` of elapsed time after the timebase
    pub fn at(&self, seconds: f64) -> Result<AbsoluteTime> {
        self.instant()?
            .checked_add_seconds(seconds)
            .ok_or(MagdaError::InvalidTimeValue {
                row: 0,
                value: seconds,
            })
    }
}

impl fmt::Display for Timebase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seconds = self.offset.num_milliseconds() as f64 / 1000.0;
        write!(f, "{seconds} s after 1970-01-01 ({})", self.scale)
    }
}

/// Replace the first column's relative seconds with absolute instants and
/// rename it to `TIME`. Columns that already hold absolute times are left
/// untouched, so applying this twice is harmless.
pub fn build_time_axis(columns: &mut [Column], timebase: &Timebase) -> Result<()> {
    let Some(time_column) = columns.first_mut() else {
        return Ok(());
    };

    let relative: Vec<f64> = match &time_column.values {
        ColumnValues::Time(values) => values.clone(),
        ColumnValues::Real(values) => values.iter().map(|v| f64::from(*v)).collect(),
        ColumnValues::Integer(values) => values.iter().map(|v| f64::from(*v)).collect(),
        ColumnValues::Absolute(_) => return Ok(()),
    };

    let base = timebase.instant()?;
    let absolute = relative
        .iter()
        .enumerate()
        .map(|(row, seconds)| {
            base.checked_add_seconds(*seconds)
                .ok_or(MagdaError::InvalidTimeValue {
                    row,
                    value: *seconds,
                })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(
        "Built time axis from column {} ({} rows, timebase {})",
        time_column.definition.name,
        absolute.len(),
        timebase
    );

    time_column.definition.name = TIME_COLUMN_NAME.to_string();
    time_column.values = ColumnValues::Absolute(absolute);
    Ok(())
}
