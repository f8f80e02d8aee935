//! Format constants for MAGDA flat files
//!
//! Fixed widths, epoch table, file-name vocabulary and timestamp formats
//! shared by the header grammar, decoders and CLI.

// =============================================================================
// File Layout
// =============================================================================

/// Header files carry no line breaks; their text is a sequence of fixed blocks
pub const FFH_BLOCK_WIDTH: usize = 72;

/// Header file extension
pub const HEADER_EXTENSION: &str = "ffh";

/// Binary data file extension
pub const DATA_EXTENSION: &str = "ffd";

/// Canonical name given to the first column once it holds absolute times
pub const TIME_COLUMN_NAME: &str = "TIME";

/// Suffix appended to the sensor code to name its raw status-word column
pub const SENSOR_STATUS_SUFFIX: &str = "Status";

/// Coordinate frame whose sensor status column is decoded on load
pub const STATUS_DECODED_FRAME: &str = "C";

/// Coordinate frame for which the external header tool appends an extra column
pub const EXTRA_TOOL_COLUMN_FRAME: &str = "C";

// =============================================================================
// Header Keywords
// =============================================================================

pub mod keywords {
    pub const NCOLS: &str = "NCOLS";
    pub const NROWS: &str = "NROWS";
    pub const EPOCH: &str = "EPOCH";
    pub const FIRST_TIME: &str = "FIRST TIME";
    pub const LAST_TIME: &str = "LAST TIME";
}

/// Symbolic epochs and their instants in Unix seconds on the UTC scale
pub const EPOCHS: &[(&str, i64)] = &[
    ("J2000", 946_727_968),
    ("Y1958", -378_691_200),
    ("Y1966", -126_230_400),
];

/// Resolve a symbolic epoch key
pub fn epoch_seconds(key: &str) -> Option<i64> {
    EPOCHS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, seconds)| *seconds)
}

// =============================================================================
// File Name Vocabulary
// =============================================================================

/// Telemetry kinds: housekeeping, science data, science housekeeping
pub const TELEMETRY_CODES: &[&str] = &["hk", "sd", "sh"];

/// Magnetometer sensors: flux-gate, vector helium, scalar helium
pub const SENSOR_CODES: &[&str] = &["fgm", "vhm", "shm"];

/// Closed vocabulary of coordinate frames
pub const COORDINATE_FRAMES: &[&str] = &[
    "c", "krtp", "kso", "ksm", "kg", "tiis", "enis", "iais", "j3", "jmxyz", "gse", "gsm", "rtn",
    "sc",
];

// =============================================================================
// Timestamps
// =============================================================================

/// Header timestamp layout, e.g. `2017 051 Feb 20 00:00:30.000`
pub const MAGDA_TIME_FORMAT: &str = "%Y %j %b %d %H:%M:%S%.f";

/// Legacy two-digit years only ever start with 9 and belong to the 1990s
pub const LEGACY_YEAR_PREFIX: &str = "19";

// =============================================================================
// Sensor Status
// =============================================================================

/// Top two bits of the status word hold the sensitivity range
pub const STATUS_RANGE_MASK: u32 = 0xC000_0000;

pub const STATUS_RANGE_SHIFT: u32 = 30;

// =============================================================================
// External Header Tool
// =============================================================================

/// Default wall-clock limit for one header tool invocation
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

/// Environment variable naming the base data directory
pub const DATA_ROOT_ENV: &str = "CASDATA";

/// Environment variable naming the external header tool command line
pub const HEADER_TOOL_ENV: &str = "MAGDA_HEADER_TOOL";
