//! Named empirical constants used throughout the merger.
//!
//! The gap-fill factor and the OPC top-edge rule are instrument-specific and
//! deliberately overridable through [`crate::config::InstrumentConfig`].

/// Multiple of the sampling resolution that a time gap between two series must
/// exceed before synthetic gap-fill samples are inserted.
pub const GAP_FILL_FACTOR: f64 = 1.5;

/// Difference in sampling resolution (seconds) above which the merger emits a
/// resolution-mismatch warning.
pub const RESOLUTION_WARN_SECONDS: i64 = 60;

/// Separator characters stripped from a timestamp before compact format
/// inference.
pub const SEPARATORS: [char; 4] = [' ', '-', '.', ':'];

/// Stripped timestamp length for a date-only stamp (yyyymmdd).
pub const COMPACT_DATE_LEN: usize = 8;
/// Stripped timestamp length for a date plus hours and minutes (yyyymmddHHMM).
pub const COMPACT_MINUTE_LEN: usize = 12;
/// Stripped timestamp length for a full date-time stamp (yyyymmddHHMMSS).
pub const COMPACT_SECOND_LEN: usize = 14;

/// Canonical compact format; shorter stamps are zero-padded up to this one.
pub const COMPACT_DATETIME_FORMAT: &str = "[year][month][day][hour][minute][second]";

/// Marker for a missing sample in numeric payloads. Missing is explicit, never
/// a silent zero.
pub const MISSING: f64 = f64::NAN;

/// Check whether a numeric sample carries the missing marker.
pub fn is_missing(value: f64) -> bool {
    value.is_nan()
}
