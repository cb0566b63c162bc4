use std::path::PathBuf;
use thiserror::Error;

use super::constants::{COMPACT_DATE_LEN, COMPACT_MINUTE_LEN, COMPACT_SECOND_LEN};

#[derive(Debug, Error)]
pub enum TimeIndexError {
    #[error("Cannot infer a time format from stripped timestamp {0:?} of length {1}; expected {d}, {m} or {s} digits", d=COMPACT_DATE_LEN, m=COMPACT_MINUTE_LEN, s=COMPACT_SECOND_LEN)]
    FormatInference(String, usize),
    #[error("TimeIndex failed to parse a timestamp: {0}")]
    ParsingError(#[from] time::error::Parse),
    #[error("TimeIndex was given an invalid format description: {0}")]
    BadFormatDescription(#[from] time::error::InvalidFormatDescription),
    #[error("TimeIndex failed to format an instant: {0}")]
    FormattingError(#[from] time::error::Format),
    #[error("TimeIndex was given an empty timestamp list")]
    EmptyTimeline,
}

#[derive(Debug, Error)]
pub enum BinGridError {
    #[error("BinReconciler was given an empty diameter grid for the {0} series")]
    EmptyGrid(&'static str),
}

/// Per-field merge failures. These are never fatal; the merger logs them and
/// drops the offending field from the output.
#[derive(Debug, Error)]
pub enum FieldMergeError {
    #[error("payload types differ between the two series")]
    TypeMismatch,
    #[error("payload holds {have} samples but {need} are required")]
    ShortPayload { have: usize, need: usize },
    #[error("bin window spans {window} rows but the payload has {bins} bins")]
    WindowMismatch { window: usize, bins: usize },
    #[error("variable is not diameter-resolved in both series")]
    MissingVariable,
    #[error("diameter-resolved payload requires a diameter grid in both series")]
    MissingGrid,
}

#[derive(Debug, Error)]
pub enum SeriesError {
    #[error("Field {name} holds {found} samples; series has {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Variable {name} has shape {found:?}; expected {expected:?}")]
    ShapeMismatch {
        name: String,
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("Variable {0} requires a diameter field on the series")]
    MissingDiameter(String),
    #[error("Variable {0} is not present in the fields mapping as a matrix payload")]
    MissingVariable(String),
    #[error("Field {0} holds a diameter-resolved matrix; add it as a variable instead")]
    UnlistedMatrix(String),
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("Merger failed due to time index error: {0}")]
    TimeError(#[from] TimeIndexError),
    #[error("Merger failed due to bin grid error: {0}")]
    BinError(#[from] BinGridError),
    #[error("Merger was given a series with no samples")]
    EmptySeries,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}
