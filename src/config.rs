use serde::{Deserialize, Serialize};
use std::path::Path;

use super::constants::{GAP_FILL_FACTOR, RESOLUTION_WARN_SECONDS};
use super::error::ConfigError;

/// Instrument-specific tuning for the merger. Injected at construction time;
/// the merger itself never holds mutable global state.
///
/// Configs are serializable and deserializable to YAML using serde and serde_yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    /// Multiple of the sampling resolution a time gap must exceed before
    /// gap-fill samples are synthesized.
    pub gap_fill_factor: f64,
    /// Resolution difference (seconds) above which a mismatch warning is emitted.
    pub resolution_warn_secs: i64,
    /// Optical particle counters report bin edges rather than midpoints, with
    /// one more edge than midpoint. When set, the top entry of a reconciled
    /// OPC grid is dropped.
    pub trim_opc_top_edge: bool,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            gap_fill_factor: GAP_FILL_FACTOR,
            resolution_warn_secs: RESOLUTION_WARN_SECONDS,
            trim_opc_top_edge: true,
        }
    }
}

impl InstrumentConfig {
    /// Read the configuration in a YAML file
    /// Returns an InstrumentConfig if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }
}

/// Caller-facing switches for a single merge call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    /// Keep fields present in only one of the two series, padded with missing
    /// values over the other series' span.
    pub keep_unique: bool,
    /// Bridge a time gap between the two series with missing-valued samples.
    pub fill_time: bool,
    /// Emit warnings and informational notices while merging.
    pub warn: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            keep_unique: false,
            fill_time: false,
            warn: true,
        }
    }
}
