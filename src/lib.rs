//! # libsmps_merger
//!
//! libsmps_merger merges time-indexed particle sizer measurement series. A
//! series holds concentration values binned by particle diameter plus scalar
//! auxiliary channels (temperature, flow rate, voltage, ...); two
//! independently-read series are combined into one logically continuous
//! series, reconciling their diameter-bin grids, their chronological order
//! (forward, reversed, or overlapping), and optionally bridging a time gap
//! with missing-valued samples.
//!
//! File readers, format sniffing, and plotting are external collaborators:
//! this library consumes and produces fully-materialized
//! [`series::MeasurementSeries`] values and performs no I/O of its own beyond
//! loading its YAML tuning config.
//!
//! ## Usage
//!
//! ```ignore
//! use libsmps_merger::config::{InstrumentConfig, MergeOptions};
//! use libsmps_merger::merger::SeriesMerger;
//!
//! let merger = SeriesMerger::new(InstrumentConfig::default());
//! let options = MergeOptions {
//!     fill_time: true,
//!     ..MergeOptions::default()
//! };
//! let combined = merger.merge(&run_one, &run_two, &options)?;
//! ```
//!
//! ## Configuration
//!
//! Instrument tuning is injected through [`config::InstrumentConfig`], which
//! is serializable to YAML:
//!
//! ```yml
//! gap_fill_factor: 1.5
//! resolution_warn_secs: 60
//! trim_opc_top_edge: true
//! ```
//!
//! The gap-fill factor and the OPC top-edge trim are empirical,
//! instrument-specific rules; they are named constants with config overrides
//! rather than hard-coded assumptions.
//!
//! ## Failure semantics
//!
//! Only an unparseable time axis aborts a merge; there is no safe result
//! without one. Resolution mismatches, overlap resolution ("later wins"), and
//! per-field merge failures are logged through spdlog and the merge completes
//! with best-effort output, so the result's field set may be a strict subset
//! of the union of the inputs' fields.
pub mod bin_grid;
pub mod config;
pub mod constants;
pub mod error;
pub mod merger;
pub mod series;
pub mod time_index;

pub use bin_grid::{reconcile_bins, BinAlignment};
pub use config::{InstrumentConfig, MergeOptions};
pub use error::MergeError;
pub use merger::{merge, SeriesMerger};
pub use series::{
    DiameterField, Field, FieldData, InstrumentFamily, InstrumentKind, MeasurementSeries,
    NumericOrText, TimeField,
};
pub use time_index::find_nearest_date;
