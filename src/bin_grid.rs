//! Reconciliation of two diameter-bin grids into one union grid.

use super::config::InstrumentConfig;
use super::error::BinGridError;
use super::series::{InstrumentFamily, InstrumentKind};

/// Result of reconciling two diameter grids: the ascending, duplicate-free
/// union grid and the half-open index window `[start, end)` at which each
/// input's bins land within it.
#[derive(Debug, Clone, PartialEq)]
pub struct BinAlignment {
    pub start_a: usize,
    pub end_a: usize,
    pub start_b: usize,
    pub end_b: usize,
    pub grid: Vec<f64>,
}

/// Index of the grid entry closest to `value`; ties resolve to the lowest index.
fn nearest_bin(grid: &[f64], value: f64) -> usize {
    let mut best = 0;
    let mut best_delta = (grid[0] - value).abs();
    for (idx, bin) in grid.iter().enumerate().skip(1) {
        let delta = (bin - value).abs();
        if delta < best_delta {
            best = idx;
            best_delta = delta;
        }
    }
    best
}

/// Build the sorted union of two diameter grids and locate each input within it.
///
/// The OPC family (plain or concatenated) stores bin edges with one more edge
/// than midpoint, so the top union entry is dropped for it when the config
/// enables the trim.
pub fn reconcile_bins(
    bins_a: &[f64],
    bins_b: &[f64],
    kind: &InstrumentKind,
    config: &InstrumentConfig,
) -> Result<BinAlignment, BinGridError> {
    if bins_a.is_empty() {
        return Err(BinGridError::EmptyGrid("first"));
    }
    if bins_b.is_empty() {
        return Err(BinGridError::EmptyGrid("second"));
    }

    let mut grid: Vec<f64> = bins_a.iter().chain(bins_b.iter()).copied().collect();
    grid.sort_by(|x, y| x.total_cmp(y));
    grid.dedup();

    if config.trim_opc_top_edge && kind.family == InstrumentFamily::Opc && grid.len() > 1 {
        grid.pop();
    }

    let start_a = nearest_bin(&grid, bins_a[0]);
    let end_a = nearest_bin(&grid, bins_a[bins_a.len() - 1]) + 1;
    let start_b = nearest_bin(&grid, bins_b[0]);
    let end_b = nearest_bin(&grid, bins_b[bins_b.len() - 1]) + 1;

    Ok(BinAlignment {
        start_a,
        end_a,
        start_b,
        end_b,
        grid,
    })
}
