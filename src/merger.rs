//! Merging of two measurement series into one logically continuous series.
//!
//! The merger classifies the chronological relationship of the two inputs
//! (forward, reversed, overlapping), optionally bridges a time gap with
//! missing-valued samples, reconciles the diameter grids, and concatenates
//! every field. Inputs are never mutated; the merge works on clones.

use ndarray::{s, Array2};
use time::format_description;
use time::{Date, Duration, PrimitiveDateTime, Time};

use super::bin_grid::{reconcile_bins, BinAlignment};
use super::config::{InstrumentConfig, MergeOptions};
use super::constants::MISSING;
use super::error::{FieldMergeError, MergeError, TimeIndexError};
use super::series::{Field, FieldData, MeasurementSeries, NumericOrText, TimeField};
use super::time_index;

/// Chronological relationship between the two input series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeriesOrder {
    /// The first series ends before the second begins.
    Forward { gap_secs: i64 },
    /// The second series ends before the first begins; the caller swapped them.
    Reversed { gap_secs: i64 },
    /// The time ranges intersect. The second series replaces the first from
    /// index `cut` of the first series' timeline onward.
    Overlap { cut: usize },
}

/// Which time axis a string belongs to; decides how it is re-parsed when the
/// two series carry different format descriptions.
#[derive(Debug, Clone, Copy)]
enum TimeKind {
    DateTime,
    Date,
    Time,
}

/// SeriesMerger combines two MeasurementSeries into one.
///
/// Holds the injected instrument configuration; each call to
/// [`SeriesMerger::merge`] is independent and leaves its inputs untouched.
#[derive(Debug, Clone, Default)]
pub struct SeriesMerger {
    config: InstrumentConfig,
}

impl SeriesMerger {
    /// Create a new SeriesMerger with the given instrument configuration.
    pub fn new(config: InstrumentConfig) -> Self {
        Self { config }
    }

    /// Merge two measurement series into one.
    ///
    /// Classification handles forward, reversed, and overlapping inputs; on
    /// overlap the second series is authoritative from the overlap point
    /// onward. Per-field failures are logged and the field dropped; only an
    /// unparseable time axis aborts the merge.
    pub fn merge(
        &self,
        series_a: &MeasurementSeries,
        series_b: &MeasurementSeries,
        options: &MergeOptions,
    ) -> Result<MeasurementSeries, MergeError> {
        if series_a.sample_count == 0 || series_b.sample_count == 0 {
            return Err(MergeError::EmptySeries);
        }

        let mut a = series_a.clone();
        let mut b = series_b.clone();
        a.ensure_datetime();
        b.ensure_datetime();

        let ta = timeline(datetime_axis(&a))?;
        let tb = timeline(datetime_axis(&b))?;

        let res_a = resolution_secs(&ta);
        let res_b = resolution_secs(&tb);
        if (res_a - res_b).abs() > self.config.resolution_warn_secs && options.warn {
            spdlog::warn!("resolutions differ by {} seconds", (res_a - res_b).abs());
        }

        let (earlier, later, res_later, later_first, gap_secs, cut) = match classify(&ta, &tb) {
            SeriesOrder::Forward { gap_secs } => (a, b, res_b, tb[0], gap_secs, None),
            SeriesOrder::Reversed { gap_secs } => {
                if options.warn {
                    spdlog::info!(
                        "series given in reversed chronological order; merging as (second, first)"
                    );
                }
                (b, a, res_a, ta[0], gap_secs, None)
            }
            SeriesOrder::Overlap { cut } => {
                if options.warn {
                    spdlog::info!(
                        "overlapping series; second series replaces the first from index {} ({})",
                        cut,
                        ta[cut]
                    );
                }
                (a, b, res_b, tb[0], 0, Some(cut))
            }
        };

        // Gap decision. The threshold is exclusive and keyed to the later
        // series' resolution; the later series' own first sample is excluded
        // from the synthetic list.
        let mut synthetic: Vec<PrimitiveDateTime> = Vec::new();
        if options.fill_time
            && cut.is_none()
            && res_later > 0
            && gap_secs as f64 > self.config.gap_fill_factor * res_later as f64
        {
            let numdates = (gap_secs as f64 / res_later as f64).ceil() as i64;
            for step in (1..numdates).rev() {
                synthetic.push(later_first - Duration::seconds(res_later * step));
            }
            if options.warn {
                spdlog::info!("filling time gap with {} synthetic samples", synthetic.len());
            }
        }

        let keep_e = cut.unwrap_or(earlier.sample_count).min(earlier.sample_count);
        let gap = synthetic.len();
        let n_later = later.sample_count;
        let total = keep_e + gap + n_later;

        // The later series is the attribute shell of the result.
        let mut out = later.clone();
        out.instrument_kind = earlier.instrument_kind.as_concatenated();
        out.sample_count = total;

        out.datetime = Some(TimeField {
            data: merge_time_data(
                datetime_axis(&earlier),
                datetime_axis(&later),
                TimeKind::DateTime,
                keep_e,
                &synthetic,
            )?,
            units: datetime_axis(&later).units.clone(),
        });
        out.date = TimeField {
            data: merge_time_data(&earlier.date, &later.date, TimeKind::Date, keep_e, &synthetic)?,
            units: later.date.units.clone(),
        };
        out.time = TimeField {
            data: merge_time_data(&earlier.time, &later.time, TimeKind::Time, keep_e, &synthetic)?,
            units: later.time.units.clone(),
        };

        // Diameter grid and the diameter-resolved variables.
        let mut merged_vars: Vec<String> = Vec::new();
        match (&earlier.diameter, &later.diameter) {
            (Some(grid_e), Some(grid_l)) => {
                let align = reconcile_bins(
                    &grid_e.data,
                    &grid_l.data,
                    &earlier.instrument_kind,
                    &self.config,
                )?;
                for name in &earlier.variables {
                    match merge_variable(&earlier, &later, name, &align, keep_e, gap, n_later) {
                        Ok(field) => {
                            out.fields.insert(name.clone(), field);
                            merged_vars.push(name.clone());
                        }
                        Err(e) => {
                            if options.warn {
                                spdlog::warn!("Could not append variable {}: {}", name, e);
                            }
                        }
                    }
                }
                let mut diameter = grid_l.clone();
                diameter.valid_min = align.grid[0];
                diameter.valid_max = align.grid[align.grid.len() - 1];
                diameter.data = align.grid;
                out.diameter = Some(diameter);
            }
            (Some(grid_e), None) => {
                if options.warn && !earlier.variables.is_empty() {
                    spdlog::warn!(
                        "Could not append {} diameter-resolved variables: {}",
                        earlier.variables.len(),
                        FieldMergeError::MissingGrid
                    );
                }
                out.diameter = if options.keep_unique {
                    Some(grid_e.clone())
                } else {
                    None
                };
            }
            (None, Some(_)) => {
                if options.warn && !later.variables.is_empty() {
                    spdlog::warn!(
                        "Could not append {} diameter-resolved variables: {}",
                        later.variables.len(),
                        FieldMergeError::MissingGrid
                    );
                }
                if !options.keep_unique {
                    out.diameter = None;
                }
            }
            (None, None) => {}
        }
        for name in &later.variables {
            if !merged_vars.iter().any(|v| v == name) {
                out.fields.remove(name);
                if options.warn && !earlier.variables.iter().any(|v| v == name) {
                    spdlog::warn!(
                        "Could not append variable {}: {}",
                        name,
                        FieldMergeError::MissingVariable
                    );
                }
            }
        }
        out.variables = merged_vars.clone();

        // Sample-indexed scalar and tagged fields.
        for (name, field_e) in &earlier.fields {
            if merged_vars.iter().any(|v| v == name) {
                continue;
            }
            if matches!(field_e.data, FieldData::Matrix(_)) {
                // Matrix payloads are only merged through the variables list.
                out.fields.remove(name);
                continue;
            }
            match later.fields.get(name) {
                Some(field_l) => {
                    if matches!(field_l.data, FieldData::Matrix(_)) {
                        out.fields.remove(name);
                        if options.warn {
                            spdlog::warn!(
                                "Could not append field {}: {}",
                                name,
                                FieldMergeError::TypeMismatch
                            );
                        }
                        continue;
                    }
                    match merge_sample_data(&field_e.data, &field_l.data, keep_e, gap) {
                        Ok(data) => {
                            let mut merged = field_l.clone();
                            merged.data = data;
                            out.fields.insert(name.clone(), merged);
                        }
                        Err(e) => {
                            out.fields.remove(name);
                            if options.warn {
                                spdlog::warn!("Could not append field {}: {}", name, e);
                            }
                        }
                    }
                }
                None => {
                    if options.keep_unique {
                        if let Some(data) = pad_tail(&field_e.data, keep_e, gap + n_later) {
                            let mut kept = field_e.clone();
                            kept.data = data;
                            out.fields.insert(name.clone(), kept);
                        }
                    }
                }
            }
        }

        // Fields present only in the later series live in the shell already.
        let later_only: Vec<String> = later
            .fields
            .keys()
            .filter(|name| !earlier.fields.contains_key(*name) && !merged_vars.contains(*name))
            .cloned()
            .collect();
        for name in later_only {
            if !options.keep_unique {
                out.fields.remove(&name);
                continue;
            }
            let padded = out
                .fields
                .get(&name)
                .and_then(|field| pad_head(&field.data, keep_e + gap));
            match padded {
                Some(data) => {
                    if let Some(field) = out.fields.get_mut(&name) {
                        field.data = data;
                    }
                }
                None => {
                    out.fields.remove(&name);
                }
            }
        }

        // Continuity, not provenance: the sample axis is a fresh 1-based run.
        out.sample.data = FieldData::Scalar((1..=total).map(|i| i as f64).collect());

        Ok(out)
    }
}

/// Merge two measurement series with the default instrument configuration.
pub fn merge(
    series_a: &MeasurementSeries,
    series_b: &MeasurementSeries,
    options: &MergeOptions,
) -> Result<MeasurementSeries, MergeError> {
    SeriesMerger::new(InstrumentConfig::default()).merge(series_a, series_b, options)
}

/// The combined time axis; present on every series once `ensure_datetime` ran.
fn datetime_axis(series: &MeasurementSeries) -> &TimeField {
    series.datetime.as_ref().unwrap()
}

fn timeline(field: &TimeField) -> Result<Vec<PrimitiveDateTime>, TimeIndexError> {
    time_index::normalize(&field.data, Some(&field.units))
}

/// Nominal time between consecutive samples; 0 for a single-sample series.
fn resolution_secs(timeline: &[PrimitiveDateTime]) -> i64 {
    if timeline.len() < 2 {
        0
    } else {
        (timeline[1] - timeline[0]).whole_seconds()
    }
}

fn classify(ta: &[PrimitiveDateTime], tb: &[PrimitiveDateTime]) -> SeriesOrder {
    if ta[ta.len() - 1] < tb[0] {
        SeriesOrder::Forward {
            gap_secs: (tb[0] - ta[ta.len() - 1]).whole_seconds(),
        }
    } else if tb[tb.len() - 1] < ta[0] {
        SeriesOrder::Reversed {
            gap_secs: (ta[0] - tb[tb.len() - 1]).whole_seconds(),
        }
    } else {
        SeriesOrder::Overlap {
            cut: time_index::nearest_instant(ta, tb[0]),
        }
    }
}

/// Concatenate one time axis: the earlier block (truncated at the overlap cut,
/// reformatted into the later series' format when the two differ), the
/// synthetic gap stamps, then the later block.
fn merge_time_data(
    earlier: &TimeField,
    later: &TimeField,
    kind: TimeKind,
    keep_e: usize,
    synthetic: &[PrimitiveDateTime],
) -> Result<Vec<String>, TimeIndexError> {
    let out_fmt = format_description::parse(&later.units)?;
    let keep = keep_e.min(earlier.data.len());
    let mut data = Vec::with_capacity(keep + synthetic.len() + later.data.len());
    if earlier.units == later.units {
        data.extend_from_slice(&earlier.data[..keep]);
    } else {
        let in_fmt = format_description::parse(&earlier.units)?;
        for stamp in &earlier.data[..keep] {
            data.push(match kind {
                TimeKind::DateTime => PrimitiveDateTime::parse(stamp, &in_fmt)?.format(&out_fmt)?,
                TimeKind::Date => Date::parse(stamp, &in_fmt)?.format(&out_fmt)?,
                TimeKind::Time => Time::parse(stamp, &in_fmt)?.format(&out_fmt)?,
            });
        }
    }
    for instant in synthetic {
        data.push(instant.format(&out_fmt)?);
    }
    data.extend_from_slice(&later.data);
    Ok(data)
}

/// Place both blocks of one diameter-resolved variable into the union grid.
fn merge_variable(
    earlier: &MeasurementSeries,
    later: &MeasurementSeries,
    name: &str,
    align: &BinAlignment,
    keep_e: usize,
    gap: usize,
    n_later: usize,
) -> Result<Field, FieldMergeError> {
    if !later.variables.iter().any(|v| v == name) {
        return Err(FieldMergeError::MissingVariable);
    }
    let field_e = earlier
        .fields
        .get(name)
        .ok_or(FieldMergeError::MissingVariable)?;
    let field_l = later
        .fields
        .get(name)
        .ok_or(FieldMergeError::MissingVariable)?;
    let (matrix_e, matrix_l) = match (&field_e.data, &field_l.data) {
        (FieldData::Matrix(matrix_e), FieldData::Matrix(matrix_l)) => (matrix_e, matrix_l),
        _ => return Err(FieldMergeError::TypeMismatch),
    };
    if matrix_e.ncols() < keep_e {
        return Err(FieldMergeError::ShortPayload {
            have: matrix_e.ncols(),
            need: keep_e,
        });
    }
    if matrix_l.ncols() != n_later {
        return Err(FieldMergeError::ShortPayload {
            have: matrix_l.ncols(),
            need: n_later,
        });
    }
    let window_e = align.end_a - align.start_a;
    let window_l = align.end_b - align.start_b;
    check_block_rows(matrix_e.nrows(), window_e, align.end_a, align.grid.len())?;
    check_block_rows(matrix_l.nrows(), window_l, align.end_b, align.grid.len())?;

    let mut merged = Array2::from_elem((align.grid.len(), keep_e + gap + n_later), MISSING);
    merged
        .slice_mut(s![align.start_a..align.end_a, 0..keep_e])
        .assign(&matrix_e.slice(s![0..window_e, 0..keep_e]));
    merged
        .slice_mut(s![align.start_b..align.end_b, (keep_e + gap)..])
        .assign(&matrix_l.slice(s![0..window_l, ..]));

    let mut field = field_l.clone();
    field.data = FieldData::Matrix(merged);
    Ok(field)
}

/// A block must fit its window exactly, except that the OPC top-edge trim
/// removes the union grid's uppermost entry: the block whose grid supplied
/// that entry then runs to the end of the grid with one extra row, and the
/// extra row is cut together with the trimmed edge.
fn check_block_rows(
    rows: usize,
    window: usize,
    end: usize,
    grid_len: usize,
) -> Result<(), FieldMergeError> {
    if rows == window || (rows == window + 1 && end == grid_len) {
        Ok(())
    } else {
        Err(FieldMergeError::WindowMismatch { window, bins: rows })
    }
}

/// Concatenate one sample-indexed payload: earlier block (truncated at the
/// cut), missing-valued gap block, later block.
fn merge_sample_data(
    earlier: &FieldData,
    later: &FieldData,
    keep_e: usize,
    gap: usize,
) -> Result<FieldData, FieldMergeError> {
    match (earlier, later) {
        (FieldData::Scalar(data_e), FieldData::Scalar(data_l)) => {
            if data_e.len() < keep_e {
                return Err(FieldMergeError::ShortPayload {
                    have: data_e.len(),
                    need: keep_e,
                });
            }
            let mut data = Vec::with_capacity(keep_e + gap + data_l.len());
            data.extend_from_slice(&data_e[..keep_e]);
            data.extend(std::iter::repeat(MISSING).take(gap));
            data.extend_from_slice(data_l);
            Ok(FieldData::Scalar(data))
        }
        (FieldData::Tagged(data_e), FieldData::Tagged(data_l)) => {
            if data_e.len() < keep_e {
                return Err(FieldMergeError::ShortPayload {
                    have: data_e.len(),
                    need: keep_e,
                });
            }
            let mut data = Vec::with_capacity(keep_e + gap + data_l.len());
            data.extend_from_slice(&data_e[..keep_e]);
            data.extend(std::iter::repeat(NumericOrText::Missing).take(gap));
            data.extend_from_slice(data_l);
            Ok(FieldData::Tagged(data))
        }
        _ => Err(FieldMergeError::TypeMismatch),
    }
}

/// Pad a payload kept from the earlier series out to the merged sample count.
fn pad_tail(data: &FieldData, keep: usize, pad: usize) -> Option<FieldData> {
    match data {
        FieldData::Scalar(values) => {
            let keep = keep.min(values.len());
            let mut out = Vec::with_capacity(keep + pad);
            out.extend_from_slice(&values[..keep]);
            out.extend(std::iter::repeat(MISSING).take(pad));
            Some(FieldData::Scalar(out))
        }
        FieldData::Tagged(values) => {
            let keep = keep.min(values.len());
            let mut out = Vec::with_capacity(keep + pad);
            out.extend_from_slice(&values[..keep]);
            out.extend(std::iter::repeat(NumericOrText::Missing).take(pad));
            Some(FieldData::Tagged(out))
        }
        FieldData::Matrix(_) => None,
    }
}

/// Pad a payload kept from the later series back over the earlier span.
fn pad_head(data: &FieldData, pad: usize) -> Option<FieldData> {
    match data {
        FieldData::Scalar(values) => {
            let mut out = vec![MISSING; pad];
            out.extend_from_slice(values);
            Some(FieldData::Scalar(out))
        }
        FieldData::Tagged(values) => {
            let mut out = vec![NumericOrText::Missing; pad];
            out.extend_from_slice(values);
            Some(FieldData::Tagged(out))
        }
        FieldData::Matrix(_) => None,
    }
}
