//! End-to-end checks of the public merge contract.

use ndarray::Array2;
use time::format_description;
use time::macros::datetime;
use time::{Duration, PrimitiveDateTime};

use libsmps_merger::{
    find_nearest_date, merge, reconcile_bins, DiameterField, Field, InstrumentConfig,
    InstrumentKind, MeasurementSeries, MergeOptions, SeriesMerger, TimeField,
};

const DATE_UNITS: &str = "[year]-[month]-[day]";
const TIME_UNITS: &str = "[hour]:[minute]:[second]";

fn make_series(
    tag: &str,
    start: PrimitiveDateTime,
    count: usize,
    res_secs: i64,
    bins: &[f64],
    value: f64,
) -> MeasurementSeries {
    let date_fmt = format_description::parse(DATE_UNITS).unwrap();
    let time_fmt = format_description::parse(TIME_UNITS).unwrap();
    let mut dates = Vec::with_capacity(count);
    let mut times = Vec::with_capacity(count);
    for i in 0..count {
        let instant = start + Duration::seconds(res_secs * i as i64);
        dates.push(instant.format(&date_fmt).unwrap());
        times.push(instant.format(&time_fmt).unwrap());
    }
    let mut series = MeasurementSeries::new(
        InstrumentKind::from(tag),
        TimeField::new(dates, DATE_UNITS),
        TimeField::new(times, TIME_UNITS),
    );
    series.set_diameter(DiameterField {
        data: bins.to_vec(),
        units: "nm".to_string(),
        valid_min: bins[0],
        valid_max: bins[bins.len() - 1],
    });
    series
        .add_variable(
            "concentration",
            Field::matrix(Array2::from_elem((bins.len(), count), value), "#/cm3"),
        )
        .unwrap();
    series
        .add_field("temperature", Field::scalar(vec![value; count], "C"))
        .unwrap();
    series
}

#[test]
fn merge_is_order_independent_for_disjoint_ranges() {
    let bins = [10.0, 20.0, 30.0];
    let a = make_series("SMPS", datetime!(2021-06-01 08:00:00), 4, 300, &bins, 1.0);
    let b = make_series("SMPS", datetime!(2021-06-01 12:00:00), 4, 300, &bins, 2.0);
    let forward = merge(&a, &b, &MergeOptions::default()).unwrap();
    let swapped = merge(&b, &a, &MergeOptions::default()).unwrap();
    assert_eq!(forward, swapped);
    forward.validate().unwrap();
    assert_eq!(forward.sample_count, a.sample_count + b.sample_count);
}

#[test]
fn injected_config_controls_gap_fill() {
    let bins = [10.0, 20.0];
    // 150 s gap at 60 s resolution: filled by default (150 > 1.5 * 60) but
    // not under a raised gap-fill factor.
    let a = make_series("SMPS", datetime!(2021-06-01 08:00:00), 3, 60, &bins, 1.0);
    let b = make_series("SMPS", datetime!(2021-06-01 08:04:30), 3, 60, &bins, 2.0);
    let options = MergeOptions {
        fill_time: true,
        warn: false,
        ..MergeOptions::default()
    };

    let filled = merge(&a, &b, &options).unwrap();
    assert_eq!(filled.sample_count, 8);

    let relaxed = SeriesMerger::new(InstrumentConfig {
        gap_fill_factor: 3.0,
        ..InstrumentConfig::default()
    });
    let unfilled = relaxed.merge(&a, &b, &options).unwrap();
    assert_eq!(unfilled.sample_count, 6);
}

#[test]
fn standalone_helpers_are_reusable() {
    let align = reconcile_bins(
        &[1.0, 2.0, 3.0],
        &[4.0, 5.0],
        &InstrumentKind::from("SMPS"),
        &InstrumentConfig::default(),
    )
    .unwrap();
    assert_eq!(align.grid, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    assert_eq!((align.start_a, align.end_a), (0, 3));
    assert_eq!((align.start_b, align.end_b), (3, 5));

    let stamps = vec![
        "2020-01-01 00:00:00".to_string(),
        "2020-01-01 00:00:10".to_string(),
    ];
    let (idx, instant) = find_nearest_date(&stamps, "2020-01-01 00:00:05", None).unwrap();
    assert_eq!(idx, 0);
    assert_eq!(instant, datetime!(2020-01-01 00:00:00));
}
