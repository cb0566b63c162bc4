//! Normalization and search over ordered lists of timestamp strings.
//!
//! Timestamps arrive with inconsistent separators and unspecified precision.
//! When no explicit format is given, separators are stripped and the format is
//! inferred from the first entry's stripped length: 8 digits is a date, 12 a
//! date with minutes, 14 a full date-time. The inferred precision is shared by
//! the whole list; stamps are padded to full second precision and parsed with
//! one canonical compact format.

use time::format_description;
use time::{Duration, PrimitiveDateTime};

use super::constants::{
    COMPACT_DATETIME_FORMAT, COMPACT_DATE_LEN, COMPACT_MINUTE_LEN, COMPACT_SECOND_LEN, SEPARATORS,
};
use super::error::TimeIndexError;

fn strip_separators(stamp: &str) -> String {
    stamp.chars().filter(|c| !SEPARATORS.contains(c)).collect()
}

/// Pad a stripped timestamp up to the canonical 14-digit compact form.
fn pad_compact(stripped: String) -> Result<String, TimeIndexError> {
    match stripped.len() {
        COMPACT_DATE_LEN => Ok(stripped + "000000"),
        COMPACT_MINUTE_LEN => Ok(stripped + "00"),
        COMPACT_SECOND_LEN => Ok(stripped),
        len => Err(TimeIndexError::FormatInference(stripped, len)),
    }
}

fn normalize_one(
    stamp: &str,
    explicit_format: Option<&str>,
) -> Result<PrimitiveDateTime, TimeIndexError> {
    match explicit_format {
        Some(units) => {
            let fmt = format_description::parse(units)?;
            Ok(PrimitiveDateTime::parse(stamp, &fmt)?)
        }
        None => {
            let fmt = format_description::parse(COMPACT_DATETIME_FORMAT)?;
            let padded = pad_compact(strip_separators(stamp))?;
            Ok(PrimitiveDateTime::parse(&padded, &fmt)?)
        }
    }
}

/// Normalize a list of timestamp strings to comparable instants.
///
/// With an explicit format (a `time` format description covering a full
/// date-time), every string is parsed with it. Without one, the precision is
/// inferred from the first entry and every stamp must share it; a stamp of a
/// different stripped length fails inference.
pub fn normalize(
    stamps: &[String],
    explicit_format: Option<&str>,
) -> Result<Vec<PrimitiveDateTime>, TimeIndexError> {
    if stamps.is_empty() {
        return Err(TimeIndexError::EmptyTimeline);
    }
    if let Some(units) = explicit_format {
        let fmt = format_description::parse(units)?;
        return stamps
            .iter()
            .map(|stamp| Ok(PrimitiveDateTime::parse(stamp, &fmt)?))
            .collect();
    }
    let fmt = format_description::parse(COMPACT_DATETIME_FORMAT)?;
    let inferred_len = strip_separators(&stamps[0]).len();
    let mut instants = Vec::with_capacity(stamps.len());
    for stamp in stamps {
        let stripped = strip_separators(stamp);
        if stripped.len() != inferred_len {
            let len = stripped.len();
            return Err(TimeIndexError::FormatInference(stripped, len));
        }
        let padded = pad_compact(stripped)?;
        instants.push(PrimitiveDateTime::parse(&padded, &fmt)?);
    }
    Ok(instants)
}

/// Index of the instant closest to `target`. Ties resolve to the earliest
/// index. Linear scan; timestamps are not guaranteed sorted once a series has
/// been through prior merges or gap-filling.
pub(crate) fn nearest_instant(instants: &[PrimitiveDateTime], target: PrimitiveDateTime) -> usize {
    let mut best = 0;
    let mut best_delta = (instants[0] - target).abs();
    for (idx, instant) in instants.iter().enumerate().skip(1) {
        let delta = (*instant - target).abs();
        if delta < best_delta {
            best = idx;
            best_delta = delta;
        }
    }
    best
}

/// Find the timestamp closest to `target` within a list of timestamps.
///
/// Returns the index of the closest entry and its normalized instant. If two
/// entries are equally close, the earliest-occurring one wins.
pub fn find_nearest_date(
    stamps: &[String],
    target: &str,
    explicit_format: Option<&str>,
) -> Result<(usize, PrimitiveDateTime), TimeIndexError> {
    let instants = normalize(stamps, explicit_format)?;
    let target = normalize_one(target, explicit_format)?;
    let idx = nearest_instant(&instants, target);
    Ok((idx, instants[idx]))
}

/// Find the last entry exactly equal to `target` after normalization, if any.
pub fn find_exact_date(
    stamps: &[String],
    target: &str,
    explicit_format: Option<&str>,
) -> Result<Option<(usize, PrimitiveDateTime)>, TimeIndexError> {
    let instants = normalize(stamps, explicit_format)?;
    let target = normalize_one(target, explicit_format)?;
    let mut found = None;
    for (idx, instant) in instants.iter().enumerate() {
        if *instant == target {
            found = Some((idx, *instant));
        }
    }
    Ok(found)
}

/// Find all entries exactly equal to `target` after normalization, in order.
pub fn find_exact_date_all(
    stamps: &[String],
    target: &str,
    explicit_format: Option<&str>,
) -> Result<Vec<usize>, TimeIndexError> {
    let instants = normalize(stamps, explicit_format)?;
    let target = normalize_one(target, explicit_format)?;
    Ok(instants
        .iter()
        .enumerate()
        .filter(|(_, instant)| **instant == target)
        .map(|(idx, _)| idx)
        .collect())
}

/// Find all entries within `tolerance_secs` (inclusive, both directions) of
/// `target`.
pub fn find_common_date(
    stamps: &[String],
    target: &str,
    tolerance_secs: i64,
    explicit_format: Option<&str>,
) -> Result<Vec<(usize, PrimitiveDateTime)>, TimeIndexError> {
    let instants = normalize(stamps, explicit_format)?;
    let target = normalize_one(target, explicit_format)?;
    let tolerance = Duration::seconds(tolerance_secs);
    Ok(instants
        .into_iter()
        .enumerate()
        .filter(|(_, instant)| (*instant - target).abs() <= tolerance)
        .collect())
}

/// Group samples into consecutive time buckets of nominal width `res_secs`.
///
/// Samples are taken in chronological order; each bucket starts at its first
/// sample and extends to the entry nearest to that instant plus `res_secs`
/// (inclusive). Returns the original indices of the stamps per bucket, so any
/// sample-indexed payload can be sliced along with them.
pub fn group_by_date(
    stamps: &[String],
    res_secs: i64,
    explicit_format: Option<&str>,
) -> Result<Vec<Vec<usize>>, TimeIndexError> {
    let instants = normalize(stamps, explicit_format)?;
    let mut order: Vec<usize> = (0..instants.len()).collect();
    order.sort_by_key(|&idx| instants[idx]);
    let sorted: Vec<PrimitiveDateTime> = order.iter().map(|&idx| instants[idx]).collect();
    let step = Duration::seconds(res_secs);

    let mut groups = Vec::new();
    let mut start = 0;
    while start < sorted.len() {
        // ties in a sorted list can resolve before the cursor; clamp so the
        // scan always advances
        let end = nearest_instant(&sorted, sorted[start] + step).max(start);
        groups.push(order[start..=end].to_vec());
        start = end + 1;
    }
    Ok(groups)
}

/// Inclusive membership test of `target` within `[start, end]`.
pub fn within_period(
    target: &str,
    start: &str,
    end: &str,
    explicit_format: Option<&str>,
) -> Result<bool, TimeIndexError> {
    let target = normalize_one(target, explicit_format)?;
    let start = normalize_one(start, explicit_format)?;
    let end = normalize_one(end, explicit_format)?;
    Ok(start <= target && target <= end)
}

/// Rewrite a list of timestamps from one format description into another.
pub fn convert_format(
    stamps: &[String],
    input_format: &str,
    output_format: &str,
) -> Result<Vec<String>, TimeIndexError> {
    let in_fmt = format_description::parse(input_format)?;
    let out_fmt = format_description::parse(output_format)?;
    stamps
        .iter()
        .map(|stamp| Ok(PrimitiveDateTime::parse(stamp, &in_fmt)?.format(&out_fmt)?))
        .collect()
}

/// Split a combined date-time list into separate date and time string lists.
pub fn split_datetime(
    datetimes: &[String],
    input_format: &str,
    date_format: &str,
    time_format: &str,
) -> Result<(Vec<String>, Vec<String>), TimeIndexError> {
    let in_fmt = format_description::parse(input_format)?;
    let date_fmt = format_description::parse(date_format)?;
    let time_fmt = format_description::parse(time_format)?;
    let mut dates = Vec::with_capacity(datetimes.len());
    let mut times = Vec::with_capacity(datetimes.len());
    for stamp in datetimes {
        let instant = PrimitiveDateTime::parse(stamp, &in_fmt)?;
        dates.push(instant.format(&date_fmt)?);
        times.push(instant.format(&time_fmt)?);
    }
    Ok((dates, times))
}

//Unit tests
#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn stamps(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_inference_by_length() {
        let instants = normalize(
            &stamps(&["2020-01-02", "20200103", "2020.01.04"]),
            None,
        )
        .unwrap();
        assert_eq!(instants[0], datetime!(2020-01-02 00:00:00));
        assert_eq!(instants[1], datetime!(2020-01-03 00:00:00));
        assert_eq!(instants[2], datetime!(2020-01-04 00:00:00));

        let instants = normalize(&stamps(&["2020-01-02 13:05"]), None).unwrap();
        assert_eq!(instants[0], datetime!(2020-01-02 13:05:00));

        let instants = normalize(&stamps(&["2020-01-02 13:05:30"]), None).unwrap();
        assert_eq!(instants[0], datetime!(2020-01-02 13:05:30));
    }

    #[test]
    fn test_inference_failure() {
        let result = normalize(&stamps(&["2020-01"]), None);
        assert!(matches!(
            result,
            Err(TimeIndexError::FormatInference(_, 6))
        ));
    }

    #[test]
    fn test_mixed_precision_list_rejected() {
        // the first entry fixes the precision for the whole list
        let result = normalize(&stamps(&["2020-01-02", "2020-01-02 13:05:30"]), None);
        assert!(matches!(
            result,
            Err(TimeIndexError::FormatInference(_, 14))
        ));
    }

    #[test]
    fn test_group_by_date_buckets() {
        let list = stamps(&[
            "2020-01-01 00:00:00",
            "2020-01-01 00:01:00",
            "2020-01-01 00:02:00",
            "2020-01-01 00:10:00",
            "2020-01-01 00:11:00",
        ]);
        let groups = group_by_date(&list, 120, None).unwrap();
        assert_eq!(groups, vec![vec![0, 1, 2], vec![3, 4]]);
    }

    #[test]
    fn test_group_by_date_returns_original_indices() {
        let list = stamps(&[
            "2020-01-01 00:10:00",
            "2020-01-01 00:00:00",
            "2020-01-01 00:01:00",
        ]);
        let groups = group_by_date(&list, 120, None).unwrap();
        assert_eq!(groups, vec![vec![1, 2], vec![0]]);
    }

    #[test]
    fn test_nearest_tie_breaks_to_earliest() {
        let (idx, _) = find_nearest_date(
            &stamps(&["2020-01-01 00:00:00", "2020-01-01 00:00:10"]),
            "2020-01-01 00:00:05",
            None,
        )
        .unwrap();
        assert_eq!(idx, 0);
    }

    #[test]
    fn test_nearest_unsorted_input() {
        let (idx, instant) = find_nearest_date(
            &stamps(&["2020-01-03", "2020-01-01", "2020-01-02"]),
            "2020-01-01 01:00",
            None,
        )
        .unwrap();
        assert_eq!(idx, 1);
        assert_eq!(instant, datetime!(2020-01-01 00:00:00));
    }

    #[test]
    fn test_exact_takes_last_match() {
        let list = stamps(&["2020-01-01", "2020-01-02", "2020-01-01"]);
        let (idx, _) = find_exact_date(&list, "20200101", None).unwrap().unwrap();
        assert_eq!(idx, 2);
        assert_eq!(find_exact_date_all(&list, "20200101", None).unwrap(), vec![0, 2]);
        assert!(find_exact_date(&list, "2020-01-05", None).unwrap().is_none());
    }

    #[test]
    fn test_within_period_is_inclusive() {
        assert!(within_period("2020-01-02", "2020-01-01", "2020-01-03", None).unwrap());
        assert!(within_period("2020-01-03", "2020-01-01", "2020-01-03", None).unwrap());
        assert!(!within_period("2020-01-04", "2020-01-01", "2020-01-03", None).unwrap());
    }

    #[test]
    fn test_find_common_date_tolerance() {
        let list = stamps(&[
            "2020-01-01 00:00:00",
            "2020-01-01 00:01:00",
            "2020-01-01 00:10:00",
        ]);
        let matches = find_common_date(&list, "2020-01-01 00:00:30", 30, None).unwrap();
        let indices: Vec<usize> = matches.iter().map(|(idx, _)| *idx).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn test_convert_and_split() {
        let converted = convert_format(
            &stamps(&["2020-01-01 12:30:00"]),
            "[year]-[month]-[day] [hour]:[minute]:[second]",
            "[year][month][day][hour][minute][second]",
        )
        .unwrap();
        assert_eq!(converted, vec!["20200101123000".to_string()]);

        let (dates, times) = split_datetime(
            &stamps(&["2020-01-01 12:30:00"]),
            "[year]-[month]-[day] [hour]:[minute]:[second]",
            "[year]-[month]-[day]",
            "[hour]:[minute]:[second]",
        )
        .unwrap();
        assert_eq!(dates, vec!["2020-01-01".to_string()]);
        assert_eq!(times, vec!["12:30:00".to_string()]);
    }
}
