//! Field-level conversions from raw CSV text to typed values.
//!
//! Integers and decimals parse strictly and abort the run on garbage.
//! Timestamps parse leniently: a value matching no known format loads as
//! NULL and is counted, mirroring how the rest of the warehouse treats
//! vendor date columns.

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Scale of the DECIMAL(18,4) destination columns.
const DECIMAL_SCALE: u32 = 4;

/// Timestamp formats tried in order. Bare dates parse to midnight.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Location of the row being converted, for error reporting.
pub(crate) struct FieldCx<'a> {
    path: &'a Path,
    line: u64,
}

impl<'a> FieldCx<'a> {
    /// `line` is the 1-based data row number, not counting the header.
    pub(crate) fn new(path: &'a Path, line: u64) -> Self {
        Self { path, line }
    }

    fn err(&self, column: &'static str, value: &str, expected: &'static str) -> PipelineError {
        PipelineError::ValueParse {
            path: self.path.to_path_buf(),
            line: self.line,
            column,
            value: value.to_string(),
            expected,
        }
    }
}

/// Per-column counters for timestamp values that loaded as NULL.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CoercionStats {
    counts: Vec<(&'static str, u64)>,
}

impl CoercionStats {
    pub fn record(&mut self, column: &'static str) {
        match self.counts.iter_mut().find(|(name, _)| *name == column) {
            Some((_, count)) => *count += 1,
            None => self.counts.push((column, 1)),
        }
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|(_, count)| count).sum()
    }

    pub fn get(&self, column: &str) -> u64 {
        self.counts
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.counts.iter().copied()
    }
}

/// Strict integer field: blank is NULL, anything else must parse.
pub(crate) fn int(raw: Option<&str>, column: &'static str, cx: &FieldCx<'_>) -> Result<Option<i32>> {
    let value = match blank_to_none(raw) {
        Some(value) => value,
        None => return Ok(None),
    };
    value
        .parse::<i32>()
        .map(Some)
        .map_err(|_| cx.err(column, value, "INT"))
}

/// Strict decimal field, normalized to the destination scale. Parsed from
/// the cell text directly so money values never take a float round trip.
pub(crate) fn decimal(
    raw: Option<&str>,
    column: &'static str,
    cx: &FieldCx<'_>,
) -> Result<Option<Decimal>> {
    let value = match blank_to_none(raw) {
        Some(value) => value,
        None => return Ok(None),
    };
    match value.parse::<Decimal>() {
        Ok(mut parsed) => {
            parsed.rescale(DECIMAL_SCALE);
            Ok(Some(parsed))
        }
        Err(_) => Err(cx.err(column, value, "DECIMAL")),
    }
}

/// Lenient timestamp field: blank is NULL without comment, a non-blank
/// value matching no format is NULL and counted.
pub(crate) fn datetime(
    raw: Option<&str>,
    column: &'static str,
    stats: &mut CoercionStats,
) -> Option<NaiveDateTime> {
    let value = blank_to_none(raw)?;
    match parse_datetime(value) {
        Some(parsed) => Some(parsed),
        None => {
            stats.record(column);
            debug!(column, value, "timestamp failed to parse, storing NULL");
            None
        }
    }
}

/// Try every known timestamp format, then every bare-date format.
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, format) {
            return parsed.and_hms_opt(0, 0, 0);
        }
    }
    None
}

fn blank_to_none(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn cx(path: &Path) -> FieldCx<'_> {
        FieldCx::new(path, 3)
    }

    fn midnight(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn iso_datetime_parses() {
        assert_eq!(
            parse_datetime("2021-01-19 13:45:07"),
            Some(
                NaiveDate::from_ymd_opt(2021, 1, 19)
                    .unwrap()
                    .and_hms_opt(13, 45, 7)
                    .unwrap()
            )
        );
    }

    #[test]
    fn fractional_seconds_parse() {
        let parsed = parse_datetime("2021-01-19 13:45:07.123").unwrap();
        assert_eq!(parsed.format("%H:%M:%S%.3f").to_string(), "13:45:07.123");
    }

    #[test]
    fn t_separated_datetime_parses() {
        assert!(parse_datetime("2021-01-19T13:45:07").is_some());
    }

    #[test]
    fn bare_date_parses_to_midnight() {
        assert_eq!(parse_datetime("2021-01-19"), Some(midnight(2021, 1, 19)));
        assert_eq!(parse_datetime("2021/01/19"), Some(midnight(2021, 1, 19)));
    }

    #[test]
    fn us_style_date_parses() {
        assert_eq!(parse_datetime("01/19/2021"), Some(midnight(2021, 1, 19)));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(parse_datetime("  2021-01-19  "), Some(midnight(2021, 1, 19)));
    }

    #[test]
    fn garbage_and_blank_do_not_parse() {
        assert_eq!(parse_datetime("not-a-date"), None);
        assert_eq!(parse_datetime("2021-13-40"), None);
        assert_eq!(parse_datetime(""), None);
    }

    #[test]
    fn blank_timestamp_is_null_without_counting() {
        let mut stats = CoercionStats::default();
        assert_eq!(datetime(None, "TRANS_DATE", &mut stats), None);
        assert_eq!(datetime(Some("   "), "TRANS_DATE", &mut stats), None);
        assert_eq!(stats.total(), 0);
    }

    #[test]
    fn unparseable_timestamp_is_null_and_counted() {
        let mut stats = CoercionStats::default();
        assert_eq!(datetime(Some("19/19/2021"), "TRANS_DATE", &mut stats), None);
        assert_eq!(datetime(Some("soon"), "TRANS_DATE", &mut stats), None);
        assert_eq!(datetime(Some("soon"), "VERSION", &mut stats), None);
        assert_eq!(stats.get("TRANS_DATE"), 2);
        assert_eq!(stats.get("VERSION"), 1);
        assert_eq!(stats.total(), 3);
    }

    #[test]
    fn int_blank_is_null() {
        let path = PathBuf::from("x.csv");
        assert_eq!(int(None, "BRAND_ID", &cx(&path)).unwrap(), None);
        assert_eq!(int(Some(""), "BRAND_ID", &cx(&path)).unwrap(), None);
        assert_eq!(int(Some(" 42 "), "BRAND_ID", &cx(&path)).unwrap(), Some(42));
    }

    #[test]
    fn int_garbage_is_a_hard_error() {
        let path = PathBuf::from("x.csv");
        match int(Some("12.5"), "BRAND_ID", &cx(&path)) {
            Err(PipelineError::ValueParse { line, column, value, .. }) => {
                assert_eq!(line, 3);
                assert_eq!(column, "BRAND_ID");
                assert_eq!(value, "12.5");
            }
            other => panic!("expected ValueParse, got {other:?}"),
        }
    }

    #[test]
    fn decimal_is_rescaled_to_four_places() {
        let path = PathBuf::from("x.csv");
        let parsed = decimal(Some("12.5"), "SPEND_AMOUNT", &cx(&path)).unwrap().unwrap();
        assert_eq!(parsed.to_string(), "12.5000");
        let negative = decimal(Some("-0.25"), "SPEND_AMOUNT", &cx(&path)).unwrap().unwrap();
        assert_eq!(negative.to_string(), "-0.2500");
    }

    #[test]
    fn decimal_garbage_is_a_hard_error() {
        let path = PathBuf::from("x.csv");
        assert!(decimal(Some("12,50"), "SPEND_AMOUNT", &cx(&path)).is_err());
    }
}
