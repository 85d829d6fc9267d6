// Utility helpers for parsing, tallying and number formatting.
//
// This module centralizes the "dirty" date/header handling so the loader and
// the aggregator can assume clean, typed values.
use crate::types::CategoryCount;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W+").expect("static regex"));

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%m-%d-%Y", "%d.%m.%Y", "%d %B %Y", "%d %b %Y",
    "%B %d, %Y", "%b %d, %Y", "%d-%b-%Y", "%Y%m%d",
];

/// Lower-case, trim, and collapse every run of non-word characters into `_`.
///
/// `"  Officer Name "` becomes `"officer_name"`, `"Date (UTC)"` becomes
/// `"date_utc_"`.
pub fn clean_column_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    NON_WORD.replace_all(lowered.trim(), "_").into_owned()
}

/// Parse a free-text date or timestamp, returning `None` for anything that
/// does not match a known layout.
///
/// - Trims whitespace and rejects empty strings.
/// - Accepts RFC 3339 (offset is dropped, the wall-clock UTC value is kept).
/// - Tries a list of datetime layouts, then plain dates at midnight.
pub fn parse_datetime_safe(s: Option<&str>) -> Option<NaiveDateTime> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Convert an Excel serial date (days since 1899-12-30, fractional part is
/// the time of day) into a timestamp.
///
/// Excel treats 1900 as a leap year, so serials below 60 are counted from
/// 1899-12-31 and serial 60 (the non-existent 1900-02-29) is rejected.
/// Values outside 1..=2958465 (9999-12-31) are rejected.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    let epoch = if serial < 60.0 {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else if serial < 61.0 {
        return None;
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    }
    .and_hms_opt(0, 0, 0)?;
    let seconds = (serial * 86_400.0).round() as i64;
    epoch.checked_add_signed(Duration::seconds(seconds))
}

/// Interpret a transport timestamp expressed in epoch milliseconds.
pub fn epoch_millis_to_datetime(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

/// Occurrence counts that remember the order in which values were first seen.
///
/// Ties are always resolved in favor of the value encountered first, so the
/// results do not depend on hash ordering.
#[derive(Debug, Default, Clone)]
pub struct Tally {
    order: Vec<String>,
    counts: HashMap<String, usize>,
}

impl Tally {
    pub fn add(&mut self, value: &str) {
        match self.counts.get_mut(value) {
            Some(c) => *c += 1,
            None => {
                self.order.push(value.to_string());
                self.counts.insert(value.to_string(), 1);
            }
        }
    }

    pub fn distinct(&self) -> usize {
        self.order.len()
    }

    /// Most frequent value; strictly-greater comparison keeps the first
    /// occurrence on ties.
    pub fn mode(&self) -> Option<&str> {
        let mut best: Option<(&str, usize)> = None;
        for value in &self.order {
            let count = self.counts[value];
            if best.map_or(true, |(_, b)| count > b) {
                best = Some((value.as_str(), count));
            }
        }
        best.map(|(v, _)| v)
    }

    /// Mode, or the `"Unknown"` sentinel for an empty tally.
    pub fn mode_or_unknown(&self) -> String {
        self.mode().unwrap_or(crate::types::UNKNOWN).to_string()
    }

    /// Values by descending count, first-seen order among equal counts.
    pub fn ranked(&self) -> Vec<CategoryCount> {
        let mut out: Vec<CategoryCount> = self
            .order
            .iter()
            .map(|v| CategoryCount { name: v.clone(), count: self.counts[v] })
            .collect();
        // `sort_by` is stable, which is what keeps first-seen ties in place.
        out.sort_by(|a, b| b.count.cmp(&a.count));
        out
    }
}

impl<'a> FromIterator<&'a str> for Tally {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut tally = Tally::default();
        for v in iter {
            tally.add(v);
        }
        tally
    }
}

/// `part / whole` as a percentage rounded to two decimals; 0 for an empty whole.
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let pct = part as f64 / whole as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals plus `num-format` thousands separators on the integer part.
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_val: i64 = parts.next().unwrap_or("0").parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = parts.next() {
        res.push('.');
        res.push_str(frac);
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_column_name() {
        assert_eq!(clean_column_name("Officer Name"), "officer_name");
        assert_eq!(clean_column_name("  Burst Date "), "burst_date");
        assert_eq!(clean_column_name("Date (UTC)"), "date_utc_");
        assert_eq!(clean_column_name("Pipe--Size//mm"), "pipe_size_mm");
        assert_eq!(clean_column_name("Fix Area"), "fix_area");
    }

    #[test]
    fn test_parse_datetime_variants() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_datetime_safe(Some("2024-01-05")), Some(expected));
        assert_eq!(parse_datetime_safe(Some("01/05/2024")), Some(expected));
        assert_eq!(parse_datetime_safe(Some(" 2024/01/05 ")), Some(expected));
        assert_eq!(parse_datetime_safe(Some("2024-01-05T00:00:00")), Some(expected));
        assert_eq!(parse_datetime_safe(Some("2024-01-05T00:00:00Z")), Some(expected));
        assert_eq!(parse_datetime_safe(Some("5 January 2024")), Some(expected));
    }

    #[test]
    fn test_parse_datetime_with_time() {
        let dt = parse_datetime_safe(Some("2024-03-10 14:30:00")).unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2024-03-10 14:30");
    }

    #[test]
    fn test_parse_datetime_rejects_garbage() {
        assert_eq!(parse_datetime_safe(None), None);
        assert_eq!(parse_datetime_safe(Some("")), None);
        assert_eq!(parse_datetime_safe(Some("yesterday")), None);
        assert_eq!(parse_datetime_safe(Some("2024-13-40")), None);
    }

    #[test]
    fn test_excel_serial() {
        let dt = excel_serial_to_datetime(45296.0).unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2024-01-05");
        let noon = excel_serial_to_datetime(45296.5).unwrap();
        assert_eq!(noon.format("%H:%M").to_string(), "12:00");
        assert_eq!(excel_serial_to_datetime(0.0), None);
    }

    #[test]
    fn test_excel_serial_1900_leap_year() {
        let day = |serial: f64| {
            excel_serial_to_datetime(serial).map(|d| d.format("%Y-%m-%d").to_string())
        };
        assert_eq!(day(1.0).as_deref(), Some("1900-01-01"));
        assert_eq!(day(59.0).as_deref(), Some("1900-02-28"));
        assert_eq!(day(60.0), None);
        assert_eq!(day(61.0).as_deref(), Some("1900-03-01"));
        assert_eq!(excel_serial_to_datetime(f64::NAN), None);
    }

    #[test]
    fn test_tally_mode_prefers_first_on_tie() {
        let tally: Tally = ["8in", "6in", "6in", "8in", "4in"].into_iter().collect();
        assert_eq!(tally.mode(), Some("8in"));
        assert_eq!(tally.distinct(), 3);
    }

    #[test]
    fn test_tally_ranked_is_stable() {
        let tally: Tally = ["b", "a", "a", "c", "b", "d"].into_iter().collect();
        let ranked = tally.ranked();
        let names: Vec<&str> = ranked.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c", "d"]);
    }

    #[test]
    fn test_tally_empty() {
        let tally = Tally::default();
        assert_eq!(tally.mode(), None);
        assert_eq!(tally.mode_or_unknown(), "Unknown");
        assert!(tally.ranked().is_empty());
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(0, 0), 0.0);
    }

    #[test]
    fn test_format_number_and_int() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-1500.0, 0), "-1,500");
        assert_eq!(format_number(0.0, 2), "0.00");
        assert_eq!(format_int(9855usize), "9,855");
    }
}
