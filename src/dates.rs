//! Lenient calendar-date parsing
//!
//! Upstream price sheets and weather payloads disagree on date spelling.
//! Everything is reduced to a `NaiveDate`; time-of-day is discarded.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%Y/%m/%d",
    "%d %b %Y",
    "%d-%b-%Y",
    "%d %B %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
];

/// Parse a date cell, returning `None` for anything unrecognised
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.date());
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_common_spellings() {
        assert_eq!(parse_date("2024-03-05"), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date("05/03/2024"), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date("05-03-2024"), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date("05 Mar 2024"), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date(" 2024/03/05 "), Some(ymd(2024, 3, 5)));
    }

    #[test]
    fn test_time_of_day_discarded() {
        assert_eq!(parse_date("2024-03-05 23:59:59"), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date("2024-03-05T06:00"), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date("2024-03-05T10:00:00+05:30"), Some(ymd(2024, 3, 5)));
    }

    #[test]
    fn test_garbage_rejected() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date("2024-13-40"), None);
    }
}
