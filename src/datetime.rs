//! Flexible timestamp parsing for the `_datetime_` coercion.
//!
//! Input is first classified into a family (ISO dates, slashed dates, textual
//! month names, bare digits) and only that family's formats are tried. Values
//! without an offset are taken as UTC.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

const ISO_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%d %H:%M:%S%.f %z %Z",
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %I:%M:%S %p",
    "%Y-%m-%d %I:%M %p",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d",
];

const YMD_SLASH_FORMATS: &[&str] = &[
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%Y/%m/%d",
];

// month first, then day first for values like 25/12/2022
const MDY_SLASH_FORMATS: &[&str] = &[
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y",
    "%m/%d/%y",
    "%d/%m/%Y %H:%M:%S%.f",
    "%d/%m/%Y",
];

const TEXT_FORMATS: &[&str] = &[
    "%a %b %e %H:%M:%S %Y",
    "%a %b %e %H:%M:%S %z %Y",
    "%a, %d %b %Y %H:%M:%S %z",
    "%A, %B %d, %Y %H:%M:%S",
    "%A, %B %d, %Y",
    "%B %d, %Y %H:%M:%S",
    "%B %d, %Y",
    "%b %d, %Y %H:%M:%S",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y %H:%M:%S",
    "%d %B %Y",
    "%d %b %Y %H:%M:%S",
    "%d %b %Y, %H:%M:%S",
    "%d %b %Y, %H:%M",
    "%d %b %Y",
];

struct Family {
    pattern: Regex,
    formats: &'static [&'static str],
}

static FAMILIES: LazyLock<Vec<Family>> = LazyLock::new(|| {
    [
        (r"^\d{4}-\d{1,2}-\d{1,2}", ISO_FORMATS),
        (r"^\d{4}/\d{1,2}/\d{1,2}", YMD_SLASH_FORMATS),
        (r"^\d{1,2}/\d{1,2}/\d{2,4}", MDY_SLASH_FORMATS),
        (r"^[A-Za-z]|\d{1,2} [A-Za-z]{3}", TEXT_FORMATS),
    ]
    .into_iter()
    .filter_map(|(pattern, formats)| {
        Regex::new(pattern)
            .ok()
            .map(|pattern| Family { pattern, formats })
    })
    .collect()
});

/// Parses a date/time string in any of the supported layouts.
///
/// Returns `None` when nothing matches; callers turn that into a null value.
pub fn parse_datetime(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    if s.bytes().all(|b| b.is_ascii_digit()) {
        return parse_digits(s);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }

    let s = s
        .strip_suffix(" UTC")
        .or_else(|| s.strip_suffix(" GMT"))
        .unwrap_or(s);

    let family = FAMILIES.iter().find(|f| f.pattern.is_match(s))?;
    parse_with_formats(s, family.formats)
}

fn parse_with_formats(s: &str, formats: &[&str]) -> Option<DateTime<Utc>> {
    for format in formats {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(ndt.and_utc());
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return date.and_hms_opt(0, 0, 0).map(|ndt| ndt.and_utc());
        }
    }
    None
}

/// Bare digits are compact calendar dates or unix epochs, decided by length.
fn parse_digits(s: &str) -> Option<DateTime<Utc>> {
    match s.len() {
        4 => NaiveDate::parse_from_str(&format!("{s}0101"), "%Y%m%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|ndt| ndt.and_utc()),
        6 => NaiveDate::parse_from_str(&format!("{s}01"), "%Y%m%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|ndt| ndt.and_utc()),
        8 => parse_with_formats(s, &["%Y%m%d"]),
        14 => parse_with_formats(s, &["%Y%m%d%H%M%S"]),
        len => {
            let value: i64 = s.parse().ok()?;
            let per_second: i64 = match len {
                0..=10 => 1,
                11..=13 => 1_000,
                14..=16 => 1_000_000,
                17..=19 => 1_000_000_000,
                _ => return None,
            };
            let nanos = (value % per_second) * (1_000_000_000 / per_second);
            DateTime::from_timestamp(value / per_second, u32::try_from(nanos).ok()?)
        }
    }
}
