use crate::error::{Result, SalesCountError};
use chrono::NaiveDate;

/// Fallback label for missing customer ids, sale types and payment methods.
pub const UNKNOWN_LABEL: &str = "UNKNOWN";

/// Width advisor codes are left-padded to before lookup.
pub const ADVISOR_CODE_WIDTH: usize = 5;

/// Parses a record date in `DD/MM/YYYY`, `DD-MM-YYYY`, `YYYY-MM-DD` or `YYYY/MM/DD` form.
///
/// Two-digit years are read as `20YY`. A trailing time component
/// (`2024-03-01 10:15:00` or `2024-03-01T10:15:00`) is ignored.
pub fn parse_record_date(raw: &str) -> Result<NaiveDate> {
    let date_part = raw
        .trim()
        .split(|c: char| c.is_whitespace() || c == 'T')
        .next()
        .unwrap_or("");

    let parts: Vec<&str> = date_part.split(['/', '-']).collect();
    if parts.len() != 3
        || parts
            .iter()
            .any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit()))
    {
        return Err(SalesCountError::DateError(format!(
            "Invalid date '{}'. Expected DD/MM/YYYY, DD-MM-YYYY, YYYY-MM-DD or YYYY/MM/DD",
            raw
        )));
    }

    let (year_str, month_str, day_str) = if parts[0].len() == 4 {
        (parts[0], parts[1], parts[2])
    } else {
        (parts[2], parts[1], parts[0])
    };

    let year = parse_year(year_str).ok_or_else(|| {
        SalesCountError::DateError(format!("Invalid year '{}' in date '{}'", year_str, raw))
    })?;
    let month: u32 = month_str
        .parse()
        .map_err(|_| SalesCountError::DateError(format!("Invalid month in date '{}'", raw)))?;
    let day: u32 = day_str
        .parse()
        .map_err(|_| SalesCountError::DateError(format!("Invalid day in date '{}'", raw)))?;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        SalesCountError::DateError(format!("Date '{}' does not exist in the calendar", raw))
    })
}

fn parse_year(year_str: &str) -> Option<i32> {
    let year: i32 = year_str.parse().ok()?;
    match year_str.len() {
        2 => Some(2000 + year),
        4 => Some(year),
        _ => None,
    }
}

/// Absolute distance in whole days between two dates.
pub fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    (b - a).num_days().abs()
}

/// Upper-cases a classification label, falling back to `"UNKNOWN"` when absent or blank.
pub fn normalize_label(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(label) if !label.is_empty() => label.to_uppercase(),
        _ => UNKNOWN_LABEL.to_string(),
    }
}

/// Normalizes an advisor code for lookup: strips leading zeros, then left-pads
/// with zeros to [`ADVISOR_CODE_WIDTH`] characters.
///
/// Returns `None` for absent or blank codes.
pub fn normalize_advisor_code(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let stripped = trimmed.trim_start_matches('0');
    Some(format!("{:0>width$}", stripped, width = ADVISOR_CODE_WIDTH))
}

/// Returns the trimmed value if it holds anything other than whitespace.
pub fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}
