// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Best-effort ISO-8601 normalization of temporal expressions.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%B %d %Y",
    "%b %d, %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%m/%d/%Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

/// ISO form of `value` if it parses as a date or date-time.
pub fn parse_iso(value: &str) -> Option<String> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc).to_rfc3339());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.format("%Y-%m-%dT%H:%M:%S").to_string());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }
    None
}

/// Resolve an expression to an ISO date, preferring the model's own value.
///
/// Falls back to parsing the expression itself, then to the relative words
/// `today`, `tomorrow` and `yesterday` against `now`.
pub fn normalize(expression: &str, provided: Option<&str>, now: DateTime<Utc>) -> Option<String> {
    if let Some(iso) = provided.and_then(parse_iso) {
        return Some(iso);
    }
    if let Some(iso) = parse_iso(expression) {
        return Some(iso);
    }
    let offset = match expression.trim().to_lowercase().as_str() {
        "today" | "tonight" | "now" => 0,
        "tomorrow" => 1,
        "yesterday" => -1,
        _ => return None,
    };
    Some((now + Duration::days(offset)).format("%Y-%m-%d").to_string())
}
