//! Lenient readers for loosely-typed notification fields.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Collapses the backend's success encodings into a single boolean.
///
/// Accepted encodings: `true`, the string `"true"` (any case), and the number `1`.
pub fn normalize_success_flag(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(raw) => raw.trim().eq_ignore_ascii_case("true"),
        Value::Number(number) => {
            number.as_u64() == Some(1) || number.as_f64().is_some_and(|value| value == 1.0)
        }
        _ => false,
    }
}

/// Reads a non-negative test index from a number or a string of digits.
pub fn parse_index(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|value| value.is_finite() && *value >= 0.0 && value.fract() == 0.0)
                .map(|value| value as u64)
        }),
        Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() || !trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
                return None;
            }
            trimmed.parse::<u64>().ok()
        }
        _ => None,
    }
}

/// Parses an ISO-8601 timestamp; offset-less values are taken as UTC.
pub fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let raw = value?.as_str()?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Returns the string value when it has visible content.
pub fn non_blank_text(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text.clone()),
        _ => None,
    }
}
