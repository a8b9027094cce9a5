//! Tagged view over the free-form `report_data` values.
//!
//! The backend does not type `report_data`, so each entry is classified by
//! its JSON kind and, for strings, by whether the key looks time-related.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use serde_json::{Number, Value};

/// Shown for null or missing values.
pub const PLACEHOLDER: &str = "-";

const TIME_KEY_MARKERS: [&str; 3] = ["date", "time", "ts"];

const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// A parsed date or date-time string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampValue {
    /// Carries an explicit offset and is converted to the display zone.
    Instant(DateTime<FixedOffset>),
    /// Wall-clock time without an offset; shown as-is.
    Naive(NaiveDateTime),
    /// Calendar date only.
    Date(NaiveDate),
}

impl TimestampValue {
    /// Format for display in the given time zone.
    pub fn display_in<Tz>(&self, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        match self {
            Self::Instant(instant) => instant
                .with_timezone(tz)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            Self::Naive(naive) => naive.format("%Y-%m-%d %H:%M:%S").to_string(),
            Self::Date(date) => date.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Parse RFC 3339, ISO-8601 without offset, or a bare `YYYY-MM-DD` date.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<TimestampValue> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(TimestampValue::Instant(instant));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(TimestampValue::Naive(naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(TimestampValue::Date)
}

/// Classified `report_data` value.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportValue {
    Null,
    Number(Number),
    Text(String),
    Timestamp(TimestampValue),
    Nested(Value),
}

impl ReportValue {
    /// Classify `value` stored under `key`.
    ///
    /// Only strings under a time-like key become timestamps; numbers stay
    /// numbers whatever the key, and unparseable strings fall back to text.
    #[must_use]
    pub fn classify(key: &str, value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Object(_) | Value::Array(_) => Self::Nested(value.clone()),
            Value::Number(number) => Self::Number(number.clone()),
            Value::String(text) if is_time_key(key) => {
                parse_timestamp(text).map_or_else(|| Self::Text(text.clone()), Self::Timestamp)
            }
            Value::String(text) => Self::Text(text.clone()),
            Value::Bool(flag) => Self::Text(flag.to_string()),
        }
    }

    /// Human-readable rendering in the given time zone.
    pub fn display_in<Tz>(&self, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        match self {
            Self::Null => PLACEHOLDER.to_string(),
            Self::Number(number) => format_number(number),
            Self::Text(text) => text.clone(),
            Self::Timestamp(timestamp) => timestamp.display_in(tz),
            Self::Nested(value) => value.to_string(),
        }
    }
}

fn is_time_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    TIME_KEY_MARKERS.iter().any(|marker| key.contains(marker))
}

// Integers print as-is; anything fractional is rounded to at most two
// decimals with trailing zeros dropped.
fn format_number(number: &Number) -> String {
    if number.is_i64() || number.is_u64() {
        return number.to_string();
    }
    match number.as_f64() {
        Some(float) if float.is_finite() && float.fract() == 0.0 => format!("{float:.0}"),
        Some(float) if float.is_finite() => {
            let rounded = format!("{float:.2}");
            match rounded.trim_end_matches('0').trim_end_matches('.') {
                "-0" => "0".to_string(),
                trimmed => trimmed.to_string(),
            }
        }
        _ => number.to_string(),
    }
}

/// `avg_reaction_ms` -> `Avg Reaction Ms`.
#[must_use]
pub fn humanize_key(key: &str) -> String {
    let mut label = String::with_capacity(key.len());
    let mut at_word_start = true;
    for ch in key.chars() {
        let ch = if ch == '_' { ' ' } else { ch };
        if at_word_start && ch.is_alphanumeric() {
            label.extend(ch.to_uppercase());
        } else {
            label.push(ch);
        }
        at_word_start = !ch.is_alphanumeric();
    }
    label
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn test_null_renders_placeholder() {
        let value = ReportValue::classify("city", &Value::Null);
        assert_eq!(value, ReportValue::Null);
        assert_eq!(value.display_in(&Utc), "-");
    }

    #[test]
    fn test_fractional_numbers_round_to_at_most_two_decimals() {
        let value = ReportValue::classify("avg_reaction_ms", &json!(12.3456));
        assert_eq!(value.display_in(&Utc), "12.35");

        let value = ReportValue::classify("avg_battery_level", &json!(80.5));
        assert_eq!(value.display_in(&Utc), "80.5");

        let value = ReportValue::classify("avg_battery_level", &json!(79.999));
        assert_eq!(value.display_in(&Utc), "80");

        let value = ReportValue::classify("drift", &json!(-0.001));
        assert_eq!(value.display_in(&Utc), "0");
    }

    #[test]
    fn test_integers_render_verbatim() {
        assert_eq!(
            ReportValue::classify("total_events", &json!(1500)).display_in(&Utc),
            "1500"
        );
        assert_eq!(
            ReportValue::classify("delta", &json!(-7)).display_in(&Utc),
            "-7"
        );
        assert_eq!(
            ReportValue::classify("ratio", &json!(3.0)).display_in(&Utc),
            "3"
        );
    }

    #[test]
    fn test_numbers_under_time_keys_stay_numbers() {
        // "total_requests" contains "ts" but is still a count
        let value = ReportValue::classify("total_requests", &json!(17));
        assert_eq!(value, ReportValue::Number(17.into()));
        assert_eq!(value.display_in(&Utc), "17");
    }

    #[test]
    fn test_objects_and_arrays_render_as_compact_json() {
        let value = ReportValue::classify("device", &json!({"model": "X1", "fw": 2}));
        assert_eq!(value.display_in(&Utc), r#"{"model":"X1","fw":2}"#);

        let value = ReportValue::classify("tags", &json!(["a", "b"]));
        assert_eq!(value.display_in(&Utc), r#"["a","b"]"#);
    }

    #[test]
    fn test_time_keys_parse_timestamps() {
        let value = ReportValue::classify("last_event_ts", &json!("2024-05-01T10:15:30Z"));
        assert!(matches!(
            value,
            ReportValue::Timestamp(TimestampValue::Instant(_))
        ));
        assert_eq!(value.display_in(&Utc), "2024-05-01 10:15:30");

        let offset = FixedOffset::east_opt(3 * 3600).unwrap();
        assert_eq!(value.display_in(&offset), "2024-05-01 13:15:30");

        let value = ReportValue::classify("from_date", &json!("2024-04-25"));
        assert_eq!(value.display_in(&offset), "2024-04-25");

        let value = ReportValue::classify("Start_Time", &json!("2024-04-25 08:00:00"));
        assert_eq!(value.display_in(&offset), "2024-04-25 08:00:00");
    }

    #[test]
    fn test_unparseable_time_value_falls_back_to_text() {
        let value = ReportValue::classify("update_date", &json!("soon"));
        assert_eq!(value, ReportValue::Text("soon".into()));
        assert_eq!(value.display_in(&Utc), "soon");
    }

    #[test]
    fn test_other_values_coerce_to_strings() {
        assert_eq!(
            ReportValue::classify("country", &json!("NO")).display_in(&Utc),
            "NO"
        );
        assert_eq!(
            ReportValue::classify("enabled", &json!(true)).display_in(&Utc),
            "true"
        );
    }

    #[test]
    fn test_humanize_key() {
        assert_eq!(humanize_key("avg_reaction_ms"), "Avg Reaction Ms");
        assert_eq!(humanize_key("p95_reaction_ms"), "P95 Reaction Ms");
        assert_eq!(humanize_key("city"), "City");
        assert_eq!(humanize_key("already Spaced"), "Already Spaced");
    }
}
