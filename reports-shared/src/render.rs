//! Key/value table rendering for a [`ReportResponse`].

use std::fmt;

use chrono::TimeZone;

use crate::models::{ReportResponse, ReportValue, humanize_key, parse_timestamp};

/// `report_data` entry the backend uses for status text; never shown as a row.
const RESERVED_MESSAGE_KEY: &str = "message";

/// One labelled row of the rendered report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub label: String,
    pub value: String,
}

impl ReportRow {
    fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Report flattened into display rows, ready to print.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReportTable {
    rows: Vec<ReportRow>,
}

impl ReportTable {
    /// Build the table, formatting timestamps in `tz`.
    ///
    /// Fixed fields come first (username, total usage, active sessions, last
    /// activity when present), followed by every `report_data` entry except
    /// the reserved `message` key, in payload order.
    pub fn from_response<Tz>(report: &ReportResponse, tz: &Tz) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let mut rows = vec![
            ReportRow::new("Username", report.username.clone()),
            ReportRow::new("Total Usage", report.total_usage.to_string()),
            ReportRow::new("Active Sessions", report.active_sessions.to_string()),
        ];

        if let Some(raw) = report
            .last_activity
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
        {
            let value = parse_timestamp(raw).map_or_else(|| raw.to_string(), |ts| ts.display_in(tz));
            rows.push(ReportRow::new("Last Activity", value));
        }

        rows.extend(
            report
                .report_data
                .iter()
                .filter(|(key, _)| key.as_str() != RESERVED_MESSAGE_KEY)
                .map(|(key, value)| {
                    ReportRow::new(
                        humanize_key(key),
                        ReportValue::classify(key, value).display_in(tz),
                    )
                }),
        );

        Self { rows }
    }

    #[must_use]
    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    /// Value of the first row with the given label.
    #[must_use]
    pub fn value(&self, label: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|row| row.label == label)
            .map(|row| row.value.as_str())
    }
}

impl fmt::Display for ReportTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const FIELD: &str = "Field";
        const VALUE: &str = "Value";

        let label_width = self
            .rows
            .iter()
            .map(|row| row.label.chars().count())
            .chain(std::iter::once(FIELD.len()))
            .max()
            .unwrap_or(FIELD.len());
        let value_width = self
            .rows
            .iter()
            .map(|row| row.value.chars().count())
            .chain(std::iter::once(VALUE.len()))
            .max()
            .unwrap_or(VALUE.len());

        writeln!(f, "{FIELD:<label_width$} | {VALUE}")?;
        writeln!(f, "{}-+-{}", "-".repeat(label_width), "-".repeat(value_width))?;
        for row in &self.rows {
            writeln!(f, "{:<label_width$} | {}", row.label, row.value)?;
        }
        Ok(())
    }
}
