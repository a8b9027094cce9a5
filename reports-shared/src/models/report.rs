use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Optional date range sent to `GET /reports`.
///
/// Dates are passed through as typed by the user; the backend owns their
/// validation and picks its own default range when both are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportQuery {
    /// Start of the period (`YYYY-MM-DD`)
    pub from_date: Option<String>,
    /// End of the period (`YYYY-MM-DD`)
    pub to_date: Option<String>,
}

impl ReportQuery {
    #[must_use]
    pub fn new(from_date: Option<String>, to_date: Option<String>) -> Self {
        Self { from_date, to_date }
    }

    /// Query pairs for the non-empty dates, in `from_date`, `to_date` order.
    #[must_use]
    pub fn params(&self) -> Vec<(&'static str, &str)> {
        [("from_date", &self.from_date), ("to_date", &self.to_date)]
            .into_iter()
            .filter_map(|(name, value)| {
                value
                    .as_deref()
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(|v| (name, v))
            })
            .collect()
    }

    /// `true` when neither date would be sent.
    #[must_use]
    pub fn is_default_range(&self) -> bool {
        self.params().is_empty()
    }
}

/// Body of a successful `GET /reports` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportResponse {
    /// Account the report was generated for.
    pub username: String,
    /// Total usage over the period, kept as the JSON number the backend sent.
    pub total_usage: Number,
    /// Number of active sessions over the period.
    pub active_sessions: Number,
    /// Timestamp of the most recent activity, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<String>,
    /// Free-form breakdown; key order follows the backend payload.
    #[serde(default)]
    pub report_data: Map<String, Value>,
}
