pub mod report;
pub mod value;

pub use report::{ReportQuery, ReportResponse};
pub use value::{PLACEHOLDER, ReportValue, TimestampValue, humanize_key, parse_timestamp};
