use std::path::PathBuf;

use shared::config::ConfigError;
use thiserror::Error;

/// Errors produced by the session subsystem.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),
    #[error("identity provider rejected the request: {error}{}", .description.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    Rejected {
        error: String,
        description: Option<String>,
    },
    #[error("authorization redirect was invalid: {0}")]
    InvalidCallback(String),
    #[error("login timed out after {0} seconds")]
    LoginTimedOut(u64),
    #[error("identity provider request failed: {0}")]
    Transport(String),
    #[error("failed to start callback listener: {0}")]
    Listener(#[source] std::io::Error),
    #[error("token store error at {path}: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed token store at {path}: {source}")]
    StoreFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors surfaced by a report fetch. Each one ends the current attempt.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("token refresh failed. Please try logging in again.")]
    TokenRefreshFailed(#[source] SessionError),
    #[error("Authentication failed. Please login again.")]
    Unauthorized,
    #[error("HTTP error! status: {status}, message: {body}")]
    Http { status: u16, body: String },
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid report payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
