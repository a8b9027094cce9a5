use std::{
    fmt, fs,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Duration, Utc};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use shared::config::Config;
use tracing::debug;

use crate::{claims::TokenClaims, error::SessionError};

/// Access and refresh credentials with their expiry bookkeeping.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub refresh_expires_at: Option<DateTime<Utc>>,
}

impl TokenSet {
    /// Build a token set from a token endpoint response.
    ///
    /// Without `expires_in` the access token's own `exp` claim is used, and
    /// failing that the token is treated as already expired so the next
    /// refresh exchanges it.
    #[must_use]
    pub fn issued(
        access_token: String,
        refresh_token: Option<String>,
        expires_in: Option<std::time::Duration>,
        now: DateTime<Utc>,
    ) -> Self {
        let expires_at = expires_in
            .and_then(|ttl| Duration::from_std(ttl).ok())
            .map(|ttl| now + ttl)
            .or_else(|| TokenClaims::decode_unverified(&access_token)?.expires_at())
            .unwrap_or(now);
        let refresh_expires_at = refresh_token
            .as_deref()
            .and_then(TokenClaims::decode_unverified)
            .and_then(|claims| claims.expires_at());

        Self {
            access_token,
            refresh_token,
            expires_at,
            refresh_expires_at,
        }
    }

    /// Time left on the access token; negative once expired.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }

    /// `true` when fewer than `min_validity_secs` seconds remain.
    #[must_use]
    pub fn expires_within(&self, min_validity_secs: u64, now: DateTime<Utc>) -> bool {
        let threshold = i64::try_from(min_validity_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        self.remaining(now) < threshold
    }

    /// The refresh token, if there is one and it has not expired.
    #[must_use]
    pub fn usable_refresh_token(&self, now: DateTime<Utc>) -> Option<&str> {
        let expired = self.refresh_expires_at.is_some_and(|at| at <= now);
        if expired {
            None
        } else {
            self.refresh_token.as_deref()
        }
    }

    /// A session is worth keeping while either token can still be used.
    #[must_use]
    pub fn is_resumable(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now || self.usable_refresh_token(now).is_some()
    }

    #[must_use]
    pub fn claims(&self) -> Option<TokenClaims> {
        TokenClaims::decode_unverified(&self.access_token)
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"[redacted]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[redacted]"),
            )
            .field("expires_at", &self.expires_at)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .finish()
    }
}

/// Persistence for the current [`TokenSet`].
pub trait TokenStore: Send + Sync {
    /// Load the stored session, `None` when nothing is stored.
    ///
    /// # Errors
    /// Returns an error if the store exists but cannot be read or parsed.
    fn load(&self) -> Result<Option<TokenSet>, SessionError>;

    /// Replace the stored session.
    ///
    /// # Errors
    /// Returns an error if the session cannot be written.
    fn save(&self, tokens: &TokenSet) -> Result<(), SessionError>;

    /// Remove the stored session. Clearing an empty store succeeds.
    ///
    /// # Errors
    /// Returns an error if an existing store cannot be removed.
    fn clear(&self) -> Result<(), SessionError>;
}

/// JSON file store, readable by the owner only on unix.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `session_path` from the config, or the platform default.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config
                .session_path
                .clone()
                .unwrap_or_else(Self::default_path),
        )
    }

    #[must_use]
    pub fn default_path() -> PathBuf {
        BaseDirs::new().map_or_else(
            || PathBuf::from("./session.json"),
            |dirs| dirs.config_dir().join("usage-reports").join("session.json"),
        )
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SessionError {
        SessionError::Store {
            path: self.path.clone(),
            source,
        }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<TokenSet>, SessionError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path).map_err(|err| self.io_error(err))?;
        let tokens = serde_json::from_str(&contents).map_err(|source| SessionError::StoreFormat {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(tokens))
    }

    fn save(&self, tokens: &TokenSet) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }
        let serialized =
            serde_json::to_vec_pretty(tokens).map_err(|source| SessionError::StoreFormat {
                path: self.path.clone(),
                source,
            })?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path).map_err(|err| self.io_error(err))?;
        // `mode` only applies on creation; tighten a file left by an older write.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(|err| self.io_error(err))?;
        }
        file.write_all(&serialized).map_err(|err| self.io_error(err))?;
        debug!(path = %self.path.display(), "session saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|err| self.io_error(err))?;
            debug!(path = %self.path.display(), "session removed");
        }
        Ok(())
    }
}
