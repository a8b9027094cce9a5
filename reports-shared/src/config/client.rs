use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf};
use thiserror::Error;
use tracing::debug;
use url::Url;

const DEFAULT_IDENTITY_URL: &str = "http://localhost:8080";
const DEFAULT_REALM: &str = "reports-realm";
const DEFAULT_CLIENT_ID: &str = "reports-frontend";
const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_REDIRECT_PORT: u16 = 8765;
const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 300;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Errors raised while loading or validating the client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yml::Error),
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported configuration format. Use 'yaml' or 'json'.")]
    UnsupportedFormat,
    #[error("Invalid {name} value: {reason}")]
    InvalidEnv { name: &'static str, reason: String },
    #[error("invalid URL for {field}: {source}")]
    InvalidUrl {
        field: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Identity provider (Keycloak) settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct IdentityConfig {
    /// Base URL of the identity provider, without the `/realms` suffix
    pub url: String,

    /// Realm the client is registered in
    pub realm: String,

    /// Public client identifier presented in the PKCE flow
    pub client_id: String,

    /// Loopback port that receives the authorization redirect
    pub redirect_port: u16,

    /// How long `login` waits for the browser to come back
    pub login_timeout_secs: u64,

    /// Scopes requested at authorization time
    pub scopes: Vec<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_IDENTITY_URL.to_string(),
            realm: DEFAULT_REALM.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            redirect_port: DEFAULT_REDIRECT_PORT,
            login_timeout_secs: DEFAULT_LOGIN_TIMEOUT_SECS,
            scopes: vec!["openid".to_string()],
        }
    }
}

impl IdentityConfig {
    /// Root of the realm's OpenID Connect endpoints, always ending in `/`.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidUrl`] when `url` is not an absolute URL.
    pub fn realm_endpoints(&self) -> Result<Url, ConfigError> {
        let raw = format!(
            "{}/realms/{}/protocol/openid-connect/",
            self.url.trim_end_matches('/'),
            self.realm
        );
        Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl {
            field: "identity.url",
            source,
        })
    }

    /// Authorization endpoint the browser is sent to.
    ///
    /// # Errors
    /// Returns an error when the identity URL is malformed.
    pub fn authorization_endpoint(&self) -> Result<Url, ConfigError> {
        self.endpoint("auth")
    }

    /// Token endpoint used for code and refresh exchanges.
    ///
    /// # Errors
    /// Returns an error when the identity URL is malformed.
    pub fn token_endpoint(&self) -> Result<Url, ConfigError> {
        self.endpoint("token")
    }

    /// End-session endpoint called on logout.
    ///
    /// # Errors
    /// Returns an error when the identity URL is malformed.
    pub fn end_session_endpoint(&self) -> Result<Url, ConfigError> {
        self.endpoint("logout")
    }

    /// Loopback redirect URI registered for the client.
    ///
    /// # Errors
    /// Returns an error if the generated URI cannot be parsed.
    pub fn redirect_uri(&self) -> Result<Url, ConfigError> {
        Url::parse(&format!("http://127.0.0.1:{}/callback", self.redirect_port)).map_err(
            |source| ConfigError::InvalidUrl {
                field: "identity.redirect_port",
                source,
            },
        )
    }

    fn endpoint(&self, name: &str) -> Result<Url, ConfigError> {
        self.realm_endpoints()?
            .join(name)
            .map_err(|source| ConfigError::InvalidUrl {
                field: "identity.realm",
                source,
            })
    }
}

/// Report API settings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the report API
    pub base_url: String,

    /// Per-request timeout applied to report and token calls
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ApiConfig {
    /// The `/reports` endpoint without any query string.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidUrl`] when `base_url` is malformed.
    pub fn reports_endpoint(&self) -> Result<Url, ConfigError> {
        Url::parse(&format!("{}/reports", self.base_url.trim_end_matches('/'))).map_err(
            |source| ConfigError::InvalidUrl {
                field: "api.base_url",
                source,
            },
        )
    }
}

/// The main configuration structure for the Usage Reports client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Identity provider settings
    pub identity: IdentityConfig,

    /// Report API settings
    pub api: ApiConfig,

    /// Logging level
    pub log_level: String,

    /// Where the token set is persisted; defaults to the platform config dir
    pub session_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Config {
    /// Generates a default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            identity: IdentityConfig::default(),
            api: ApiConfig::default(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            session_path: None,
        }
    }

    /// Loads the configuration from a file, environment variables, or defaults.
    ///
    /// File values win over environment variables, and `api_override` wins over both.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] when the file cannot be read or parsed, an
    /// environment variable is malformed, or the result fails [`Config::validate`].
    pub fn load_config(
        config_path: Option<PathBuf>,
        api_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => Self::with_defaults(),
        };

        config.apply_env_overrides()?;

        if let Some(api) = api_override {
            config.api.base_url = api;
        }

        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    fn from_file(path: PathBuf) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => serde_yml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            _ => return Err(ConfigError::UnsupportedFormat),
        };
        debug!(path = %path.display(), "configuration file loaded");
        Ok(config)
    }

    // Environment variables only fill values that are still at their defaults.
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let defaults = Self::with_defaults();

        if self.identity.url == defaults.identity.url
            && let Ok(url) = env::var("REPORTS_IDENTITY_URL")
        {
            self.identity.url = url;
        }
        if self.identity.realm == defaults.identity.realm
            && let Ok(realm) = env::var("REPORTS_REALM")
        {
            self.identity.realm = realm;
        }
        if self.identity.client_id == defaults.identity.client_id
            && let Ok(client_id) = env::var("REPORTS_CLIENT_ID")
        {
            self.identity.client_id = client_id;
        }
        if self.identity.redirect_port == defaults.identity.redirect_port
            && let Ok(port) = env::var("REPORTS_REDIRECT_PORT")
        {
            self.identity.redirect_port =
                port.parse().map_err(|_| ConfigError::InvalidEnv {
                    name: "REPORTS_REDIRECT_PORT",
                    reason: "must be a valid number between 1 and 65535".to_string(),
                })?;
        }
        if self.api.base_url == defaults.api.base_url
            && let Ok(api) = env::var("REPORTS_API_URL")
        {
            self.api.base_url = api;
        }
        if self.api.request_timeout_secs == defaults.api.request_timeout_secs
            && let Ok(timeout) = env::var("REPORTS_REQUEST_TIMEOUT")
        {
            self.api.request_timeout_secs =
                timeout.parse().map_err(|_| ConfigError::InvalidEnv {
                    name: "REPORTS_REQUEST_TIMEOUT",
                    reason: "must be a whole number of seconds".to_string(),
                })?;
        }
        if self.log_level == defaults.log_level
            && let Ok(level) = env::var("REPORTS_LOG_LEVEL")
        {
            self.log_level = level;
        }

        Ok(())
    }

    /// Validate the complete configuration.
    ///
    /// # Errors
    /// Returns every problem found, not just the first one.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let required = [
            ("identity.url", &self.identity.url),
            ("identity.realm", &self.identity.realm),
            ("identity.client_id", &self.identity.client_id),
            ("api.base_url", &self.api.base_url),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                errors.push(format!("{field} must not be empty"));
            }
        }

        if !self.identity.url.trim().is_empty()
            && let Err(err) = self.identity.realm_endpoints()
        {
            errors.push(err.to_string());
        }
        if !self.api.base_url.trim().is_empty()
            && let Err(err) = self.api.reports_endpoint()
        {
            errors.push(err.to_string());
        }

        if self.identity.redirect_port == 0 {
            errors.push("Invalid redirect port. Must be greater than 0.".to_string());
        }
        if self.identity.login_timeout_secs == 0 {
            errors.push("identity.login_timeout_secs must be greater than 0".to_string());
        }
        if self.api.request_timeout_secs == 0 {
            errors.push("api.request_timeout_secs must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
