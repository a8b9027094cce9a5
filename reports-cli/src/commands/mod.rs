//! Subcommand implementations.

pub mod completion;
pub mod config;
pub mod report;
pub mod session;

use std::path::PathBuf;

use anyhow::{Context, Result};
use client::{FileTokenStore, KeycloakSession};
use shared::config::Config;

/// Resolve configuration and start logging at its level.
pub fn load(config_path: Option<PathBuf>, api_url: Option<String>) -> Result<Config> {
    let config =
        Config::load_config(config_path, api_url).context("failed to load configuration")?;
    crate::logging::initialize_tracing(&config.log_level);
    Ok(config)
}

/// Session backed by the configured token store, resumed if possible.
pub fn open_session(config: &Config) -> Result<KeycloakSession> {
    KeycloakSession::init(config, FileTokenStore::from_config(config))
        .context("failed to initialise the session")
}
