//! # Configuration
//!
//! Client configuration: identity provider coordinates, report API location,
//! and logging. See [`client::Config::load_config`] for precedence rules.

pub mod client;

pub use client::{ApiConfig, Config, ConfigError, IdentityConfig};
