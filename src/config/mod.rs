//! Configuration management for report-lookup
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use report_lookup::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Any setting can be overridden with `REPORT_LOOKUP__<section>__<key>`:
//! - `REPORT_LOOKUP__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `REPORT_LOOKUP__VENDOR__REQUEST_TIMEOUT=5s`
//! - `REPORT_LOOKUP__QUERY__URL_MINT_CONCURRENCY=4`
//!
//! Credentials and form identifiers are usually supplied through the flat
//! names the deployment already uses (`CLIENT_ID`, `CLIENT_SECRET`,
//! `SYSTEM_TOKEN`, `APP_TYPE`, `FORM_UUID`, `USERID`, `*_FIELD_ID`,
//! `WEBHOOK_*`, `PORT`), which take precedence over everything else.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/report-lookup.toml`.
//! This can be overridden using the `REPORT_LOOKUP_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::HumanDuration;
pub use models::{
    Config, FieldsConfig, QueryConfig, Secret, ServerConfig, TelemetryConfig, VendorConfig,
    WebhookConfig,
};
pub use sources::apply_flat_env;
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or a required
    /// credential or identifier is missing.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration with an explicit file path, still honouring the
    /// environment overlays.
    pub fn load_with_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_with_path(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file without the flat variable
    /// overlay. Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
