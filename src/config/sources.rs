use super::models::{Config, Secret};
use crate::humanize::HumanDuration;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "REPORT_LOOKUP_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/report-lookup.toml";
const ENV_PREFIX: &str = "REPORT_LOOKUP";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. `REPORT_LOOKUP__*` variables
/// 5. Flat deployment variables (`CLIENT_ID`, `WEBHOOK_URL`, ...)
pub fn load() -> Result<Config, ConfigError> {
    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_with_path(config_path)
}

/// Same as [`load`] but with an explicit config file path.
pub fn load_with_path(config_path: PathBuf) -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let mut config = load_from_sources(config_path)?;
    apply_flat_env(&mut config, |key| env::var(key).ok())?;

    Ok(config)
}

/// Overlay the flat variable names used by existing deployments.
/// Secrets are expected to arrive this way rather than through TOML.
pub fn apply_flat_env<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(value) = get("CLIENT_ID") {
        config.vendor.client_id = Secret::new(value);
    }
    if let Some(value) = get("CLIENT_SECRET") {
        config.vendor.client_secret = Secret::new(value);
    }
    if let Some(value) = get("SYSTEM_TOKEN") {
        config.vendor.system_token = Secret::new(value);
    }
    if let Some(value) = get("APP_TYPE") {
        config.vendor.app_type = value;
    }
    if let Some(value) = get("FORM_UUID") {
        config.vendor.form_uuid = value;
    }
    if let Some(value) = get("USERID") {
        config.vendor.user_id = value;
    }
    if let Some(value) = get("NAME_FIELD_ID") {
        config.fields.name_field_id = value;
    }
    if let Some(value) = get("PHONE_FIELD_ID") {
        config.fields.phone_field_id = Some(value);
    }
    if let Some(value) = get("ATTACHMENT_FIELD_ID") {
        config.fields.attachment_field_id = value;
    }
    if let Some(value) = get("WEBHOOK_URL") {
        config.webhook.url = Some(value);
    }
    if let Some(value) = get("WEBHOOK_TIMEOUT") {
        config.webhook.timeout = parse_duration("WEBHOOK_TIMEOUT", &value)?;
    }
    if let Some(value) = get("WEBHOOK_RETRY_DELAY_BASE") {
        config.webhook.retry_delay_base = parse_duration("WEBHOOK_RETRY_DELAY_BASE", &value)?;
    }
    if let Some(value) = get("WEBHOOK_MAX_RETRIES") {
        config.webhook.max_retries = value.trim().parse().map_err(|e| {
            ConfigError::Message(format!("WEBHOOK_MAX_RETRIES: {}", e))
        })?;
    }
    if let Some(value) = get("PORT") {
        let port: u16 = value
            .trim()
            .parse()
            .map_err(|e| ConfigError::Message(format!("PORT: {}", e)))?;
        config.server.bind_addr.set_port(port);
    }

    Ok(())
}

fn parse_duration(key: &str, value: &str) -> Result<HumanDuration, ConfigError> {
    value
        .parse()
        .map_err(|e| ConfigError::Message(format!("{}: {}", key, e)))
}

/// Load configuration from a specific path and environment
/// Useful for testing with custom config files
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // REPORT_LOOKUP__VENDOR__APP_TYPE -> vendor.app_type
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}
