use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing vendor credential: {field}")]
    MissingCredential { field: &'static str },

    #[error("Missing required setting: {field}")]
    MissingSetting { field: &'static str },

    #[error("Invalid URL for {field}: '{value}' (expected http:// or https://)")]
    InvalidUrl { field: &'static str, value: String },

    #[error("Page size must be positive and default ({default}) must not exceed max ({max})")]
    InvalidPageSize { default: u32, max: u32 },

    #[error("{field} must be at least 1")]
    ZeroLimit { field: &'static str },

    #[error("Token refresh margin must be shorter than the default token lifetime")]
    RefreshMarginTooLarge,

    #[error("display_utc_offset_hours out of range: {0}")]
    InvalidUtcOffset(i32),
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_vendor(config)?;
    validate_fields(config)?;
    validate_query(config)?;
    validate_webhook(config)?;
    validate_server(config)?;
    Ok(())
}

fn validate_vendor(config: &Config) -> Result<(), ValidationError> {
    let vendor = &config.vendor;

    if vendor.client_id.is_empty() {
        return Err(ValidationError::MissingCredential { field: "vendor.client_id" });
    }
    if vendor.client_secret.is_empty() {
        return Err(ValidationError::MissingCredential { field: "vendor.client_secret" });
    }
    if vendor.system_token.is_empty() {
        return Err(ValidationError::MissingCredential { field: "vendor.system_token" });
    }

    require("vendor.app_type", &vendor.app_type)?;
    require("vendor.form_uuid", &vendor.form_uuid)?;
    require("vendor.user_id", &vendor.user_id)?;

    require_http_url("vendor.api_base_url", &vendor.api_base_url)?;
    require_http_url("vendor.attachment_host", &vendor.attachment_host)?;

    if vendor.token_refresh_margin >= vendor.default_token_lifetime {
        return Err(ValidationError::RefreshMarginTooLarge);
    }

    Ok(())
}

fn validate_fields(config: &Config) -> Result<(), ValidationError> {
    require("fields.name_field_id", &config.fields.name_field_id)?;
    require("fields.attachment_field_id", &config.fields.attachment_field_id)?;
    Ok(())
}

fn validate_query(config: &Config) -> Result<(), ValidationError> {
    let query = &config.query;

    if query.default_page_size == 0
        || query.max_page_size == 0
        || query.default_page_size > query.max_page_size
    {
        return Err(ValidationError::InvalidPageSize {
            default: query.default_page_size,
            max: query.max_page_size,
        });
    }

    if query.url_mint_concurrency == 0 {
        return Err(ValidationError::ZeroLimit { field: "query.url_mint_concurrency" });
    }

    if !(-12..=14).contains(&query.display_utc_offset_hours) {
        return Err(ValidationError::InvalidUtcOffset(query.display_utc_offset_hours));
    }

    Ok(())
}

fn validate_webhook(config: &Config) -> Result<(), ValidationError> {
    if let Some(url) = config.webhook.target() {
        require_http_url("webhook.url", url)?;
    }

    if config.webhook.queue_capacity == 0 {
        return Err(ValidationError::ZeroLimit { field: "webhook.queue_capacity" });
    }

    Ok(())
}

fn validate_server(config: &Config) -> Result<(), ValidationError> {
    if config.server.max_concurrent_queries == 0 {
        return Err(ValidationError::ZeroLimit { field: "server.max_concurrent_queries" });
    }
    Ok(())
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingSetting { field });
    }
    Ok(())
}

fn require_http_url(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}
