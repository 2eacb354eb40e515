use crate::humanize::HumanDuration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub vendor: VendorConfig,
    #[serde(default)]
    pub fields: FieldsConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Credential string whose `Debug` output is redacted.
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Secret(<empty>)")
        } else {
            f.write_str("Secret(<redacted>)")
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Concurrent in-flight `/api` requests before load shedding kicks in.
    #[serde(default = "default_max_concurrent_queries")]
    pub max_concurrent_queries: usize,
    #[serde(default = "default_true")]
    pub cors_allow_any_origin: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_concurrent_queries: default_max_concurrent_queries(),
            cors_allow_any_origin: true,
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_max_concurrent_queries() -> usize {
    64
}

fn default_true() -> bool {
    true
}

/// Form platform endpoints, credentials and call policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VendorConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Host prefixed to root-relative attachment paths.
    #[serde(default = "default_attachment_host")]
    pub attachment_host: String,
    #[serde(default)]
    pub client_id: Secret,
    #[serde(default)]
    pub client_secret: Secret,
    #[serde(default)]
    pub system_token: Secret,
    #[serde(default)]
    pub app_type: String,
    #[serde(default)]
    pub form_uuid: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: HumanDuration,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay: HumanDuration,
    #[serde(default = "default_temporary_url_expiry")]
    pub temporary_url_expiry: HumanDuration,
    #[serde(default = "default_token_refresh_margin")]
    pub token_refresh_margin: HumanDuration,
    #[serde(default = "default_token_lifetime")]
    pub default_token_lifetime: HumanDuration,
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            attachment_host: default_attachment_host(),
            client_id: Secret::default(),
            client_secret: Secret::default(),
            system_token: Secret::default(),
            app_type: String::new(),
            form_uuid: String::new(),
            user_id: String::new(),
            language: default_language(),
            request_timeout: default_request_timeout(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            temporary_url_expiry: default_temporary_url_expiry(),
            token_refresh_margin: default_token_refresh_margin(),
            default_token_lifetime: default_token_lifetime(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.dingtalk.com".to_string()
}

fn default_attachment_host() -> String {
    "https://www.aliwork.com".to_string()
}

fn default_language() -> String {
    "zh_CN".to_string()
}

fn default_request_timeout() -> HumanDuration {
    HumanDuration::from_secs(10)
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> HumanDuration {
    HumanDuration::from_millis(1000)
}

fn default_temporary_url_expiry() -> HumanDuration {
    HumanDuration::from_secs(60)
}

fn default_token_refresh_margin() -> HumanDuration {
    HumanDuration::from_secs(10 * 60)
}

fn default_token_lifetime() -> HumanDuration {
    HumanDuration::from_secs(2 * 60 * 60)
}

/// Field identifiers inside the form schema
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FieldsConfig {
    #[serde(default)]
    pub name_field_id: String,
    /// When absent the search filter matches on name only.
    #[serde(default)]
    pub phone_field_id: Option<String>,
    #[serde(default)]
    pub attachment_field_id: String,
}

/// Query pipeline tunables
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    #[serde(default = "default_page_size")]
    pub max_page_size: u32,
    /// Window used when the caller omits `fromDate`.
    #[serde(default = "default_lookback")]
    pub default_lookback: HumanDuration,
    /// Temporary URL requests in flight per query; 1 is strictly sequential.
    #[serde(default = "default_url_mint_concurrency")]
    pub url_mint_concurrency: usize,
    #[serde(default)]
    pub validate_cached_token: bool,
    #[serde(default = "default_display_utc_offset_hours")]
    pub display_utc_offset_hours: i32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_page_size(),
            default_lookback: default_lookback(),
            url_mint_concurrency: default_url_mint_concurrency(),
            validate_cached_token: false,
            display_utc_offset_hours: default_display_utc_offset_hours(),
        }
    }
}

fn default_page_size() -> u32 {
    100
}

fn default_lookback() -> HumanDuration {
    HumanDuration::from_secs(30 * 24 * 60 * 60)
}

fn default_url_mint_concurrency() -> usize {
    1
}

fn default_display_utc_offset_hours() -> i32 {
    8
}

/// Lifecycle event webhook
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookConfig {
    /// Absent or blank disables notifications entirely.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub timeout: HumanDuration,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_base: HumanDuration,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default = "default_source")]
    pub source: String,
}

impl WebhookConfig {
    pub fn target(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|url| !url.is_empty())
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout: default_request_timeout(),
            max_retries: default_max_retries(),
            retry_delay_base: default_retry_delay(),
            queue_capacity: default_queue_capacity(),
            environment: default_environment(),
            source: default_source(),
        }
    }
}

fn default_queue_capacity() -> usize {
    256
}

fn default_environment() -> String {
    "production".to_string()
}

fn default_source() -> String {
    "report-lookup".to_string()
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            json_logs: false,
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}
