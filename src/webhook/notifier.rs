//! Webhook delivery with exponential backoff

use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::events::WebhookEvent;
use crate::config::WebhookConfig;

pub const USER_AGENT: &str = concat!("report-lookup-webhook/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("failed to build webhook client: {0}")]
    Build(String),

    #[error("webhook request failed: {0}")]
    Transport(String),

    #[error("webhook endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Clone)]
pub struct NotifierSettings {
    /// `None` disables delivery.
    pub url: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay_base: Duration,
    pub source: String,
    pub environment: String,
}

impl NotifierSettings {
    pub fn from_config(webhook: &WebhookConfig) -> Self {
        Self {
            url: webhook.target().map(str::to_string),
            timeout: webhook.timeout.as_duration(),
            max_retries: webhook.max_retries,
            retry_delay_base: webhook.retry_delay_base.as_duration(),
            source: webhook.source.clone(),
            environment: webhook.environment.clone(),
        }
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.retry_delay_base.saturating_mul(factor)
    }
}

#[derive(Debug, Serialize)]
struct SystemInfo<'a> {
    source: &'a str,
    version: &'static str,
    environment: &'a str,
}

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    #[serde(flatten)]
    event: &'a WebhookEvent,
    system: SystemInfo<'a>,
}

#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    settings: NotifierSettings,
}

impl WebhookNotifier {
    pub fn new(settings: NotifierSettings) -> Result<Self, WebhookError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| WebhookError::Build(e.to_string()))?;

        if settings.url.is_none() {
            info!("Webhook URL not configured, notifications disabled");
        }

        Ok(Self { client, settings })
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.url.is_some()
    }

    /// Deliver `event`, retrying with exponential backoff. Never fails:
    /// the return value only says whether delivery succeeded. A disabled
    /// notifier reports success without doing anything.
    pub async fn send_notification(&self, event: &WebhookEvent) -> bool {
        let Some(url) = self.settings.url.as_deref() else {
            return true;
        };

        let envelope = Envelope {
            event,
            system: SystemInfo {
                source: &self.settings.source,
                version: env!("CARGO_PKG_VERSION"),
                environment: &self.settings.environment,
            },
        };

        let mut attempt = 0;
        loop {
            match self.post(url, &envelope).await {
                Ok(()) => {
                    info!(query_id = %event.query_id, status = ?event.status, "Webhook delivered");
                    return true;
                }
                Err(e) if attempt < self.settings.max_retries => {
                    let delay = self.settings.retry_delay(attempt);
                    warn!(
                        query_id = %event.query_id,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Webhook delivery failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(
                        query_id = %event.query_id,
                        max_retries = self.settings.max_retries,
                        error = %e,
                        "Webhook delivery abandoned"
                    );
                    return false;
                }
            }
        }
    }

    async fn post(&self, url: &str, envelope: &Envelope<'_>) -> Result<(), WebhookError> {
        debug!(url, "Posting webhook");

        let response = self
            .client
            .post(url)
            .json(envelope)
            .send()
            .await
            .map_err(|e| WebhookError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(WebhookError::Status {
            status: status.as_u16(),
            body,
        })
    }
}
