use std::sync::Arc;
use thiserror::Error;

use crate::config::Config;
use crate::observability::Metrics;
use crate::query::{QueryOrchestrator, QuerySettings};
use crate::vendor::{
    HttpConfig, HttpError, RetryingClient, TokenCache, TokenManager, TokenSettings, VendorClient,
    VendorSettings,
};
use crate::webhook::{DispatcherHandle, NotifierSettings, WebhookDispatcher, WebhookError, WebhookNotifier};

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to build vendor client: {0}")]
    Vendor(#[from] HttpError),
    #[error("failed to build webhook notifier: {0}")]
    Webhook(#[from] WebhookError),
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<QueryOrchestrator>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: Config, orchestrator: QueryOrchestrator, metrics: Arc<Metrics>) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            metrics,
        }
    }

    /// Wire the production components. Must run inside a tokio runtime: the
    /// webhook worker is spawned here and stopped through the returned handle.
    pub fn from_config(config: Config) -> Result<(Self, DispatcherHandle), StateError> {
        let metrics = Arc::new(Metrics::new());

        let http = RetryingClient::new(HttpConfig {
            request_timeout: config.vendor.request_timeout.as_duration(),
            max_retries: config.vendor.max_retries,
            retry_delay: config.vendor.retry_delay.as_duration(),
            ..HttpConfig::default()
        })?;

        let tokens = TokenManager::new(
            http.clone(),
            Arc::new(TokenCache::new()),
            TokenSettings::from_config(&config.vendor),
        );
        let vendor = VendorClient::new(http, VendorSettings::from_config(&config.vendor));

        let notifier = WebhookNotifier::new(NotifierSettings::from_config(&config.webhook))?;
        let (dispatcher, handle) =
            WebhookDispatcher::spawn(notifier, config.webhook.queue_capacity, metrics.clone());

        let orchestrator = QueryOrchestrator::new(
            Arc::new(tokens),
            Arc::new(vendor),
            Arc::new(dispatcher),
            metrics.clone(),
            QuerySettings::from_config(&config),
        );

        Ok((Self::new(config, orchestrator, metrics), handle))
    }
}
