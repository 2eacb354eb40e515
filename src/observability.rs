//! Tracing setup and in-process counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::TelemetryConfig;

/// Install the global subscriber. `RUST_LOG` wins over the configured filter.
pub fn init_tracing(telemetry: &TelemetryConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&telemetry.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    if telemetry.json_logs {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    queries_started: AtomicU64,
    queries_succeeded: AtomicU64,
    queries_failed: AtomicU64,
    queries_empty: AtomicU64,
    urls_minted: AtomicU64,
    url_failures: AtomicU64,
    webhooks_delivered: AtomicU64,
    webhooks_dropped: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query_started(&self) {
        self.queries_started.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "queries_started", "Metric incremented");
    }

    pub fn query_succeeded(&self) {
        self.queries_succeeded.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "queries_succeeded", "Metric incremented");
    }

    pub fn query_failed(&self) {
        self.queries_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "queries_failed", "Metric incremented");
    }

    pub fn query_empty(&self) {
        self.queries_empty.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "queries_empty", "Metric incremented");
    }

    pub fn url_minted(&self) {
        self.urls_minted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn url_failed(&self) {
        self.url_failures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "url_failures", "Metric incremented");
    }

    pub fn webhook_delivered(&self) {
        self.webhooks_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn webhook_dropped(&self) {
        self.webhooks_dropped.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "webhooks_dropped", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries_started: self.queries_started.load(Ordering::Relaxed),
            queries_succeeded: self.queries_succeeded.load(Ordering::Relaxed),
            queries_failed: self.queries_failed.load(Ordering::Relaxed),
            queries_empty: self.queries_empty.load(Ordering::Relaxed),
            urls_minted: self.urls_minted.load(Ordering::Relaxed),
            url_failures: self.url_failures.load(Ordering::Relaxed),
            webhooks_delivered: self.webhooks_delivered.load(Ordering::Relaxed),
            webhooks_dropped: self.webhooks_dropped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub queries_started: u64,
    pub queries_succeeded: u64,
    pub queries_failed: u64,
    pub queries_empty: u64,
    pub urls_minted: u64,
    pub url_failures: u64,
    pub webhooks_delivered: u64,
    pub webhooks_dropped: u64,
}
