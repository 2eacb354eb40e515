//! Background delivery of webhook events.
//!
//! Publishers hand events to a bounded channel and return immediately. A
//! single worker task drains the channel and spawns one delivery per event,
//! so a slow endpoint never delays the next notification. Shutdown closes
//! the channel, drains what was already queued and waits for in-flight
//! deliveries to finish their retry budget.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use super::events::WebhookEvent;
use super::notifier::WebhookNotifier;
use crate::observability::Metrics;

/// Destination for lifecycle events. Publishing never blocks and never fails.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: WebhookEvent);
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn publish(&self, _event: WebhookEvent) {}
}

pub struct WebhookDispatcher {
    sender: Option<mpsc::Sender<WebhookEvent>>,
    metrics: Arc<Metrics>,
}

/// Owned by the process entry point. Dropping it stops the worker without
/// waiting for queued deliveries.
pub struct DispatcherHandle {
    shutdown: Option<oneshot::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl WebhookDispatcher {
    /// Start the worker task. A disabled notifier yields a dispatcher that
    /// drops events at the door.
    pub fn spawn(
        notifier: WebhookNotifier,
        capacity: usize,
        metrics: Arc<Metrics>,
    ) -> (Self, DispatcherHandle) {
        if !notifier.is_enabled() {
            let dispatcher = Self {
                sender: None,
                metrics,
            };
            let handle = DispatcherHandle {
                shutdown: None,
                worker: None,
            };
            return (dispatcher, handle);
        }

        let (tx, rx) = mpsc::channel(capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        info!(capacity, "Starting webhook dispatcher");
        let worker = tokio::spawn(run_worker(
            Arc::new(notifier),
            rx,
            shutdown_rx,
            metrics.clone(),
        ));

        let dispatcher = Self {
            sender: Some(tx),
            metrics,
        };
        let handle = DispatcherHandle {
            shutdown: Some(shutdown_tx),
            worker: Some(worker),
        };

        (dispatcher, handle)
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }
}

impl EventSink for WebhookDispatcher {
    fn publish(&self, event: WebhookEvent) {
        let Some(sender) = &self.sender else {
            return;
        };

        if let Err(e) = sender.try_send(event) {
            let reason = match &e {
                mpsc::error::TrySendError::Full(_) => "queue full",
                mpsc::error::TrySendError::Closed(_) => "dispatcher stopped",
            };
            let event = e.into_inner();
            warn!(query_id = %event.query_id, reason, "Dropping webhook event");
            self.metrics.webhook_dropped();
        }
    }
}

impl DispatcherHandle {
    /// Stop accepting events, deliver what is queued and wait for
    /// in-flight deliveries.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                warn!(error = %e, "Webhook dispatcher task ended abnormally");
            }
        }
    }
}

async fn run_worker(
    notifier: Arc<WebhookNotifier>,
    mut rx: mpsc::Receiver<WebhookEvent>,
    mut shutdown: oneshot::Receiver<()>,
    metrics: Arc<Metrics>,
) {
    let mut deliveries = JoinSet::new();

    loop {
        tokio::select! {
            maybe_event = rx.recv() => {
                let Some(event) = maybe_event else { break };
                spawn_delivery(&mut deliveries, &notifier, &metrics, event);
            }
            _ = &mut shutdown => {
                debug!("Webhook dispatcher shutdown requested");
                break;
            }
            Some(_) = deliveries.join_next(), if !deliveries.is_empty() => {}
        }
    }

    rx.close();
    while let Some(event) = rx.recv().await {
        spawn_delivery(&mut deliveries, &notifier, &metrics, event);
    }

    let pending = deliveries.len();
    if pending > 0 {
        info!(pending, "Waiting for in-flight webhook deliveries");
    }
    while deliveries.join_next().await.is_some() {}

    info!("Webhook dispatcher stopped");
}

fn spawn_delivery(
    deliveries: &mut JoinSet<()>,
    notifier: &Arc<WebhookNotifier>,
    metrics: &Arc<Metrics>,
    event: WebhookEvent,
) {
    let notifier = notifier.clone();
    let metrics = metrics.clone();

    deliveries.spawn(async move {
        if notifier.send_notification(&event).await {
            metrics.webhook_delivered();
        } else {
            metrics.webhook_dropped();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryParameters;
    use crate::webhook::{NotifierSettings, QueryTrace};
    use axum::{Router, extract::State, http::StatusCode, routing::post};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::net::TcpListener;

    fn event() -> WebhookEvent {
        let params = QueryParameters {
            search_name: "李四".into(),
            search_phone: "13900139000".into(),
            from_date: chrono::Utc::now(),
            to_date: chrono::Utc::now(),
            page_size: 10,
            current_page: 1,
        };
        WebhookEvent::query_started(&QueryTrace::start(), &params)
    }

    fn notifier(url: Option<String>) -> WebhookNotifier {
        WebhookNotifier::new(NotifierSettings {
            url,
            timeout: Duration::from_secs(2),
            max_retries: 0,
            retry_delay_base: Duration::from_millis(1),
            source: "report-lookup".into(),
            environment: "test".into(),
        })
        .unwrap()
    }

    async fn start_counting_receiver(delay: Duration) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));

        let app = Router::new()
            .route(
                "/hook",
                post(move |State(hits): State<Arc<AtomicUsize>>| async move {
                    tokio::time::sleep(delay).await;
                    hits.fetch_add(1, Ordering::SeqCst);
                    StatusCode::NO_CONTENT
                }),
            )
            .with_state(hits.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}/hook"), hits)
    }

    #[tokio::test]
    async fn test_disabled_dispatcher_drops_silently() {
        let metrics = Arc::new(Metrics::new());
        let (dispatcher, handle) = WebhookDispatcher::spawn(notifier(None), 4, metrics.clone());

        assert!(!dispatcher.is_enabled());
        dispatcher.publish(event());
        handle.shutdown().await;

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.webhooks_delivered, 0);
        assert_eq!(snapshot.webhooks_dropped, 0);
    }

    #[tokio::test]
    async fn test_shutdown_drains_queued_events() {
        let (url, hits) = start_counting_receiver(Duration::from_millis(20)).await;
        let metrics = Arc::new(Metrics::new());
        let (dispatcher, handle) = WebhookDispatcher::spawn(notifier(Some(url)), 16, metrics.clone());

        for _ in 0..3 {
            dispatcher.publish(event());
        }
        handle.shutdown().await;

        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(metrics.snapshot().webhooks_delivered, 3);
    }

    #[tokio::test]
    async fn test_publish_after_shutdown_is_dropped() {
        let (url, hits) = start_counting_receiver(Duration::ZERO).await;
        let metrics = Arc::new(Metrics::new());
        let (dispatcher, handle) = WebhookDispatcher::spawn(notifier(Some(url)), 4, metrics.clone());

        handle.shutdown().await;
        dispatcher.publish(event());

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(metrics.snapshot().webhooks_dropped, 1);
    }
}
