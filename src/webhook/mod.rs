//! Query lifecycle notifications.
//!
//! - [`events`] - event payloads and query correlation ids
//! - [`notifier`] - HTTP delivery with exponential backoff
//! - [`dispatcher`] - detached background delivery and drain on shutdown

pub mod dispatcher;
pub mod events;
pub mod notifier;

pub use dispatcher::{DispatcherHandle, EventSink, NoopSink, WebhookDispatcher};
pub use events::{
    EventMetadata, EventParameters, EventPhase, EventStatus, QueryTrace, ResultSummary,
    WebhookEvent, generate_query_id,
};
pub use notifier::{NotifierSettings, WebhookError, WebhookNotifier};
