//! Lifecycle events reported for each query

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::query::{QueryParameters, QueryResult};

pub const MESSAGE_TYPE: &str = "search";

/// `query_<epochMillis>_<8 hex chars>`, unique per inbound request.
pub fn generate_query_id(at: DateTime<Utc>) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("query_{}_{}", at.timestamp_millis(), &random[..8])
}

/// Correlation state threaded through the events of one query.
///
/// The start instant is carried explicitly; nothing parses it back out of
/// the id.
#[derive(Debug, Clone)]
pub struct QueryTrace {
    pub query_id: String,
    pub started_at: DateTime<Utc>,
    started: Instant,
}

impl QueryTrace {
    pub fn start() -> Self {
        let started_at = Utc::now();
        Self {
            query_id: generate_query_id(started_at),
            started_at,
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Started,
    Success,
    Partial,
    Error,
    NoResults,
}

impl EventStatus {
    /// Status of a successful pipeline run, judged by how many reports
    /// received a download URL.
    pub fn for_completed(result: &QueryResult) -> Self {
        let total = result.data.len();
        let downloadable = result.downloadable_count();

        if total == 0 {
            EventStatus::NoResults
        } else if downloadable == total {
            EventStatus::Success
        } else if downloadable == 0 {
            EventStatus::Error
        } else {
            EventStatus::Partial
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPhase {
    QueryStart,
    QueryComplete,
    QueryFailed,
    QueryNoResults,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventParameters {
    pub search_type: &'static str,
    pub name: String,
    pub phone: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub from_date: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub to_date: DateTime<Utc>,
    pub page_size: u32,
    pub current_page: u32,
}

impl From<&QueryParameters> for EventParameters {
    fn from(params: &QueryParameters) -> Self {
        Self {
            search_type: "nameAndPhone",
            name: params.search_name.clone(),
            phone: params.search_phone.clone(),
            from_date: params.from_date,
            to_date: params.to_date,
            page_size: params.page_size,
            current_page: params.current_page,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub total_count: u64,
    pub report_count: usize,
    pub valid_count: usize,
    pub error_count: usize,
}

impl From<&QueryResult> for ResultSummary {
    fn from(result: &QueryResult) -> Self {
        Self {
            total_count: result.total_count,
            report_count: result.data.len(),
            valid_count: result.downloadable_count(),
            error_count: result.failed_count(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    pub phase: EventPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
}

/// Body of one webhook notification, minus the `system` block the
/// notifier appends.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub message_type: &'static str,
    pub query_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub status: EventStatus,
    pub parameters: EventParameters,
    pub result_summary: ResultSummary,
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub metadata: EventMetadata,
}

impl WebhookEvent {
    fn new(
        trace: &QueryTrace,
        params: &QueryParameters,
        status: EventStatus,
        phase: EventPhase,
    ) -> Self {
        let processing_time_ms = match phase {
            EventPhase::QueryStart => None,
            _ => Some(u64::try_from(trace.elapsed().as_millis()).unwrap_or(u64::MAX)),
        };

        Self {
            message_type: MESSAGE_TYPE,
            query_id: trace.query_id.clone(),
            timestamp: Utc::now(),
            status,
            parameters: params.into(),
            result_summary: ResultSummary::default(),
            user_id: None,
            error_message: None,
            metadata: EventMetadata {
                phase,
                processing_time_ms,
            },
        }
    }

    pub fn query_started(trace: &QueryTrace, params: &QueryParameters) -> Self {
        Self::new(trace, params, EventStatus::Started, EventPhase::QueryStart)
    }

    pub fn query_completed(
        trace: &QueryTrace,
        params: &QueryParameters,
        result: &QueryResult,
    ) -> Self {
        let mut event = Self::new(
            trace,
            params,
            EventStatus::for_completed(result),
            EventPhase::QueryComplete,
        );
        event.result_summary = result.into();
        event
    }

    pub fn query_no_results(trace: &QueryTrace, params: &QueryParameters) -> Self {
        Self::new(trace, params, EventStatus::NoResults, EventPhase::QueryNoResults)
    }

    pub fn query_failed(trace: &QueryTrace, params: &QueryParameters, error: &str) -> Self {
        let mut event = Self::new(trace, params, EventStatus::Error, EventPhase::QueryFailed);
        event.error_message = Some(error.to_string());
        event
    }
}
