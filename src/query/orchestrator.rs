use chrono::{FixedOffset, Offset, Utc};
use futures::stream::{self, StreamExt};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{info, warn};

use super::QueryError;
use super::extract::extract_attachments;
use super::types::{AttachmentReport, AttachmentShell, QueryParameters, QueryResult};
use crate::config::Config;
use crate::observability::Metrics;
use crate::vendor::{AccessToken, HttpError, PageRequest, TokenProvider, VendorApi};
use crate::webhook::{EventSink, QueryTrace, WebhookEvent};

pub const NO_SOURCE_URL: &str = "attachment has no source url";

#[derive(Debug, Clone)]
pub struct QuerySettings {
    pub name_field_id: String,
    pub phone_field_id: Option<String>,
    pub attachment_field_id: String,
    pub attachment_host: String,
    /// Temporary URL requests in flight per query.
    pub url_mint_concurrency: usize,
    pub validate_cached_token: bool,
    pub display_offset: FixedOffset,
}

impl QuerySettings {
    pub fn from_config(config: &Config) -> Self {
        let display_offset = FixedOffset::east_opt(config.query.display_utc_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix());

        Self {
            name_field_id: config.fields.name_field_id.clone(),
            phone_field_id: config.fields.phone_field_id.clone(),
            attachment_field_id: config.fields.attachment_field_id.clone(),
            attachment_host: config.vendor.attachment_host.clone(),
            url_mint_concurrency: config.query.url_mint_concurrency,
            validate_cached_token: config.query.validate_cached_token,
            display_offset,
        }
    }
}

/// `{ <nameField>: name, <phoneField>: phone, gmtCreate: { fromDate, toDate } }`
pub fn build_search_filter(params: &QueryParameters, settings: &QuerySettings) -> Value {
    let mut filter = Map::new();
    filter.insert(
        settings.name_field_id.clone(),
        Value::String(params.search_name.clone()),
    );
    if let Some(phone_field) = &settings.phone_field_id {
        filter.insert(
            phone_field.clone(),
            Value::String(params.search_phone.clone()),
        );
    }
    filter.insert(
        "gmtCreate".to_string(),
        json!({
            "fromDate": params.from_date.timestamp_millis(),
            "toDate": params.to_date.timestamp_millis(),
        }),
    );
    Value::Object(filter)
}

enum Outcome {
    NoMatches,
    Completed(QueryResult),
}

pub struct QueryOrchestrator {
    tokens: Arc<dyn TokenProvider>,
    vendor: Arc<dyn VendorApi>,
    events: Arc<dyn EventSink>,
    metrics: Arc<Metrics>,
    settings: QuerySettings,
}

impl QueryOrchestrator {
    pub fn new(
        tokens: Arc<dyn TokenProvider>,
        vendor: Arc<dyn VendorApi>,
        events: Arc<dyn EventSink>,
        metrics: Arc<Metrics>,
        settings: QuerySettings,
    ) -> Self {
        Self {
            tokens,
            vendor,
            events,
            metrics,
            settings,
        }
    }

    /// Run one lookup. Never returns an error: pipeline failures come back
    /// as `success == false` with `error` set.
    pub async fn query_report_data(&self, params: &QueryParameters) -> QueryResult {
        let trace = QueryTrace::start();
        self.metrics.query_started();

        info!(
            query_id = %trace.query_id,
            page = params.current_page,
            page_size = params.page_size,
            "Starting report query"
        );
        self.events.publish(WebhookEvent::query_started(&trace, params));

        match self.run(params).await {
            Ok(Outcome::NoMatches) => {
                info!(query_id = %trace.query_id, "No matching form instances");
                self.metrics.query_empty();
                self.events.publish(WebhookEvent::query_no_results(&trace, params));
                QueryResult::empty(params)
            }
            Ok(Outcome::Completed(result)) => {
                info!(
                    query_id = %trace.query_id,
                    reports = result.data.len(),
                    downloadable = result.downloadable_count(),
                    elapsed_ms = trace.elapsed().as_millis() as u64,
                    "Report query completed"
                );
                self.metrics.query_succeeded();
                self.events
                    .publish(WebhookEvent::query_completed(&trace, params, &result));
                result
            }
            Err(e) => {
                warn!(query_id = %trace.query_id, error = %e, "Report query failed");
                self.metrics.query_failed();
                let message = e.to_string();
                self.events
                    .publish(WebhookEvent::query_failed(&trace, params, &message));
                QueryResult::failure(params, message)
            }
        }
    }

    async fn run(&self, params: &QueryParameters) -> Result<Outcome, QueryError> {
        let token = if self.settings.validate_cached_token {
            self.tokens.acquire_valid().await?
        } else {
            self.tokens.acquire().await?
        };

        let filter = build_search_filter(params, &self.settings);
        let page = PageRequest {
            page_number: params.current_page,
            page_size: params.page_size,
        };

        let listing = self
            .vendor
            .list_instance_ids(&token, &filter, page)
            .await
            .map_err(|e| self.vendor_failure(e, QueryError::ListFailure))?;

        let ids = listing.data.unwrap_or_default();
        if ids.is_empty() {
            return Ok(Outcome::NoMatches);
        }
        let total_count = listing.total_count.unwrap_or(ids.len() as u64);

        let fetched = self
            .vendor
            .fetch_instances(&token, &ids)
            .await
            .map_err(|e| self.vendor_failure(e, QueryError::BatchFetchFailure))?;

        let records = fetched.result.ok_or_else(|| {
            QueryError::BatchFetchFailure("response has no result array".to_string())
        })?;

        let shells = extract_attachments(
            &records,
            &self.settings.attachment_field_id,
            &self.settings.attachment_host,
            &self.settings.display_offset,
        );

        let data = self.mint_urls(&token, shells).await;

        Ok(Outcome::Completed(QueryResult {
            success: true,
            data,
            total_count,
            current_page: params.current_page,
            page_size: params.page_size,
            error: None,
        }))
    }

    /// Results keep the order of `shells` regardless of concurrency.
    async fn mint_urls(
        &self,
        token: &AccessToken,
        shells: Vec<AttachmentShell>,
    ) -> Vec<AttachmentReport> {
        let concurrency = self.settings.url_mint_concurrency.max(1);

        stream::iter(shells)
            .map(|shell| self.mint_one(token, shell))
            .buffered(concurrency)
            .collect::<Vec<_>>()
            .await
    }

    async fn mint_one(&self, token: &AccessToken, shell: AttachmentShell) -> AttachmentReport {
        if shell.original_url.is_empty() {
            self.metrics.url_failed();
            return shell.failed(NO_SOURCE_URL.to_string());
        }

        let failure = match self.vendor.mint_temporary_url(token, &shell.original_url).await {
            Ok(response) => match response.result.filter(|url| !url.is_empty()) {
                Some(url) => {
                    self.metrics.url_minted();
                    return shell.resolved(url);
                }
                None => QueryError::AttachmentUrlFailure("response has no result".to_string()),
            },
            Err(e) => self.vendor_failure(e, QueryError::AttachmentUrlFailure),
        };

        warn!(
            form_instance_id = %shell.form_instance_id,
            file_name = %shell.file_name,
            error = %failure,
            "Temporary url request failed"
        );
        self.metrics.url_failed();
        shell.failed(failure.to_string())
    }

    fn vendor_failure(&self, error: HttpError, wrap: fn(String) -> QueryError) -> QueryError {
        if error.is_unauthorized() {
            self.tokens.invalidate();
        }
        wrap(error.to_string())
    }
}
