use axum::{Json, extract::State, http::HeaderMap, response::IntoResponse};
use chrono::{SecondsFormat, Utc};
use tracing::{debug, info};

use super::{
    models::{
        HealthResponse, Pagination, QueryReportsRequest, QueryReportsResponse, ReportItem, Summary,
    },
    state::AppState,
    utils::{MAX_PAYLOAD_SIZE, read_body, require_json_content_type},
    validation::build_query_parameters,
};
use crate::api::error::ApiError;

pub const NO_RESULTS_MESSAGE: &str = "no matching reports found";

/// Report lookup endpoint (POST /api/query-reports)
///
/// ## Flow:
/// 1. Require a JSON body and decode it
/// 2. Validate name and phone, fill paging and date-window defaults
/// 3. Run the lookup pipeline
/// 4. Shape the result: items, pagination and a valid/error summary
///
/// A pipeline failure becomes a 500 with the cause in `error`; individual
/// attachments that could not be given a URL are reported inline.
pub async fn query_reports(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ApiError> {
    require_json_content_type(&headers)?;

    let body_bytes = read_body(body, MAX_PAYLOAD_SIZE).await?;
    let request: QueryReportsRequest = serde_json::from_slice(&body_bytes)?;

    let params = build_query_parameters(request, &state.config.query, Utc::now())?;
    debug!(
        page = params.current_page,
        page_size = params.page_size,
        "Report query accepted"
    );

    let result = state.orchestrator.query_report_data(&params).await;

    if !result.success {
        let cause = result
            .error
            .unwrap_or_else(|| "report query failed".to_string());
        return Err(ApiError::QueryFailed(cause));
    }

    if result.data.is_empty() {
        return Ok(Json(QueryReportsResponse {
            success: true,
            data: Vec::new(),
            pagination: None,
            summary: None,
            total_count: Some(0),
            message: NO_RESULTS_MESSAGE.to_string(),
        }));
    }

    let data: Vec<ReportItem> = result.data.iter().map(ReportItem::from).collect();
    let valid = data.iter().filter(|item| item.download_url.is_some()).count();
    let errors = data.iter().filter(|item| item.error.is_some()).count();

    info!(reports = data.len(), valid, errors, "Report query answered");

    let message = format!(
        "found {} reports, {} on this page, {} downloadable",
        result.total_count,
        data.len(),
        valid
    );

    Ok(Json(QueryReportsResponse {
        success: true,
        pagination: Some(Pagination::new(
            result.current_page,
            result.page_size,
            result.total_count,
        )),
        summary: Some(Summary {
            total: data.len(),
            valid,
            errors,
        }),
        data,
        total_count: None,
        message,
    }))
}

/// Health check endpoint (GET /health)
///
/// Always 200 while the process can answer; counters are included for
/// operators.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        version: env!("CARGO_PKG_VERSION"),
        metrics: state.metrics.snapshot(),
    })
}
