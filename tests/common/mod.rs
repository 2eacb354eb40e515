//! In-process stand-in for the form platform API.
//!
//! Behaviour is keyed on the searched name so one server can serve every
//! scenario:
//! - `无结果` matches nothing
//! - `李四` matches two instances whose second attachment cannot be signed
//! - anything else matches two instances that sign cleanly

#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::time::Duration;

use report_lookup::config::{Config, Secret};
use report_lookup::humanize::HumanDuration;

pub const TOKEN: &str = "mock-access-token";
pub const NAME_FIELD: &str = "textField_name";
pub const PHONE_FIELD: &str = "textField_phone";
pub const ATTACHMENT_FIELD: &str = "attachmentField_report";
pub const APP_TYPE: &str = "APP_TEST";
pub const FORM_UUID: &str = "FORM-TEST";

#[derive(Default)]
pub struct MockVendor {
    pub token_exchanges: AtomicUsize,
    pub probes: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
    pub mint_calls: AtomicUsize,
    /// Status the probe endpoint answers with; 0 means 200.
    pub probe_status: AtomicU16,
    /// Status the listing endpoint answers with; 0 means normal behaviour.
    pub list_status: AtomicU16,
    /// Replaces the body of a successful token exchange.
    pub token_body: Mutex<Option<Value>>,
    /// Error code attached to an otherwise successful probe answer.
    pub probe_code: Mutex<Option<String>>,
    /// Remaining failures of `/flaky` before it succeeds.
    pub flaky_failures: AtomicUsize,
    pub flaky_hits: AtomicUsize,
    pub always_failing_hits: AtomicUsize,
}

pub struct MockServer {
    pub base_url: String,
    pub state: Arc<MockVendor>,
}

pub async fn start_mock_vendor() -> MockServer {
    let state = Arc::new(MockVendor::default());

    let app = Router::new()
        .route("/v1.0/oauth2/accessToken", post(exchange_token))
        .route("/v1.0/contact/users/me", get(probe))
        .route(
            "/v2.0/yida/forms/instances/ids/{app_type}/{form_uuid}",
            post(list_instances),
        )
        .route("/v1.0/yida/forms/instances/ids/query", post(batch_fetch))
        .route("/v1.0/yida/apps/temporaryUrls/{app_type}", get(temporary_url))
        .route("/flaky", get(flaky))
        .route("/always-failing", get(always_failing))
        .with_state(state.clone());

    let addr = SocketAddr::from(([127, 0, 0, 1], 0));
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    let bound_addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockServer {
        base_url: format!("http://{}", bound_addr),
        state,
    }
}

/// Valid configuration pointing at `base_url`, with short retry delays.
pub fn test_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.vendor.api_base_url = base_url.to_string();
    config.vendor.client_id = Secret::new("ding-app");
    config.vendor.client_secret = Secret::new("s3cret");
    config.vendor.system_token = Secret::new("sys-token");
    config.vendor.app_type = APP_TYPE.to_string();
    config.vendor.form_uuid = FORM_UUID.to_string();
    config.vendor.user_id = "manager1".to_string();
    config.vendor.max_retries = 1;
    config.vendor.retry_delay = HumanDuration(Duration::from_millis(10));
    config.vendor.request_timeout = HumanDuration(Duration::from_secs(5));
    config.fields.name_field_id = NAME_FIELD.to_string();
    config.fields.phone_field_id = Some(PHONE_FIELD.to_string());
    config.fields.attachment_field_id = ATTACHMENT_FIELD.to_string();
    config
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("x-acs-dingtalk-access-token")
        .and_then(|v| v.to_str().ok())
        == Some(TOKEN)
}

async fn exchange_token(State(state): State<Arc<MockVendor>>, Json(body): Json<Value>) -> impl IntoResponse {
    state.token_exchanges.fetch_add(1, Ordering::SeqCst);

    if body["appKey"] != "ding-app" || body["appSecret"] != "s3cret" {
        return (StatusCode::BAD_REQUEST, Json(json!({ "code": "invalidClient" })));
    }

    let body = state
        .token_body
        .lock()
        .unwrap()
        .clone()
        .unwrap_or_else(|| json!({ "accessToken": TOKEN, "expireIn": 7200 }));

    (StatusCode::OK, Json(body))
}

async fn probe(State(state): State<Arc<MockVendor>>, headers: HeaderMap) -> impl IntoResponse {
    state.probes.fetch_add(1, Ordering::SeqCst);

    let code = state.probe_code.lock().unwrap().clone();

    match state.probe_status.load(Ordering::SeqCst) {
        0 if authorized(&headers) => match code {
            Some(code) => (StatusCode::OK, Json(json!({ "code": code }))),
            None => (StatusCode::OK, Json(json!({ "nick": "manager" }))),
        },
        0 => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "code": "InvalidAuthentication" })),
        ),
        status => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::UNAUTHORIZED),
            Json(json!({ "code": "InvalidAuthentication" })),
        ),
    }
}

async fn list_instances(
    State(state): State<Arc<MockVendor>>,
    Path((app_type, form_uuid)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state.list_calls.fetch_add(1, Ordering::SeqCst);

    let forced = state.list_status.load(Ordering::SeqCst);
    if forced != 0 {
        return (
            StatusCode::from_u16(forced).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(json!({ "code": "Forced" })),
        );
    }

    if !authorized(&headers) || app_type != APP_TYPE || form_uuid != FORM_UUID {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "code": "InvalidToken" })));
    }

    let filter: Value = body["searchFieldJson"]
        .as_str()
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or(Value::Null);

    let ids: Vec<String> = match filter[NAME_FIELD].as_str() {
        Some("无结果") => vec![],
        Some("李四") => vec!["FINST-L1".into(), "FINST-L2".into()],
        _ => vec!["FINST-1".into(), "FINST-2".into()],
    };

    let page_number: u32 = query
        .get("pageNumber")
        .and_then(|p| p.parse().ok())
        .unwrap_or(1);

    (
        StatusCode::OK,
        Json(json!({ "pageNumber": page_number, "totalCount": ids.len(), "data": ids })),
    )
}

async fn batch_fetch(
    State(state): State<Arc<MockVendor>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state.batch_calls.fetch_add(1, Ordering::SeqCst);

    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "code": "InvalidToken" })));
    }

    let ids: Vec<String> = body["formInstanceIdList"]
        .as_array()
        .map(|ids| ids.iter().filter_map(|id| id.as_str().map(str::to_string)).collect())
        .unwrap_or_default();

    let records: Vec<Value> = ids
        .iter()
        .map(|id| {
            // The second "李四" record points at an attachment that cannot be signed.
            let path = if id == "FINST-L2" {
                format!("/ossFile/broken/{id}.pdf")
            } else {
                format!("/ossFile/{id}.pdf")
            };
            let field_map = json!([
                { "fieldId": NAME_FIELD, "fieldData": { "value": "张三" } },
                { "fieldId": ATTACHMENT_FIELD, "fieldData": { "value": [
                    { "name": format!("{id}.pdf"), "downloadUrl": path, "size": 4096 }
                ] } }
            ]);
            json!({
                "formInstanceId": id,
                "createTimeGMT": "2024-05-01T10:00Z",
                "instanceValue": field_map.to_string(),
            })
        })
        .collect();

    (StatusCode::OK, Json(json!({ "result": records })))
}

async fn temporary_url(
    State(state): State<Arc<MockVendor>>,
    Path(app_type): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    state.mint_calls.fetch_add(1, Ordering::SeqCst);

    if !authorized(&headers) || app_type != APP_TYPE {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "code": "InvalidToken" })));
    }

    let file_url = query.get("fileUrl").cloned().unwrap_or_default();
    if file_url.contains("/broken/") {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "code": "FileNotFound" })),
        );
    }

    let timeout = query.get("timeout").cloned().unwrap_or_default();
    (
        StatusCode::OK,
        Json(json!({ "result": format!("{file_url}?signed=1&timeout={timeout}") })),
    )
}

async fn flaky(State(state): State<Arc<MockVendor>>) -> impl IntoResponse {
    state.flaky_hits.fetch_add(1, Ordering::SeqCst);

    let remaining = state.flaky_failures.load(Ordering::SeqCst);
    if remaining > 0 {
        state.flaky_failures.store(remaining - 1, Ordering::SeqCst);
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "ok": false })));
    }

    (StatusCode::OK, Json(json!({ "ok": true })))
}

async fn always_failing(State(state): State<Arc<MockVendor>>) -> impl IntoResponse {
    state.always_failing_hits.fetch_add(1, Ordering::SeqCst);
    (StatusCode::BAD_GATEWAY, Json(json!({ "ok": false })))
}
