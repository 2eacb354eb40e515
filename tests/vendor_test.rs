mod common;

use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{MockServer, NAME_FIELD, TOKEN, start_mock_vendor, test_config};
use report_lookup::config::Secret;
use report_lookup::vendor::{
    AccessToken, HttpConfig, HttpError, OutboundRequest, PageRequest, RetryingClient, TokenCache,
    TokenError, TokenManager, TokenProvider, TokenSettings, VendorApi, VendorClient,
    VendorSettings,
};

fn fast_client(max_retries: u32) -> RetryingClient {
    RetryingClient::new(HttpConfig {
        request_timeout: Duration::from_secs(5),
        max_retries,
        retry_delay: Duration::from_millis(10),
        ..HttpConfig::default()
    })
    .unwrap()
}

fn token_manager(mock: &MockServer, cache: Arc<TokenCache>) -> TokenManager {
    let config = test_config(&mock.base_url);
    TokenManager::new(fast_client(1), cache, TokenSettings::from_config(&config.vendor))
}

#[tokio::test]
async fn test_retry_budget_is_exhausted() {
    let mock = start_mock_vendor().await;
    let client = fast_client(3);

    let request = OutboundRequest::get(format!("{}/always-failing", mock.base_url));
    let err = client.send_json::<Value>(&request).await.unwrap_err();

    match err {
        HttpError::RequestFailed {
            status, attempts, ..
        } => {
            assert_eq!(status, Some(502));
            assert_eq!(attempts, 4);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(mock.state.always_failing_hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let mock = start_mock_vendor().await;
    mock.state.flaky_failures.store(2, Ordering::SeqCst);
    let client = fast_client(3);

    let request = OutboundRequest::get(format!("{}/flaky", mock.base_url));
    let body: Value = client.send_json(&request).await.unwrap();

    assert_eq!(body, json!({ "ok": true }));
    assert_eq!(mock.state.flaky_hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_unroutable_host_reports_transport_error() {
    let client = fast_client(0);

    let request = OutboundRequest::get("http://127.0.0.1:9/nothing");
    let err = client.send_json::<Value>(&request).await.unwrap_err();

    assert_eq!(err.status(), None);
    assert!(!err.is_unauthorized());
}

#[tokio::test]
async fn test_token_is_cached_between_acquires() {
    let mock = start_mock_vendor().await;
    let cache = Arc::new(TokenCache::new());
    let manager = token_manager(&mock, cache.clone());

    let first = manager.acquire().await.unwrap();
    let second = manager.acquire().await.unwrap();

    assert_eq!(first, AccessToken::new(TOKEN));
    assert_eq!(first, second);
    assert_eq!(mock.state.token_exchanges.load(Ordering::SeqCst), 1);
    assert_eq!(cache.size(), 1);
}

#[tokio::test]
async fn test_rejected_cached_token_is_replaced() {
    let mock = start_mock_vendor().await;
    let manager = token_manager(&mock, Arc::new(TokenCache::new()));

    manager.acquire().await.unwrap();
    mock.state.probe_status.store(401, Ordering::SeqCst);

    let token = manager.acquire_valid().await.unwrap();

    assert_eq!(token.as_str(), TOKEN);
    assert_eq!(mock.state.probes.load(Ordering::SeqCst), 1);
    assert_eq!(mock.state.token_exchanges.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_accepted_cached_token_is_kept() {
    let mock = start_mock_vendor().await;
    let manager = token_manager(&mock, Arc::new(TokenCache::new()));

    manager.acquire().await.unwrap();
    manager.acquire_valid().await.unwrap();

    assert_eq!(mock.state.probes.load(Ordering::SeqCst), 1);
    assert_eq!(mock.state.token_exchanges.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_bad_credentials_leave_cache_empty() {
    let mock = start_mock_vendor().await;
    let mut config = test_config(&mock.base_url);
    config.vendor.client_secret = Secret::new("wrong");

    let cache = Arc::new(TokenCache::new());
    let manager = TokenManager::new(
        fast_client(0),
        cache.clone(),
        TokenSettings::from_config(&config.vendor),
    );

    assert!(manager.acquire().await.is_err());
    assert_eq!(cache.size(), 0);
    assert_eq!(mock.state.token_exchanges.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_exchange_without_token_is_auth_failure() {
    let mock = start_mock_vendor().await;
    *mock.state.token_body.lock().unwrap() = Some(json!({ "expireIn": 7200 }));

    let cache = Arc::new(TokenCache::new());
    let manager = token_manager(&mock, cache.clone());

    let err = manager.acquire().await.unwrap_err();

    assert!(matches!(err, TokenError::AuthFailure(_)));
    assert_eq!(cache.size(), 0);
    // A 200 answer is not retried.
    assert_eq!(mock.state.token_exchanges.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_zero_lifetime_uses_default() {
    let mock = start_mock_vendor().await;
    *mock.state.token_body.lock().unwrap() =
        Some(json!({ "accessToken": TOKEN, "expireIn": 0 }));

    let cache = Arc::new(TokenCache::new());
    let manager = token_manager(&mock, cache.clone());

    manager.acquire().await.unwrap();
    manager.acquire().await.unwrap();

    assert_eq!(cache.size(), 1);
    assert_eq!(mock.state.token_exchanges.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_probe_error_code_rejects_token() {
    for code in ["InvalidToken", "InvalidAuthentication"] {
        let mock = start_mock_vendor().await;
        let manager = token_manager(&mock, Arc::new(TokenCache::new()));

        manager.acquire().await.unwrap();
        // 200 status, but the body says the token is no longer accepted.
        *mock.state.probe_code.lock().unwrap() = Some(code.to_string());

        manager.acquire_valid().await.unwrap();

        assert_eq!(mock.state.probes.load(Ordering::SeqCst), 1, "{code}");
        assert_eq!(mock.state.token_exchanges.load(Ordering::SeqCst), 2, "{code}");
    }
}

#[tokio::test]
async fn test_invalidate_forces_exchange() {
    let mock = start_mock_vendor().await;
    let manager = token_manager(&mock, Arc::new(TokenCache::new()));

    manager.acquire().await.unwrap();
    manager.invalidate();
    manager.acquire().await.unwrap();

    assert_eq!(mock.state.token_exchanges.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_vendor_client_round_trip() {
    let mock = start_mock_vendor().await;
    let config = test_config(&mock.base_url);
    let client = VendorClient::new(fast_client(0), VendorSettings::from_config(&config.vendor));
    let token = AccessToken::new(TOKEN);

    let mut filter = serde_json::Map::new();
    filter.insert(NAME_FIELD.to_string(), json!("张三"));
    let filter = Value::Object(filter);
    let listing = client
        .list_instance_ids(
            &token,
            &filter,
            PageRequest {
                page_number: 2,
                page_size: 10,
            },
        )
        .await
        .unwrap();
    let ids = listing.data.unwrap();
    assert_eq!(ids, vec!["FINST-1".to_string(), "FINST-2".to_string()]);
    assert_eq!(listing.page_number, Some(2));
    assert_eq!(listing.total_count, Some(2));

    let fetched = client.fetch_instances(&token, &ids).await.unwrap();
    let records = fetched.result.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["formInstanceId"], "FINST-1");

    let minted = client
        .mint_temporary_url(&token, "https://www.aliwork.com/ossFile/FINST-1.pdf")
        .await
        .unwrap();
    let url = minted.result.unwrap();
    assert!(url.contains("signed=1"));
    assert!(url.ends_with("timeout=60000"));
}

#[tokio::test]
async fn test_vendor_client_surfaces_unauthorized() {
    let mock = start_mock_vendor().await;
    let config = test_config(&mock.base_url);
    let client = VendorClient::new(fast_client(0), VendorSettings::from_config(&config.vendor));

    let err = client
        .fetch_instances(&AccessToken::new("stale"), &["FINST-1".to_string()])
        .await
        .unwrap_err();

    assert!(err.is_unauthorized());
}
