use std::net::SocketAddr;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tracing::info;

use super::{
    services::{health, query_reports},
    state::AppState,
};
use crate::config::Config;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All routes with their middleware.
pub fn router(state: AppState) -> Router {
    let max_concurrent = state.config.server.max_concurrent_queries;
    let allow_any_origin = state.config.server.cors_allow_any_origin;

    // Requests past the limit wait for a slot rather than fanning out more
    // vendor traffic.
    let api = Router::new()
        .route("/api/query-reports", post(query_reports))
        .layer(ConcurrencyLimitLayer::new(max_concurrent));

    let app = Router::new()
        .merge(api)
        .route("/health", get(health))
        .with_state(state)
        // Automatically decompress gzip request bodies
        .layer(RequestDecompressionLayer::new());

    if allow_any_origin {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

pub async fn run(config: Config, address: Option<SocketAddr>) -> Result<(), AnyError> {
    let address = address.unwrap_or(config.server.bind_addr);

    let (state, dispatcher) =
        AppState::from_config(config).map_err(|e| format!("Failed to initialise: {}", e))?;

    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "Report lookup API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, draining webhook notifications");
    dispatcher.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
