//! HTTP trigger for the importer
//!
//! A deliberately small surface: start a run, read the current state, and a
//! health check. Record queries are out of scope.

use crate::{Config, ImportOrchestrator, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error_response;
pub mod routes;
pub mod state;

pub use state::AppState;

/// Create the API router
///
/// # Routes
///
/// - `POST /import` - Run an import and return its summary (409 if one is running)
/// - `GET /import/status` - Current state and last summary
/// - `GET /health` - Health check
pub fn create_router(
    orchestrator: Arc<ImportOrchestrator>,
    config: Arc<Config>,
    shutdown: CancellationToken,
) -> Router {
    let state = AppState::new(orchestrator, shutdown);

    let router = Router::new()
        .route("/import", post(routes::trigger_import))
        .route("/import/status", get(routes::import_status))
        .route("/health", get(routes::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.api.cors_enabled {
        router.layer(build_cors_layer(&config.api.cors_origins))
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins ("*" allows any)
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Serve the API on `config.api.bind_address` until `shutdown` fires
pub async fn start_api_server(
    orchestrator: Arc<ImportOrchestrator>,
    config: Arc<Config>,
    shutdown: CancellationToken,
) -> Result<()> {
    let bind_address = config.api.bind_address;
    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    serve(listener, orchestrator, config, shutdown).await
}

/// Serve the API on an already bound listener until `shutdown` fires
pub async fn serve(
    listener: TcpListener,
    orchestrator: Arc<ImportOrchestrator>,
    config: Arc<Config>,
    shutdown: CancellationToken,
) -> Result<()> {
    let address = listener.local_addr().map_err(crate::error::Error::Io)?;
    tracing::info!(address = %address, "API server listening");

    let app = create_router(orchestrator, config, shutdown.clone());

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
