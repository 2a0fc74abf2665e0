//! Dashboard HTTP server.
//!
//! Binds the axum router, applies CORS for the dashboard origin, and serves
//! until interrupted.

use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};

use crate::error::AppError;
use crate::services::api::{api_routes, ApiState};

/// Serve the dashboard API on `addr` until ctrl-c.
pub async fn run_server(addr: &str, dashboard_origin: &str, state: ApiState) -> Result<(), AppError> {
    let origin = dashboard_origin
        .parse::<HeaderValue>()
        .map_err(|_| AppError::config(format!("Invalid dashboard origin: {}", dashboard_origin)))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api_routes().with_state(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind to {}: {}", addr, e)))?;

    tracing::info!("Dashboard API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolve when the process receives ctrl-c.
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("Failed to listen for shutdown signal");
    }
}
