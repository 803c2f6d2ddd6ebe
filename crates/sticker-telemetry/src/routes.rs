//! Scrape and health routes.

use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tower_http::trace::TraceLayer;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Create the telemetry router.
pub fn create_router(metrics_handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/metrics", get(move || async move { metrics_handle.render() }))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
}
