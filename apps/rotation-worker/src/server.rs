//! Operational endpoints
//!
//! Liveness, readiness, and metrics exposition. These carry no worker
//! logic; they exist for the orchestrator and the scrape target.

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::metrics::RotationMetrics;

pub const HEALTH_PATH: &str = "/healthz";
pub const READY_PATH: &str = "/readyz";
pub const METRICS_PATH: &str = "/metrics";

const OPENMETRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

async fn health_check() -> &'static str {
    "OK"
}

async fn ready_check() -> &'static str {
    "OK"
}

async fn export_metrics(State(metrics): State<Arc<RotationMetrics>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)],
        metrics.encode(),
    )
}

pub fn router(metrics: Arc<RotationMetrics>) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health_check))
        .route(READY_PATH, get(ready_check))
        .route(METRICS_PATH, get(export_metrics))
        .with_state(metrics)
}

/// Serve the operational endpoints until shutdown.
pub async fn serve(
    host: &str,
    metrics: Arc<RotationMetrics>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(host).await?;
    tracing::info!(host = %host, "operational endpoints listening");

    axum::serve(listener, router(metrics))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
