//! Prometheus metrics
//!
//! Installs the global `metrics` recorder and renders it at `/metrics`.

use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder; later calls return the same handle
pub fn init_metrics() -> Option<PrometheusHandle> {
    if let Some(handle) = HANDLE.get() {
        return Some(handle.clone());
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = HANDLE.set(handle.clone());
            describe_metrics();
            Some(handle)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install Prometheus recorder");
            None
        }
    }
}

pub fn describe_metrics() {
    metrics::describe_counter!("sommelier_queries_total", "Queries answered, by category");
    metrics::describe_counter!(
        "sommelier_fallbacks_total",
        "Degraded paths taken, by pipeline stage"
    );
    metrics::describe_counter!(
        "sommelier_persist_failures_total",
        "Turns that could not be written to the memory store"
    );
    metrics::describe_histogram!(
        "sommelier_query_duration_ms",
        metrics::Unit::Milliseconds,
        "End-to-end query latency"
    );
}

/// GET /metrics
pub async fn metrics_handler() -> impl IntoResponse {
    match HANDLE.get() {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            "metrics disabled\n".to_string(),
        ),
    }
}
