//! HTTP handlers for the publication surface.
//!
//! Every handler copies values out of the store and releases the lock before
//! encoding; nothing is recomputed on scrape.

use crate::error::{Result, SystemError};
use crate::metrics::data::{MetricType, StoreSnapshot};
use crate::web::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use prometheus::{Counter, Encoder, Gauge, Registry, TextEncoder};
use serde_json::json;
use tracing::error;

/// Encode a store snapshot in the Prometheus text exposition format.
pub fn render_prometheus(snapshot: &StoreSnapshot) -> Result<String> {
    let registry = Registry::new();
    let exposition_error = |e: prometheus::Error| SystemError::web_server_error(e.to_string());

    for sample in &snapshot.metrics {
        match sample.metric_type {
            MetricType::Gauge => {
                let gauge = Gauge::new(sample.name.as_str(), sample.help.as_str())
                    .map_err(exposition_error)?;
                gauge.set(sample.value);
                registry
                    .register(Box::new(gauge))
                    .map_err(exposition_error)?;
            }
            MetricType::Counter => {
                let counter = Counter::new(sample.name.as_str(), sample.help.as_str())
                    .map_err(exposition_error)?;
                counter.inc_by(sample.value);
                registry
                    .register(Box::new(counter))
                    .map_err(exposition_error)?;
            }
        }
    }

    register_process_metrics(&registry)?;

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .map_err(exposition_error)?;
    String::from_utf8(buffer).map_err(|e| SystemError::web_server_error(e.to_string()))
}

/// The exporter's own cpu, memory, fds and start time.
#[cfg(target_os = "linux")]
fn register_process_metrics(registry: &Registry) -> Result<()> {
    registry
        .register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))
        .map_err(|e| SystemError::web_server_error(e.to_string()))
}

#[cfg(not(target_os = "linux"))]
fn register_process_metrics(_registry: &Registry) -> Result<()> {
    Ok(())
}

/// Prometheus scrape endpoint.
pub async fn get_metrics(State(state): State<AppState>) -> Response {
    let rendered = state
        .store
        .read_all()
        .and_then(|snapshot| render_prometheus(&snapshot));

    match rendered {
        Ok(body) => (
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Current store contents as JSON.
pub async fn get_snapshot(
    State(state): State<AppState>,
) -> std::result::Result<Json<StoreSnapshot>, StatusCode> {
    state.store.read_all().map(Json).map_err(|e| {
        error!("Failed to read metric store: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Active configuration vector.
pub async fn get_config(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "enabled": state.config.enabled_kinds(),
        "interval_secs": state.config.interval_secs(),
        "flags": state.config.to_flags(),
    }))
}

/// Health check endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "syswatch",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
