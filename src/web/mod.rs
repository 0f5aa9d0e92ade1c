//! Publication surface: serves the metric store over HTTP.
//!
//! `/metrics` is the Prometheus scrape endpoint; `/api/*` expose the same
//! values as JSON along with the active configuration and a health check.

pub mod config;
pub mod handlers;
pub mod router;

// Re-export commonly used items
pub use config::WebConfig;
pub use router::create_app;

use crate::config::ConfigVector;
use crate::error::{Result, SystemError};
use crate::metrics::store::MetricStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// State shared with every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: Arc<MetricStore>,
    pub config: ConfigVector,
}

/// Serve the store until `cancel` fires.
pub async fn start_web_server(
    config: WebConfig,
    store: Arc<MetricStore>,
    vector: ConfigVector,
    cancel: CancellationToken,
) -> Result<()> {
    let app = create_app(
        &config,
        AppState {
            store,
            config: vector,
        },
    );

    let addr = config.socket_addr()?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SystemError::web_server_error(format!("Failed to bind to address: {}", e)))?;

    info!("Serving metrics on http://{}/metrics", addr);
    info!("JSON snapshot: http://{}/api/metrics", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| SystemError::web_server_error(format!("Server error: {}", e)))?;

    info!("Web server stopped");
    Ok(())
}
