//! # syswatch - kernel counter exporter
//!
//! Samples resource counters from `/proc` at a fixed interval and republishes
//! them as gauges and monotonic counters for a Prometheus scraper.
//!
//! ## Features
//!
//! - **Stateful sampling**: CPU and memory usage, disk latency and busy time,
//!   network throughput and packet counts, process count
//! - **First-sample handling**: rate metrics publish nothing until a baseline exists
//! - **One store, one lock**: the collector writes, the HTTP surface reads
//! - **Cancellable**: collector and server stop on the same token
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use syswatch::{
//!     start_web_server, CollectorConfig, ConfigVector, MetricStore, MetricsCollector, WebConfig,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigVector::all(1)?;
//!     let store = Arc::new(MetricStore::new());
//!     let cancel = CancellationToken::new();
//!
//!     let collector =
//!         MetricsCollector::from_config(config, &CollectorConfig::default(), store.clone());
//!     tokio::spawn(collector.run(cancel.clone()));
//!
//!     start_web_server(WebConfig::default(), store, config, cancel).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod web;

// Re-export public API
pub use config::{CollectorConfig, ConfigSource, ConfigVector};
pub use error::{Result, SystemError};
pub use metrics::{
    collector::{MetricsCollector, PollReport},
    data::{DerivedValue, MetricKind, MetricSample, MetricType, StoreSnapshot},
    rates::RateMode,
    store::MetricStore,
};

pub use web::{start_web_server, WebConfig};

/// The default poll interval in seconds
pub const DEFAULT_INTERVAL_SECS: u64 = 1;

/// The default web server port
pub const DEFAULT_WEB_PORT: u16 = 8080;

/// Where kernel pseudo-files are read from by default
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Default configuration channel
pub const DEFAULT_CONFIG_FIFO: &str = "/tmp/fifo_config";

/// Default acknowledgement channel
pub const DEFAULT_CONFIG_ACK_FIFO: &str = "/tmp/fifo_config_ack";
