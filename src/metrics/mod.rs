//! Kernel counter sampling, rate derivation, and the shared metric store.
//!
//! Data flows leaves-first: `reader` parses pseudo-files into raw samples,
//! `rates` combines them with retained prior samples, `store` holds the
//! derived values, and `collector` drives the whole thing once per interval.

pub mod collector;
pub mod data;
pub mod rates;
pub mod reader;
pub mod store;
pub mod traits;

// Re-export commonly used items
pub use collector::{MetricsCollector, PollReport};
pub use data::{DerivedValue, MetricKind, MetricSample, MetricType, StoreSnapshot};
pub use rates::{DerivationState, RateMode};
pub use reader::CounterReader;
pub use store::MetricStore;
pub use traits::{InMemoryProc, ProcFs, ProcSource};
