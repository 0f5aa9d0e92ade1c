//! Lock-protected store of derived metric values.
//!
//! One mutex covers every entry. It is held only while a single value is
//! copied in or out, never across a pseudo-file read.

use crate::error::{Result, SystemError};
use crate::metrics::data::{DerivedValue, MetricKind, MetricSample, MetricType, StoreSnapshot};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, Default)]
struct Entry {
    value: f64,
    updates: u64,
}

/// Current value of every metric kind.
///
/// Constructed once at startup and shared (via `Arc`) between the collector
/// and the HTTP state. Entries start at zero.
#[derive(Debug, Default)]
pub struct MetricStore {
    entries: Mutex<[Entry; MetricKind::COUNT]>,
}

impl MetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, [Entry; MetricKind::COUNT]>> {
        self.entries
            .lock()
            .map_err(|_| SystemError::system_error("metric store lock poisoned"))
    }

    /// Record a derived value: gauges are overwritten, counters accumulate.
    ///
    /// A value whose shape does not match the kind's type is rejected.
    pub fn write(&self, kind: MetricKind, value: DerivedValue) -> Result<()> {
        let mut entries = self.lock()?;
        let entry = &mut entries[kind.index()];
        match (kind.metric_type(), value) {
            (MetricType::Gauge, DerivedValue::Gauge(v)) => entry.value = v,
            (MetricType::Counter, DerivedValue::Counter(delta)) => entry.value += delta as f64,
            (expected, got) => {
                return Err(SystemError::system_error(format!(
                    "{kind} is a {expected:?}, refusing {got:?}"
                )))
            }
        }
        entry.updates += 1;
        Ok(())
    }

    /// Copy of one entry.
    pub fn get(&self, kind: MetricKind) -> Result<MetricSample> {
        let entry = self.lock()?[kind.index()];
        Ok(sample(kind, entry))
    }

    /// Copy of every entry, taken under one lock acquisition.
    pub fn read_all(&self) -> Result<StoreSnapshot> {
        let entries = *self.lock()?;
        Ok(StoreSnapshot::new(
            MetricKind::ALL
                .into_iter()
                .map(|kind| sample(kind, entries[kind.index()]))
                .collect(),
        ))
    }
}

fn sample(kind: MetricKind, entry: Entry) -> MetricSample {
    MetricSample {
        kind,
        name: kind.metric_name().to_string(),
        help: kind.help().to_string(),
        metric_type: kind.metric_type(),
        value: entry.value,
        updates: entry.updates,
    }
}
