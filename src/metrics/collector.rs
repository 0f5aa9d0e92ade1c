//! Collection scheduler: polls enabled metric kinds and writes the store.

use crate::config::{CollectorConfig, ConfigVector};
use crate::error::{Result, SystemError};
use crate::metrics::data::{DerivedValue, MetricKind};
use crate::metrics::rates::DerivationState;
use crate::metrics::reader::CounterReader;
use crate::metrics::store::MetricStore;
use crate::metrics::traits::{ProcFs, ProcSource};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::{task, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome of one polling phase.
#[derive(Debug, Default)]
pub struct PollReport {
    /// Kinds whose store entry was written, in poll order
    pub written: Vec<(MetricKind, DerivedValue)>,
    /// Kinds that produced no measurement this cycle
    pub skipped: Vec<(MetricKind, SystemError)>,
}

impl PollReport {
    pub fn is_written(&self, kind: MetricKind) -> bool {
        self.written.iter().any(|(k, _)| *k == kind)
    }
}

/// Owns the counter reader and every prior sample; the only writer of the store.
pub struct MetricsCollector<S = ProcFs> {
    reader: CounterReader<S>,
    state: DerivationState,
    config: ConfigVector,
    store: Arc<MetricStore>,
    cycles: u64,
}

impl MetricsCollector<ProcFs> {
    /// Collector reading the proc tree described by `settings`.
    pub fn from_config(
        config: ConfigVector,
        settings: &CollectorConfig,
        store: Arc<MetricStore>,
    ) -> Self {
        let reader = CounterReader::new(ProcFs::new(&settings.proc_root))
            .with_net_prefix(settings.net_interface.clone());
        Self::new(reader, config, settings, store)
    }
}

impl<S: ProcSource> MetricsCollector<S> {
    pub fn new(
        reader: CounterReader<S>,
        config: ConfigVector,
        settings: &CollectorConfig,
        store: Arc<MetricStore>,
    ) -> Self {
        Self {
            reader,
            state: DerivationState::new(settings.rate_mode, config.interval()),
            config,
            store,
            cycles: 0,
        }
    }

    pub fn config(&self) -> &ConfigVector {
        &self.config
    }

    pub fn store(&self) -> &Arc<MetricStore> {
        &self.store
    }

    /// Completed polling phases.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Attempt every enabled kind exactly once, in canonical order.
    ///
    /// Per-metric failures are logged and leave the store entry untouched.
    /// Only a store failure (poisoned lock) is returned as an error.
    pub fn poll_once(&mut self) -> Result<PollReport> {
        let mut report = PollReport::default();

        for kind in self.config.enabled_kinds() {
            match self.state.sample(kind, &self.reader, Instant::now()) {
                Ok(value) => {
                    self.store.write(kind, value)?;
                    debug!("{} = {}", kind.metric_name(), value.as_f64());
                    report.written.push((kind, value));
                }
                Err(e @ SystemError::Warmup(_)) => {
                    debug!("{e}");
                    report.skipped.push((kind, e));
                }
                Err(e) if e.is_transient() => {
                    warn!("Skipping {} this cycle: {}", kind.metric_name(), e);
                    report.skipped.push((kind, e));
                }
                Err(e) => return Err(e),
            }
        }

        self.cycles += 1;
        Ok(report)
    }

    /// `poll_once` from async context. Pseudo-file reads block, so on a
    /// multi-threaded runtime the worker hands its other tasks (HTTP) off first.
    fn poll_in_place(&mut self) -> Result<PollReport> {
        match Handle::current().runtime_flavor() {
            RuntimeFlavor::MultiThread => task::block_in_place(|| self.poll_once()),
            _ => self.poll_once(),
        }
    }

    /// Poll, sleep one interval, repeat until `cancel` fires.
    ///
    /// The sleep starts after the poll finishes, so a slow cycle delays the
    /// next one instead of overlapping with it.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        let interval = self.config.interval();
        info!(
            "Collecting {:?} every {}s ({:?} rates)",
            self.config.enabled_kinds(),
            interval.as_secs(),
            self.state.mode()
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }
            self.poll_in_place()?;

            tokio::select! {
                _ = time::sleep(interval) => {}
                _ = cancel.cancelled() => break,
            }
        }

        info!("Collector stopped after {} cycles", self.cycles);
        Ok(())
    }
}
