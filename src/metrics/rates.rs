//! Percentage and rate derivation from cumulative kernel counters.
//!
//! Every derivation that needs history keeps its prior sample in an explicit
//! slot of `DerivationState`, which the collector owns and passes in by
//! `&mut`. A slot is only ever touched by the derivation for its own kind.

use crate::error::{Result, SystemError};
use crate::metrics::data::{CpuTimes, DerivedValue, MemorySample, MetricKind};
use crate::metrics::reader::CounterReader;
use crate::metrics::traits::ProcSource;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// What a per-second rate is divided by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RateMode {
    /// The configured poll interval, assumed rather than measured
    #[default]
    Nominal,
    /// Actual elapsed time between two successful reads of the same kind
    Measured,
}

/// Compute a u64 delta, returning `None` on counter regression.
pub fn du64(curr: u64, prev: u64) -> Option<u64> {
    curr.checked_sub(prev)
}

/// A retained cumulative counter and when it was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorCounter {
    pub value: u64,
    pub at: Instant,
}

/// Prior samples for every kind that derives from a delta.
///
/// All slots start empty ("no prior data yet").
#[derive(Debug)]
pub struct DerivationState {
    mode: RateMode,
    period: Duration,
    pub cpu: Option<CpuTimes>,
    pub disk_io_time: Option<PriorCounter>,
    pub net_rx_bytes: Option<PriorCounter>,
    pub net_tx_bytes: Option<PriorCounter>,
    pub net_rx_packets: Option<PriorCounter>,
    pub net_tx_packets: Option<PriorCounter>,
}

impl DerivationState {
    /// Empty state; `period` is the poll interval used by `RateMode::Nominal`.
    pub fn new(mode: RateMode, period: Duration) -> Self {
        Self {
            mode,
            period,
            cpu: None,
            disk_io_time: None,
            net_rx_bytes: None,
            net_tx_bytes: None,
            net_rx_packets: None,
            net_tx_packets: None,
        }
    }

    pub fn mode(&self) -> RateMode {
        self.mode
    }

    /// Read the raw sample for `kind` and derive its value.
    ///
    /// No lock is held here; the caller writes the result into the store.
    pub fn sample<S: ProcSource>(
        &mut self,
        kind: MetricKind,
        reader: &CounterReader<S>,
        now: Instant,
    ) -> Result<DerivedValue> {
        let value = match kind {
            MetricKind::CpuUsage => {
                DerivedValue::Gauge(cpu_usage(&mut self.cpu, reader.cpu_times()?)?)
            }
            MetricKind::MemoryUsage => DerivedValue::Gauge(memory_usage(&reader.memory()?)?),
            MetricKind::DiskAvgReadTime => {
                let disk = reader.disk()?;
                DerivedValue::Gauge(average_op_time(disk.read_time_ms, disk.reads_completed)?)
            }
            MetricKind::DiskAvgWriteTime => {
                let disk = reader.disk()?;
                DerivedValue::Gauge(average_op_time(disk.write_time_ms, disk.writes_completed)?)
            }
            MetricKind::DiskIoBusy => {
                let io_time = reader.disk()?.io_time_ms;
                let (delta, elapsed) = advance(kind, &mut self.disk_io_time, io_time, now)?;
                let period_ms = self.period_ms(elapsed)?;
                DerivedValue::Gauge(busy_percentage(delta, period_ms))
            }
            MetricKind::NetReceiveKbps => {
                let bytes = reader.net()?.rx_bytes;
                let (delta, elapsed) = advance(kind, &mut self.net_rx_bytes, bytes, now)?;
                DerivedValue::Gauge(delta as f64 / self.period_ms(elapsed)?)
            }
            MetricKind::NetSentKbps => {
                let bytes = reader.net()?.tx_bytes;
                let (delta, elapsed) = advance(kind, &mut self.net_tx_bytes, bytes, now)?;
                DerivedValue::Gauge(delta as f64 / self.period_ms(elapsed)?)
            }
            MetricKind::NetReceivedPackets => {
                let packets = reader.net()?.rx_packets;
                DerivedValue::Counter(advance(kind, &mut self.net_rx_packets, packets, now)?.0)
            }
            MetricKind::NetSentPackets => {
                let packets = reader.net()?.tx_packets;
                DerivedValue::Counter(advance(kind, &mut self.net_tx_packets, packets, now)?.0)
            }
            MetricKind::Processes => DerivedValue::Gauge(process_count(reader.process_count()?)?),
        };
        Ok(value)
    }

    /// Interval in milliseconds a delta is divided by.
    fn period_ms(&self, elapsed: Duration) -> Result<f64> {
        let period = match self.mode {
            RateMode::Nominal => self.period,
            RateMode::Measured => elapsed,
        };
        let ms = period.as_secs_f64() * 1000.0;
        if ms <= 0.0 {
            return Err(SystemError::degenerate_interval(
                "no time elapsed between samples",
            ));
        }
        Ok(ms)
    }
}

/// `(total - available) / total * 100`.
pub fn memory_usage(sample: &MemorySample) -> Result<f64> {
    if sample.total_kb == 0 || sample.available_kb == 0 {
        return Err(SystemError::parse_error("MemTotal/MemAvailable is zero"));
    }
    if sample.available_kb > sample.total_kb {
        return Err(SystemError::parse_error("MemAvailable exceeds MemTotal"));
    }
    let used = (sample.total_kb - sample.available_kb) as f64;
    Ok(used / sample.total_kb as f64 * 100.0)
}

/// Busy percentage from two aggregate CPU readings.
///
/// The first call only records the baseline and returns `Warmup`.
pub fn cpu_usage(prior: &mut Option<CpuTimes>, current: CpuTimes) -> Result<f64> {
    let Some(prev) = prior.replace(current) else {
        return Err(SystemError::Warmup(MetricKind::CpuUsage));
    };

    let (Some(total_delta), Some(idle_delta)) = (
        du64(current.total(), prev.total()),
        du64(current.idle_total(), prev.idle_total()),
    ) else {
        return Err(SystemError::degenerate_interval("cpu counters went backwards"));
    };

    if total_delta == 0 {
        return Err(SystemError::degenerate_interval(
            "cpu counters did not advance",
        ));
    }

    let busy = total_delta.saturating_sub(idle_delta) as f64;
    Ok((busy / total_delta as f64 * 100.0).clamp(0.0, 100.0))
}

/// `time_spent / operations_completed` over lifetime totals.
pub fn average_op_time(time_spent_ms: u64, operations: u64) -> Result<f64> {
    if operations == 0 {
        return Err(SystemError::degenerate_interval(
            "no disk operations completed",
        ));
    }
    Ok(time_spent_ms as f64 / operations as f64)
}

/// Percentage of `period_ms` covered by `io_delta_ms`, clamped to [0, 100].
pub fn busy_percentage(io_delta_ms: u64, period_ms: f64) -> f64 {
    (io_delta_ms as f64 / period_ms * 100.0).clamp(0.0, 100.0)
}

/// Processes created since boot; zero means the line was not populated.
pub fn process_count(count: u64) -> Result<f64> {
    if count == 0 {
        return Err(SystemError::parse_error("processes counter is zero"));
    }
    Ok(count as f64)
}

/// Advance a retained counter to `current`.
///
/// Returns the delta and elapsed time since the prior read. The slot always
/// ends up holding `current`, so a failed or reset cycle just becomes the next
/// baseline.
pub fn advance(
    kind: MetricKind,
    prior: &mut Option<PriorCounter>,
    current: u64,
    now: Instant,
) -> Result<(u64, Duration)> {
    let previous = prior.replace(PriorCounter {
        value: current,
        at: now,
    });
    let Some(previous) = previous else {
        return Err(SystemError::Warmup(kind));
    };
    let delta = du64(current, previous.value).ok_or_else(|| {
        SystemError::degenerate_interval(format!(
            "{kind} counter went backwards ({} -> {current})",
            previous.value
        ))
    })?;
    Ok((delta, now.saturating_duration_since(previous.at)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu(user: u64, system: u64, idle: u64, iowait: u64) -> CpuTimes {
        CpuTimes {
            user,
            system,
            idle,
            iowait,
            ..CpuTimes::default()
        }
    }

    #[test]
    fn test_memory_usage_formula() {
        let sample = MemorySample {
            total_kb: 16_000_000,
            available_kb: 12_000_000,
        };
        assert_eq!(memory_usage(&sample).unwrap(), 25.0);
    }

    #[test]
    fn test_memory_usage_rejects_inconsistent_sample() {
        let sample = MemorySample {
            total_kb: 100,
            available_kb: 200,
        };
        assert!(memory_usage(&sample).is_err());
    }

    #[test]
    fn test_cpu_first_call_is_warmup() {
        let mut prior = None;
        let err = cpu_usage(&mut prior, cpu(100, 50, 800, 50)).unwrap_err();
        assert!(matches!(err, SystemError::Warmup(MetricKind::CpuUsage)));
        assert_eq!(prior, Some(cpu(100, 50, 800, 50)));
    }

    #[test]
    fn test_cpu_usage_from_two_samples() {
        let mut prior = Some(cpu(100, 50, 800, 50));
        // total +200, idle +150 => busy 50/200
        let usage = cpu_usage(&mut prior, cpu(130, 70, 940, 60)).unwrap();
        assert!((usage - 25.0).abs() < 1e-9);
        assert_eq!(prior, Some(cpu(130, 70, 940, 60)));
    }

    #[test]
    fn test_cpu_zero_total_delta_is_degenerate() {
        let mut prior = Some(cpu(100, 50, 800, 50));
        let err = cpu_usage(&mut prior, cpu(100, 50, 800, 50)).unwrap_err();
        assert!(matches!(err, SystemError::DegenerateInterval(_)));
    }

    #[test]
    fn test_cpu_regression_rebaselines() {
        let mut prior = Some(cpu(1000, 500, 8000, 500));
        assert!(cpu_usage(&mut prior, cpu(10, 5, 80, 5)).is_err());
        assert_eq!(prior, Some(cpu(10, 5, 80, 5)));
        assert!(cpu_usage(&mut prior, cpu(20, 5, 90, 5)).is_ok());
    }

    #[test]
    fn test_average_op_time() {
        assert_eq!(average_op_time(100, 1234).unwrap(), 100.0 / 1234.0);
        assert!(average_op_time(100, 0).is_err());
    }

    #[test]
    fn test_busy_percentage_is_clamped() {
        assert_eq!(busy_percentage(500, 1000.0), 50.0);
        assert_eq!(busy_percentage(2500, 1000.0), 100.0);
    }

    #[test]
    fn test_advance_tracks_immediately_preceding_sample() {
        let start = Instant::now();
        let mut prior = None;
        assert!(matches!(
            advance(MetricKind::NetReceivedPackets, &mut prior, 100, start),
            Err(SystemError::Warmup(_))
        ));
        let (d1, _) = advance(
            MetricKind::NetReceivedPackets,
            &mut prior,
            150,
            start + Duration::from_secs(1),
        )
        .unwrap();
        let (d2, elapsed) = advance(
            MetricKind::NetReceivedPackets,
            &mut prior,
            175,
            start + Duration::from_secs(3),
        )
        .unwrap();
        assert_eq!(d1, 50);
        assert_eq!(d2, 25);
        assert_eq!(elapsed, Duration::from_secs(2));
    }

    #[test]
    fn test_nominal_and_measured_period() {
        let nominal = DerivationState::new(RateMode::Nominal, Duration::from_secs(2));
        assert_eq!(nominal.period_ms(Duration::from_millis(10)).unwrap(), 2000.0);

        let measured = DerivationState::new(RateMode::Measured, Duration::from_secs(2));
        assert_eq!(measured.period_ms(Duration::from_millis(500)).unwrap(), 500.0);
        assert!(measured.period_ms(Duration::ZERO).is_err());
    }
}
