//! Data structures for sampled counters and derived metric values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every metric the exporter knows about, in configuration-vector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    CpuUsage,
    MemoryUsage,
    DiskAvgReadTime,
    DiskAvgWriteTime,
    DiskIoBusy,
    NetReceiveKbps,
    NetSentKbps,
    NetReceivedPackets,
    NetSentPackets,
    Processes,
}

/// Whether a store entry is overwritten or accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Gauge,
    Counter,
}

impl MetricKind {
    /// Number of metric kinds.
    pub const COUNT: usize = 10;

    /// All kinds in canonical (configuration vector) order.
    pub const ALL: [MetricKind; Self::COUNT] = [
        MetricKind::CpuUsage,
        MetricKind::MemoryUsage,
        MetricKind::DiskAvgReadTime,
        MetricKind::DiskAvgWriteTime,
        MetricKind::DiskIoBusy,
        MetricKind::NetReceiveKbps,
        MetricKind::NetSentKbps,
        MetricKind::NetReceivedPackets,
        MetricKind::NetSentPackets,
        MetricKind::Processes,
    ];

    /// Position of this kind in the configuration vector.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Name used for the exposed metric.
    pub fn metric_name(self) -> &'static str {
        match self {
            MetricKind::CpuUsage => "cpu_usage_percentage",
            MetricKind::MemoryUsage => "memory_usage_percentage",
            MetricKind::DiskAvgReadTime => "avg_read_time",
            MetricKind::DiskAvgWriteTime => "avg_write_time",
            MetricKind::DiskIoBusy => "disk_IO_percentage_time",
            MetricKind::NetReceiveKbps => "net_receive_kbps",
            MetricKind::NetSentKbps => "net_sent_kbps_metric",
            MetricKind::NetReceivedPackets => "net_received_packets_metric",
            MetricKind::NetSentPackets => "net_sent_packets_metric",
            MetricKind::Processes => "processes_metric",
        }
    }

    /// Help text for the exposed metric.
    pub fn help(self) -> &'static str {
        match self {
            MetricKind::CpuUsage => "CPU usage percentage over the last poll interval",
            MetricKind::MemoryUsage => "Memory usage percentage (MemTotal - MemAvailable)",
            MetricKind::DiskAvgReadTime => "Lifetime average time per completed disk read in ms",
            MetricKind::DiskAvgWriteTime => "Lifetime average time per completed disk write in ms",
            MetricKind::DiskIoBusy => "Percentage of the poll interval the disk spent doing I/O",
            MetricKind::NetReceiveKbps => "Kilobytes per second received on the sampled interface",
            MetricKind::NetSentKbps => "Kilobytes per second sent on the sampled interface",
            MetricKind::NetReceivedPackets => "Packets received on the sampled interface",
            MetricKind::NetSentPackets => "Packets sent on the sampled interface",
            MetricKind::Processes => "Processes created since boot",
        }
    }

    /// Gauge or counter semantics in the store.
    pub fn metric_type(self) -> MetricType {
        match self {
            MetricKind::NetReceivedPackets | MetricKind::NetSentPackets => MetricType::Counter,
            _ => MetricType::Gauge,
        }
    }

    /// Short name accepted on the command line.
    pub fn short_name(self) -> &'static str {
        match self {
            MetricKind::CpuUsage => "cpu",
            MetricKind::MemoryUsage => "memory",
            MetricKind::DiskAvgReadTime => "disk-read",
            MetricKind::DiskAvgWriteTime => "disk-write",
            MetricKind::DiskIoBusy => "disk-busy",
            MetricKind::NetReceiveKbps => "net-rx-kbps",
            MetricKind::NetSentKbps => "net-tx-kbps",
            MetricKind::NetReceivedPackets => "net-rx-packets",
            MetricKind::NetSentPackets => "net-tx-packets",
            MetricKind::Processes => "processes",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        MetricKind::ALL
            .into_iter()
            .find(|kind| kind.short_name() == wanted || kind.metric_name() == wanted)
            .ok_or_else(|| format!("unknown metric kind: {wanted}"))
    }
}

/// `MemTotal` and `MemAvailable` from `/proc/meminfo`, in kB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemorySample {
    pub total_kb: u64,
    pub available_kb: u64,
}

/// The eight aggregate CPU time buckets from the `cpu` line of `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuTimes {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuTimes {
    /// Jiffies spent idle or waiting on I/O.
    pub fn idle_total(&self) -> u64 {
        self.idle + self.iowait
    }

    /// Jiffies spent doing work.
    pub fn non_idle(&self) -> u64 {
        self.user + self.nice + self.system + self.irq + self.softirq + self.steal
    }

    /// All accounted jiffies.
    pub fn total(&self) -> u64 {
        self.idle_total() + self.non_idle()
    }
}

/// Cumulative counters for one block device from `/proc/diskstats`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiskSample {
    pub device: String,
    pub reads_completed: u64,
    /// Time spent reading (ms)
    pub read_time_ms: u64,
    pub writes_completed: u64,
    /// Time spent writing (ms)
    pub write_time_ms: u64,
    /// Time spent doing I/Os (ms)
    pub io_time_ms: u64,
}

/// Cumulative counters for one interface from `/proc/net/dev`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NetSample {
    pub interface: String,
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
}

/// A value produced by one derivation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DerivedValue {
    /// Point-in-time measurement; replaces the stored value
    Gauge(f64),
    /// Per-cycle delta; added to the stored running total
    Counter(u64),
}

impl DerivedValue {
    /// The value as a float, for logging and exposition.
    pub fn as_f64(&self) -> f64 {
        match *self {
            DerivedValue::Gauge(v) => v,
            DerivedValue::Counter(v) => v as f64,
        }
    }
}

/// One store entry as seen by the publication surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub kind: MetricKind,
    pub name: String,
    pub help: String,
    pub metric_type: MetricType,
    /// Current gauge value, or running total for counters
    pub value: f64,
    /// Number of successful writes since start
    pub updates: u64,
}

/// A copy of the whole store taken under a single lock acquisition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Unix timestamp in milliseconds
    pub timestamp: u64,
    pub metrics: Vec<MetricSample>,
}

impl StoreSnapshot {
    /// Wrap samples with the current timestamp.
    pub fn new(metrics: Vec<MetricSample>) -> Self {
        Self {
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
            metrics,
        }
    }

    /// Look up one sample by kind.
    pub fn get(&self, kind: MetricKind) -> Option<&MetricSample> {
        self.metrics.iter().find(|sample| sample.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_order_matches_index() {
        for (i, kind) in MetricKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_only_packet_kinds_are_counters() {
        let counters: Vec<_> = MetricKind::ALL
            .into_iter()
            .filter(|k| k.metric_type() == MetricType::Counter)
            .collect();
        assert_eq!(
            counters,
            vec![MetricKind::NetReceivedPackets, MetricKind::NetSentPackets]
        );
    }

    #[test]
    fn test_exposed_names_match_existing_dashboards() {
        let names: Vec<_> = MetricKind::ALL.iter().map(|k| k.metric_name()).collect();
        assert_eq!(
            names,
            vec![
                "cpu_usage_percentage",
                "memory_usage_percentage",
                "avg_read_time",
                "avg_write_time",
                "disk_IO_percentage_time",
                "net_receive_kbps",
                "net_sent_kbps_metric",
                "net_received_packets_metric",
                "net_sent_packets_metric",
                "processes_metric",
            ]
        );
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("cpu".parse::<MetricKind>(), Ok(MetricKind::CpuUsage));
        assert_eq!(
            "net_sent_kbps_metric".parse::<MetricKind>(),
            Ok(MetricKind::NetSentKbps)
        );
        assert!("gpu".parse::<MetricKind>().is_err());
    }

    #[test]
    fn test_cpu_times_totals() {
        let t = CpuTimes {
            user: 10,
            nice: 1,
            system: 5,
            idle: 80,
            iowait: 4,
            irq: 0,
            softirq: 0,
            steal: 0,
        };
        assert_eq!(t.idle_total(), 84);
        assert_eq!(t.non_idle(), 16);
        assert_eq!(t.total(), 100);
    }
}
