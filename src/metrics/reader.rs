//! Counter reader for kernel pseudo-files.
//!
//! The `parse_*` functions are pure and operate on file contents so they can be
//! tested with string fixtures. `CounterReader` pairs them with a `ProcSource`
//! and maps I/O failures to `SourceUnavailable`.

use crate::error::{Result, SystemError};
use crate::metrics::data::{CpuTimes, DiskSample, MemorySample, NetSample};
use crate::metrics::traits::ProcSource;
use std::path::Path;

pub const MEMINFO: &str = "meminfo";
pub const STAT: &str = "stat";
pub const DISKSTATS: &str = "diskstats";
pub const NET_DEV: &str = "net/dev";

/// Name fragments of block devices that are never sampled.
const VIRTUAL_DISK_MARKERS: [&str; 2] = ["loop", "ram"];

/// Parses `MemTotal` and `MemAvailable` out of `/proc/meminfo`.
///
/// Fails if either value is missing or zero.
pub fn parse_meminfo(content: &str) -> Result<MemorySample> {
    let mut total_kb = None;
    let mut available_kb = None;

    for line in content.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let slot = match key.trim() {
            "MemTotal" => &mut total_kb,
            "MemAvailable" => &mut available_kb,
            _ => continue,
        };
        let value = rest
            .split_whitespace()
            .next()
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| SystemError::parse_error(format!("invalid {} value", key.trim())))?;
        *slot = Some(value);

        if total_kb.is_some() && available_kb.is_some() {
            break;
        }
    }

    match (total_kb, available_kb) {
        (Some(total_kb), Some(available_kb)) if total_kb > 0 && available_kb > 0 => {
            Ok(MemorySample {
                total_kb,
                available_kb,
            })
        }
        _ => Err(SystemError::parse_error(
            "MemTotal/MemAvailable missing or zero in meminfo",
        )),
    }
}

/// Parses the aggregate `cpu` line of `/proc/stat`.
///
/// Format: `cpu  user nice system idle iowait irq softirq steal [guest guest_nice]`
pub fn parse_cpu_times(content: &str) -> Result<CpuTimes> {
    let line = content
        .lines()
        .find(|line| line.split_whitespace().next() == Some("cpu"))
        .ok_or_else(|| SystemError::parse_error("no aggregate cpu line in stat"))?;

    let values: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|field| field.parse::<u64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| SystemError::parse_error(format!("invalid cpu time field: {e}")))?;

    if values.len() < 8 {
        return Err(SystemError::parse_error(format!(
            "not enough cpu time fields: expected 8, got {}",
            values.len()
        )));
    }

    Ok(CpuTimes {
        user: values[0],
        nice: values[1],
        system: values[2],
        idle: values[3],
        iowait: values[4],
        irq: values[5],
        softirq: values[6],
        steal: values[7],
    })
}

/// Parses the `processes` line (forks since boot) of `/proc/stat`.
pub fn parse_process_count(content: &str) -> Result<u64> {
    for line in content.lines() {
        let mut parts = line.split_whitespace();
        if parts.next() != Some("processes") {
            continue;
        }
        return parts
            .next()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| SystemError::parse_error("invalid processes value in stat"));
    }
    Err(SystemError::parse_error("no processes line in stat"))
}

/// Whether a block device name denotes a virtual device.
pub fn is_virtual_disk(name: &str) -> bool {
    VIRTUAL_DISK_MARKERS
        .iter()
        .any(|marker| name.contains(marker))
}

/// Parses the first physical block device record of `/proc/diskstats`.
///
/// Format: major minor name reads r_merged r_sectors r_time writes w_merged
/// w_sectors w_time io_pending io_time w_io_time [discards ...]
pub fn parse_disk_record(content: &str) -> Result<DiskSample> {
    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 14 || is_virtual_disk(parts[2]) {
            continue;
        }

        let field = |idx: usize, name: &str| -> Result<u64> {
            parts[idx].parse().map_err(|_| {
                SystemError::parse_error(format!("invalid {} for device {}", name, parts[2]))
            })
        };

        return Ok(DiskSample {
            device: parts[2].to_string(),
            reads_completed: field(3, "reads completed")?,
            read_time_ms: field(6, "read time")?,
            writes_completed: field(7, "writes completed")?,
            write_time_ms: field(10, "write time")?,
            io_time_ms: field(12, "io time")?,
        });
    }
    Err(SystemError::parse_error("no physical block device in diskstats"))
}

/// Parses one interface record of `/proc/net/dev`.
///
/// With `prefix` set, the first interface whose name starts with it is used;
/// otherwise the first interface that is not `lo`.
pub fn parse_net_record(content: &str, prefix: Option<&str>) -> Result<NetSample> {
    for line in content.lines() {
        // header lines
        if line.contains('|') {
            continue;
        }
        let Some((name, values)) = line.split_once(':') else {
            continue;
        };
        let interface = name.trim();
        let selected = match prefix {
            Some(prefix) => interface.starts_with(prefix),
            None => interface != "lo",
        };
        if !selected {
            continue;
        }

        let values: Vec<&str> = values.split_whitespace().collect();
        if values.len() < 10 {
            return Err(SystemError::parse_error(format!(
                "not enough fields for interface {interface}: got {}",
                values.len()
            )));
        }
        let field = |idx: usize, name: &str| -> Result<u64> {
            values[idx].parse().map_err(|_| {
                SystemError::parse_error(format!("invalid {name} for interface {interface}"))
            })
        };

        return Ok(NetSample {
            interface: interface.to_string(),
            rx_bytes: field(0, "rx bytes")?,
            rx_packets: field(1, "rx packets")?,
            tx_bytes: field(8, "tx bytes")?,
            tx_packets: field(9, "tx packets")?,
        });
    }
    Err(SystemError::parse_error(match prefix {
        Some(prefix) => format!("no interface matching '{prefix}' in net/dev"),
        None => "no non-loopback interface in net/dev".to_string(),
    }))
}

/// Reads raw samples from a `ProcSource`.
///
/// Every call opens and scans the pseudo-file once; there are no retries.
#[derive(Debug, Clone)]
pub struct CounterReader<S> {
    source: S,
    net_prefix: Option<String>,
}

impl<S: ProcSource> CounterReader<S> {
    /// Reader over `source`, sampling the first non-loopback interface.
    pub fn new(source: S) -> Self {
        Self {
            source,
            net_prefix: None,
        }
    }

    /// Only sample interfaces whose name starts with `prefix`.
    pub fn with_net_prefix(mut self, prefix: Option<String>) -> Self {
        self.net_prefix = prefix.filter(|p| !p.is_empty());
        self
    }

    fn read(&self, relative: &str) -> Result<String> {
        let relative = Path::new(relative);
        self.source
            .read_to_string(relative)
            .map_err(|e| SystemError::source_unavailable(self.source.display_path(relative), e))
    }

    pub fn memory(&self) -> Result<MemorySample> {
        parse_meminfo(&self.read(MEMINFO)?)
    }

    pub fn cpu_times(&self) -> Result<CpuTimes> {
        parse_cpu_times(&self.read(STAT)?)
    }

    pub fn process_count(&self) -> Result<u64> {
        parse_process_count(&self.read(STAT)?)
    }

    pub fn disk(&self) -> Result<DiskSample> {
        parse_disk_record(&self.read(DISKSTATS)?)
    }

    pub fn net(&self) -> Result<NetSample> {
        parse_net_record(&self.read(NET_DEV)?, self.net_prefix.as_deref())
    }
}
