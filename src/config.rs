//! Collection configuration: which metric kinds are enabled and how often to poll.
//!
//! The vector normally arrives once at startup over a FIFO as eleven
//! native-endian `i32` values (ten enable flags in canonical order, then the
//! poll interval in seconds) and is echoed back on an acknowledgement FIFO.

use crate::error::{Result, SystemError};
use crate::metrics::data::MetricKind;
use crate::metrics::rates::RateMode;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Number of integers on the configuration channel.
pub const CONFIG_SIZE: usize = MetricKind::COUNT + 1;

/// Bytes on the configuration channel.
pub const CONFIG_BYTES: usize = CONFIG_SIZE * std::mem::size_of::<i32>();

/// Immutable enable flags plus poll interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigVector {
    enabled: [bool; MetricKind::COUNT],
    interval_secs: u64,
}

impl Default for ConfigVector {
    /// Nothing enabled, one second interval.
    fn default() -> Self {
        Self {
            enabled: [false; MetricKind::COUNT],
            interval_secs: crate::DEFAULT_INTERVAL_SECS,
        }
    }
}

impl ConfigVector {
    /// Build from the raw integer form. A flag is enabled only when it is `1`.
    pub fn from_flags(raw: &[i32]) -> Result<Self> {
        if raw.len() != CONFIG_SIZE {
            return Err(SystemError::config_error(format!(
                "expected {CONFIG_SIZE} values, got {}",
                raw.len()
            )));
        }
        let mut enabled = [false; MetricKind::COUNT];
        for (slot, flag) in enabled.iter_mut().zip(raw) {
            *slot = *flag == 1;
        }
        let interval = raw[MetricKind::COUNT];
        if interval < 1 {
            return Err(SystemError::config_error(format!(
                "poll interval must be at least 1 second, got {interval}"
            )));
        }
        Ok(Self {
            enabled,
            interval_secs: interval as u64,
        })
    }

    /// Build from a set of kinds.
    pub fn from_kinds(kinds: &[MetricKind], interval_secs: u64) -> Result<Self> {
        if interval_secs < 1 {
            return Err(SystemError::config_error(
                "poll interval must be at least 1 second",
            ));
        }
        if i32::try_from(interval_secs).is_err() {
            return Err(SystemError::config_error(format!(
                "poll interval {interval_secs} does not fit the configuration channel"
            )));
        }
        let mut enabled = [false; MetricKind::COUNT];
        for kind in kinds {
            enabled[kind.index()] = true;
        }
        Ok(Self {
            enabled,
            interval_secs,
        })
    }

    /// Every kind enabled.
    pub fn all(interval_secs: u64) -> Result<Self> {
        Self::from_kinds(&MetricKind::ALL, interval_secs)
    }

    /// Decode the channel's byte form.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != CONFIG_BYTES {
            return Err(SystemError::config_error(format!(
                "expected {CONFIG_BYTES} bytes, got {}",
                bytes.len()
            )));
        }
        let raw: Vec<i32> = bytes
            .chunks_exact(std::mem::size_of::<i32>())
            .map(|chunk| i32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Self::from_flags(&raw)
    }

    /// The raw integer form, as sent on the channel.
    pub fn to_flags(&self) -> [i32; CONFIG_SIZE] {
        let mut raw = [0i32; CONFIG_SIZE];
        for (slot, enabled) in raw.iter_mut().zip(self.enabled) {
            *slot = i32::from(enabled);
        }
        // from_flags/from_kinds guarantee the interval fits
        raw[MetricKind::COUNT] = self.interval_secs as i32;
        raw
    }

    /// The channel's byte form.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_flags()
            .iter()
            .flat_map(|value| value.to_ne_bytes())
            .collect()
    }

    pub fn is_enabled(&self, kind: MetricKind) -> bool {
        self.enabled[kind.index()]
    }

    /// Enabled kinds in canonical order.
    pub fn enabled_kinds(&self) -> Vec<MetricKind> {
        MetricKind::ALL
            .into_iter()
            .filter(|kind| self.is_enabled(*kind))
            .collect()
    }

    pub fn interval_secs(&self) -> u64 {
        self.interval_secs
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Read one vector from the configuration channel (blocks until a writer
    /// opens a FIFO).
    pub fn read_from_channel(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Waiting for configuration on {}", path.display());
        let mut file = std::fs::File::open(path)?;
        let mut buf = [0u8; CONFIG_BYTES];
        file.read_exact(&mut buf).map_err(|e| {
            SystemError::config_error(format!(
                "short read on configuration channel {}: {e}",
                path.display()
            ))
        })?;
        let config = Self::from_bytes(&buf)?;
        info!(
            "Received configuration: {:?} every {}s",
            config.enabled_kinds(),
            config.interval_secs
        );
        Ok(config)
    }

    /// Echo the vector on the acknowledgement channel.
    pub fn acknowledge(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut file = std::fs::OpenOptions::new().write(true).open(path)?;
        file.write_all(&self.to_bytes())?;
        file.flush()?;
        debug!("Acknowledged configuration on {}", path.display());
        Ok(())
    }
}

/// Where the configuration vector comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Read from a FIFO and acknowledge on another
    Channel { config: PathBuf, ack: PathBuf },
    /// Given directly (command line)
    Inline(ConfigVector),
}

impl Default for ConfigSource {
    fn default() -> Self {
        Self::Channel {
            config: PathBuf::from(crate::DEFAULT_CONFIG_FIFO),
            ack: PathBuf::from(crate::DEFAULT_CONFIG_ACK_FIFO),
        }
    }
}

impl ConfigSource {
    /// Obtain the vector, acknowledging receipt when it came over a channel.
    pub fn resolve(&self) -> Result<ConfigVector> {
        match self {
            ConfigSource::Channel { config, ack } => {
                let vector = ConfigVector::read_from_channel(config)?;
                vector.acknowledge(ack)?;
                Ok(vector)
            }
            ConfigSource::Inline(vector) => Ok(*vector),
        }
    }
}

/// Settings for the sampling side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Directory kernel pseudo-files are read from
    pub proc_root: PathBuf,
    /// Interface name prefix for network metrics; first non-loopback if unset
    pub net_interface: Option<String>,
    /// How rates are normalized
    pub rate_mode: RateMode,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from(crate::DEFAULT_PROC_ROOT),
            net_interface: None,
            rate_mode: RateMode::default(),
        }
    }
}

impl CollectorConfig {
    pub fn with_proc_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.proc_root = root.into();
        self
    }

    pub fn with_net_interface(mut self, prefix: Option<String>) -> Self {
        self.net_interface = prefix;
        self
    }

    pub fn with_rate_mode(mut self, mode: RateMode) -> Self {
        self.rate_mode = mode;
        self
    }
}
