//! Error handling for the syswatch exporter.

use crate::metrics::data::MetricKind;
use std::path::PathBuf;

/// A specialized `Result` type for syswatch operations.
pub type Result<T> = std::result::Result<T, SystemError>;

/// The main error type for syswatch.
///
/// The first four variants describe a single metric's single poll attempt and
/// are never fatal: the collector logs them and moves on to the next kind.
#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    /// A kernel pseudo-file could not be opened or read
    #[error("source unavailable: {path}: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The expected record or field was missing or malformed
    #[error("failed to parse counters: {0}")]
    ParseFailure(String),

    /// Counters did not advance (or went backwards), so no rate is defined
    #[error("degenerate interval: {0}")]
    DegenerateInterval(String),

    /// First successful read of a rate metric; stored as the baseline only
    #[error("{0} has no prior sample yet")]
    Warmup(MetricKind),

    /// Configuration vector or CLI options were invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O on the configuration channel failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),

    /// Unexpected internal failure (lock poisoning and the like)
    #[error("System error: {0}")]
    System(String),
}

impl SystemError {
    /// Create a new source-unavailable error for `path`
    pub fn source_unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SourceUnavailable {
            path: path.into(),
            source,
        }
    }

    /// Create a new parse error
    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::ParseFailure(msg.into())
    }

    /// Create a new degenerate-interval error
    pub fn degenerate_interval(msg: impl Into<String>) -> Self {
        Self::DegenerateInterval(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new generic system error
    #[allow(clippy::self_named_constructors)]
    pub fn system_error(msg: impl Into<String>) -> Self {
        Self::System(msg.into())
    }

    /// Whether this error only affects one metric for one poll cycle.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable { .. }
                | Self::ParseFailure(_)
                | Self::DegenerateInterval(_)
                | Self::Warmup(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(SystemError::source_unavailable("/proc/stat", io).is_transient());
        assert!(SystemError::parse_error("bad").is_transient());
        assert!(SystemError::degenerate_interval("zero").is_transient());
        assert!(SystemError::Warmup(MetricKind::CpuUsage).is_transient());
        assert!(!SystemError::system_error("poisoned").is_transient());
        assert!(!SystemError::config_error("interval").is_transient());
    }

    #[test]
    fn test_source_unavailable_mentions_path() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = SystemError::source_unavailable("/proc/meminfo", io);
        assert!(err.to_string().contains("/proc/meminfo"));
    }
}
