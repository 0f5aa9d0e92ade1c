//! Listener settings for the scrape endpoint.

use crate::error::{Result, SystemError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    /// Permissive CORS headers, for dashboards served from another origin
    pub enable_cors: bool,
}

impl Default for WebConfig {
    /// All interfaces on the default exporter port.
    fn default() -> Self {
        Self::new("0.0.0.0", crate::DEFAULT_WEB_PORT)
    }
}

impl WebConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            enable_cors: false,
        }
    }

    pub fn with_cors(mut self, enable_cors: bool) -> Self {
        self.enable_cors = enable_cors;
        self
    }

    /// Address the listener binds to; the host must be an IP literal.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.to_string()
            .parse()
            .map_err(|e| SystemError::config_error(format!("Invalid bind address {self}: {e}")))
    }
}

impl fmt::Display for WebConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
