//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server by `(host, port)`
//! - Track the cumulative number of connections routed to it
//! - Parse backend addresses from configuration strings

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a backend address cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddrParseError {
    #[error("missing port in {0:?}")]
    MissingPort(String),

    #[error("empty host in {0:?}")]
    EmptyHost(String),

    #[error("invalid port in {0:?}")]
    InvalidPort(String),
}

/// Network identity of a backend.
///
/// The host is kept unresolved so that names like `localhost` are looked up
/// at dial time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendAddr {
    pub host: String,
    pub port: u16,
}

impl BackendAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl FromStr for BackendAddr {
    type Err = AddrParseError;

    /// Accepts `host:port` and `[v6-addr]:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (host, port) = rest
                .split_once("]:")
                .ok_or_else(|| AddrParseError::MissingPort(s.to_string()))?;
            (host, port)
        } else {
            let (host, port) = s
                .rsplit_once(':')
                .ok_or_else(|| AddrParseError::MissingPort(s.to_string()))?;
            // A bare IPv6 address without brackets is ambiguous.
            if host.contains(':') {
                return Err(AddrParseError::MissingPort(s.to_string()));
            }
            (host, port)
        };

        if host.is_empty() {
            return Err(AddrParseError::EmptyHost(s.to_string()));
        }

        let port: u16 = port
            .parse()
            .map_err(|_| AddrParseError::InvalidPort(s.to_string()))?;
        if port == 0 {
            return Err(AddrParseError::InvalidPort(s.to_string()));
        }

        Ok(Self::new(host, port))
    }
}

impl fmt::Display for BackendAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// A single backend server.
///
/// Owned by the pool; the connection counter is only touched under the
/// pool's lock.
#[derive(Debug, Clone)]
pub struct Backend {
    /// Name used in logs and metrics.
    pub name: String,
    /// Where to dial.
    pub addr: BackendAddr,
    /// Connections routed here since process start.
    connections: u64,
}

impl Backend {
    /// Create a new backend with a zero counter.
    pub fn new(name: impl Into<String>, addr: BackendAddr) -> Self {
        Self {
            name: name.into(),
            addr,
            connections: 0,
        }
    }

    /// Number of connections routed to this backend so far.
    pub fn connections(&self) -> u64 {
        self.connections
    }

    pub(crate) fn record_selection(&mut self) -> u64 {
        self.connections += 1;
        self.connections
    }
}
