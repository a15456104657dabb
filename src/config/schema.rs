//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the balancer.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the TCP balancer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Backend server definitions, in round-robin order.
    pub backends: Vec<BackendConfig>,

    /// Selection settings.
    pub balancer: BalancerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            backends: vec![
                BackendConfig::new("server-1", "localhost:8000"),
                BackendConfig::new("server-2", "localhost:9000"),
            ],
            balancer: BalancerConfig::default(),
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:7878").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:7878".to_string(),
        }
    }
}

/// Backend server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Backend identifier for logging/metrics. Defaults to the address.
    #[serde(default)]
    pub name: String,

    /// Backend address (e.g., "127.0.0.1:3000" or "localhost:8000").
    pub address: String,
}

impl BackendConfig {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    /// Name used in logs; falls back to the address when unnamed.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.address
        } else {
            &self.name
        }
    }
}

/// Round-robin selector settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Index of the backend treated as "last used" at startup.
    /// `None` starts at the last backend, so the first pick is index 0.
    pub initial_cursor: Option<usize>,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Backend connection establishment timeout in milliseconds.
    pub connect_ms: u64,

    /// How long the surviving relay direction may keep draining after the
    /// other direction reached end-of-stream, in milliseconds.
    pub half_close_ms: u64,

    /// How long shutdown waits for live sessions, in seconds.
    pub shutdown_secs: u64,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn half_close(&self) -> Duration {
        Duration::from_millis(self.half_close_ms)
    }

    pub fn shutdown(&self) -> Duration {
        Duration::from_secs(self.shutdown_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 3_000,
            half_close_ms: 5_000,
            shutdown_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
