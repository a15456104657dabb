//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Configure log level from config, overridable by `RUST_LOG`
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::{LogFormat, ObservabilityConfig};

/// Build the filter: `RUST_LOG` if set, else the configured level for this crate.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tcp_balancer={},demo_backend={}", level, level)))
}

/// Install the global subscriber.
pub fn init(config: &ObservabilityConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let registry = tracing_subscriber::registry().with(env_filter(&config.log_level));

    match config.log_format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    }
}
