//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, one span per session)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Connection ID flows through every session log line
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
