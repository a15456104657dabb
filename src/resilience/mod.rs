//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Session dials a backend:
//!     → timeouts.rs (bounded connect)
//!
//! Accept loop hits a transient error:
//!     → backoff.rs (exponential delay with jitter, reset on success)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every outbound dial has a deadline
//! - No retries: a failed dial is reported to the client, not re-routed

pub mod backoff;
pub mod timeouts;
