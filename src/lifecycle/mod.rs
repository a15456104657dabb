//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build pool → Bind listener → Accept
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain sessions → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: any configuration error is fatal before binding
//! - Shutdown has timeout: live sessions get a bounded drain window

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
