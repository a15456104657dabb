//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, transient error backoff)
//!     → connection.rs (connection ID, live session tracking)
//!     → Hand off to the proxy on a new task
//! ```
//!
//! # Design Decisions
//! - The accept loop never waits on a session
//! - No admission limit; every accepted connection gets a session
//! - Each session tracked for graceful shutdown

pub mod connection;
pub mod listener;

pub use listener::{Listener, ListenerError};
