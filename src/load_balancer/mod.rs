//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Session needs an upstream
//!     → pool.rs (lock cursor + counters)
//!     → round_robin.rs (advance cursor)
//!     → backend.rs (count the selection)
//!     → Return snapshot of the chosen backend
//! ```
//!
//! # Design Decisions
//! - Pool is fixed at construction; no backend added or removed at runtime
//! - Cursor and counters share one lock so no selection is lost
//! - Selection never fails; an empty pool is rejected up front

pub mod backend;
pub mod pool;
pub mod round_robin;

pub use backend::{Backend, BackendAddr};
pub use pool::{BackendPool, BackendStats, PoolError, SelectedBackend};
