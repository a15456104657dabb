//! Backend pool management.
//!
//! # Responsibilities
//! - Own the fixed, ordered list of backends
//! - Apply round-robin selection under a single lock
//! - Keep per-backend selection counters consistent with the cursor

use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use crate::config::BackendConfig;
use crate::load_balancer::{
    backend::{AddrParseError, Backend, BackendAddr},
    round_robin::RoundRobin,
};

/// Errors raised while building a pool. All are configuration errors.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("backend pool is empty")]
    Empty,

    #[error("initial cursor {cursor} is out of range for {len} backends")]
    CursorOutOfRange { cursor: usize, len: usize },

    #[error("invalid address for backend {name:?}: {source}")]
    InvalidAddress {
        name: String,
        #[source]
        source: AddrParseError,
    },
}

/// Snapshot of the backend chosen by [`BackendPool::select`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedBackend {
    /// Position in the pool.
    pub index: usize,
    pub name: String,
    pub addr: BackendAddr,
    /// Counter value after this selection.
    pub connections: u64,
}

/// Point-in-time view of one backend's counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendStats {
    pub name: String,
    pub addr: BackendAddr,
    pub connections: u64,
}

/// Cursor and counters, guarded together.
#[derive(Debug)]
struct PoolState {
    backends: Vec<Backend>,
    selector: RoundRobin,
}

/// Fixed pool of backends with round-robin selection.
///
/// Shared between sessions as `Arc<BackendPool>`.
#[derive(Debug)]
pub struct BackendPool {
    state: Mutex<PoolState>,
    len: usize,
}

impl BackendPool {
    /// Create a pool whose first selection is index 0.
    pub fn new(backends: Vec<Backend>) -> Result<Self, PoolError> {
        let last = backends.len().checked_sub(1).ok_or(PoolError::Empty)?;
        Self::with_cursor(backends, last)
    }

    /// Create a pool treating `cursor` as the most recently used index.
    pub fn with_cursor(backends: Vec<Backend>, cursor: usize) -> Result<Self, PoolError> {
        let len = backends.len();
        if len == 0 {
            return Err(PoolError::Empty);
        }
        if cursor >= len {
            return Err(PoolError::CursorOutOfRange { cursor, len });
        }

        Ok(Self {
            state: Mutex::new(PoolState {
                backends,
                selector: RoundRobin::starting_at(cursor),
            }),
            len,
        })
    }

    /// Build a pool from configuration entries.
    pub fn from_config(
        configs: &[BackendConfig],
        initial_cursor: Option<usize>,
    ) -> Result<Self, PoolError> {
        let backends = configs
            .iter()
            .map(|config| -> Result<Backend, PoolError> {
                let addr: BackendAddr = config.address.parse().map_err(|source| {
                    PoolError::InvalidAddress {
                        name: config.display_name().to_string(),
                        source,
                    }
                })?;
                Ok(Backend::new(config.display_name(), addr))
            })
            .collect::<Result<Vec<_>, _>>()?;

        match initial_cursor {
            Some(cursor) => Self::with_cursor(backends, cursor),
            None => Self::new(backends),
        }
    }

    /// Pick the next backend in round-robin order and count the selection.
    ///
    /// Cursor advance and counter increment happen under one lock
    /// acquisition, so concurrent callers each get a distinct slot.
    pub fn select(&self) -> SelectedBackend {
        let mut state = self.lock();
        let index = state.selector.advance(self.len);
        let backend = &mut state.backends[index];
        let connections = backend.record_selection();

        SelectedBackend {
            index,
            name: backend.name.clone(),
            addr: backend.addr.clone(),
            connections,
        }
    }

    /// Number of backends. Never zero.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; an empty pool cannot be constructed.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Index of the most recently selected backend.
    pub fn cursor(&self) -> usize {
        self.lock().selector.last_used()
    }

    /// Counters for every backend, in pool order.
    pub fn snapshot(&self) -> Vec<BackendStats> {
        self.lock()
            .backends
            .iter()
            .map(|b| BackendStats {
                name: b.name.clone(),
                addr: b.addr.clone(),
                connections: b.connections(),
            })
            .collect()
    }

    /// Sum of all backend counters.
    pub fn total_selections(&self) -> u64 {
        self.lock().backends.iter().map(Backend::connections).sum()
    }

    // No code path panics while holding the lock, but a poisoned guard still
    // holds a consistent state, so selection keeps working.
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
