//! Connection identity and lifecycle tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Count live sessions so shutdown can wait for them to drain

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Tracks live sessions.
///
/// The count is published through a watch channel so waiters wake on every
/// change instead of polling.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    active: Arc<watch::Sender<u64>>,
}

impl ConnectionTracker {
    /// Create a new connection tracker.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            active: Arc::new(tx),
        }
    }

    /// Record a new live session. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active.send_modify(|n| *n += 1);
        ConnectionGuard {
            active: Arc::clone(&self.active),
            id: ConnectionId::new(),
        }
    }

    /// Get current live session count.
    pub fn active_count(&self) -> u64 {
        *self.active.borrow()
    }

    /// Wait until no session is live. Returns false if `timeout` elapsed first.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let mut rx = self.active.subscribe();
        // Bound before returning: the timeout result borrows `rx`.
        let idle = matches!(
            tokio::time::timeout(timeout, rx.wait_for(|n| *n == 0)).await,
            Ok(Ok(_))
        );
        idle
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that tracks a session's lifetime.
/// Decrements the live count when dropped, on every exit path.
#[derive(Debug)]
pub struct ConnectionGuard {
    active: Arc<watch::Sender<u64>>,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active.send_modify(|n| *n = n.saturating_sub(1));
        tracing::trace!(connection_id = %self.id, "Connection released");
    }
}
