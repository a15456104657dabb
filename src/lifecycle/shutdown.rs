//! Shutdown coordination for the balancer.

use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that long-running loops subscribe to.
/// Subscribe before triggering; a receiver created afterwards misses it.
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of subscribers still listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
