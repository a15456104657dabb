//! Round-robin load balancing strategy.

/// Round-robin cursor.
/// Remembers the most recently selected index and rotates from there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundRobin {
    last_used: usize,
}

impl RoundRobin {
    /// Start with `last_used` as the most recently selected index.
    pub fn starting_at(last_used: usize) -> Self {
        Self { last_used }
    }

    /// The most recently selected index.
    pub fn last_used(&self) -> usize {
        self.last_used
    }

    /// Advance to the next index in a pool of `len` backends.
    ///
    /// `len` must be non-zero; the pool guarantees this at construction.
    pub fn advance(&mut self, len: usize) -> usize {
        debug_assert!(len > 0, "round-robin over an empty pool");
        self.last_used = (self.last_used + 1) % len;
        self.last_used
    }
}
