//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Delay for the `attempt`-th consecutive failure (1-based), capped at `max`
/// plus up to 10% jitter.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let base_ms = base.as_millis() as u64;
    let max_ms = max.as_millis() as u64;
    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let capped_delay = base_ms.saturating_mul(exponential_base).min(max_ms);

    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Tracks consecutive failures of a repeating operation.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: 0,
        }
    }

    /// Record a failure and return how long to wait before retrying.
    pub fn next_delay(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        calculate_backoff(self.failures, self.base, self.max)
    }

    /// Forget past failures after a success.
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let base = Duration::from_millis(100);
        let b1 = calculate_backoff(1, base, Duration::from_millis(2000));
        assert!(b1.as_millis() >= 100 && b1.as_millis() < 110);

        let b2 = calculate_backoff(2, base, Duration::from_millis(2000));
        assert!(b2.as_millis() >= 200);

        let max = calculate_backoff(10, base, Duration::from_millis(1000));
        assert!(max.as_millis() >= 1000 && max.as_millis() < 1100);

        assert_eq!(calculate_backoff(0, base, base), Duration::ZERO);
    }

    #[test]
    fn backoff_grows_then_resets() {
        let mut backoff = Backoff::new(Duration::from_millis(5), Duration::from_secs(1));
        let first = backoff.next_delay();
        let _ = backoff.next_delay();
        let third = backoff.next_delay();
        assert_eq!(backoff.failures(), 3);
        assert!(third > first);

        backoff.reset();
        assert_eq!(backoff.failures(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(5));
    }

    #[test]
    fn huge_attempt_counts_saturate() {
        let delay = calculate_backoff(u32::MAX, Duration::from_millis(5), Duration::from_secs(1));
        assert!(delay >= Duration::from_secs(1));
    }
}
