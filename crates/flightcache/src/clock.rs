//! Time source abstraction
//!
//! Caches read "now" through a [`Clock`] so expiry can be driven by a
//! [`MockClock`] in tests instead of real sleeps.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Source of monotonic time for entry ages and expiry checks.
pub trait Clock: Send + Sync + 'static {
    /// Current monotonic instant
    fn now(&self) -> Instant;
}

/// Real monotonic clock backed by [`Instant::now`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Manually advanced clock for deterministic tests.
///
/// Clones share the same elapsed offset, so a clone handed to a cache moves
/// forward whenever the test advances its own copy.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a mock clock frozen at the current instant
    pub fn new() -> Self {
        Self { start: Instant::now(), elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Move the clock forward by `duration`
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Move the clock forward by `millis` milliseconds
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Total time advanced since creation
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + *self.elapsed.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_clock_advances_shared_offset() {
        let clock = MockClock::new();
        let handle = clock.clone();
        let before = handle.now();

        clock.advance(Duration::from_secs(3));
        clock.advance_millis(500);

        assert_eq!(handle.now() - before, Duration::from_millis(3500));
        assert_eq!(handle.elapsed(), Duration::from_millis(3500));
    }

    #[test]
    fn test_mock_clock_is_frozen_without_advance() {
        let clock = MockClock::new();
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn test_arc_clock_delegates() {
        let clock = Arc::new(MockClock::new());
        let before = clock.now();
        clock.advance(Duration::from_secs(1));
        assert_eq!(Clock::now(&clock) - before, Duration::from_secs(1));
    }
}
