//! Cache entry with access metadata.

use std::time::{Duration, Instant};

/// A cached value plus the metadata used for expiry and statistics.
///
/// Times are supplied by the owning cache's clock rather than read here, so
/// every check within one cache operation sees the same "now".
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The cached value
    pub value: V,

    /// When the entry was created
    pub created_at: Instant,

    /// When the entry was last read or written
    pub accessed_at: Instant,

    /// Number of accesses, starting at 1 for the insert itself
    pub access_count: u64,

    /// Time-to-live measured from `created_at` (None = never expires)
    pub ttl: Option<Duration>,
}

impl<V> CacheEntry<V> {
    /// Creates a fresh entry observed at `now`
    pub fn new(value: V, ttl: Option<Duration>, now: Instant) -> Self {
        Self { value, created_at: now, accessed_at: now, access_count: 1, ttl }
    }

    /// True once more than `ttl` has passed since creation.
    ///
    /// Access never extends the lifetime: `touch` leaves `created_at` alone.
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => self.age(now) > ttl,
            None => false,
        }
    }

    /// Records a read at `now`
    pub fn touch(&mut self, now: Instant) {
        self.accessed_at = now;
        self.access_count += 1;
    }

    /// Time elapsed since creation
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    /// Time elapsed since the last access
    pub fn idle_time(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.accessed_at)
    }

    /// Remaining lifetime, or None when there is no TTL or it has run out
    pub fn remaining_ttl(&self, now: Instant) -> Option<Duration> {
        self.ttl.and_then(|ttl| ttl.checked_sub(self.age(now)).filter(|left| !left.is_zero()))
    }
}
