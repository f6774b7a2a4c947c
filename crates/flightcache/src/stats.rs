//! Cache statistics and operation counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Point-in-time view of one entry, without its key or value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntrySnapshot {
    /// Accesses so far, including the insert
    pub access_count: u64,
    /// Time since the entry was created
    pub age: Duration,
    /// Configured time-to-live, if any
    pub ttl: Option<Duration>,
}

/// Snapshot of a cache's contents and counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Current number of entries
    pub size: usize,

    /// Configured capacity
    pub max_size: usize,

    /// Sum of `access_count` over all surviving entries
    pub total_accesses: u64,

    /// Per-entry snapshots, least recently used first
    pub entries: Vec<EntrySnapshot>,

    /// Lookups that returned a value
    pub hits: u64,

    /// Lookups that found nothing or an expired entry
    pub misses: u64,

    /// Insert operations
    pub inserts: u64,

    /// Entries removed to respect the capacity
    pub evictions: u64,

    /// Entries removed because their TTL ran out
    pub expirations: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit (0.0 when there were none)
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }

    /// Fraction of lookups that missed
    pub fn miss_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            1.0 - self.hit_rate()
        }
    }

    /// How full the cache is, as `size / max_size`
    pub fn fill_ratio(&self) -> f64 {
        if self.max_size == 0 {
            0.0
        } else {
            self.size as f64 / self.max_size as f64
        }
    }
}

/// Lock-free operation counters shared by one cache instance
#[derive(Debug, Default)]
pub(crate) struct MetricsCollector {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl MetricsCollector {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expirations(&self, count: u64) {
        self.expirations.fetch_add(count, Ordering::Relaxed);
    }

    /// Copy the counters into `stats`
    pub(crate) fn fill(&self, stats: &mut CacheStats) {
        stats.hits = self.hits.load(Ordering::Relaxed);
        stats.misses = self.misses.load(Ordering::Relaxed);
        stats.inserts = self.inserts.load(Ordering::Relaxed);
        stats.evictions = self.evictions.load(Ordering::Relaxed);
        stats.expirations = self.expirations.load(Ordering::Relaxed);
    }

    pub(crate) fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.inserts.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_without_lookups() {
        let stats = CacheStats::default();
        assert_eq!(stats.hit_rate(), 0.0);
        assert_eq!(stats.miss_rate(), 0.0);
        assert_eq!(stats.fill_ratio(), 0.0);
    }

    #[test]
    fn test_rates() {
        let stats = CacheStats { size: 5, max_size: 20, hits: 3, misses: 1, ..Default::default() };
        assert_eq!(stats.hit_rate(), 0.75);
        assert_eq!(stats.miss_rate(), 0.25);
        assert_eq!(stats.fill_ratio(), 0.25);
    }

    #[test]
    fn test_collector_fill_and_reset() {
        let metrics = MetricsCollector::default();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_miss();
        metrics.record_insert();
        metrics.record_eviction();
        metrics.record_expirations(3);

        let mut stats = CacheStats::default();
        metrics.fill(&mut stats);
        assert_eq!((stats.hits, stats.misses, stats.inserts), (2, 1, 1));
        assert_eq!((stats.evictions, stats.expirations), (1, 3));

        metrics.reset();
        let mut stats = CacheStats::default();
        metrics.fill(&mut stats);
        assert_eq!(stats, CacheStats::default());
    }
}
