//! Capacity- and time-bounded cache with least-recently-used eviction
//!
//! Every entry carries a recency marker drawn from a per-cache counter that
//! increases on each `put` and on each `get` hit. Markers are unique, so the
//! smallest one always identifies the single least recently used entry and
//! eviction needs no tie-breaking.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::trace;

use crate::clock::{Clock, SystemClock};
use crate::config::{validate_ttl, CacheConfig};
use crate::entry::CacheEntry;
use crate::error::CacheResult;
use crate::stats::{CacheStats, EntrySnapshot, MetricsCollector};

#[derive(Debug)]
struct Slot<V> {
    entry: CacheEntry<V>,
    marker: u64,
}

/// Entries plus the marker → key index used to find the eviction victim
#[derive(Debug)]
struct Storage<K, V> {
    entries: HashMap<K, Slot<V>>,
    recency: BTreeMap<u64, K>,
    next_marker: u64,
}

impl<K, V> Storage<K, V>
where
    K: Eq + Hash,
{
    fn new() -> Self {
        Self { entries: HashMap::new(), recency: BTreeMap::new(), next_marker: 0 }
    }

    fn issue_marker(&mut self) -> u64 {
        let marker = self.next_marker;
        self.next_marker += 1;
        marker
    }

    fn remove<Q>(&mut self, key: &Q) -> Option<CacheEntry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = self.entries.remove(key)?;
        self.recency.remove(&slot.marker);
        Some(slot.entry)
    }

    fn evict_least_recent(&mut self) -> bool {
        match self.recency.pop_first() {
            Some((_, key)) => self.entries.remove(&key).is_some(),
            None => false,
        }
    }
}

/// Thread-safe LRU cache with per-entry TTL
///
/// All operations, including `get`, run under one mutex because a lookup
/// may delete an expired entry or move the entry to the most recent
/// position.
///
/// # Example
/// ```
/// use flightcache::{BoundedCache, CacheConfig};
///
/// let cache: BoundedCache<String, i32> = BoundedCache::new(CacheConfig::lru(2)).unwrap();
/// cache.put("a".to_string(), 1).unwrap();
/// cache.put("b".to_string(), 2).unwrap();
/// cache.get("a");
/// cache.put("c".to_string(), 3).unwrap();
///
/// assert_eq!(cache.get("a"), Some(1));
/// assert_eq!(cache.get("b"), None);
/// ```
pub struct BoundedCache<K, V, C = SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    storage: Mutex<Storage<K, V>>,
    config: CacheConfig,
    metrics: MetricsCollector,
    clock: C,
}

impl<K, V> BoundedCache<K, V, SystemClock>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache on the system clock.
    ///
    /// Fails with `InvalidConfiguration` for a zero capacity or zero TTL.
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<K, V, C> BoundedCache<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    /// Create a cache reading time from `clock`
    pub fn with_clock(config: CacheConfig, clock: C) -> CacheResult<Self> {
        config.validate()?;
        Ok(Self {
            storage: Mutex::new(Storage::new()),
            config,
            metrics: MetricsCollector::default(),
            clock,
        })
    }

    /// Look up `key`, marking it as most recently used.
    ///
    /// An expired entry is removed by this call and reported as absent.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lookup(key, true)
    }

    /// Same as [`get`](Self::get) but leaves the hit and miss counters
    /// alone, for a second look at a key whose miss was already counted.
    pub(crate) fn get_untracked<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lookup(key, false)
    }

    fn lookup<Q>(&self, key: &Q, count_lookup: bool) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now();
        let mut guard = self.storage.lock();
        let storage = &mut *guard;

        let expired = match storage.entries.get(key) {
            Some(slot) => slot.entry.is_expired(now),
            None => {
                if count_lookup {
                    self.metrics.record_miss();
                }
                return None;
            }
        };

        if expired {
            storage.remove(key);
            self.metrics.record_expirations(1);
            if count_lookup {
                self.metrics.record_miss();
            }
            trace!(size = storage.entries.len(), "dropped expired entry on lookup");
            return None;
        }

        let marker = storage.issue_marker();
        let slot = storage.entries.get_mut(key)?;
        slot.entry.touch(now);
        let previous = std::mem::replace(&mut slot.marker, marker);
        let value = slot.entry.value.clone();

        if let Some(owned_key) = storage.recency.remove(&previous) {
            storage.recency.insert(marker, owned_key);
        }

        if count_lookup {
            self.metrics.record_hit();
        }
        Some(value)
    }

    /// Insert `value` under `key` with the configured default TTL.
    ///
    /// Any existing entry is replaced by a fresh one. If the cache is then
    /// over capacity, the least recently used entry is evicted.
    pub fn put(&self, key: K, value: V) -> CacheResult<()> {
        self.insert_entry(key, value, self.config.default_ttl);
        Ok(())
    }

    /// Insert `value` under `key`, expiring `ttl` after now.
    ///
    /// A zero `ttl` is rejected and the cache is left unchanged.
    pub fn put_with_ttl(&self, key: K, value: V, ttl: Duration) -> CacheResult<()> {
        let ttl = validate_ttl(ttl)?;
        self.insert_entry(key, value, Some(ttl));
        Ok(())
    }

    /// Insert with a TTL that was already validated, or the default when None.
    pub(crate) fn put_validated(&self, key: K, value: V, ttl: Option<Duration>) {
        self.insert_entry(key, value, ttl.or(self.config.default_ttl));
    }

    fn insert_entry(&self, key: K, value: V, ttl: Option<Duration>) {
        let now = self.clock.now();
        let mut guard = self.storage.lock();
        let storage = &mut *guard;

        storage.remove(&key);
        let marker = storage.issue_marker();
        storage.recency.insert(marker, key.clone());
        storage.entries.insert(key, Slot { entry: CacheEntry::new(value, ttl, now), marker });
        self.metrics.record_insert();

        // Each insert adds at most one entry, so one eviction restores the bound.
        if storage.entries.len() > self.config.max_size && storage.evict_least_recent() {
            self.metrics.record_eviction();
            trace!(
                size = storage.entries.len(),
                max_size = self.config.max_size,
                "evicted least recently used entry"
            );
        }
    }

    /// Remove `key`; returns whether an entry existed
    pub fn invalidate<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.storage.lock().remove(key).is_some()
    }

    /// Remove every entry, reset the recency counter and the counters
    pub fn clear(&self) {
        let mut storage = self.storage.lock();
        storage.entries.clear();
        storage.recency.clear();
        storage.next_marker = 0;
        self.metrics.reset();
    }

    /// Whether `key` holds a live entry; does not count as an access
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now();
        self.storage.lock().entries.get(key).is_some_and(|slot| !slot.entry.is_expired(now))
    }

    /// Remove every expired entry; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut storage = self.storage.lock();

        let expired: Vec<K> = storage
            .entries
            .iter()
            .filter(|(_, slot)| slot.entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            storage.remove(key);
        }

        let count = expired.len();
        if count > 0 {
            self.metrics.record_expirations(count as u64);
            trace!(count, "purged expired entries");
        }
        count
    }

    /// Number of stored entries, including expired ones not yet removed
    pub fn len(&self) -> usize {
        self.storage.lock().entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The configuration this cache was built with
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Snapshot of size, per-entry metadata and counters
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let storage = self.storage.lock();

        let entries: Vec<EntrySnapshot> = storage
            .recency
            .values()
            .filter_map(|key| storage.entries.get(key))
            .map(|slot| EntrySnapshot {
                access_count: slot.entry.access_count,
                age: slot.entry.age(now),
                ttl: slot.entry.ttl,
            })
            .collect();

        let mut stats = CacheStats {
            size: storage.entries.len(),
            max_size: self.config.max_size,
            total_accesses: entries.iter().map(|e| e.access_count).sum(),
            entries,
            ..CacheStats::default()
        };
        self.metrics.fill(&mut stats);
        stats
    }
}

impl<K, V, C> std::fmt::Debug for BoundedCache<K, V, C>
where
    K: Eq + Hash + Clone,
    V: Clone,
    C: Clock,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCache")
            .field("len", &self.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
