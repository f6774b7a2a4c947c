//! Integration tests for the bounded and coalescing caches
//!
//! Covers eviction order, TTL expiry, access accounting and single-flight
//! computation through the public API only.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use flightcache::{
    BoundedCache, CacheConfig, CacheError, CoalescingCache, ErrorClassification, MockClock,
};

fn key(name: &str) -> String {
    name.to_string()
}

/// Validates that inserting past capacity evicts the oldest entry.
///
/// # Test Steps
/// 1. Insert A, B and C into a cache with max size 2
/// 2. Verify A is gone and B, C remain
#[test]
fn test_lru_evicts_oldest_insert() {
    let cache: BoundedCache<String, i32> = BoundedCache::new(CacheConfig::lru(2)).unwrap();

    cache.put(key("A"), 1).unwrap();
    cache.put(key("B"), 2).unwrap();
    cache.put(key("C"), 3).unwrap();

    assert_eq!(cache.get("A"), None); // Evicted
    assert_eq!(cache.get("B"), Some(2));
    assert_eq!(cache.get("C"), Some(3));
    assert_eq!(cache.len(), 2);
}

/// Validates that a read between inserts protects the entry from eviction.
///
/// # Test Steps
/// 1. Insert A and B into a cache with max size 2
/// 2. Read A so B becomes least recently used
/// 3. Insert C and verify B (not A) was evicted
#[test]
fn test_get_refreshes_recency() {
    let cache: BoundedCache<String, i32> = BoundedCache::new(CacheConfig::lru(2)).unwrap();

    cache.put(key("A"), 1).unwrap();
    cache.put(key("B"), 2).unwrap();
    assert_eq!(cache.get("A"), Some(1));
    cache.put(key("C"), 3).unwrap();

    assert_eq!(cache.get("A"), Some(1));
    assert_eq!(cache.get("B"), None); // Evicted
    assert_eq!(cache.get("C"), Some(3));
}

/// Validates that expired entries vanish on read and leave the size count.
///
/// # Test Steps
/// 1. Insert an entry with a 10s TTL using a mock clock
/// 2. Advance exactly 10s and verify it is still served
/// 3. Advance past the TTL and verify the read misses and size drops to 0
#[test]
fn test_ttl_expiry_is_lazy_and_strict() {
    let clock = MockClock::new();
    let cache: BoundedCache<String, i32, MockClock> =
        BoundedCache::with_clock(CacheConfig::lru(10), clock.clone()).unwrap();

    cache.put_with_ttl(key("token"), 7, Duration::from_secs(10)).unwrap();

    clock.advance(Duration::from_secs(10));
    assert_eq!(cache.get("token"), Some(7));

    clock.advance_millis(1);
    assert_eq!(cache.stats().size, 1); // Not yet discovered
    assert_eq!(cache.get("token"), None);
    assert_eq!(cache.stats().size, 0);
}

/// Validates that reads do not extend an entry's lifetime.
#[test]
fn test_access_does_not_refresh_ttl() {
    let clock = MockClock::new();
    let cache: BoundedCache<String, i32, MockClock> = BoundedCache::with_clock(
        CacheConfig::ttl_lru(Duration::from_secs(5), 10),
        clock.clone(),
    )
    .unwrap();

    cache.put(key("k"), 1).unwrap();
    for _ in 0..4 {
        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("k"), Some(1));
    }
    clock.advance(Duration::from_secs(2));

    assert_eq!(cache.get("k"), None);
}

/// Validates that overwriting an entry resets its metadata.
#[test]
fn test_put_overwrites_with_fresh_entry() {
    let cache: BoundedCache<String, i32> = BoundedCache::new(CacheConfig::lru(4)).unwrap();

    cache.put(key("k"), 1).unwrap();
    let _ = cache.get("k");
    let _ = cache.get("k");
    cache.put(key("k"), 2).unwrap();

    let stats = cache.stats();
    assert_eq!(cache.get("k"), Some(2));
    assert_eq!(stats.size, 1);
    assert_eq!(stats.total_accesses, 1);
    assert_eq!(stats.entries[0].access_count, 1);
}

/// Validates invalidate and clear bookkeeping.
#[test]
fn test_invalidate_and_clear() {
    let cache: BoundedCache<String, i32> = BoundedCache::new(CacheConfig::lru(4)).unwrap();
    cache.put(key("a"), 1).unwrap();
    cache.put(key("b"), 2).unwrap();

    assert!(cache.invalidate("a"));
    assert!(!cache.invalidate("a"));
    assert_eq!(cache.len(), 1);

    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.stats().total_accesses, 0);
}

/// Validates that invalid configuration is rejected up front.
#[test]
fn test_invalid_configuration_rejected() {
    let zero = BoundedCache::<String, i32>::new(CacheConfig::lru(0));
    assert!(matches!(zero, Err(CacheError::InvalidConfiguration { field: "max_size", .. })));

    let cache: BoundedCache<String, i32> = BoundedCache::new(CacheConfig::lru(2)).unwrap();
    let err = cache.put_with_ttl(key("k"), 1, Duration::ZERO).unwrap_err();
    assert!(matches!(err, CacheError::InvalidConfiguration { .. }));
    assert!(!err.is_retryable());
    assert!(cache.is_empty());
}

/// Validates size bound and access accounting under parallel threads.
///
/// # Test Steps
/// 1. Run 8 threads doing interleaved puts and gets on a cache of size 16
/// 2. Verify size never exceeds the bound
/// 3. Verify total_accesses equals the sum of per-entry access counts
#[test]
fn test_parallel_threads_keep_invariants() {
    let cache: Arc<BoundedCache<u64, u64>> =
        Arc::new(BoundedCache::new(CacheConfig::lru(16)).unwrap());

    let handles: Vec<_> = (0..8u64)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..500u64 {
                    let key = (t * 7 + i) % 40;
                    if i % 3 == 0 {
                        cache.put(key, i).unwrap();
                    } else {
                        let _ = cache.get(&key);
                    }
                    assert!(cache.len() <= 16);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let stats = cache.stats();
    assert!(stats.size <= 16);
    assert_eq!(stats.total_accesses, stats.entries.iter().map(|e| e.access_count).sum::<u64>());
}

/// Validates that N concurrent callers share a single producer run.
///
/// # Test Steps
/// 1. Spawn 16 tasks calling get_or_compute for the same key
/// 2. The producer sleeps briefly and counts its invocations
/// 3. Verify the producer ran once and all callers got the same value
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_flight_across_tasks() {
    let cache: Arc<CoalescingCache<String, u64>> =
        Arc::new(CoalescingCache::new(CacheConfig::lru(8)).unwrap());
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(tokio::sync::Notify::new());

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                cache
                    .get_or_compute(key("report"), move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        gate.notified().await;
                        Ok::<_, std::io::Error>(99)
                    })
                    .await
            })
        })
        .collect();

    // Let every task reach the flight before releasing the producer.
    while cache.in_flight() == 0 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    gate.notify_one();

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), 99);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.get(&key("report")), Some(99));
    assert_eq!(cache.in_flight(), 0);
}

/// Validates that a failed computation is not cached and can be retried.
#[tokio::test]
async fn test_failure_then_retry() -> anyhow::Result<()> {
    let cache: CoalescingCache<String, u64> = CoalescingCache::new(CacheConfig::lru(8))?;

    let err = cache
        .get_or_compute(key("flaky"), || async {
            Err::<u64, _>(std::io::Error::new(std::io::ErrorKind::TimedOut, "upstream timeout"))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CacheError::ComputationFailure(_)));
    assert!(err.to_string().contains("upstream timeout"));
    assert_eq!(cache.get(&key("flaky")), None);

    let value = cache
        .get_or_compute(key("flaky"), || async { Ok::<_, std::io::Error>(5) })
        .await?;
    assert_eq!(value, 5);
    Ok(())
}

/// Validates that the per-call TTL bounds retention of computed values.
#[tokio::test]
async fn test_computed_value_respects_ttl() -> anyhow::Result<()> {
    let clock = MockClock::new();
    let cache: CoalescingCache<String, u64, MockClock> =
        CoalescingCache::with_clock(CacheConfig::lru(8), clock.clone())?;
    let calls = Arc::new(AtomicUsize::new(0));

    for expected_calls in [1, 1, 2] {
        let counter = Arc::clone(&calls);
        let value = cache
            .get_or_compute_with_ttl(key("rate"), Duration::from_secs(30), move || async move {
                Ok::<_, std::io::Error>(counter.fetch_add(1, Ordering::SeqCst) as u64)
            })
            .await?;
        assert_eq!(calls.load(Ordering::SeqCst), expected_calls);
        assert_eq!(value, expected_calls as u64 - 1);
        clock.advance(Duration::from_secs(20));
    }
    Ok(())
}
