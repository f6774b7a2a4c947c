//! Single-flight wrapper around [`BoundedCache`]
//!
//! `get_or_compute` guarantees that concurrent misses for one key run the
//! producer once. The first caller spawns the producer as a Tokio task and
//! registers a weak handle to it in the pending map; every caller that misses
//! while that handle is alive joins it and receives the same outcome.
//!
//! # Locking
//!
//! The pending map has its own mutex, held only for the join-or-launch
//! decision and for the final cleanup. It is never held across an `.await`,
//! so computations for different keys proceed independently. When both
//! locks are needed the pending lock is taken first.
//!
//! # Cancellation
//!
//! Joiners hold strong clones of the shared flight and the pending map holds
//! a weak one. A joiner that is dropped simply detaches; once the last joiner
//! is gone the producer task is aborted and its pending entry removed.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, warn};

use crate::bounded::BoundedCache;
use crate::clock::{Clock, SystemClock};
use crate::config::{validate_ttl, CacheConfig};
use crate::error::{CacheError, CacheResult};
use crate::stats::CacheStats;

type FlightFuture<V> = BoxFuture<'static, CacheResult<V>>;
type Flight<V> = Shared<FlightFuture<V>>;

struct PendingFlight<V> {
    id: u64,
    flight: WeakShared<FlightFuture<V>>,
}

type PendingMap<K, V> = Arc<Mutex<HashMap<K, PendingFlight<V>>>>;

/// Outcome of the guarded join-or-launch step
enum Lookup<V> {
    Ready(V),
    Flight(Flight<V>),
}

/// Removes a flight's pending entry when the producer task finishes or is
/// dropped, unless a newer flight has taken the slot.
struct FlightCleanup<K, V>
where
    K: Eq + Hash,
{
    pending: PendingMap<K, V>,
    key: K,
    id: u64,
}

impl<K, V> Drop for FlightCleanup<K, V>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        let mut pending = self.pending.lock();
        if pending.get(&self.key).is_some_and(|slot| slot.id == self.id) {
            pending.remove(&self.key);
        }
    }
}

/// Bounded LRU+TTL cache that deduplicates concurrent computations per key.
///
/// # Example
/// ```
/// use flightcache::{CacheConfig, CoalescingCache};
///
/// #[tokio::main]
/// async fn main() {
///     let cache: CoalescingCache<String, u64> =
///         CoalescingCache::new(CacheConfig::lru(100)).unwrap();
///
///     let value = cache
///         .get_or_compute("answer".to_string(), || async { Ok::<_, std::io::Error>(42) })
///         .await
///         .unwrap();
///     assert_eq!(value, 42);
/// }
/// ```
pub struct CoalescingCache<K, V, C = SystemClock>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    C: Clock,
{
    inner: Arc<BoundedCache<K, V, C>>,
    pending: PendingMap<K, V>,
    next_flight: AtomicU64,
}

impl<K, V> CoalescingCache<K, V, SystemClock>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a coalescing cache on the system clock
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<K, V, C> CoalescingCache<K, V, C>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    C: Clock,
{
    /// Create a coalescing cache reading time from `clock`
    pub fn with_clock(config: CacheConfig, clock: C) -> CacheResult<Self> {
        Ok(Self::from_cache(BoundedCache::with_clock(config, clock)?))
    }

    /// Wrap an existing bounded cache
    pub fn from_cache(inner: BoundedCache<K, V, C>) -> Self {
        Self {
            inner: Arc::new(inner),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_flight: AtomicU64::new(0),
        }
    }

    /// Return the cached value for `key`, or compute it with `producer`.
    ///
    /// Concurrent callers for the same key share one producer run and all
    /// observe its outcome. A successful value is stored with the cache's
    /// default TTL; a failure is returned as
    /// [`CacheError::ComputationFailure`] and nothing is cached, so the
    /// next call computes again.
    ///
    /// `producer` is called at most once per flight, after the flight is
    /// registered and with no lock held, so it may call back into this cache.
    pub async fn get_or_compute<F, Fut, E>(&self, key: K, producer: F) -> CacheResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Into<Box<dyn StdError + Send + Sync>> + 'static,
    {
        self.compute(key, None, producer).await
    }

    /// Like [`get_or_compute`](Self::get_or_compute), storing a successful
    /// value with `ttl`.
    ///
    /// Callers that join an existing flight get that flight's TTL. `ttl`
    /// bounds retention only; it does not time out the producer.
    pub async fn get_or_compute_with_ttl<F, Fut, E>(
        &self,
        key: K,
        ttl: Duration,
        producer: F,
    ) -> CacheResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Into<Box<dyn StdError + Send + Sync>> + 'static,
    {
        let ttl = validate_ttl(ttl)?;
        self.compute(key, Some(ttl), producer).await
    }

    async fn compute<F, Fut, E>(&self, key: K, ttl: Option<Duration>, producer: F) -> CacheResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Into<Box<dyn StdError + Send + Sync>> + 'static,
    {
        if let Some(value) = self.inner.get(&key) {
            return Ok(value);
        }

        match self.join_or_launch(key, ttl, producer)? {
            Lookup::Ready(value) => Ok(value),
            Lookup::Flight(flight) => flight.await,
        }
    }

    fn join_or_launch<F, Fut, E>(
        &self,
        key: K,
        ttl: Option<Duration>,
        producer: F,
    ) -> CacheResult<Lookup<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Into<Box<dyn StdError + Send + Sync>> + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| CacheError::NoRuntime)?;

        let (flight, work_tx) = {
            let mut pending = self.pending.lock();

            if let Some(flight) = pending.get(&key).and_then(|slot| slot.flight.upgrade()) {
                debug!("joining in-flight computation");
                return Ok(Lookup::Flight(flight));
            }

            // A flight may have stored its value while this caller waited for
            // the lock. The miss was already counted on the fast path.
            if let Some(value) = self.inner.get_untracked(&key) {
                return Ok(Lookup::Ready(value));
            }

            let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
            let (work_tx, work_rx) = oneshot::channel();
            let flight = self.launch(&runtime, key.clone(), id, ttl, work_rx);
            if let Some(weak) = flight.downgrade() {
                pending.insert(key, PendingFlight { id, flight: weak });
            }
            debug!(flight = id, in_flight = pending.len(), "started computation");
            (flight, work_tx)
        };

        // The slot is reserved, so the producer runs outside the lock.
        let work = producer().map(|outcome| outcome.map_err(CacheError::computation)).boxed();
        if work_tx.send(work).is_err() {
            debug!("flight ended before its producer was handed over");
        }

        Ok(Lookup::Flight(flight))
    }

    fn launch(
        &self,
        runtime: &Handle,
        key: K,
        id: u64,
        ttl: Option<Duration>,
        work: oneshot::Receiver<FlightFuture<V>>,
    ) -> Flight<V> {
        let cleanup = FlightCleanup { pending: Arc::clone(&self.pending), key: key.clone(), id };
        let inner = Arc::clone(&self.inner);

        let task = runtime.spawn(async move {
            let outcome = match work.await {
                Ok(work) => work.await,
                Err(_) => Err(CacheError::ComputationPanicked(
                    "producer panicked before returning its future".to_string(),
                )),
            };
            match &outcome {
                Ok(value) => {
                    inner.put_validated(key, value.clone(), ttl);
                    debug!(flight = id, "computation settled");
                }
                Err(err) => {
                    warn!(flight = id, error = %err, "computation failed, result not cached");
                }
            }
            drop(cleanup);
            outcome
        });

        let handle = AbortOnDropHandle::new(task);
        async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(err) => Err(CacheError::from(err)),
            }
        }
        .boxed()
        .shared()
    }

    /// Number of keys with a computation currently registered
    pub fn in_flight(&self) -> usize {
        self.pending.lock().len()
    }

    /// Callers currently awaiting the flight registered for `key`
    #[cfg(test)]
    fn joiners(&self, key: &K) -> usize {
        let pending = self.pending.lock();
        pending
            .get(key)
            .and_then(|slot| slot.flight.upgrade())
            .and_then(|flight| flight.strong_count())
            .map_or(0, |count| count.saturating_sub(1))
    }

    /// The wrapped bounded cache
    pub fn inner(&self) -> &BoundedCache<K, V, C> {
        &self.inner
    }

    /// See [`BoundedCache::get`]
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.get(key)
    }

    /// See [`BoundedCache::put`]
    pub fn put(&self, key: K, value: V) -> CacheResult<()> {
        self.inner.put(key, value)
    }

    /// See [`BoundedCache::put_with_ttl`]
    pub fn put_with_ttl(&self, key: K, value: V, ttl: Duration) -> CacheResult<()> {
        self.inner.put_with_ttl(key, value, ttl)
    }

    /// See [`BoundedCache::invalidate`]
    pub fn invalidate<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.invalidate(key)
    }

    /// Clear stored values. Computations already in flight still store
    /// their result when they finish.
    pub fn clear(&self) {
        self.inner.clear();
    }

    /// See [`BoundedCache::purge_expired`]
    pub fn purge_expired(&self) -> usize {
        self.inner.purge_expired()
    }

    /// See [`BoundedCache::len`]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// See [`BoundedCache::is_empty`]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// See [`BoundedCache::stats`]
    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}

impl<K, V, C> std::fmt::Debug for CoalescingCache<K, V, C>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    C: Clock,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoalescingCache")
            .field("inner", &self.inner)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
