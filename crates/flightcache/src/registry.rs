//! Named-cache registry
//!
//! A [`CacheRegistry`] is created once by the application and passed to the
//! components that need caching. Caches are built lazily on the first
//! request for a name; later requests for that name return the same
//! instance, whatever kind or config they ask for.
//!
//! Caches with different key/value types share one registry. Each instance
//! is stored type-erased and recovered by downcast, so asking for an
//! existing name with other types is reported as
//! [`CacheError::TypeMismatch`].

use std::any::Any;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::info;

use crate::bounded::BoundedCache;
use crate::clock::{Clock, SystemClock};
use crate::coalescing::CoalescingCache;
use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::logging::{CacheLogger, TracingLogger};
use crate::settings::ConfigSource;
use crate::stats::CacheStats;

/// Which cache implementation a registry entry uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    /// Plain [`BoundedCache`]
    Bounded,
    /// [`CoalescingCache`] with single-flight `get_or_compute`
    Coalescing,
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded => write!(f, "bounded"),
            Self::Coalescing => write!(f, "coalescing"),
        }
    }
}

/// Shared handle to a registered cache
pub enum CacheHandle<K, V, C = SystemClock>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    C: Clock,
{
    /// A plain bounded cache
    Bounded(Arc<BoundedCache<K, V, C>>),
    /// A single-flight cache
    Coalescing(Arc<CoalescingCache<K, V, C>>),
}

impl<K, V, C> CacheHandle<K, V, C>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    C: Clock,
{
    fn build(kind: CacheKind, config: CacheConfig, clock: C) -> CacheResult<Self> {
        Ok(match kind {
            CacheKind::Bounded => Self::Bounded(Arc::new(BoundedCache::with_clock(config, clock)?)),
            CacheKind::Coalescing => {
                Self::Coalescing(Arc::new(CoalescingCache::with_clock(config, clock)?))
            }
        })
    }

    /// The implementation behind this handle
    pub fn kind(&self) -> CacheKind {
        match self {
            Self::Bounded(_) => CacheKind::Bounded,
            Self::Coalescing(_) => CacheKind::Coalescing,
        }
    }

    /// The underlying bounded cache, for either kind
    pub fn bounded(&self) -> &BoundedCache<K, V, C> {
        match self {
            Self::Bounded(cache) => cache,
            Self::Coalescing(cache) => cache.inner(),
        }
    }

    /// The coalescing cache, if this handle is one
    pub fn coalescing(&self) -> Option<&Arc<CoalescingCache<K, V, C>>> {
        match self {
            Self::Coalescing(cache) => Some(cache),
            Self::Bounded(_) => None,
        }
    }

    /// See [`BoundedCache::get`]
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.bounded().get(key)
    }

    /// See [`BoundedCache::put`]
    pub fn put(&self, key: K, value: V) -> CacheResult<()> {
        self.bounded().put(key, value)
    }

    /// See [`BoundedCache::put_with_ttl`]
    pub fn put_with_ttl(&self, key: K, value: V, ttl: Duration) -> CacheResult<()> {
        self.bounded().put_with_ttl(key, value, ttl)
    }

    /// See [`BoundedCache::invalidate`]
    pub fn invalidate<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.bounded().invalidate(key)
    }

    /// See [`BoundedCache::clear`]
    pub fn clear(&self) {
        self.bounded().clear();
    }

    /// See [`BoundedCache::stats`]
    pub fn stats(&self) -> CacheStats {
        self.bounded().stats()
    }

    /// Whether both handles point at the same cache instance
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bounded(a), Self::Bounded(b)) => Arc::ptr_eq(a, b),
            (Self::Coalescing(a), Self::Coalescing(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<K, V, C> Clone for CacheHandle<K, V, C>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    C: Clock,
{
    fn clone(&self) -> Self {
        match self {
            Self::Bounded(cache) => Self::Bounded(Arc::clone(cache)),
            Self::Coalescing(cache) => Self::Coalescing(Arc::clone(cache)),
        }
    }
}

impl<K, V, C> fmt::Debug for CacheHandle<K, V, C>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    C: Clock,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded(cache) => f.debug_tuple("Bounded").field(cache).finish(),
            Self::Coalescing(cache) => f.debug_tuple("Coalescing").field(cache).finish(),
        }
    }
}

/// Type-erased view the registry keeps for each cache
trait RegisteredCache: Send + Sync {
    fn clear(&self);
    fn stats(&self) -> CacheStats;
    fn kind(&self) -> CacheKind;
    fn as_any(&self) -> &dyn Any;
}

impl<K, V, C> RegisteredCache for CacheHandle<K, V, C>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    C: Clock,
{
    fn clear(&self) {
        CacheHandle::clear(self);
    }

    fn stats(&self) -> CacheStats {
        CacheHandle::stats(self)
    }

    fn kind(&self) -> CacheKind {
        CacheHandle::kind(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Registry of named caches with aggregate stats and bulk clear
pub struct CacheRegistry<C = SystemClock>
where
    C: Clock + Clone,
{
    caches: RwLock<HashMap<String, Arc<dyn RegisteredCache>>>,
    logger: Arc<dyn CacheLogger>,
    clock: C,
}

impl CacheRegistry<SystemClock> {
    /// Registry on the system clock that logs through `tracing`
    pub fn new() -> Self {
        Self::with_logger(Arc::new(TracingLogger))
    }

    /// Registry on the system clock with a custom logger
    pub fn with_logger(logger: Arc<dyn CacheLogger>) -> Self {
        Self::with_clock(SystemClock, logger)
    }
}

impl Default for CacheRegistry<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> CacheRegistry<C>
where
    C: Clock + Clone,
{
    /// Registry whose caches read time from `clock`
    pub fn with_clock(clock: C, logger: Arc<dyn CacheLogger>) -> Self {
        Self { caches: RwLock::new(HashMap::new()), logger, clock }
    }

    /// Return the cache registered as `name`, creating it on first use.
    ///
    /// `kind` and `config` only matter for the call that creates the cache;
    /// `config` is validated at that point.
    pub fn get_cache<K, V>(
        &self,
        name: &str,
        kind: CacheKind,
        config: CacheConfig,
    ) -> CacheResult<CacheHandle<K, V, C>>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        if let Some(existing) = self.caches.read().get(name) {
            return downcast(name, existing.as_ref());
        }

        let mut caches = self.caches.write();
        if let Some(existing) = caches.get(name) {
            return downcast(name, existing.as_ref());
        }

        let handle = CacheHandle::<K, V, C>::build(kind, config, self.clock.clone())?;
        caches.insert(name.to_string(), Arc::new(handle.clone()));
        info!(
            cache = name,
            %kind,
            max_size = config.max_size,
            default_ttl = ?config.default_ttl,
            "created cache"
        );
        Ok(handle)
    }

    /// Like [`get_cache`](Self::get_cache), taking the config for a new
    /// cache from `source`.
    pub fn get_configured_cache<K, V>(
        &self,
        name: &str,
        kind: CacheKind,
        source: &dyn ConfigSource,
    ) -> CacheResult<CacheHandle<K, V, C>>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        if let Some(existing) = self.caches.read().get(name) {
            return downcast(name, existing.as_ref());
        }
        let config = source.config_for(name)?;
        self.get_cache(name, kind, config)
    }

    /// Clear every registered cache; returns how many were cleared
    pub fn clear_all(&self) -> usize {
        let caches: Vec<Arc<dyn RegisteredCache>> = self.caches.read().values().cloned().collect();
        for cache in &caches {
            cache.clear();
        }
        self.logger.info(&format!("cleared {} caches", caches.len()));
        caches.len()
    }

    /// Stats of every registered cache, keyed by name
    pub fn stats(&self) -> HashMap<String, CacheStats> {
        self.caches.read().iter().map(|(name, cache)| (name.clone(), cache.stats())).collect()
    }

    /// Kind of the cache registered as `name`
    pub fn kind_of(&self, name: &str) -> Option<CacheKind> {
        self.caches.read().get(name).map(|cache| cache.kind())
    }

    /// Whether a cache is registered as `name`
    pub fn contains(&self, name: &str) -> bool {
        self.caches.read().contains_key(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered caches
    pub fn len(&self) -> usize {
        self.caches.read().len()
    }

    /// Whether no cache has been registered yet
    pub fn is_empty(&self) -> bool {
        self.caches.read().is_empty()
    }
}

impl<C> fmt::Debug for CacheRegistry<C>
where
    C: Clock + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("caches", &self.names())
            .field("logger", &self.logger)
            .finish_non_exhaustive()
    }
}

fn downcast<K, V, C>(name: &str, cache: &dyn RegisteredCache) -> CacheResult<CacheHandle<K, V, C>>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    C: Clock,
{
    cache
        .as_any()
        .downcast_ref::<CacheHandle<K, V, C>>()
        .cloned()
        .ok_or_else(|| CacheError::TypeMismatch { name: name.to_string() })
}
