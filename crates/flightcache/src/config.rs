//! Cache configuration types and builder
//!
//! A [`CacheConfig`] carries the capacity and the default time-to-live of a
//! single cache. Presets and the builder never fail; validation happens when
//! a cache is constructed from the config (see [`CacheConfig::validate`]).

use std::time::Duration;

use crate::error::{CacheError, CacheResult};

/// Capacity used by [`CacheConfig::default`]
pub const DEFAULT_MAX_SIZE: usize = 1000;

/// Configuration for a bounded cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries; must be greater than zero
    pub max_size: usize,

    /// TTL applied by `put` when no explicit TTL is given (None = no expiry)
    pub default_ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_size: DEFAULT_MAX_SIZE, default_ttl: None }
    }
}

impl CacheConfig {
    /// Create a new configuration builder
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// LRU cache without expiry
    ///
    /// # Example
    /// ```
    /// use flightcache::CacheConfig;
    ///
    /// let config = CacheConfig::lru(1000);
    /// assert_eq!(config.default_ttl, None);
    /// ```
    pub fn lru(max_size: usize) -> Self {
        Self { max_size, default_ttl: None }
    }

    /// LRU cache whose entries expire `ttl` after creation
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    ///
    /// use flightcache::CacheConfig;
    ///
    /// let config = CacheConfig::ttl_lru(Duration::from_secs(300), 1000);
    /// assert_eq!(config.max_size, 1000);
    /// ```
    pub fn ttl_lru(ttl: Duration, max_size: usize) -> Self {
        Self { max_size, default_ttl: Some(ttl) }
    }

    /// Reject settings that would let the cache grow without bound or store
    /// entries that are expired on arrival.
    pub fn validate(&self) -> CacheResult<()> {
        if self.max_size == 0 {
            return Err(CacheError::invalid("max_size", "must be greater than zero"));
        }
        if let Some(ttl) = self.default_ttl {
            validate_ttl(ttl)?;
        }
        Ok(())
    }
}

/// Builder for [`CacheConfig`] with a fluent API
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum number of entries
    pub fn max_size(mut self, size: usize) -> Self {
        self.config.max_size = size;
        self
    }

    /// Set the default time-to-live for entries
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.config.default_ttl = Some(ttl);
        self
    }

    /// Remove any default time-to-live
    pub fn no_ttl(mut self) -> Self {
        self.config.default_ttl = None;
        self
    }

    /// Build the configuration
    pub fn build(self) -> CacheConfig {
        self.config
    }
}

/// A TTL of zero would expire an entry on its first lookup.
pub fn validate_ttl(ttl: Duration) -> CacheResult<Duration> {
    if ttl.is_zero() {
        return Err(CacheError::invalid("ttl", "must be greater than zero"));
    }
    Ok(ttl)
}

/// Convert a signed seconds value from an external source into a TTL.
pub fn ttl_from_secs(secs: f64) -> CacheResult<Duration> {
    if !secs.is_finite() {
        return Err(CacheError::invalid("ttl", format!("{} is not a finite number", secs)));
    }
    if secs < 0.0 {
        return Err(CacheError::invalid("ttl", format!("{} seconds is negative", secs)));
    }
    let ttl = Duration::try_from_secs_f64(secs)
        .map_err(|e| CacheError::invalid("ttl", format!("{} seconds: {}", secs, e)))?;
    validate_ttl(ttl)
}
