//! In-process caching with bounded LRU+TTL storage and request coalescing.
//!
//! # Components
//!
//! - [`BoundedCache`]: thread-safe cache capped at `max_size` entries,
//!   evicting the least recently used entry and expiring entries lazily
//!   once their TTL has elapsed
//! - [`CoalescingCache`]: a bounded cache whose `get_or_compute` runs at
//!   most one producer per key, sharing its outcome with every concurrent
//!   caller
//! - [`CacheRegistry`]: named caches created on first use, with aggregate
//!   stats and bulk clear
//!
//! Time is read through the [`Clock`] trait so expiry can be driven by a
//! [`MockClock`] in tests. Cache sizes and TTLs can be loaded per name from
//! TOML or JSON through [`SettingsFile`].
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use flightcache::{CacheConfig, CacheHandle, CacheKind, CacheRegistry};
//!
//! let registry = CacheRegistry::new();
//! let sessions: CacheHandle<String, u64> = registry
//!     .get_cache("sessions", CacheKind::Bounded, CacheConfig::ttl_lru(Duration::from_secs(60), 500))
//!     .unwrap();
//!
//! sessions.put("alice".to_string(), 7).unwrap();
//! assert_eq!(sessions.get(&"alice".to_string()), Some(7));
//! assert_eq!(registry.stats()["sessions"].size, 1);
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod bounded;
pub mod clock;
pub mod coalescing;
pub mod config;
pub mod entry;
pub mod error;
pub mod logging;
pub mod registry;
pub mod settings;
pub mod stats;
pub mod testing;

pub use bounded::BoundedCache;
pub use clock::{Clock, MockClock, SystemClock};
pub use coalescing::CoalescingCache;
pub use config::{CacheConfig, CacheConfigBuilder, DEFAULT_MAX_SIZE};
pub use entry::CacheEntry;
pub use error::{CacheError, CacheResult, ErrorClassification, ErrorSeverity, SharedError};
pub use logging::{init_tracing, CacheLogger, TracingLogger};
pub use registry::{CacheHandle, CacheKind, CacheRegistry};
pub use settings::{CacheSettings, ConfigSource, SettingsFile};
pub use stats::{CacheStats, EntrySnapshot};
