//! Per-cache settings loaded from files and the environment
//!
//! ## File Format
//! TOML or JSON, chosen by file extension:
//!
//! ```toml
//! [defaults]
//! max_size = 1000
//! default_ttl_secs = 300
//!
//! [caches.sessions]
//! max_size = 50
//! default_ttl_secs = 1.5
//! ```
//!
//! Caches without their own table use `[defaults]`; without `[defaults]`
//! they use [`CacheConfig::default`].
//!
//! ## Environment Variables
//! - `FLIGHTCACHE_MAX_SIZE`: overrides `defaults.max_size`
//! - `FLIGHTCACHE_DEFAULT_TTL_SECS`: overrides `defaults.default_ttl_secs`

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::config::{ttl_from_secs, CacheConfig};
use crate::error::{CacheError, CacheResult};

/// Environment variable overriding the default capacity
pub const ENV_MAX_SIZE: &str = "FLIGHTCACHE_MAX_SIZE";

/// Environment variable overriding the default TTL, in seconds
pub const ENV_DEFAULT_TTL_SECS: &str = "FLIGHTCACHE_DEFAULT_TTL_SECS";

/// Supplies the configuration for a named cache
pub trait ConfigSource {
    /// Configuration for the cache called `name`
    fn config_for(&self, name: &str) -> CacheResult<CacheConfig>;
}

/// Settings for one cache exactly as written by a user.
///
/// Fields are signed so that negative values reach validation and are
/// reported, rather than failing deserialization with a type error.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CacheSettings {
    /// Maximum number of entries
    pub max_size: i64,

    /// Default time-to-live in seconds (fractions allowed)
    #[serde(default)]
    pub default_ttl_secs: Option<f64>,
}

impl TryFrom<CacheSettings> for CacheConfig {
    type Error = CacheError;

    fn try_from(settings: CacheSettings) -> CacheResult<Self> {
        let max_size = usize::try_from(settings.max_size)
            .ok()
            .filter(|size| *size > 0)
            .ok_or_else(|| {
                CacheError::invalid(
                    "max_size",
                    format!("{} is not a positive entry count", settings.max_size),
                )
            })?;
        let default_ttl = settings.default_ttl_secs.map(ttl_from_secs).transpose()?;

        let config = CacheConfig { max_size, default_ttl };
        config.validate()?;
        Ok(config)
    }
}

/// Settings file contents: optional defaults plus per-name overrides
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SettingsFile {
    /// Settings used by caches without their own entry
    #[serde(default)]
    pub defaults: Option<CacheSettings>,

    /// Settings keyed by cache name
    #[serde(default)]
    pub caches: HashMap<String, CacheSettings>,
}

impl SettingsFile {
    /// Load settings from `path`, then apply environment overrides.
    ///
    /// # Errors
    /// Returns `CacheError::Settings` if the file is missing, unreadable, of
    /// an unsupported format, or malformed.
    pub fn load(path: impl AsRef<Path>) -> CacheResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CacheError::Settings(format!(
                "settings file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "loading cache settings");
        let contents = std::fs::read_to_string(path)?;
        let mut settings = Self::parse(&contents, path)?;
        settings.apply_env()?;
        Ok(settings)
    }

    /// Parse settings, detecting the format from `path`'s extension
    pub fn parse(contents: &str, path: &Path) -> CacheResult<Self> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

        match extension {
            "toml" => Ok(toml::from_str(contents)?),
            "json" => Ok(serde_json::from_str(contents)?),
            other => Err(CacheError::Settings(format!("unsupported settings format: {}", other))),
        }
    }

    /// Override the defaults from `FLIGHTCACHE_*` environment variables
    pub fn apply_env(&mut self) -> CacheResult<()> {
        let max_size = env_parse::<i64>(ENV_MAX_SIZE)?;
        let ttl_secs = env_parse::<f64>(ENV_DEFAULT_TTL_SECS)?;
        if max_size.is_none() && ttl_secs.is_none() {
            return Ok(());
        }

        let base = CacheConfig::default();
        let defaults = self.defaults.get_or_insert(CacheSettings {
            max_size: i64::try_from(base.max_size).unwrap_or(i64::MAX),
            default_ttl_secs: None,
        });
        if let Some(max_size) = max_size {
            defaults.max_size = max_size;
        }
        if ttl_secs.is_some() {
            defaults.default_ttl_secs = ttl_secs;
        }
        tracing::debug!(?defaults, "applied environment overrides to cache defaults");
        Ok(())
    }
}

impl ConfigSource for SettingsFile {
    fn config_for(&self, name: &str) -> CacheResult<CacheConfig> {
        match self.caches.get(name).or(self.defaults.as_ref()) {
            Some(settings) => CacheConfig::try_from(*settings),
            None => Ok(CacheConfig::default()),
        }
    }
}

/// A fixed config for every name
impl ConfigSource for CacheConfig {
    fn config_for(&self, _name: &str) -> CacheResult<CacheConfig> {
        Ok(*self)
    }
}

fn env_parse<T>(key: &str) -> CacheResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| CacheError::Settings(format!("invalid {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}
