//! Error types for cache construction, computation and settings loading
//!
//! A cache miss is never an error; lookups report absence as `None`. The
//! variants here cover the operations that can genuinely fail.
//!
//! Every variant is `Clone`: a single in-flight computation hands the same
//! outcome to all of its joiners, so foreign errors are kept behind an `Arc`.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Shared, type-erased error produced by a value producer
pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

/// Standard result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors raised by caches, the registry and the settings loader
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// A size or TTL value that would corrupt the cache
    #[error("invalid cache configuration for '{field}': {reason}")]
    InvalidConfiguration { field: &'static str, reason: String },

    /// The producer passed to `get_or_compute` returned an error
    #[error("value computation failed: {0}")]
    ComputationFailure(#[source] SharedError),

    /// The producer task panicked before yielding a value
    #[error("value computation panicked: {0}")]
    ComputationPanicked(String),

    /// The producer task was aborted before yielding a value
    #[error("value computation was cancelled")]
    ComputationCancelled,

    /// A coalescing call was made outside of a Tokio runtime
    #[error("no Tokio runtime available to drive the computation")]
    NoRuntime,

    /// A registry name is already bound to a cache with other key/value types
    #[error("cache '{name}' is registered with different key/value types")]
    TypeMismatch { name: String },

    /// Settings could not be read or parsed
    #[error("settings error: {0}")]
    Settings(String),
}

impl CacheError {
    /// Wrap a producer error so it can be shared between joiners
    pub fn computation<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        Self::ComputationFailure(Arc::from(err.into()))
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration { field, reason: reason.into() }
    }

    /// The original producer error, if this is a computation failure
    pub fn computation_source(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            Self::ComputationFailure(source) => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Error severity used for log levels and alerting decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Expected condition, informational only
    Info,
    /// Degraded but operational
    Warning,
    /// Failure requiring attention
    Error,
    /// Invariant violation
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Standard interface for classifying errors by their characteristics
pub trait ErrorClassification {
    /// Whether repeating the same call may succeed
    fn is_retryable(&self) -> bool;

    /// Severity for monitoring and log level decisions
    fn severity(&self) -> ErrorSeverity;

    /// Whether the error signals a broken invariant
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    /// Suggested delay before retrying, if any
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl ErrorClassification for CacheError {
    fn is_retryable(&self) -> bool {
        // Failed computations are never cached, so a fresh call recomputes.
        matches!(
            self,
            Self::ComputationFailure(_) | Self::ComputationPanicked(_) | Self::ComputationCancelled
        )
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::ComputationFailure(_) | Self::ComputationCancelled => ErrorSeverity::Warning,
            Self::InvalidConfiguration { .. }
            | Self::TypeMismatch { .. }
            | Self::Settings(_)
            | Self::NoRuntime => ErrorSeverity::Error,
            Self::ComputationPanicked(_) => ErrorSeverity::Critical,
        }
    }
}

impl From<tokio::task::JoinError> for CacheError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            Self::ComputationCancelled
        } else {
            Self::ComputationPanicked(err.to_string())
        }
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        Self::Settings(err.to_string())
    }
}

impl From<toml::de::Error> for CacheError {
    fn from(err: toml::de::Error) -> Self {
        Self::Settings(format!("invalid TOML: {}", err))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Settings(format!("invalid JSON: {}", err))
    }
}
