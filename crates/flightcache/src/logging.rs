//! Logger capability consumed by the registry, plus subscriber setup.

use std::fmt::Debug;

use tracing_subscriber::EnvFilter;

/// Sink for informational messages about cache administration.
///
/// Kept to a single method so callers can route registry events into
/// whatever logging they already run.
pub trait CacheLogger: Send + Sync + Debug {
    /// Record an informational message
    fn info(&self, message: &str);
}

/// Default logger forwarding to `tracing` at INFO level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl CacheLogger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!(target: "flightcache", "{}", message);
    }
}

/// Install a global fmt subscriber filtered by `RUST_LOG` (default `info`).
///
/// Returns false when a global subscriber was already set, so repeated calls
/// from tests or embedding applications are harmless.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_idempotent() {
        let _ = init_tracing();
        assert!(!init_tracing());
    }

    #[test]
    fn test_tracing_logger_accepts_messages() {
        let logger = TracingLogger;
        logger.info("cleared 3 caches");
    }
}
