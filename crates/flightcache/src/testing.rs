//! Test doubles for code that owns a [`CacheRegistry`](crate::CacheRegistry)

use parking_lot::Mutex;

pub use crate::clock::MockClock;
use crate::logging::CacheLogger;

/// Logger that keeps every message for later assertions
///
/// # Examples
///
/// ```
/// use flightcache::testing::RecordingLogger;
/// use flightcache::CacheLogger;
///
/// let logger = RecordingLogger::default();
/// logger.info("cleared 0 caches");
/// assert_eq!(logger.messages(), vec!["cleared 0 caches".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct RecordingLogger {
    messages: Mutex<Vec<String>>,
}

impl RecordingLogger {
    /// Messages received so far, oldest first
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    /// Forget all recorded messages
    pub fn reset(&self) {
        self.messages.lock().clear();
    }
}

impl CacheLogger for RecordingLogger {
    fn info(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}
