//! Time provider abstraction for testable time-dependent logic
//!
//! Barrier ages are measured against a [`TimeProvider`] so that the reaper's
//! timeout arithmetic can be driven deterministically from tests.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Abstraction over the monotonic clock
pub trait TimeProvider: Send + Sync {
    /// Get the current monotonic time (for measuring intervals)
    fn now(&self) -> Instant;
}

/// Production time provider using the actual monotonic clock
#[derive(Debug, Default, Clone)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for deterministic tests
///
/// Clones share the same underlying instant, so a test can keep one handle
/// and hand another to the barrier handler.
#[derive(Debug, Clone)]
pub struct MockTimeProvider {
    current_instant: Arc<Mutex<Instant>>,
}

impl Default for MockTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTimeProvider {
    /// Create a new mock time provider starting at the real current instant
    pub fn new() -> Self {
        Self {
            current_instant: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Advance the clock by the given duration
    pub fn advance_time(&self, duration: Duration) {
        let mut instant = self
            .current_instant
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *instant += duration;
    }

    /// Set the current instant
    pub fn set_instant(&self, instant: Instant) {
        let mut current = self
            .current_instant
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = instant;
    }
}

impl TimeProvider for MockTimeProvider {
    fn now(&self) -> Instant {
        *self
            .current_instant
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
