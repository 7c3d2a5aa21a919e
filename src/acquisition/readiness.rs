//! One-shot "printing has physically started" flag shared by the poller and ingestor.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

const NOT_READY: i64 = i64::MIN;

/// Monotonic readiness flag paired with the moment it was raised.
///
/// The flag and its timestamp live in a single atomic word (microseconds since the
/// Unix epoch, or a sentinel while not ready), so both become visible together in one
/// sequentially consistent compare-and-swap. Once set it never reverts.
#[derive(Debug)]
pub struct ReadinessState {
    triggered_at_micros: AtomicI64,
}

impl Default for ReadinessState {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessState {
    /// Create a flag in the not-ready state.
    pub fn new() -> Self {
        Self {
            triggered_at_micros: AtomicI64::new(NOT_READY),
        }
    }

    /// Raise the flag, recording `at` as the trigger time.
    ///
    /// Returns `true` only for the call that performed the transition; every later call
    /// returns `false` and leaves the original timestamp untouched.
    pub fn try_set_ready(&self, at: DateTime<Utc>) -> bool {
        // The sentinel is unreachable for any representable chrono timestamp.
        let micros = at.timestamp_micros().max(NOT_READY + 1);
        self.triggered_at_micros
            .compare_exchange(NOT_READY, micros, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Non-blocking read of the flag.
    pub fn is_ready(&self) -> bool {
        self.triggered_at_micros.load(Ordering::SeqCst) != NOT_READY
    }

    /// When the flag was raised, if it has been.
    pub fn triggered_at(&self) -> Option<DateTime<Utc>> {
        match self.triggered_at_micros.load(Ordering::SeqCst) {
            NOT_READY => None,
            micros => DateTime::from_timestamp_micros(micros),
        }
    }
}
