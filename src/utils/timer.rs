//! Timer utilities
//!
//! Durations of tests and hooks are always measured on the host's monotonic
//! clock, never on the virtual clock a test may have engaged.

use std::time::{Duration, Instant};

/// Simple timer for measuring elapsed time
#[derive(Debug)]
pub struct Stopwatch {
    start: Instant,
    label: String,
}

impl Stopwatch {
    /// Create and start a new timer
    pub fn start(label: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            label: label.into(),
        }
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }

    /// Stop timer and return elapsed milliseconds
    pub fn stop(self) -> u64 {
        let elapsed = self.elapsed_ms();
        tracing::trace!("{}: {}ms", self.label, elapsed);
        elapsed
    }
}
