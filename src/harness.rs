//! Per-run test environment
//!
//! A [`Harness`] bundles the mock registry and the timers handle that test
//! bodies use, so the runner can apply mock hygiene and reset timers between
//! tests.

use crate::error::{MockError, TimerError};
use crate::mock::{Method, Mock, MockRegistry};
use crate::timers::{self, FakeTimersGuard, TimerId, Timers};

/// Shared mock registry and timers; clones share both
#[derive(Clone, Default)]
pub struct Harness {
    mocks: MockRegistry,
    timers: Timers,
}

impl Harness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Harness whose timers are the process-wide handle
    pub fn with_global_timers() -> Self {
        Self::with_timers(timers::global())
    }

    pub fn with_timers(timers: Timers) -> Self {
        Self {
            mocks: MockRegistry::new(),
            timers,
        }
    }

    pub fn mocks(&self) -> &MockRegistry {
        &self.mocks
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    // Mocks

    pub fn mock_fn<A, R>(&self) -> Mock<A, R>
    where
        A: Clone + Send + 'static,
        R: Clone + Send + 'static,
    {
        self.mocks.mock_fn()
    }

    pub fn mock_fn_with<A, R, F>(&self, f: F) -> Mock<A, R>
    where
        A: Clone + Send + 'static,
        R: Clone + Send + 'static,
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        self.mocks.mock_fn_with(f)
    }

    pub fn spy_on<A, R>(&self, method: &Method<A, R>) -> Result<Mock<A, R>, MockError>
    where
        A: Clone + Send + 'static,
        R: Clone + Default + Send + 'static,
    {
        self.mocks.spy_on(method)
    }

    pub fn clear_all_mocks(&self) {
        self.mocks.clear_all_mocks();
    }

    pub fn reset_all_mocks(&self) {
        self.mocks.reset_all_mocks();
    }

    pub fn restore_all_mocks(&self) {
        self.mocks.restore_all_mocks();
    }

    // Timers

    pub fn use_fake_timers(&self) {
        self.timers.use_fake_timers();
    }

    pub fn fake_timers(&self) -> FakeTimersGuard {
        self.timers.engage()
    }

    pub fn use_real_timers(&self) -> bool {
        self.timers.use_real_timers()
    }

    pub fn set_timeout<F>(&self, callback: F, delay_ms: u64) -> Result<TimerId, TimerError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.timers.set_timeout(callback, delay_ms)
    }

    pub fn set_interval<F>(&self, callback: F, delay_ms: u64) -> Result<TimerId, TimerError>
    where
        F: FnMut() + Send + 'static,
    {
        self.timers.set_interval(callback, delay_ms)
    }

    pub fn clear_timeout(&self, id: TimerId) -> bool {
        self.timers.clear_timeout(id)
    }

    pub fn advance_timers_by_time(&self, ms: u64) -> Result<usize, TimerError> {
        self.timers.advance_timers_by_time(ms)
    }

    pub fn run_all_timers(&self) -> Result<usize, TimerError> {
        self.timers.run_all_timers()
    }

    pub fn run_only_pending_timers(&self) -> Result<usize, TimerError> {
        self.timers.run_only_pending_timers()
    }
}
