//! Timers handle
//!
//! Routes `set_timeout` / `set_interval` to tokio or to a virtual clock,
//! depending on whether fake timers are engaged.

use chrono::Utc;
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::clock::{Callback, Due, TimerId, TimerIds, VirtualClock};
use super::real::RealTimers;
use crate::error::TimerError;

/// Default cap on timers fired by one `run_all_timers` / advance call
pub const DEFAULT_LOOP_LIMIT: usize = 100_000;

struct TimersInner {
    ids: TimerIds,
    real: RealTimers,
    fake: Mutex<Option<Arc<Mutex<VirtualClock>>>>,
    loop_limit: AtomicUsize,
}

/// Cloneable handle to a timer backend
///
/// Clones share the same backend, so engaging fake timers through one clone
/// affects them all.
#[derive(Clone)]
pub struct Timers {
    inner: Arc<TimersInner>,
}

impl Default for Timers {
    fn default() -> Self {
        Self::new()
    }
}

impl Timers {
    pub fn new() -> Self {
        Self::with_loop_limit(DEFAULT_LOOP_LIMIT)
    }

    pub fn with_loop_limit(loop_limit: usize) -> Self {
        let ids = TimerIds::default();
        Self {
            inner: Arc::new(TimersInner {
                real: RealTimers::new(ids.clone()),
                ids,
                fake: Mutex::new(None),
                loop_limit: AtomicUsize::new(loop_limit.max(1)),
            }),
        }
    }

    pub fn loop_limit(&self) -> usize {
        self.inner.loop_limit.load(Ordering::Relaxed)
    }

    /// Change the cap for every clone of this handle
    pub fn set_loop_limit(&self, loop_limit: usize) {
        self.inner.loop_limit.store(loop_limit.max(1), Ordering::Relaxed);
    }

    /// Switch to a fresh virtual clock starting at the current wall time
    ///
    /// Engaging while already fake discards the previous virtual clock.
    pub fn use_fake_timers(&self) {
        let clock = VirtualClock::new(Self::get_real_system_time(), self.inner.ids.clone());
        if self.inner.fake.lock().replace(Arc::new(Mutex::new(clock))).is_some() {
            debug!("fake timers re-engaged, pending virtual timers discarded");
        } else {
            debug!(
                "fake timers engaged, {} real timers left running",
                self.inner.real.count()
            );
        }
    }

    /// Engage fake timers until the returned guard is dropped
    pub fn engage(&self) -> FakeTimersGuard {
        self.use_fake_timers();
        FakeTimersGuard {
            timers: self.clone(),
        }
    }

    /// Restore real timers, discarding pending virtual ones
    ///
    /// Returns true if fake timers were engaged.
    pub fn use_real_timers(&self) -> bool {
        match self.inner.fake.lock().take() {
            Some(clock) => {
                let pending = clock.lock().count();
                if pending > 0 {
                    debug!("discarding {} pending virtual timers", pending);
                }
                true
            }
            None => false,
        }
    }

    pub fn is_fake(&self) -> bool {
        self.inner.fake.lock().is_some()
    }

    /// Run `callback` once after `delay_ms`
    pub fn set_timeout<F>(&self, callback: F, delay_ms: u64) -> Result<TimerId, TimerError>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut callback = Some(callback);
        let callback: Callback = Box::new(move || {
            if let Some(f) = callback.take() {
                f();
            }
        });

        match self.fake_clock() {
            Ok(clock) => Ok(clock.lock().schedule(callback, delay_ms, false)),
            Err(_) => self.inner.real.set_timeout(callback, delay_ms),
        }
    }

    /// Run `callback` every `delay_ms` (at least 1ms) until cleared
    pub fn set_interval<F>(&self, callback: F, delay_ms: u64) -> Result<TimerId, TimerError>
    where
        F: FnMut() + Send + 'static,
    {
        let callback: Callback = Box::new(callback);
        match self.fake_clock() {
            Ok(clock) => Ok(clock.lock().schedule(callback, delay_ms, true)),
            Err(_) => self.inner.real.set_interval(callback, delay_ms),
        }
    }

    /// Cancel a timeout; returns false for unknown ids
    ///
    /// While fake timers are engaged only virtual timers can be cleared; a
    /// real timer's id matches nothing.
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        match self.fake_clock() {
            Ok(clock) => clock.lock().clear(id),
            Err(_) => self.inner.real.clear(id),
        }
    }

    pub fn clear_interval(&self, id: TimerId) -> bool {
        self.clear_timeout(id)
    }

    /// Current time in epoch milliseconds, virtual when fake
    pub fn now(&self) -> i64 {
        match self.fake_clock() {
            Ok(clock) => clock.lock().now(),
            Err(_) => Self::get_real_system_time(),
        }
    }

    /// Wall-clock epoch milliseconds regardless of mode
    pub fn get_real_system_time() -> i64 {
        Utc::now().timestamp_millis()
    }

    /// Move the virtual clock to `now_ms` without firing timers
    pub fn set_system_time(&self, now_ms: i64) -> Result<(), TimerError> {
        self.fake_clock()?.lock().set_now(now_ms);
        Ok(())
    }

    /// Fire every timer due within the next `ms`, in `(run_at, id)` order,
    /// then leave the clock at `now + ms`.
    pub fn advance_timers_by_time(&self, ms: u64) -> Result<usize, TimerError> {
        let clock = self.fake_clock()?;
        let target = clock.lock().now().saturating_add(ms as i64);
        let fired = self.drain(&clock, Some(target))?;
        clock.lock().advance_to(target);
        Ok(fired)
    }

    /// Jump to the next pending timer and fire everything due then, `steps`
    /// times or until nothing is pending.
    pub fn advance_timers_to_next_timer(&self, steps: usize) -> Result<usize, TimerError> {
        let clock = self.fake_clock()?;
        let mut fired = 0;
        for _ in 0..steps {
            let (now, next) = {
                let clock = clock.lock();
                (clock.now(), clock.next_run_at())
            };
            let Some(next) = next else {
                break;
            };
            fired += self.advance_timers_by_time(next.saturating_sub(now).max(0) as u64)?;
        }
        Ok(fired)
    }

    /// Fire timers until none remain, including ones scheduled while firing
    pub fn run_all_timers(&self) -> Result<usize, TimerError> {
        let clock = self.fake_clock()?;
        self.drain(&clock, None)
    }

    /// Fire only the timers pending right now
    ///
    /// Timers scheduled by these callbacks stay pending; fired intervals are
    /// rescheduled from their fire time.
    pub fn run_only_pending_timers(&self) -> Result<usize, TimerError> {
        let clock = self.fake_clock()?;
        let snapshot = clock.lock().pending_ids();
        let mut fired = 0;
        for id in snapshot {
            let due = clock.lock().take(id);
            if let Some(due) = due {
                fire(&clock, due);
                fired += 1;
            }
        }
        Ok(fired)
    }

    pub fn clear_all_timers(&self) -> Result<(), TimerError> {
        self.fake_clock()?.lock().clear_all();
        Ok(())
    }

    /// Number of pending timers on the virtual clock
    pub fn get_timer_count(&self) -> Result<usize, TimerError> {
        Ok(self.fake_clock()?.lock().count())
    }

    fn fake_clock(&self) -> Result<Arc<Mutex<VirtualClock>>, TimerError> {
        self.inner
            .fake
            .lock()
            .as_ref()
            .map(Arc::clone)
            .ok_or(TimerError::NotFaked)
    }

    fn drain(&self, clock: &Arc<Mutex<VirtualClock>>, limit: Option<i64>) -> Result<usize, TimerError> {
        let loop_limit = self.loop_limit();
        let mut fired = 0;
        loop {
            let due = clock.lock().take_next(limit);
            let Some(due) = due else {
                return Ok(fired);
            };
            if fired == loop_limit {
                clock.lock().restore(due);
                warn!("timer loop limit of {} reached", loop_limit);
                return Err(TimerError::LoopLimit { limit: loop_limit });
            }
            fire(clock, due);
            fired += 1;
        }
    }
}

/// Fire with the clock unlocked so the callback may schedule or clear timers
///
/// The timer is handed back before a callback panic propagates, so a
/// panicking interval keeps its schedule.
fn fire(clock: &Arc<Mutex<VirtualClock>>, mut due: Due) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| due.fire()));
    clock.lock().finish(due);
    if let Err(payload) = outcome {
        panic::resume_unwind(payload);
    }
}

/// Restores real timers when dropped
#[must_use = "fake timers are disengaged as soon as the guard is dropped"]
pub struct FakeTimersGuard {
    timers: Timers,
}

impl FakeTimersGuard {
    pub fn timers(&self) -> &Timers {
        &self.timers
    }
}

impl Drop for FakeTimersGuard {
    fn drop(&mut self) {
        self.timers.use_real_timers();
    }
}
