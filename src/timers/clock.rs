//! Virtual clock state
//!
//! Pending timers are ordered by `(run_at, id)`. Ids grow monotonically, so
//! timers due at the same instant fire in creation order.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifier returned by `set_timeout` / `set_interval`
pub type TimerId = u64;

/// Id source shared by the real and virtual backends of one handle, so an id
/// never names timers in both.
#[derive(Clone, Default)]
pub(crate) struct TimerIds(Arc<AtomicU64>);

impl TimerIds {
    pub(crate) fn next(&self) -> TimerId {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Timer callback; one-shot callbacks are adapted to this shape
pub type Callback = Box<dyn FnMut() + Send>;

struct PendingTimer {
    /// None while the callback is out being fired
    callback: Option<Callback>,
    run_at: i64,
    interval: Option<u64>,
}

/// A timer taken out of the clock so it can fire without the lock held
pub(crate) struct Due {
    pub(crate) id: TimerId,
    pub(crate) fired_at: i64,
    pub(crate) callback: Callback,
    pub(crate) interval: Option<u64>,
}

impl Due {
    pub(crate) fn fire(&mut self) {
        (self.callback)();
    }
}

pub(crate) struct VirtualClock {
    now: i64,
    ids: TimerIds,
    timers: HashMap<TimerId, PendingTimer>,
    queue: BTreeSet<(i64, TimerId)>,
}

impl VirtualClock {
    pub(crate) fn new(start: i64, ids: TimerIds) -> Self {
        Self {
            now: start,
            ids,
            timers: HashMap::new(),
            queue: BTreeSet::new(),
        }
    }

    pub(crate) fn now(&self) -> i64 {
        self.now
    }

    /// Move the clock without firing anything
    pub(crate) fn set_now(&mut self, now: i64) {
        self.now = now;
    }

    /// Move forward to `target`; never moves backwards
    pub(crate) fn advance_to(&mut self, target: i64) {
        self.now = self.now.max(target);
    }

    /// Interval delays below 1ms are raised to 1ms so an interval always
    /// makes progress.
    pub(crate) fn schedule(&mut self, callback: Callback, delay_ms: u64, repeat: bool) -> TimerId {
        let id = self.ids.next();

        let interval = repeat.then(|| delay_ms.max(1));
        let delay = interval.unwrap_or(delay_ms);
        let run_at = self.now.saturating_add(delay as i64);

        self.timers.insert(
            id,
            PendingTimer {
                callback: Some(callback),
                run_at,
                interval,
            },
        );
        self.queue.insert((run_at, id));
        id
    }

    pub(crate) fn clear(&mut self, id: TimerId) -> bool {
        match self.timers.remove(&id) {
            Some(timer) => {
                self.queue.remove(&(timer.run_at, id));
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear_all(&mut self) {
        self.timers.clear();
        self.queue.clear();
    }

    pub(crate) fn count(&self) -> usize {
        self.timers.len()
    }

    pub(crate) fn next_run_at(&self) -> Option<i64> {
        self.queue.first().map(|&(run_at, _)| run_at)
    }

    /// Ids of queued timers in firing order
    pub(crate) fn pending_ids(&self) -> Vec<TimerId> {
        self.queue.iter().map(|&(_, id)| id).collect()
    }

    /// Take the earliest timer due at or before `limit` (any timer if None)
    pub(crate) fn take_next(&mut self, limit: Option<i64>) -> Option<Due> {
        let &(run_at, id) = self.queue.first()?;
        if limit.is_some_and(|limit| run_at > limit) {
            return None;
        }
        self.take(id)
    }

    /// Take a specific queued timer, moving the clock to its due time
    pub(crate) fn take(&mut self, id: TimerId) -> Option<Due> {
        let timer = self.timers.get_mut(&id)?;
        let callback = timer.callback.take()?;
        let run_at = timer.run_at;
        let interval = timer.interval;

        self.queue.remove(&(run_at, id));
        if interval.is_none() {
            self.timers.remove(&id);
        }
        self.advance_to(run_at);

        Some(Due {
            id,
            fired_at: self.now,
            callback,
            interval,
        })
    }

    /// Put an unfired timer back where it was
    pub(crate) fn restore(&mut self, due: Due) {
        let run_at = due.fired_at;
        self.timers.insert(
            due.id,
            PendingTimer {
                callback: Some(due.callback),
                run_at,
                interval: due.interval,
            },
        );
        self.queue.insert((run_at, due.id));
    }

    /// Hand a fired callback back; intervals are rescheduled from their fire
    /// time unless they were cleared while firing.
    pub(crate) fn finish(&mut self, due: Due) {
        let Some(delay) = due.interval else {
            return;
        };
        if let Some(timer) = self.timers.get_mut(&due.id) {
            let run_at = due.fired_at.saturating_add(delay as i64);
            timer.callback = Some(due.callback);
            timer.run_at = run_at;
            self.queue.insert((run_at, due.id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, label: &'static str) -> Callback {
        let log = Arc::clone(log);
        Box::new(move || log.lock().push(label))
    }

    fn drain(clock: &mut VirtualClock, limit: Option<i64>) {
        while let Some(mut due) = clock.take_next(limit) {
            due.fire();
            clock.finish(due);
        }
    }

    #[test]
    fn test_equal_run_at_fires_in_creation_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut clock = VirtualClock::new(0, TimerIds::default());
        clock.schedule(recorder(&log, "b"), 10, false);
        clock.schedule(recorder(&log, "a"), 5, false);
        clock.schedule(recorder(&log, "c"), 10, false);

        drain(&mut clock, Some(10));
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
        assert_eq!(clock.now(), 10);
        assert_eq!(clock.count(), 0);
    }

    #[test]
    fn test_interval_reschedules_from_fire_time() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut clock = VirtualClock::new(100, TimerIds::default());
        let id = clock.schedule(recorder(&log, "tick"), 30, true);

        drain(&mut clock, Some(190));
        assert_eq!(log.lock().len(), 3);
        assert_eq!(clock.next_run_at(), Some(220));
        assert!(clock.clear(id));
        assert_eq!(clock.count(), 0);
    }

    #[test]
    fn test_zero_interval_is_raised_to_one() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut clock = VirtualClock::new(0, TimerIds::default());
        clock.schedule(recorder(&log, "tick"), 0, true);
        assert_eq!(clock.next_run_at(), Some(1));
    }

    #[test]
    fn test_interval_cleared_while_firing_is_dropped() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut clock = VirtualClock::new(0, TimerIds::default());
        let id = clock.schedule(recorder(&log, "tick"), 10, true);

        let mut due = clock.take_next(None).unwrap();
        due.fire();
        assert!(clock.clear(id));
        clock.finish(due);

        assert_eq!(clock.count(), 0);
        assert_eq!(clock.next_run_at(), None);
    }

    #[test]
    fn test_take_respects_limit() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut clock = VirtualClock::new(0, TimerIds::default());
        clock.schedule(recorder(&log, "late"), 100, false);
        assert!(clock.take_next(Some(99)).is_none());
        assert_eq!(clock.now(), 0);
        assert_eq!(clock.pending_ids(), vec![1]);
    }

    #[test]
    fn test_shared_ids_do_not_collide() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let ids = TimerIds::default();
        assert_eq!(ids.next(), 1);

        let mut clock = VirtualClock::new(0, ids.clone());
        assert_eq!(clock.schedule(recorder(&log, "a"), 10, false), 2);
        assert_eq!(ids.next(), 3);
        assert_eq!(clock.schedule(recorder(&log, "b"), 10, false), 4);
        assert!(!clock.clear(1));
        assert_eq!(clock.count(), 2);
    }
}
