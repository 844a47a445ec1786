//! Real timers backed by tokio tasks

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::clock::{Callback, TimerId, TimerIds};
use crate::error::TimerError;

#[derive(Default)]
pub(crate) struct RealTimers {
    ids: TimerIds,
    tasks: Arc<Mutex<HashMap<TimerId, AbortHandle>>>,
}

impl RealTimers {
    pub(crate) fn new(ids: TimerIds) -> Self {
        Self {
            ids,
            tasks: Arc::default(),
        }
    }

    pub(crate) fn set_timeout(&self, mut callback: Callback, delay_ms: u64) -> Result<TimerId, TimerError> {
        let runtime = Handle::try_current().map_err(|_| TimerError::NoRuntime)?;
        let id = self.ids.next();

        // The map lock is held across spawn so a zero-delay task cannot
        // finish and deregister before it is registered.
        let mut tasks = self.tasks.lock();
        let registry = Arc::clone(&self.tasks);
        let task = runtime.spawn(async move {
            time::sleep(Duration::from_millis(delay_ms)).await;
            registry.lock().remove(&id);
            callback();
        });
        tasks.insert(id, task.abort_handle());
        Ok(id)
    }

    pub(crate) fn set_interval(&self, mut callback: Callback, delay_ms: u64) -> Result<TimerId, TimerError> {
        let runtime = Handle::try_current().map_err(|_| TimerError::NoRuntime)?;
        let id = self.ids.next();
        let period = Duration::from_millis(delay_ms.max(1));

        let mut tasks = self.tasks.lock();
        let task = runtime.spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                callback();
            }
        });
        tasks.insert(id, task.abort_handle());
        Ok(id)
    }

    /// Cancel a pending timer; unknown ids are ignored
    pub(crate) fn clear(&self, id: TimerId) -> bool {
        match self.tasks.lock().remove(&id) {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    /// Timers still waiting to fire or repeating
    pub(crate) fn count(&self) -> usize {
        self.tasks.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_requires_runtime() {
        let timers = RealTimers::default();
        let err = timers.set_timeout(Box::new(|| {}), 10).unwrap_err();
        assert_eq!(err, TimerError::NoRuntime);
    }

    #[tokio::test]
    async fn test_timeout_fires_and_deregisters() {
        let timers = RealTimers::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        timers
            .set_timeout(Box::new(move || { counter.fetch_add(1, Ordering::SeqCst); }), 5)
            .unwrap();

        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(timers.count(), 0);
    }

    #[tokio::test]
    async fn test_cleared_timeout_never_fires() {
        let timers = RealTimers::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = timers
            .set_timeout(Box::new(move || { counter.fetch_add(1, Ordering::SeqCst); }), 20)
            .unwrap();

        assert!(timers.clear(id));
        assert!(!timers.clear(id));
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
