//! Virtual clock and timer scheduling
//!
//! Code under test schedules work through a [`Timers`] handle instead of
//! calling tokio directly. Tests can then swap in a virtual clock and drive
//! time by hand:
//!
//! ```rust
//! use harness_rt::timers::Timers;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//!
//! let timers = Timers::new();
//! let _fake = timers.engage();
//!
//! let fired = Arc::new(AtomicBool::new(false));
//! let flag = Arc::clone(&fired);
//! timers.set_timeout(move || flag.store(true, Ordering::SeqCst), 1_000).unwrap();
//!
//! timers.advance_timers_by_time(1_000).unwrap();
//! assert!(fired.load(Ordering::SeqCst));
//! ```

mod clock;
mod handle;
mod real;

pub use clock::TimerId;
pub use handle::{FakeTimersGuard, Timers, DEFAULT_LOOP_LIMIT};

use once_cell::sync::Lazy;

static GLOBAL_TIMERS: Lazy<Timers> = Lazy::new(Timers::new);

/// Process-wide timers handle
pub fn global() -> Timers {
    GLOBAL_TIMERS.clone()
}
