//! harness-rt - test framework runtime
//!
//! Registers suites of tests and hooks, runs them one at a time under a
//! watchdog, and records one result per registered test. Mock functions,
//! method spies and a virtual clock are available to test bodies through a
//! shared [`Harness`].
//!
//! ## Features
//!
//! - `describe` / `test` / `todo` registration with `only` and `skip` modes
//! - `before_all`, `before_each`, `after_each` and `after_all` hooks
//! - Sync, async and `done`-callback bodies, each raced against a timeout
//! - Call-tracking mocks, one-shot behaviors and restorable spies
//! - Fake timers driven by `advance_timers_by_time` / `run_all_timers`
//!
//! ## Usage
//!
//! ```rust
//! use harness_rt::expect::expect;
//! use harness_rt::{Body, RunConfig, Runner};
//!
//! # tokio_test::block_on(async {
//! let aggregate = Runner::new(RunConfig::default())
//!     .run_with(|s| {
//!         s.describe("math", |s| {
//!             s.test("adds", Body::sync(|| {
//!                 expect(1 + 1).to_be(2);
//!                 Ok(())
//!             }));
//!             s.todo("divides");
//!         });
//!     })
//!     .await
//!     .unwrap();
//!
//! assert_eq!(aggregate.num_passed_tests, 1);
//! assert_eq!(aggregate.num_todo_tests, 1);
//! # });
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod expect;
pub mod harness;
pub mod mock;
pub mod models;
pub mod reporter;
pub mod suite;
pub mod timers;
pub mod utils;

pub use config::{ConfigFile, RunConfig};
pub use error::{MockError, RegistrationError, RunnerError, TimerError};
pub use executor::Runner;
pub use harness::Harness;
pub use models::{AggregatedResult, AssertionResult, FailureKind, TestStatus};
pub use reporter::{CollectingReporter, LogReporter, Reporter};
pub use suite::{register, Body, Done, Suite, SuiteBuilder};
