//! Test execution engine
//!
//! Sequential suite traversal plus the timeout race every body goes through.

mod runner;
mod watchdog;

pub use runner::Runner;
pub use watchdog::{run_body, BodyFailure};
