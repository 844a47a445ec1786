//! Shared utilities

pub mod logger;
mod panic;
mod timer;

pub use logger::{init_logger, init_test_logger, LogLevel};
pub use panic::panic_message;
pub use timer::Stopwatch;
