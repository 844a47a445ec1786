//! Error types
//!
//! Library errors for registration, scheduling, mocks and timers. Test
//! failures are not errors: they are recorded as results.

use thiserror::Error;

/// Structural problems found while building a suite tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("{kind} registered with an empty name under \"{path}\"")]
    EmptyName { kind: &'static str, path: String },

    #[error("describe block \"{path}\" panicked during registration: {message}")]
    DescribePanicked { path: String, message: String },
}

/// Fatal runner errors; a run that hits one produces no aggregate
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("invalid suite tree: {0}")]
    Registration(#[from] RegistrationError),

    #[error("result count mismatch: {expected} tests registered, {actual} results produced")]
    ResultCountMismatch { expected: usize, actual: usize },
}

/// Mock and spy errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MockError {
    #[error("method \"{method}\" is already spied on with a different signature")]
    SignatureMismatch { method: String },
}

/// Timer errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    #[error("fake timers are not engaged; call use_fake_timers() first")]
    NotFaked,

    #[error("aborting after running {limit} timers, assuming an infinite loop")]
    LoopLimit { limit: usize },

    #[error("real timers need a tokio runtime")]
    NoRuntime,
}
