//! Body execution under a timeout
//!
//! Every body runs in a detached tokio task and is raced against
//! `tokio::time::timeout`. When the timer wins the task is left to finish on
//! its own; whatever it produces later is dropped.

use futures::future::{BoxFuture, FutureExt};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{self, JoinError};

use crate::expect::AssertionError;
use crate::models::{timeout_message, FailureDetail, FailureKind, HookKind};
use crate::suite::{Body, BodyResult, Done};
use crate::utils::panic_message;

const DONE_DROPPED: &str = "done callback was dropped without being called";

/// Why a body did not succeed
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BodyFailure {
    Assertion(String),
    Uncaught(String),
    TimedOut(u64),
}

impl BodyFailure {
    fn from_error(err: anyhow::Error) -> Self {
        match err.downcast_ref::<AssertionError>() {
            Some(assertion) => BodyFailure::Assertion(assertion.to_string()),
            None => BodyFailure::Uncaught(format!("{err:#}")),
        }
    }

    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        match payload.downcast::<AssertionError>() {
            Ok(assertion) => BodyFailure::Assertion(assertion.to_string()),
            Err(payload) => BodyFailure::Uncaught(panic_message(payload.as_ref())),
        }
    }

    fn from_join(err: JoinError) -> Self {
        if err.is_panic() {
            Self::from_panic(err.into_panic())
        } else {
            BodyFailure::Uncaught("body task was cancelled".to_string())
        }
    }

    pub fn message(&self) -> String {
        match self {
            BodyFailure::Assertion(msg) | BodyFailure::Uncaught(msg) => msg.clone(),
            BodyFailure::TimedOut(ms) => timeout_message(*ms),
        }
    }

    /// Detail recorded for a failing test body
    pub fn into_test_detail(self) -> FailureDetail {
        match self {
            BodyFailure::Assertion(msg) => FailureDetail::new(FailureKind::Assertion, msg),
            BodyFailure::Uncaught(msg) => FailureDetail::new(FailureKind::Uncaught, msg),
            BodyFailure::TimedOut(ms) => FailureDetail::timeout(ms),
        }
    }

    /// Detail recorded for a failing hook
    pub fn into_hook_detail(self, kind: HookKind) -> FailureDetail {
        match self {
            BodyFailure::TimedOut(ms) => FailureDetail::hook_timeout(ms),
            other => FailureDetail::new(FailureKind::Hook(kind), other.message()),
        }
    }
}

impl fmt::Display for BodyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

fn settle(joined: Result<BodyResult, JoinError>) -> Result<(), BodyFailure> {
    match joined {
        Ok(result) => result.map_err(BodyFailure::from_error),
        Err(err) => Err(BodyFailure::from_join(err)),
    }
}

fn start(body: &Body) -> BoxFuture<'static, Result<(), BodyFailure>> {
    match body {
        Body::Sync(f) => {
            let f = Arc::clone(f);
            let handle = task::spawn_blocking(move || f());
            async move { settle(handle.await) }.boxed()
        }
        Body::Async(f) => {
            let f = Arc::clone(f);
            let handle = tokio::spawn(async move { f().await });
            async move { settle(handle.await) }.boxed()
        }
        Body::Callback(f) => {
            let f = Arc::clone(f);
            let (done, rx) = Done::channel();
            let handle = task::spawn_blocking(move || f(done));
            async move {
                match rx.await {
                    Ok(result) => result.map_err(BodyFailure::from_error),
                    // The signal is gone: report the panic that dropped it, if any.
                    Err(_) => match handle.await {
                        Err(err) if err.is_panic() => Err(BodyFailure::from_join(err)),
                        _ => Err(BodyFailure::Uncaught(DONE_DROPPED.to_string())),
                    },
                }
            }
            .boxed()
        }
    }
}

/// Run `body` and wait at most `limit` for it to settle
pub async fn run_body(body: &Body, limit: Duration) -> Result<(), BodyFailure> {
    match tokio::time::timeout(limit, start(body)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(BodyFailure::TimedOut(limit.as_millis() as u64)),
    }
}
