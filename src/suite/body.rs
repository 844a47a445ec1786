//! Test and hook bodies
//!
//! A body is tagged with its shape at registration time: a plain function,
//! a function returning a future, or a function that receives a [`Done`]
//! completion signal.

use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;

/// What every body shape eventually produces
pub type BodyResult = anyhow::Result<()>;

type SyncFn = Arc<dyn Fn() -> BodyResult + Send + Sync>;
type AsyncFn = Arc<dyn Fn() -> BoxFuture<'static, BodyResult> + Send + Sync>;
type CallbackFn = Arc<dyn Fn(Done) + Send + Sync>;

/// A registered test or hook body
#[derive(Clone)]
pub enum Body {
    Sync(SyncFn),
    Async(AsyncFn),
    Callback(CallbackFn),
}

impl Body {
    /// Body that succeeds unless it returns an error or panics
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn() -> BodyResult + Send + Sync + 'static,
    {
        Body::Sync(Arc::new(f))
    }

    /// Body whose future decides the outcome
    pub fn future<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = BodyResult> + Send + 'static,
    {
        Body::Async(Arc::new(move || f().boxed()))
    }

    /// Body that reports completion through [`Done`]
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(Done) + Send + Sync + 'static,
    {
        Body::Callback(Arc::new(f))
    }

    pub fn shape(&self) -> &'static str {
        match self {
            Body::Sync(_) => "sync",
            Body::Async(_) => "async",
            Body::Callback(_) => "callback",
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Body::{}", self.shape())
    }
}

/// Completion signal handed to callback-style bodies
///
/// Consuming `self` means the signal can fire at most once. Dropping it
/// without calling [`Done::ok`] or [`Done::fail`] fails the test.
pub struct Done {
    tx: oneshot::Sender<BodyResult>,
}

impl Done {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<BodyResult>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Signal success
    pub fn ok(self) {
        self.finish(Ok(()));
    }

    /// Signal failure with an error message
    pub fn fail(self, error: impl fmt::Display) {
        self.finish(Err(anyhow::anyhow!("{error}")));
    }

    /// Signal the given outcome
    pub fn finish(self, result: BodyResult) {
        // The receiver is gone once the runner has given up on this body.
        let _ = self.tx.send(result);
    }
}

impl fmt::Debug for Done {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Done").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_shapes() {
        assert_eq!(Body::sync(|| Ok(())).shape(), "sync");
        assert_eq!(Body::future(|| async { Ok(()) }).shape(), "async");
        assert_eq!(Body::callback(|done: Done| done.ok()).shape(), "callback");
    }

    #[test]
    fn test_done_delivers_outcome() {
        let (done, mut rx) = Done::channel();
        done.fail("broken");
        let result = rx.try_recv().unwrap();
        assert_eq!(result.unwrap_err().to_string(), "broken");
    }

    #[test]
    fn test_dropped_done_closes_channel() {
        let (done, mut rx) = Done::channel();
        drop(done);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_async_body_runs() {
        let body = Body::future(|| async { anyhow::bail!("rejected") });
        let Body::Async(f) = body else {
            panic!("expected async body");
        };
        let result = tokio_test::block_on(f());
        assert!(result.is_err());
    }
}
