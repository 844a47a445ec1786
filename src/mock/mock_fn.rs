//! Mock functions
//!
//! A [`Mock`] is a shared record of calls, results and configured behavior.
//! Invocation goes through [`Mock::call`] / [`Mock::call_with`]; [`Mock::as_fn`]
//! hands out a plain closure that forwards to the same record.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::future::IntoFuture;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use tracing::trace;

use crate::utils::panic_message;

/// Shared implementation type for mocks and method slots
pub type Implementation<A, R> = Arc<dyn Fn(A) -> R + Send + Sync>;

type Restorer = Arc<dyn Fn() + Send + Sync>;

const DEFAULT_NAME: &str = "mock.fn()";

/// Outcome of one mock invocation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockResult<R> {
    /// The call returned normally
    Return(R),
    /// The implementation panicked; the panic was passed on to the caller
    Throw(String),
    /// The call has not finished yet (recursive calls observe this)
    Incomplete,
}

impl<R> MockResult<R> {
    pub fn value(&self) -> Option<&R> {
        match self {
            MockResult::Return(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_throw(&self) -> bool {
        matches!(self, MockResult::Throw(_))
    }
}

/// A settled asynchronous value returned by mocks
///
/// `mock_resolved_value` / `mock_rejected_value` configure mocks of type
/// `Mock<A, Promise<T, E>>`; awaiting the promise yields `Result<T, E>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Promise<T, E = String> {
    Resolved(T),
    Rejected(E),
}

impl<T, E> Promise<T, E> {
    pub fn into_result(self) -> Result<T, E> {
        match self {
            Promise::Resolved(value) => Ok(value),
            Promise::Rejected(err) => Err(err),
        }
    }
}

impl<T: Default, E> Default for Promise<T, E> {
    fn default() -> Self {
        Promise::Resolved(T::default())
    }
}

impl<T, E> IntoFuture for Promise<T, E> {
    type Output = Result<T, E>;
    type IntoFuture = futures::future::Ready<Result<T, E>>;

    fn into_future(self) -> Self::IntoFuture {
        futures::future::ready(self.into_result())
    }
}

pub(crate) struct MockState<A, R> {
    name: String,
    calls: Vec<A>,
    results: Vec<MockResult<R>>,
    contexts: Vec<Value>,
    instances: Vec<Value>,
    last_call: Option<A>,
    implementation: Option<Implementation<A, R>>,
    return_value: Option<R>,
    once_implementations: VecDeque<Implementation<A, R>>,
    once_return_values: VecDeque<R>,
    restorer: Option<Restorer>,
}

impl<A, R> MockState<A, R> {
    fn new(implementation: Option<Implementation<A, R>>) -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            calls: Vec::new(),
            results: Vec::new(),
            contexts: Vec::new(),
            instances: Vec::new(),
            last_call: None,
            implementation,
            return_value: None,
            once_implementations: VecDeque::new(),
            once_return_values: VecDeque::new(),
            restorer: None,
        }
    }

    fn clear(&mut self) {
        self.calls.clear();
        self.results.clear();
        self.contexts.clear();
        self.instances.clear();
        self.last_call = None;
    }

    fn reset(&mut self) {
        self.clear();
        self.implementation = None;
        self.return_value = None;
        self.once_implementations.clear();
        self.once_return_values.clear();
    }
}

enum Behavior<A, R> {
    Call(Implementation<A, R>),
    Value(R),
    Default,
}

/// A call-tracking stand-in for a function `Fn(A) -> R`
///
/// Cloning a mock shares its record.
pub struct Mock<A, R> {
    state: Arc<Mutex<MockState<A, R>>>,
}

impl<A, R> Clone for Mock<A, R> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<A, R> fmt::Debug for Mock<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Mock")
            .field("name", &state.name)
            .field("calls", &state.calls.len())
            .field("spy", &state.restorer.is_some())
            .finish()
    }
}

impl<A, R> Mock<A, R>
where
    A: Clone + Send + 'static,
    R: Clone + Send + 'static,
{
    /// Mock returning `R::default()` until configured
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::new(None))),
        }
    }

    /// Mock with a persistent implementation
    pub fn with_implementation<F>(f: F) -> Self
    where
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        Self::from_implementation(Arc::new(f))
    }

    pub(crate) fn from_implementation(implementation: Implementation<A, R>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::new(Some(implementation)))),
        }
    }

    /// Invoke without a receiver
    pub fn call(&self, args: A) -> R
    where
        R: Default,
    {
        self.call_with(Value::Null, args)
    }

    /// Invoke with `this` recorded in the contexts and instances logs
    ///
    /// A panicking implementation is recorded as [`MockResult::Throw`] and the
    /// panic continues to the caller.
    pub fn call_with(&self, this: Value, args: A) -> R
    where
        R: Default,
    {
        let (index, behavior) = {
            let mut state = self.state.lock();
            state.calls.push(args.clone());
            state.contexts.push(this.clone());
            state.instances.push(this);
            state.last_call = Some(args.clone());
            state.results.push(MockResult::Incomplete);

            let behavior = if let Some(f) = state.once_implementations.pop_front() {
                Behavior::Call(f)
            } else if let Some(value) = state.once_return_values.pop_front() {
                Behavior::Value(value)
            } else if let Some(value) = &state.return_value {
                Behavior::Value(value.clone())
            } else if let Some(f) = &state.implementation {
                Behavior::Call(Arc::clone(f))
            } else {
                Behavior::Default
            };
            trace!("{} called ({} calls)", state.name, state.calls.len());
            (state.results.len() - 1, behavior)
        };

        // The lock is released here so implementations may call the mock again.
        let outcome = panic::catch_unwind(AssertUnwindSafe(move || match behavior {
            Behavior::Call(f) => f(args),
            Behavior::Value(value) => value,
            Behavior::Default => R::default(),
        }));

        match outcome {
            Ok(value) => {
                if let Some(slot) = self.state.lock().results.get_mut(index) {
                    *slot = MockResult::Return(value.clone());
                }
                value
            }
            Err(payload) => {
                if let Some(slot) = self.state.lock().results.get_mut(index) {
                    *slot = MockResult::Throw(panic_message(payload.as_ref()));
                }
                panic::resume_unwind(payload)
            }
        }
    }

    /// Closure forwarding to [`Mock::call`]
    pub fn as_fn(&self) -> impl Fn(A) -> R + Send + Sync + 'static
    where
        R: Default,
    {
        let mock = self.clone();
        move |args| mock.call(args)
    }

    pub fn mock_implementation<F>(&self, f: F) -> &Self
    where
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        self.state.lock().implementation = Some(Arc::new(f));
        self
    }

    pub fn mock_implementation_once<F>(&self, f: F) -> &Self
    where
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        self.state.lock().once_implementations.push_back(Arc::new(f));
        self
    }

    pub fn mock_return_value(&self, value: R) -> &Self {
        self.state.lock().return_value = Some(value);
        self
    }

    pub fn mock_return_value_once(&self, value: R) -> &Self {
        self.state.lock().once_return_values.push_back(value);
        self
    }

    pub fn mock_name(&self, name: impl Into<String>) -> &Self {
        self.state.lock().name = name.into();
        self
    }

    pub fn get_mock_name(&self) -> String {
        self.state.lock().name.clone()
    }

    /// Forget recorded calls, results and receivers
    pub fn mock_clear(&self) -> &Self {
        self.state.lock().clear();
        self
    }

    /// Forget recorded data and all configured behavior
    pub fn mock_reset(&self) -> &Self {
        self.state.lock().reset();
        self
    }

    /// Reset, and for spies put the original method back
    pub fn mock_restore(&self) {
        let restorer = {
            let mut state = self.state.lock();
            state.reset();
            state.restorer.take()
        };
        if let Some(restore) = restorer {
            restore();
        }
    }

    pub fn calls(&self) -> Vec<A> {
        self.state.lock().calls.clone()
    }

    pub fn results(&self) -> Vec<MockResult<R>> {
        self.state.lock().results.clone()
    }

    pub fn contexts(&self) -> Vec<Value> {
        self.state.lock().contexts.clone()
    }

    pub fn instances(&self) -> Vec<Value> {
        self.state.lock().instances.clone()
    }

    pub fn last_call(&self) -> Option<A> {
        self.state.lock().last_call.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// True while this mock is an installed spy
    pub fn is_spy(&self) -> bool {
        self.state.lock().restorer.is_some()
    }

    pub(crate) fn set_restorer(&self, restorer: Restorer) {
        self.state.lock().restorer = Some(restorer);
    }

    pub(crate) fn downgrade(&self) -> WeakMock<A, R> {
        WeakMock {
            state: Arc::downgrade(&self.state),
        }
    }
}

impl<A, R> Default for Mock<A, R>
where
    A: Clone + Send + 'static,
    R: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A, T, E> Mock<A, Promise<T, E>>
where
    A: Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn mock_resolved_value(&self, value: T) -> &Self {
        self.mock_implementation(move |_| Promise::Resolved(value.clone()))
    }

    pub fn mock_resolved_value_once(&self, value: T) -> &Self {
        self.mock_implementation_once(move |_| Promise::Resolved(value.clone()))
    }

    pub fn mock_rejected_value(&self, error: E) -> &Self {
        self.mock_implementation(move |_| Promise::Rejected(error.clone()))
    }

    pub fn mock_rejected_value_once(&self, error: E) -> &Self {
        self.mock_implementation_once(move |_| Promise::Rejected(error.clone()))
    }
}

/// Registry-side handle that does not keep a mock alive
pub(crate) struct WeakMock<A, R> {
    state: Weak<Mutex<MockState<A, R>>>,
}

impl<A, R> WeakMock<A, R> {
    pub(crate) fn upgrade(&self) -> Option<Mock<A, R>> {
        self.state.upgrade().map(|state| Mock { state })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::panic::catch_unwind;

    #[test]
    fn test_unconfigured_mock_returns_default() {
        let mock: Mock<(i32, i32), i32> = Mock::new();
        assert_eq!(mock.call((1, 2)), 0);
        assert_eq!(mock.calls(), vec![(1, 2)]);
        assert_eq!(mock.results(), vec![MockResult::Return(0)]);
        assert_eq!(mock.last_call(), Some((1, 2)));
    }

    #[test]
    fn test_once_values_then_persistent() {
        let mock: Mock<(), i32> = Mock::new();
        mock.mock_return_value_once(1)
            .mock_return_value_once(2)
            .mock_return_value(3);

        let values: Vec<_> = (0..4).map(|_| mock.call(())).collect();
        assert_eq!(values, vec![1, 2, 3, 3]);
    }

    #[test]
    fn test_behavior_precedence() {
        let mock = Mock::with_implementation(|x: i32| x * 10);
        mock.mock_return_value(7)
            .mock_return_value_once(1)
            .mock_implementation_once(|x| x + 100);

        assert_eq!(mock.call(1), 101);
        assert_eq!(mock.call(1), 1);
        assert_eq!(mock.call(1), 7);

        mock.mock_reset();
        assert_eq!(mock.call(5), 0);

        mock.mock_implementation(|x| x * 10);
        assert_eq!(mock.call(5), 50);
    }

    #[test]
    fn test_throw_is_recorded_and_rethrown() {
        let mock: Mock<&'static str, ()> =
            Mock::with_implementation(|msg| panic!("boom: {msg}"));

        let caught = catch_unwind(AssertUnwindSafe(|| mock.call("x")));
        assert!(caught.is_err());
        assert_eq!(mock.results(), vec![MockResult::Throw("boom: x".to_string())]);
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn test_clear_keeps_configuration() {
        let mock: Mock<(), &'static str> = Mock::new();
        mock.mock_return_value("configured");
        mock.call(());
        mock.mock_clear();

        assert_eq!(mock.call_count(), 0);
        assert!(mock.results().is_empty());
        assert_eq!(mock.last_call(), None);
        assert_eq!(mock.call(()), "configured");
    }

    #[test]
    fn test_contexts_record_receiver() {
        let mock: Mock<u8, ()> = Mock::new();
        mock.call_with(json!({"id": 1}), 1);
        mock.call(2);

        assert_eq!(mock.contexts(), vec![json!({"id": 1}), Value::Null]);
        assert_eq!(mock.instances().len(), 2);
    }

    #[test]
    fn test_recursive_call_sees_incomplete() {
        let mock: Mock<u32, u32> = Mock::new();
        let inner = mock.clone();
        mock.mock_implementation(move |n| if n == 0 { 0 } else { inner.call(n - 1) + 1 });

        assert_eq!(mock.call(2), 2);
        assert_eq!(
            mock.results(),
            vec![
                MockResult::Return(2),
                MockResult::Return(1),
                MockResult::Return(0)
            ]
        );
    }

    #[test]
    fn test_as_fn_shares_record() {
        let mock: Mock<i32, i32> = Mock::with_implementation(|x| x + 1);
        let f = mock.as_fn();
        assert_eq!(f(1), 2);
        assert_eq!(vec![3, 4].into_iter().map(&f).collect::<Vec<_>>(), vec![4, 5]);
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_resolved_and_rejected_values() {
        let mock: Mock<(), Promise<u32>> = Mock::new();
        mock.mock_resolved_value(1)
            .mock_rejected_value_once("nope".to_string());

        assert_eq!(mock.call(()).await, Err("nope".to_string()));
        assert_eq!(mock.call(()).await, Ok(1));
        assert_eq!(mock.call(()).await, Ok(1));
    }

    #[test]
    fn test_mock_name() {
        let mock: Mock<(), ()> = Mock::new();
        assert_eq!(mock.get_mock_name(), DEFAULT_NAME);
        mock.mock_name("fetchUser");
        assert_eq!(mock.get_mock_name(), "fetchUser");
    }
}
