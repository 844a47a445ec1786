//! Assertions
//!
//! A failing matcher unwinds with an [`AssertionError`] payload. The runner
//! recognizes that payload and records the failure as an assertion failure
//! rather than an uncaught panic.

use serde::Serialize;
use serde_json::Value;
use std::fmt::{self, Debug};
use std::panic::{self, AssertUnwindSafe};

use crate::mock::{Mock, MockResult};
use crate::utils::panic_message;

/// Payload carried by a failing matcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionError {
    pub matcher: String,
    pub message: String,
}

impl AssertionError {
    pub fn new(matcher: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            matcher: matcher.into(),
            message: message.into(),
        }
    }

    /// Unwind with this error as the payload
    ///
    /// Uses `resume_unwind`, so the panic hook does not print it.
    pub fn raise(self) -> ! {
        panic::resume_unwind(Box::new(self))
    }
}

impl fmt::Display for AssertionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expect(received).{}\n\n{}", self.matcher, self.message)
    }
}

impl std::error::Error for AssertionError {}

/// Fail the current test with a custom message
pub fn fail(message: impl Into<String>) -> ! {
    AssertionError::new("fail()", message).raise()
}

fn matcher_name(negated: bool, name: &str) -> String {
    if negated {
        format!("not.{name}")
    } else {
        name.to_string()
    }
}

fn check(negated: bool, pass: bool, name: &str, message: impl FnOnce() -> String) {
    if pass == negated {
        AssertionError::new(matcher_name(negated, name), message()).raise();
    }
}

pub fn expect<T>(actual: T) -> Expect<T> {
    Expect {
        actual,
        negated: false,
    }
}

/// Matchers over a plain value
pub struct Expect<T> {
    actual: T,
    negated: bool,
}

impl<T> Expect<T> {
    pub fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }
}

impl<T: Debug> Expect<T> {
    /// `==` equality
    pub fn to_be<U>(&self, expected: U)
    where
        T: PartialEq<U>,
        U: Debug,
    {
        check(self.negated, self.actual == expected, "to_be(expected)", || {
            format!("Expected: {:?}\nReceived: {:?}", expected, self.actual)
        });
    }

    /// Recursive structural equality of the serialized forms
    ///
    /// Lets a struct be compared against `serde_json::json!` literals.
    pub fn to_equal<U>(&self, expected: U)
    where
        T: Serialize,
        U: Serialize + Debug,
    {
        let actual = serde_json::to_value(&self.actual).unwrap_or(Value::Null);
        let wanted = serde_json::to_value(&expected).unwrap_or(Value::Null);
        check(self.negated, actual == wanted, "to_equal(expected)", || {
            format!("Expected: {}\nReceived: {}", pretty(&wanted), pretty(&actual))
        });
    }

    pub fn to_be_greater_than(&self, bound: T)
    where
        T: PartialOrd,
    {
        check(self.negated, self.actual > bound, "to_be_greater_than(expected)", || {
            format!("Expected: > {:?}\nReceived:   {:?}", bound, self.actual)
        });
    }

    pub fn to_be_less_than(&self, bound: T)
    where
        T: PartialOrd,
    {
        check(self.negated, self.actual < bound, "to_be_less_than(expected)", || {
            format!("Expected: < {:?}\nReceived:   {:?}", bound, self.actual)
        });
    }

    /// Slice membership
    pub fn to_contain<E>(&self, item: E)
    where
        T: AsRef<[E]>,
        E: PartialEq + Debug,
    {
        let items = self.actual.as_ref();
        check(self.negated, items.contains(&item), "to_contain(expected)", || {
            format!("Expected item: {:?}\nReceived array: {:?}", item, items)
        });
    }
}

impl<T: Debug> Expect<Option<T>> {
    pub fn to_be_some(&self) {
        check(self.negated, self.actual.is_some(), "to_be_some()", || {
            format!("Received: {:?}", self.actual)
        });
    }

    pub fn to_be_none(&self) {
        check(self.negated, self.actual.is_none(), "to_be_none()", || {
            format!("Received: {:?}", self.actual)
        });
    }
}

impl<T: Debug, E: Debug> Expect<Result<T, E>> {
    pub fn to_be_ok(&self) {
        check(self.negated, self.actual.is_ok(), "to_be_ok()", || {
            format!("Received: {:?}", self.actual)
        });
    }

    pub fn to_be_err(&self) {
        check(self.negated, self.actual.is_err(), "to_be_err()", || {
            format!("Received: {:?}", self.actual)
        });
    }
}

impl Expect<&str> {
    pub fn to_match(&self, needle: &str) {
        check(self.negated, self.actual.contains(needle), "to_match(expected)", || {
            format!("Expected substring: {:?}\nReceived string:    {:?}", needle, self.actual)
        });
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

pub fn expect_mock<A, R>(mock: &Mock<A, R>) -> ExpectMock<'_, A, R> {
    ExpectMock {
        mock,
        negated: false,
    }
}

/// Matchers over a mock's recorded calls and results
pub struct ExpectMock<'a, A, R> {
    mock: &'a Mock<A, R>,
    negated: bool,
}

impl<A, R> ExpectMock<'_, A, R>
where
    A: Clone + Send + Debug + 'static,
    R: Clone + Send + Debug + 'static,
{
    pub fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    pub fn to_have_been_called(&self) {
        let count = self.mock.call_count();
        check(self.negated, count > 0, "to_have_been_called()", || {
            format!(
                "{}\nExpected number of calls: {}\nReceived number of calls: {count}",
                self.mock.get_mock_name(),
                if self.negated { "0" } else { ">= 1" },
            )
        });
    }

    pub fn to_have_been_called_times(&self, times: usize) {
        let count = self.mock.call_count();
        check(self.negated, count == times, "to_have_been_called_times(expected)", || {
            format!(
                "{}\nExpected number of calls: {times}\nReceived number of calls: {count}",
                self.mock.get_mock_name()
            )
        });
    }

    pub fn to_have_been_called_with(&self, args: A)
    where
        A: PartialEq,
    {
        let calls = self.mock.calls();
        check(self.negated, calls.contains(&args), "to_have_been_called_with(...expected)", || {
            format!(
                "{}\nExpected: {:?}\nReceived calls: {:?}",
                self.mock.get_mock_name(),
                args,
                calls
            )
        });
    }

    pub fn to_have_been_last_called_with(&self, args: A)
    where
        A: PartialEq,
    {
        let last = self.mock.last_call();
        check(
            self.negated,
            last.as_ref() == Some(&args),
            "to_have_been_last_called_with(...expected)",
            || {
                format!(
                    "{}\nExpected: {:?}\nReceived: {:?}",
                    self.mock.get_mock_name(),
                    args,
                    last
                )
            },
        );
    }

    /// Passes if any call returned normally
    pub fn to_have_returned(&self) {
        let results = self.mock.results();
        let pass = results.iter().any(|r| matches!(r, MockResult::Return(_)));
        check(self.negated, pass, "to_have_returned()", || {
            format!("{}\nReceived results: {:?}", self.mock.get_mock_name(), results)
        });
    }

    pub fn to_have_returned_with(&self, value: R)
    where
        R: PartialEq,
    {
        let results = self.mock.results();
        let pass = results.iter().any(|r| r.value() == Some(&value));
        check(self.negated, pass, "to_have_returned_with(expected)", || {
            format!(
                "{}\nExpected: {:?}\nReceived results: {:?}",
                self.mock.get_mock_name(),
                value,
                results
            )
        });
    }
}

pub fn expect_fn<F: FnOnce()>(f: F) -> ExpectFn<F> {
    ExpectFn { f, negated: false }
}

/// Matchers over a closure that may panic
pub struct ExpectFn<F> {
    f: F,
    negated: bool,
}

impl<F: FnOnce()> ExpectFn<F> {
    pub fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    pub fn to_throw(self) {
        let negated = self.negated;
        let thrown = run_catching(self.f);
        check(negated, thrown.is_some(), "to_throw()", || match thrown {
            Some(message) => format!("Received function did throw: {message}"),
            None => "Received function did not throw".to_string(),
        });
    }

    pub fn to_throw_containing(self, needle: &str) {
        let negated = self.negated;
        let thrown = run_catching(self.f);
        let pass = thrown.as_deref().is_some_and(|m| m.contains(needle));
        check(negated, pass, "to_throw(expected)", || {
            format!(
                "Expected substring: {:?}\nReceived message: {}",
                needle,
                thrown.as_deref().unwrap_or("<did not throw>")
            )
        });
    }
}

fn run_catching<F: FnOnce()>(f: F) -> Option<String> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .err()
        .map(|payload| panic_message(payload.as_ref()))
}
