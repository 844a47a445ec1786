//! Test result models
//!
//! Defines per-test assertion results, failure kinds and the run-wide aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle hook kinds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HookKind {
    BeforeAll,
    BeforeEach,
    AfterEach,
    AfterAll,
}

impl HookKind {
    /// Get hook name as written in test files
    pub fn name(&self) -> &'static str {
        match self {
            HookKind::BeforeAll => "beforeAll",
            HookKind::BeforeEach => "beforeEach",
            HookKind::AfterEach => "afterEach",
            HookKind::AfterAll => "afterAll",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Final status of a test
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Pending,
    Todo,
}

impl TestStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            TestStatus::Passed => "✓",
            TestStatus::Failed => "✗",
            TestStatus::Pending => "○",
            TestStatus::Todo => "✎",
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, TestStatus::Failed)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Passed => write!(f, "PASS"),
            TestStatus::Failed => write!(f, "FAIL"),
            TestStatus::Pending => write!(f, "SKIP"),
            TestStatus::Todo => write!(f, "TODO"),
        }
    }
}

/// Why a test failed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "hook", rename_all = "camelCase")]
pub enum FailureKind {
    /// A matcher rejected a value
    Assertion,
    /// A lifecycle hook failed
    Hook(HookKind),
    /// The test exceeded its time budget
    Timeout,
    /// Any other panic or error escaping the test body
    Uncaught,
}

/// A single recorded failure
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub kind: FailureKind,
    pub message: String,
}

impl FailureDetail {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(timeout_ms: u64) -> Self {
        Self::new(FailureKind::Timeout, timeout_message(timeout_ms))
    }

    pub fn hook_timeout(timeout_ms: u64) -> Self {
        Self::new(FailureKind::Timeout, hook_timeout_message(timeout_ms))
    }
}

fn exceeded(timeout_ms: u64, subject: &str) -> String {
    format!(
        "Exceeded timeout of {timeout_ms} ms for a {subject}.\n\
         Add a timeout value to this test to increase the timeout, if this is a long-running test."
    )
}

/// Message used for test bodies that exceed their timeout
pub fn timeout_message(timeout_ms: u64) -> String {
    exceeded(timeout_ms, "test")
}

/// Message used for hooks that exceed their timeout
pub fn hook_timeout_message(timeout_ms: u64) -> String {
    exceeded(timeout_ms, "hook")
}

/// Outcome of one registered test in one run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResult {
    pub ancestor_titles: Vec<String>,
    pub title: String,
    pub full_name: String,
    pub status: TestStatus,
    /// None when the body never ran
    pub duration_ms: Option<u64>,
    pub failure_messages: Vec<String>,
    pub failure_details: Vec<FailureDetail>,
}

impl AssertionResult {
    fn base(ancestors: &[String], title: &str, status: TestStatus) -> Self {
        let full_name = ancestors
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(title))
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            ancestor_titles: ancestors.to_vec(),
            title: title.to_string(),
            full_name,
            status,
            duration_ms: None,
            failure_messages: Vec::new(),
            failure_details: Vec::new(),
        }
    }

    pub fn passed(ancestors: &[String], title: &str, duration_ms: u64) -> Self {
        let mut result = Self::base(ancestors, title, TestStatus::Passed);
        result.duration_ms = Some(duration_ms);
        result
    }

    pub fn failed(
        ancestors: &[String],
        title: &str,
        duration_ms: Option<u64>,
        details: Vec<FailureDetail>,
    ) -> Self {
        let mut result = Self::base(ancestors, title, TestStatus::Failed);
        result.duration_ms = duration_ms;
        result.failure_messages = details.iter().map(|d| d.message.clone()).collect();
        result.failure_details = details;
        result
    }

    pub fn pending(ancestors: &[String], title: &str) -> Self {
        Self::base(ancestors, title, TestStatus::Pending)
    }

    pub fn todo(ancestors: &[String], title: &str) -> Self {
        Self::base(ancestors, title, TestStatus::Todo)
    }

    /// True if any recorded failure was a timeout
    pub fn is_timeout(&self) -> bool {
        self.failure_details
            .iter()
            .any(|d| d.kind == FailureKind::Timeout)
    }
}

impl fmt::Display for AssertionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status.symbol(), self.full_name)?;
        if let Some(ms) = self.duration_ms {
            write!(f, " [{ms}ms]")?;
        }
        if let Some(msg) = self.failure_messages.first() {
            write!(f, " - {}", msg.lines().next().unwrap_or_default())?;
        }
        Ok(())
    }
}

/// An afterAll failure that happened after the suite's results were recorded
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookFailure {
    pub ancestor_titles: Vec<String>,
    pub kind: HookKind,
    pub message: String,
}

/// Summary of a whole run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedResult {
    pub run_id: String,
    pub start_time: DateTime<Utc>,
    pub num_total_tests: usize,
    pub num_passed_tests: usize,
    pub num_failed_tests: usize,
    pub num_pending_tests: usize,
    pub num_todo_tests: usize,
    pub duration_ms: u64,
    pub success: bool,
    pub test_results: Vec<AssertionResult>,
    pub hook_failures: Vec<HookFailure>,
}

impl AggregatedResult {
    pub fn new(
        run_id: impl Into<String>,
        start_time: DateTime<Utc>,
        duration_ms: u64,
        test_results: Vec<AssertionResult>,
        hook_failures: Vec<HookFailure>,
    ) -> Self {
        let count = |status: TestStatus| test_results.iter().filter(|r| r.status == status).count();
        let num_passed_tests = count(TestStatus::Passed);
        let num_failed_tests = count(TestStatus::Failed);
        let num_pending_tests = count(TestStatus::Pending);
        let num_todo_tests = count(TestStatus::Todo);

        Self {
            run_id: run_id.into(),
            start_time,
            num_total_tests: test_results.len(),
            num_passed_tests,
            num_failed_tests,
            num_pending_tests,
            num_todo_tests,
            duration_ms,
            success: num_failed_tests == 0 && hook_failures.is_empty(),
            test_results,
            hook_failures,
        }
    }

    pub fn pass_rate(&self) -> f64 {
        let ran = self.num_passed_tests + self.num_failed_tests;
        if ran == 0 {
            0.0
        } else {
            (self.num_passed_tests as f64 / ran as f64) * 100.0
        }
    }

    /// Results with status Failed, in run order
    pub fn failures(&self) -> impl Iterator<Item = &AssertionResult> {
        self.test_results
            .iter()
            .filter(|r| r.status == TestStatus::Failed)
    }
}

impl fmt::Display for AggregatedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run {}", self.run_id)?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        for result in &self.test_results {
            writeln!(f, "  {result}")?;
        }
        for hook in &self.hook_failures {
            writeln!(
                f,
                "  ! {} in \"{}\" - {}",
                hook.kind,
                hook.ancestor_titles.join(" "),
                hook.message
            )?;
        }
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(
            f,
            "Tests: {} | Pass: {} | Fail: {} | Skip: {} | Todo: {}",
            self.num_total_tests,
            self.num_passed_tests,
            self.num_failed_tests,
            self.num_pending_tests,
            self.num_todo_tests
        )?;
        writeln!(
            f,
            "Pass Rate: {:.1}% | Duration: {}ms",
            self.pass_rate(),
            self.duration_ms
        )
    }
}

/// Generate unique run ID
pub fn generate_run_id() -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let random: u32 = rand::random::<u32>() % 10000;
    format!("{timestamp}_{random:04}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titles(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_full_name_joins_ancestors() {
        let result = AssertionResult::passed(&titles(&["math", "add"]), "sums", 3);
        assert_eq!(result.full_name, "math add sums");
        assert_eq!(result.duration_ms, Some(3));
        assert!(result.status.is_success());
    }

    #[test]
    fn test_failed_result_messages() {
        let result = AssertionResult::failed(
            &[],
            "slow",
            Some(50),
            vec![FailureDetail::timeout(50)],
        );
        assert_eq!(result.status, TestStatus::Failed);
        assert!(result.is_timeout());
        assert!(result.failure_messages[0].starts_with("Exceeded timeout of 50 ms"));
    }

    #[test]
    fn test_aggregate_counts() {
        let results = vec![
            AssertionResult::passed(&[], "a", 1),
            AssertionResult::failed(
                &[],
                "b",
                Some(1),
                vec![FailureDetail::new(FailureKind::Assertion, "nope")],
            ),
            AssertionResult::pending(&[], "c"),
            AssertionResult::todo(&[], "d"),
        ];

        let aggregate = AggregatedResult::new("run", Utc::now(), 5, results, Vec::new());
        assert_eq!(aggregate.num_total_tests, 4);
        assert_eq!(aggregate.num_passed_tests, 1);
        assert_eq!(aggregate.num_failed_tests, 1);
        assert_eq!(aggregate.num_pending_tests, 1);
        assert_eq!(aggregate.num_todo_tests, 1);
        assert!(!aggregate.success);
        assert_eq!(aggregate.pass_rate(), 50.0);
        assert_eq!(aggregate.failures().count(), 1);
    }

    #[test]
    fn test_hook_failure_marks_run_unsuccessful() {
        let hook = HookFailure {
            ancestor_titles: titles(&["db"]),
            kind: HookKind::AfterAll,
            message: "close failed".to_string(),
        };
        let aggregate = AggregatedResult::new(
            "run",
            Utc::now(),
            0,
            vec![AssertionResult::passed(&[], "a", 0)],
            vec![hook],
        );
        assert!(!aggregate.success);
    }

    #[test]
    fn test_failure_kind_serialization() {
        let json = serde_json::to_string(&FailureKind::Hook(HookKind::BeforeAll)).unwrap();
        assert_eq!(json, r#"{"type":"hook","hook":"beforeAll"}"#);
    }

    #[test]
    fn test_run_id_format() {
        let id = generate_run_id();
        assert_eq!(id.len(), "20260101_120000_0000".len());
    }
}
