//! Run reporters
//!
//! The runner announces the run, each finished test and the final aggregate
//! to every registered [`Reporter`].

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::RunConfig;
use crate::models::{AggregatedResult, AssertionResult, HookFailure, TestStatus};

/// Receives run progress; all methods default to no-ops
pub trait Reporter: Send + Sync {
    fn on_run_start(&self, _config: &RunConfig, _run_id: &str, _num_total_tests: usize) {}

    fn on_test_result(&self, _result: &AssertionResult) {}

    fn on_hook_failure(&self, _failure: &HookFailure) {}

    fn on_run_complete(&self, _aggregate: &AggregatedResult) {}
}

/// Reports through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn on_run_start(&self, config: &RunConfig, run_id: &str, num_total_tests: usize) {
        info!(
            "Starting run {} with {} tests (timeout {}ms)",
            run_id, num_total_tests, config.test_timeout_ms
        );
    }

    fn on_test_result(&self, result: &AssertionResult) {
        match result.status {
            TestStatus::Failed => {
                warn!("{}", result);
                for message in &result.failure_messages {
                    warn!("  {}", message);
                }
            }
            _ => debug!("{}", result),
        }
    }

    fn on_hook_failure(&self, failure: &HookFailure) {
        warn!(
            "{} hook failed in \"{}\": {}",
            failure.kind,
            failure.ancestor_titles.join(" "),
            failure.message
        );
    }

    fn on_run_complete(&self, aggregate: &AggregatedResult) {
        info!(
            "Run {} finished: {} passed, {} failed, {} skipped, {} todo ({}ms)",
            aggregate.run_id,
            aggregate.num_passed_tests,
            aggregate.num_failed_tests,
            aggregate.num_pending_tests,
            aggregate.num_todo_tests,
            aggregate.duration_ms
        );
    }
}

#[derive(Default)]
struct Collected {
    run_ids: Vec<String>,
    configs: Vec<RunConfig>,
    results: Vec<AssertionResult>,
    hook_failures: Vec<HookFailure>,
    aggregates: Vec<AggregatedResult>,
}

/// Keeps everything it is told in memory; clones share the same store
#[derive(Clone, Default)]
pub struct CollectingReporter {
    inner: Arc<Mutex<Collected>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run_ids(&self) -> Vec<String> {
        self.inner.lock().run_ids.clone()
    }

    /// Config each run started with
    pub fn configs(&self) -> Vec<RunConfig> {
        self.inner.lock().configs.clone()
    }

    /// Test results in the order they were reported
    pub fn results(&self) -> Vec<AssertionResult> {
        self.inner.lock().results.clone()
    }

    pub fn hook_failures(&self) -> Vec<HookFailure> {
        self.inner.lock().hook_failures.clone()
    }

    pub fn last_aggregate(&self) -> Option<AggregatedResult> {
        self.inner.lock().aggregates.last().cloned()
    }
}

impl Reporter for CollectingReporter {
    fn on_run_start(&self, config: &RunConfig, run_id: &str, _num_total_tests: usize) {
        let mut collected = self.inner.lock();
        collected.run_ids.push(run_id.to_string());
        collected.configs.push(config.clone());
    }

    fn on_test_result(&self, result: &AssertionResult) {
        self.inner.lock().results.push(result.clone());
    }

    fn on_hook_failure(&self, failure: &HookFailure) {
        self.inner.lock().hook_failures.push(failure.clone());
    }

    fn on_run_complete(&self, aggregate: &AggregatedResult) {
        self.inner.lock().aggregates.push(aggregate.clone());
    }
}
