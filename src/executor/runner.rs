//! Test execution runner
//!
//! Walks a suite tree depth-first in registration order, running hooks and
//! test bodies one at a time and recording one result per registered test.

use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::watchdog::run_body;
use crate::config::RunConfig;
use crate::error::RunnerError;
use crate::harness::Harness;
use crate::models::{generate_run_id, AggregatedResult, AssertionResult, FailureDetail, HookFailure, HookKind};
use crate::reporter::Reporter;
use crate::suite::{register, Hook, Node, Suite, SuiteBuilder, SuiteMode, Test, TestMode};
use crate::timers::Timers;
use crate::utils::Stopwatch;

/// What the runner will do with a test
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Plan {
    Run,
    Skip,
    Todo,
}

/// Suite context inherited by descendants
#[derive(Clone, Default)]
struct Scope<'a> {
    titles: Vec<String>,
    skipped: bool,
    focused: bool,
    /// Outermost suite first
    before_each: Vec<&'a [Hook]>,
    after_each: Vec<&'a [Hook]>,
}

impl<'a> Scope<'a> {
    fn enter(&self, suite: &'a Suite) -> Self {
        let mut titles = self.titles.clone();
        // The root suite is anonymous.
        if !suite.name().is_empty() {
            titles.push(suite.name().to_string());
        }

        let mut before_each = self.before_each.clone();
        before_each.push(suite.hooks(HookKind::BeforeEach));
        let mut after_each = self.after_each.clone();
        after_each.push(suite.hooks(HookKind::AfterEach));

        Self {
            titles,
            skipped: self.skipped || suite.mode() == SuiteMode::Skip,
            focused: self.focused || suite.mode() == SuiteMode::Only,
            before_each,
            after_each,
        }
    }

    /// before_each hooks, outermost suite first
    fn before_each_chain(&self) -> impl Iterator<Item = &'a Hook> + '_ {
        self.before_each.iter().flat_map(|hooks| hooks.iter())
    }

    /// after_each hooks, innermost suite first
    fn after_each_chain(&self) -> impl Iterator<Item = &'a Hook> + '_ {
        self.after_each.iter().rev().flat_map(|hooks| hooks.iter())
    }
}

#[derive(Default)]
struct RunState {
    results: Vec<AssertionResult>,
    hook_failures: Vec<HookFailure>,
}

/// Executes suite trees
pub struct Runner {
    config: RunConfig,
    harness: Harness,
    reporters: Vec<Arc<dyn Reporter>>,
}

impl Runner {
    /// Create a runner with its own harness
    pub fn new(config: RunConfig) -> Self {
        let harness = Harness::with_timers(Timers::with_loop_limit(config.timer_loop_limit));
        Self {
            config,
            harness,
            reporters: Vec::new(),
        }
    }

    /// Use the harness the test bodies were registered against
    ///
    /// The harness timers take on the configured loop limit.
    pub fn with_harness(mut self, harness: Harness) -> Self {
        harness.timers().set_loop_limit(self.config.timer_loop_limit);
        self.harness = harness;
        self
    }

    pub fn with_reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporters.push(Arc::new(reporter));
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn harness(&self) -> &Harness {
        &self.harness
    }

    /// Register through a closure and run the resulting tree
    pub async fn run_with<F>(&self, f: F) -> Result<AggregatedResult, RunnerError>
    where
        F: FnOnce(&mut SuiteBuilder),
    {
        let root = register(f)?;
        self.run(&root).await
    }

    /// Run every test under `root`
    ///
    /// Test and hook failures end up in the aggregate; only internal
    /// inconsistencies are returned as errors.
    pub async fn run(&self, root: &Suite) -> Result<AggregatedResult, RunnerError> {
        let run_id = generate_run_id();
        let start_time = Utc::now();
        let stopwatch = Stopwatch::start(format!("run {run_id}"));
        let expected = root.test_count();

        info!("Starting run {} ({} tests)", run_id, expected);
        for reporter in &self.reporters {
            reporter.on_run_start(&self.config, &run_id, expected);
        }

        let has_only = root.has_only();
        let mut state = RunState::default();
        self.run_suite(root, &Scope::default(), has_only, &mut state).await;

        if state.results.len() != expected {
            return Err(RunnerError::ResultCountMismatch {
                expected,
                actual: state.results.len(),
            });
        }

        let aggregate = AggregatedResult::new(
            run_id,
            start_time,
            stopwatch.stop(),
            state.results,
            state.hook_failures,
        );

        info!(
            "Run {} completed in {}ms - Pass: {}/{} ({:.1}%)",
            aggregate.run_id,
            aggregate.duration_ms,
            aggregate.num_passed_tests,
            aggregate.num_total_tests,
            aggregate.pass_rate()
        );
        for reporter in &self.reporters {
            reporter.on_run_complete(&aggregate);
        }
        Ok(aggregate)
    }

    fn plan(&self, test: &Test, scope: &Scope<'_>, has_only: bool) -> Plan {
        if test.mode() == TestMode::Todo {
            return Plan::Todo;
        }
        if scope.skipped || test.mode() == TestMode::Skip {
            return Plan::Skip;
        }
        if has_only && !(scope.focused || test.mode() == TestMode::Only) {
            return Plan::Skip;
        }
        if let Some(pattern) = &self.config.test_name_pattern {
            if !full_name(&scope.titles, test.name()).contains(pattern.as_str()) {
                return Plan::Skip;
            }
        }
        Plan::Run
    }

    fn any_runnable(&self, suite: &Suite, scope: &Scope<'_>, has_only: bool) -> bool {
        suite.children().iter().any(|node| match node {
            Node::Test(test) => self.plan(test, scope, has_only) == Plan::Run,
            Node::Suite(child) => self.any_runnable(child, &scope.enter(child), has_only),
        })
    }

    fn timeout_for(&self, own: Option<Duration>) -> Duration {
        own.unwrap_or_else(|| self.config.test_timeout())
    }

    fn run_suite<'a>(
        &'a self,
        suite: &'a Suite,
        parent: &'a Scope<'a>,
        has_only: bool,
        state: &'a mut RunState,
    ) -> BoxFuture<'a, ()> {
        async move {
            let scope = parent.enter(suite);

            if !self.any_runnable(suite, &scope, has_only) {
                self.record_without_running(suite, &scope, has_only, None, state);
                return;
            }

            let mut setup_failure = None;
            for hook in suite.hooks(HookKind::BeforeAll) {
                if let Err(detail) = self.run_hook(hook, HookKind::BeforeAll).await {
                    warn!("beforeAll failed in \"{}\": {}", scope.titles.join(" "), detail.message);
                    setup_failure = Some(detail);
                    break;
                }
            }

            match setup_failure {
                Some(detail) => {
                    self.record_without_running(suite, &scope, has_only, Some(&detail), state);
                }
                None => {
                    for node in suite.children() {
                        match node {
                            Node::Test(test) => {
                                let result = self.run_test(test, &scope, has_only).await;
                                self.report(result, state);
                            }
                            Node::Suite(child) => {
                                self.run_suite(child, &scope, has_only, state).await;
                            }
                        }
                    }
                }
            }

            for hook in suite.hooks(HookKind::AfterAll) {
                if let Err(detail) = self.run_hook(hook, HookKind::AfterAll).await {
                    let failure = HookFailure {
                        ancestor_titles: scope.titles.clone(),
                        kind: HookKind::AfterAll,
                        message: detail.message,
                    };
                    warn!("afterAll failed in \"{}\": {}", scope.titles.join(" "), failure.message);
                    for reporter in &self.reporters {
                        reporter.on_hook_failure(&failure);
                    }
                    state.hook_failures.push(failure);
                }
            }
        }
        .boxed()
    }

    /// Emit results for a subtree whose bodies will not run
    ///
    /// With `failure` set, tests that would have run are failed with it;
    /// everything else keeps its skip/todo status.
    fn record_without_running(
        &self,
        suite: &Suite,
        scope: &Scope<'_>,
        has_only: bool,
        failure: Option<&FailureDetail>,
        state: &mut RunState,
    ) {
        for node in suite.children() {
            match node {
                Node::Test(test) => {
                    let result = match (self.plan(test, scope, has_only), failure) {
                        (Plan::Todo, _) => AssertionResult::todo(&scope.titles, test.name()),
                        (Plan::Run, Some(detail)) => {
                            AssertionResult::failed(&scope.titles, test.name(), None, vec![detail.clone()])
                        }
                        _ => AssertionResult::pending(&scope.titles, test.name()),
                    };
                    self.report(result, state);
                }
                Node::Suite(child) => {
                    self.record_without_running(child, &scope.enter(child), has_only, failure, state);
                }
            }
        }
    }

    async fn run_test(&self, test: &Test, scope: &Scope<'_>, has_only: bool) -> AssertionResult {
        let titles = &scope.titles;
        let body = match (self.plan(test, scope, has_only), test.body()) {
            (Plan::Run, Some(body)) => body,
            (Plan::Todo, _) | (Plan::Run, None) => return AssertionResult::todo(titles, test.name()),
            (Plan::Skip, _) => return AssertionResult::pending(titles, test.name()),
        };

        let name = full_name(titles, test.name());
        debug!("Running {}", name);
        self.prepare_test();

        let stopwatch = Stopwatch::start(&name);
        let mut failures = Vec::new();

        let mut setup_ok = true;
        for hook in scope.before_each_chain() {
            if let Err(detail) = self.run_hook(hook, HookKind::BeforeEach).await {
                failures.push(detail);
                setup_ok = false;
                break;
            }
        }

        if setup_ok {
            if let Err(failure) = run_body(body, self.timeout_for(test.timeout())).await {
                failures.push(failure.into_test_detail());
            }
        }

        for hook in scope.after_each_chain() {
            if let Err(detail) = self.run_hook(hook, HookKind::AfterEach).await {
                failures.push(detail);
            }
        }

        let duration = stopwatch.stop();
        if self.harness.use_real_timers() {
            debug!("Restored real timers after {}", name);
        }

        if failures.is_empty() {
            AssertionResult::passed(titles, test.name(), duration)
        } else {
            AssertionResult::failed(titles, test.name(), Some(duration), failures)
        }
    }

    /// Mock hygiene and timer mode applied before every test that runs
    fn prepare_test(&self) {
        if self.config.restore_mocks {
            self.harness.restore_all_mocks();
        }
        if self.config.reset_mocks || self.config.restore_mocks {
            self.harness.reset_all_mocks();
        } else if self.config.clear_mocks {
            self.harness.clear_all_mocks();
        }
        if self.config.fake_timers {
            self.harness.use_fake_timers();
        }
    }

    async fn run_hook(&self, hook: &Hook, kind: HookKind) -> Result<(), FailureDetail> {
        run_body(hook.body(), self.timeout_for(hook.timeout()))
            .await
            .map_err(|failure| failure.into_hook_detail(kind))
    }

    fn report(&self, result: AssertionResult, state: &mut RunState) {
        for reporter in &self.reporters {
            reporter.on_test_result(&result);
        }
        state.results.push(result);
    }
}

fn full_name(titles: &[String], name: &str) -> String {
    titles
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(name))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RegistrationError, TimerError};
    use crate::expect::expect;
    use crate::models::{FailureKind, TestStatus};
    use crate::reporter::CollectingReporter;
    use crate::suite::{Body, Done};
    use parking_lot::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn log() -> Log {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn record(log: &Log, entry: &str) -> Body {
        let log = Arc::clone(log);
        let entry = entry.to_string();
        Body::sync(move || {
            log.lock().push(entry.clone());
            Ok(())
        })
    }

    fn failing(log: &Log, entry: &str) -> Body {
        let log = Arc::clone(log);
        let entry = entry.to_string();
        Body::sync(move || {
            log.lock().push(entry.clone());
            anyhow::bail!("{entry} failed")
        })
    }

    fn runner() -> Runner {
        Runner::new(RunConfig::default())
    }

    fn statuses(aggregate: &AggregatedResult) -> Vec<(String, TestStatus)> {
        aggregate
            .test_results
            .iter()
            .map(|r| (r.full_name.clone(), r.status))
            .collect()
    }

    #[tokio::test]
    async fn test_one_result_per_registered_test() {
        let calls = log();
        let aggregate = runner()
            .run_with(|s| {
                s.test("top", record(&calls, "top"));
                s.describe("group", |s| {
                    s.it("runs", record(&calls, "runs"));
                    s.it_skip("skipped", record(&calls, "skipped"));
                    s.todo("later");
                    s.describe_skip("off", |s| {
                        s.it("inside skipped", record(&calls, "inside"));
                    });
                });
            })
            .await
            .unwrap();

        assert_eq!(aggregate.num_total_tests, 5);
        assert_eq!(
            statuses(&aggregate),
            vec![
                ("top".to_string(), TestStatus::Passed),
                ("group runs".to_string(), TestStatus::Passed),
                ("group skipped".to_string(), TestStatus::Pending),
                ("group later".to_string(), TestStatus::Todo),
                ("group off inside skipped".to_string(), TestStatus::Pending),
            ]
        );
        assert_eq!(*calls.lock(), vec!["top", "runs"]);
        assert!(aggregate.success);
        assert_eq!(aggregate.test_results[1].ancestor_titles, vec!["group".to_string()]);
        assert_eq!(aggregate.test_results[2].duration_ms, None);
    }

    #[tokio::test]
    async fn test_only_filters_everything_else() {
        let calls = log();
        let aggregate = runner()
            .run_with(|s| {
                s.test("a", record(&calls, "a"));
                s.test_only("b", record(&calls, "b"));
                s.describe_only("focused", |s| {
                    s.test("c", record(&calls, "c"));
                    s.test_skip("d", record(&calls, "d"));
                });
                s.describe("plain", |s| {
                    s.before_all(record(&calls, "plain beforeAll"));
                    s.test("e", record(&calls, "e"));
                });
            })
            .await
            .unwrap();

        assert_eq!(*calls.lock(), vec!["b", "c"]);
        assert_eq!(aggregate.num_passed_tests, 2);
        assert_eq!(aggregate.num_pending_tests, 3);
    }

    #[tokio::test]
    async fn test_each_hooks_wrap_in_nesting_order() {
        let calls = log();
        runner()
            .run_with(|s| {
                s.describe("outer", |s| {
                    s.before_each(record(&calls, "before outer"));
                    s.after_each(record(&calls, "after outer"));
                    s.describe("middle", |s| {
                        s.before_each(record(&calls, "before middle"));
                        s.after_each(record(&calls, "after middle"));
                        s.describe("inner", |s| {
                            s.before_each(record(&calls, "before inner"));
                            s.after_each(record(&calls, "after inner"));
                            s.test("deep", record(&calls, "body"));
                        });
                    });
                });
            })
            .await
            .unwrap();

        assert_eq!(
            *calls.lock(),
            vec![
                "before outer",
                "before middle",
                "before inner",
                "body",
                "after inner",
                "after middle",
                "after outer",
            ]
        );
    }

    #[tokio::test]
    async fn test_all_hooks_run_once_around_children() {
        let calls = log();
        runner()
            .run_with(|s| {
                s.describe("suite", |s| {
                    s.before_all(record(&calls, "beforeAll"));
                    s.after_all(record(&calls, "afterAll"));
                    s.test("one", record(&calls, "one"));
                    s.test("two", record(&calls, "two"));
                });
            })
            .await
            .unwrap();

        assert_eq!(*calls.lock(), vec!["beforeAll", "one", "two", "afterAll"]);
    }

    #[tokio::test]
    async fn test_nested_all_hooks_order() {
        let calls = log();
        runner()
            .run_with(|s| {
                s.describe("outer", |s| {
                    s.before_all(record(&calls, "beforeAll outer"));
                    s.after_all(record(&calls, "afterAll outer"));
                    s.describe("inner", |s| {
                        s.before_all(record(&calls, "beforeAll inner"));
                        s.after_all(record(&calls, "afterAll inner"));
                        s.test("deep", record(&calls, "deep"));
                    });
                    s.test("shallow", record(&calls, "shallow"));
                });
            })
            .await
            .unwrap();

        assert_eq!(
            *calls.lock(),
            vec![
                "beforeAll outer",
                "beforeAll inner",
                "deep",
                "afterAll inner",
                "shallow",
                "afterAll outer",
            ]
        );
    }

    #[tokio::test]
    async fn test_hooks_skipped_when_nothing_runs() {
        let calls = log();
        runner()
            .run_with(|s| {
                s.describe("idle", |s| {
                    s.before_all(record(&calls, "beforeAll"));
                    s.before_each(record(&calls, "beforeEach"));
                    s.after_all(record(&calls, "afterAll"));
                    s.test_skip("skipped", record(&calls, "body"));
                    s.todo("todo");
                });
            })
            .await
            .unwrap();

        assert!(calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_fails_test_and_run_continues() {
        let calls = log();
        let aggregate = Runner::new(RunConfig::default().with_timeout_ms(5000))
            .run_with(|s| {
                s.test("hangs", Body::future(|| futures::future::pending()))
                    .timeout(Duration::from_millis(50));
                s.test("next", record(&calls, "next"));
            })
            .await
            .unwrap();

        let hung = &aggregate.test_results[0];
        assert_eq!(hung.status, TestStatus::Failed);
        assert!(hung.is_timeout());
        assert!(hung.failure_messages[0].starts_with("Exceeded timeout of 50 ms for a test."));
        assert_eq!(aggregate.test_results[1].status, TestStatus::Passed);
        assert_eq!(*calls.lock(), vec!["next"]);
    }

    #[tokio::test]
    async fn test_hook_timeout_names_the_hook() {
        let calls = log();
        let aggregate = runner()
            .run_with(|s| {
                s.hook_with_timeout(
                    HookKind::BeforeEach,
                    Body::future(|| futures::future::pending()),
                    Duration::from_millis(30),
                );
                s.test("guarded", record(&calls, "body"));
            })
            .await
            .unwrap();

        let result = &aggregate.test_results[0];
        assert!(result.is_timeout());
        assert!(result.failure_messages[0].starts_with("Exceeded timeout of 30 ms for a hook."));
        assert!(calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_with_harness_takes_configured_loop_limit() {
        let harness = Harness::new();
        let runner = Runner::new(RunConfig::default().with_timer_loop_limit(5)).with_harness(harness.clone());
        assert_eq!(harness.timers().loop_limit(), 5);

        let aggregate = runner
            .run_with(|s| {
                let harness = harness.clone();
                s.test("runaway interval", Body::sync(move || {
                    let _fake = harness.fake_timers();
                    harness.set_interval(|| {}, 1)?;
                    expect(harness.run_all_timers()).to_be(Err(TimerError::LoopLimit { limit: 5 }));
                    Ok(())
                }));
            })
            .await
            .unwrap();

        assert!(aggregate.success, "{:?}", aggregate.test_results[0].failure_messages);
    }

    #[tokio::test]
    async fn test_default_timeout_comes_from_config() {
        let aggregate = Runner::new(RunConfig::default().with_timeout_ms(30))
            .run_with(|s| {
                s.test("slow", Body::future(|| async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(())
                }));
            })
            .await
            .unwrap();

        assert!(aggregate.test_results[0].failure_messages[0].contains("30 ms"));
    }

    #[tokio::test]
    async fn test_before_all_failure_cascades() {
        let calls = log();
        let aggregate = runner()
            .run_with(|s| {
                s.describe("broken", |s| {
                    s.before_all(failing(&calls, "setup"));
                    s.before_all(record(&calls, "second setup"));
                    s.before_each(record(&calls, "beforeEach"));
                    s.after_all(record(&calls, "teardown"));
                    s.test("a", record(&calls, "a"));
                    s.describe("nested", |s| {
                        s.test("b", record(&calls, "b"));
                        s.test_skip("c", record(&calls, "c"));
                    });
                });
                s.test("after", record(&calls, "after"));
            })
            .await
            .unwrap();

        assert_eq!(*calls.lock(), vec!["setup", "teardown", "after"]);
        assert_eq!(
            statuses(&aggregate),
            vec![
                ("broken a".to_string(), TestStatus::Failed),
                ("broken nested b".to_string(), TestStatus::Failed),
                ("broken nested c".to_string(), TestStatus::Pending),
                ("after".to_string(), TestStatus::Passed),
            ]
        );
        let detail = &aggregate.test_results[0].failure_details[0];
        assert_eq!(detail.kind, FailureKind::Hook(HookKind::BeforeAll));
        assert_eq!(detail.message, "setup failed");
        assert_eq!(aggregate.test_results[0].duration_ms, None);
    }

    #[tokio::test]
    async fn test_before_each_failure_still_runs_after_each() {
        let calls = log();
        let aggregate = runner()
            .run_with(|s| {
                s.before_each(failing(&calls, "first"));
                s.before_each(record(&calls, "second"));
                s.after_each(record(&calls, "cleanup"));
                s.test("guarded", record(&calls, "body"));
            })
            .await
            .unwrap();

        assert_eq!(*calls.lock(), vec!["first", "cleanup"]);
        let result = &aggregate.test_results[0];
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.failure_details[0].kind, FailureKind::Hook(HookKind::BeforeEach));
    }

    #[tokio::test]
    async fn test_after_each_failure_is_appended() {
        let calls = log();
        let aggregate = runner()
            .run_with(|s| {
                s.after_each(failing(&calls, "cleanup"));
                s.test("body fails", failing(&calls, "body"));
            })
            .await
            .unwrap();

        let result = &aggregate.test_results[0];
        assert_eq!(result.failure_messages, vec!["body failed", "cleanup failed"]);
        assert_eq!(result.failure_details[0].kind, FailureKind::Uncaught);
        assert_eq!(result.failure_details[1].kind, FailureKind::Hook(HookKind::AfterEach));
    }

    #[tokio::test]
    async fn test_after_all_failure_is_a_hook_failure() {
        let calls = log();
        let reporter = CollectingReporter::new();
        let aggregate = runner()
            .with_reporter(reporter.clone())
            .run_with(|s| {
                s.describe("suite", |s| {
                    s.after_all(failing(&calls, "teardown"));
                    s.after_all(record(&calls, "second teardown"));
                    s.test("ok", record(&calls, "ok"));
                });
            })
            .await
            .unwrap();

        assert_eq!(*calls.lock(), vec!["ok", "teardown", "second teardown"]);
        assert_eq!(aggregate.num_passed_tests, 1);
        assert!(!aggregate.success);
        assert_eq!(aggregate.hook_failures.len(), 1);
        assert_eq!(aggregate.hook_failures[0].ancestor_titles, vec!["suite".to_string()]);
        assert_eq!(reporter.hook_failures().len(), 1);
    }

    #[tokio::test]
    async fn test_assertions_and_panics_are_classified() {
        let aggregate = runner()
            .run_with(|s| {
                s.test("assertion", Body::sync(|| {
                    expect(2).to_be(3);
                    Ok(())
                }));
                s.test("panic", Body::sync(|| panic!("unexpected")));
            })
            .await
            .unwrap();

        assert_eq!(aggregate.test_results[0].failure_details[0].kind, FailureKind::Assertion);
        assert_eq!(aggregate.test_results[1].failure_details[0].kind, FailureKind::Uncaught);
        assert_eq!(aggregate.test_results[1].failure_messages[0], "unexpected");
    }

    #[tokio::test]
    async fn test_callback_bodies() {
        let aggregate = runner()
            .run_with(|s| {
                s.test("done", Body::callback(|done: Done| done.ok()));
                s.test("done fail", Body::callback(|done: Done| done.fail("nope")));
                s.test("dropped", Body::callback(|done: Done| drop(done)));
            })
            .await
            .unwrap();

        assert_eq!(
            aggregate.test_results.iter().map(|r| r.status).collect::<Vec<_>>(),
            vec![TestStatus::Passed, TestStatus::Failed, TestStatus::Failed]
        );
        assert_eq!(aggregate.test_results[1].failure_messages[0], "nope");
    }

    #[tokio::test]
    async fn test_fake_timers_are_restored_after_each_test() {
        let harness = Harness::new();
        let seen_fake = Arc::new(Mutex::new(Vec::new()));

        let engage = harness.clone();
        let probe = harness.clone();
        let seen = Arc::clone(&seen_fake);
        let aggregate = runner()
            .with_harness(harness.clone())
            .run_with(move |s| {
                s.test("leaks fake timers", Body::sync(move || {
                    engage.use_fake_timers();
                    Ok(())
                }));
                s.test("sees real timers", Body::sync(move || {
                    seen.lock().push(probe.timers().is_fake());
                    Ok(())
                }));
            })
            .await
            .unwrap();

        assert!(aggregate.success);
        assert_eq!(*seen_fake.lock(), vec![false]);
        assert!(!harness.timers().is_fake());
    }

    #[tokio::test]
    async fn test_fake_timers_config_engages_per_test() {
        let harness = Harness::new();
        let probe = harness.clone();
        let aggregate = Runner::new(RunConfig::default().with_fake_timers())
            .with_harness(harness.clone())
            .run_with(move |s| {
                s.test("virtual clock", Body::sync(move || {
                    expect(probe.timers().is_fake()).to_be(true);
                    let fired = Arc::new(Mutex::new(false));
                    let flag = Arc::clone(&fired);
                    probe.set_timeout(move || *flag.lock() = true, 1_000)?;
                    probe.advance_timers_by_time(1_000)?;
                    expect(*fired.lock()).to_be(true);
                    Ok(())
                }));
            })
            .await
            .unwrap();

        assert!(aggregate.success, "{aggregate}");
        assert!(!harness.timers().is_fake());
    }

    #[tokio::test]
    async fn test_mock_hygiene_before_each_test() {
        let harness = Harness::new();
        let counter: crate::mock::Mock<(), u32> = harness.mock_fn();
        counter.mock_return_value(7);

        let first = counter.clone();
        let second = counter.clone();
        let aggregate = Runner::new(RunConfig::default().with_clear_mocks())
            .with_harness(harness)
            .run_with(move |s| {
                s.test("calls once", Body::sync(move || {
                    first.call(());
                    expect(first.call_count()).to_be(1);
                    Ok(())
                }));
                s.test("starts clean", Body::sync(move || {
                    expect(second.call_count()).to_be(0);
                    expect(second.call(())).to_be(7);
                    Ok(())
                }));
            })
            .await
            .unwrap();

        assert!(aggregate.success, "{aggregate}");
    }

    #[tokio::test]
    async fn test_name_pattern_filters_tests() {
        let calls = log();
        let aggregate = Runner::new(RunConfig::default().with_test_name_pattern("parser"))
            .run_with(|s| {
                s.describe("parser", |s| {
                    s.test("handles input", record(&calls, "parser"));
                });
                s.test("lexer works", record(&calls, "lexer"));
            })
            .await
            .unwrap();

        assert_eq!(*calls.lock(), vec!["parser"]);
        assert_eq!(aggregate.num_pending_tests, 1);
    }

    #[tokio::test]
    async fn test_registration_errors_are_fatal() {
        let err = runner()
            .run_with(|s| {
                s.describe("bad", |_| panic!("boom"));
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RunnerError::Registration(RegistrationError::DescribePanicked { .. })
        ));
    }

    #[tokio::test]
    async fn test_reporter_sees_results_in_order() {
        let reporter = CollectingReporter::new();
        let calls = log();
        let aggregate = runner()
            .with_reporter(reporter.clone())
            .run_with(|s| {
                s.test("first", record(&calls, "first"));
                s.describe("group", |s| {
                    s.test("second", record(&calls, "second"));
                });
            })
            .await
            .unwrap();

        let names: Vec<_> = reporter.results().into_iter().map(|r| r.full_name).collect();
        assert_eq!(names, vec!["first", "group second"]);
        assert_eq!(reporter.run_ids(), vec![aggregate.run_id.clone()]);
        assert_eq!(reporter.configs(), vec![RunConfig::default()]);
        assert_eq!(reporter.last_aggregate().unwrap().num_total_tests, 2);
    }
}
