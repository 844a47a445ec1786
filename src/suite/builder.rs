//! Registration surface
//!
//! `describe` runs its closure immediately against the builder, so the tree
//! shape is fixed by the order of registration calls. Tests and hooks are
//! stored without running their bodies.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use tracing::debug;

use super::body::Body;
use super::tree::{Hook, Node, Suite, SuiteMode, Test, TestMode};
use crate::error::RegistrationError;
use crate::models::HookKind;
use crate::utils::panic_message;

/// Collects registrations into a [`Suite`] tree
pub struct SuiteBuilder {
    root: Suite,
    /// Open describe blocks, innermost last
    stack: Vec<Suite>,
    errors: Vec<RegistrationError>,
}

/// Handle to the test that was just registered
pub struct TestRef<'a> {
    builder: &'a mut SuiteBuilder,
}

impl TestRef<'_> {
    /// Override the default timeout for this test
    pub fn timeout(self, timeout: Duration) -> Self {
        if let Some(Node::Test(test)) = self.builder.current().children.last_mut() {
            test.timeout = Some(timeout);
        }
        self
    }
}

impl SuiteBuilder {
    pub fn new() -> Self {
        Self {
            root: Suite::new("", SuiteMode::Normal),
            stack: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn current(&mut self) -> &mut Suite {
        self.stack.last_mut().unwrap_or(&mut self.root)
    }

    fn path(&self) -> String {
        self.stack
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(" > ")
    }

    fn check_name(&mut self, kind: &'static str, name: &str) {
        if name.trim().is_empty() {
            let path = self.path();
            self.errors.push(RegistrationError::EmptyName { kind, path });
        }
    }

    fn push_suite<F>(&mut self, name: String, mode: SuiteMode, f: F) -> &mut Self
    where
        F: FnOnce(&mut SuiteBuilder),
    {
        self.check_name("describe", &name);
        self.stack.push(Suite::new(name, mode));
        let depth = self.stack.len();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(self)));

        self.stack.truncate(depth);
        let path = self.path();
        let Some(suite) = self.stack.pop() else {
            return self;
        };

        match outcome {
            Ok(()) => {
                debug!("registered suite \"{}\" ({} children)", path, suite.children.len());
                self.current().children.push(Node::Suite(suite));
            }
            Err(payload) => {
                self.errors.push(RegistrationError::DescribePanicked {
                    path,
                    message: panic_message(payload.as_ref()),
                });
            }
        }
        self
    }

    /// Register a suite and collect its contents right away
    pub fn describe<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: FnOnce(&mut SuiteBuilder),
    {
        self.push_suite(name.into(), SuiteMode::Normal, f)
    }

    /// Register a focused suite
    pub fn describe_only<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: FnOnce(&mut SuiteBuilder),
    {
        self.push_suite(name.into(), SuiteMode::Only, f)
    }

    /// Register a skipped suite; its contents are still collected
    pub fn describe_skip<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: FnOnce(&mut SuiteBuilder),
    {
        self.push_suite(name.into(), SuiteMode::Skip, f)
    }

    fn push_test(&mut self, name: String, body: Option<Body>, mode: TestMode) -> TestRef<'_> {
        self.check_name("test", &name);
        self.current().children.push(Node::Test(Test {
            name,
            body,
            timeout: None,
            mode,
        }));
        TestRef { builder: self }
    }

    pub fn test(&mut self, name: impl Into<String>, body: Body) -> TestRef<'_> {
        self.push_test(name.into(), Some(body), TestMode::Normal)
    }

    pub fn test_only(&mut self, name: impl Into<String>, body: Body) -> TestRef<'_> {
        self.push_test(name.into(), Some(body), TestMode::Only)
    }

    pub fn test_skip(&mut self, name: impl Into<String>, body: Body) -> TestRef<'_> {
        self.push_test(name.into(), Some(body), TestMode::Skip)
    }

    pub fn it(&mut self, name: impl Into<String>, body: Body) -> TestRef<'_> {
        self.test(name, body)
    }

    pub fn it_only(&mut self, name: impl Into<String>, body: Body) -> TestRef<'_> {
        self.test_only(name, body)
    }

    pub fn it_skip(&mut self, name: impl Into<String>, body: Body) -> TestRef<'_> {
        self.test_skip(name, body)
    }

    /// Register a placeholder that is reported as todo
    pub fn todo(&mut self, name: impl Into<String>) -> TestRef<'_> {
        self.push_test(name.into(), None, TestMode::Todo)
    }

    /// Register one test per case
    ///
    /// In `template`, `%#` becomes the case index and the first `%s`, `%d`,
    /// `%i` or `%p` becomes the case's `Debug` rendering.
    pub fn test_each<T, I, F>(&mut self, template: &str, cases: I, make_body: F) -> &mut Self
    where
        T: fmt::Debug,
        I: IntoIterator<Item = T>,
        F: Fn(T) -> Body,
    {
        for (index, case) in cases.into_iter().enumerate() {
            let name = each_title(template, index, &case);
            let body = make_body(case);
            self.test(name, body);
        }
        self
    }

    fn push_hook(&mut self, kind: HookKind, body: Body, timeout: Option<Duration>) -> &mut Self {
        self.current().hooks_mut(kind).push(Hook { body, timeout });
        self
    }

    pub fn before_all(&mut self, body: Body) -> &mut Self {
        self.push_hook(HookKind::BeforeAll, body, None)
    }

    pub fn before_each(&mut self, body: Body) -> &mut Self {
        self.push_hook(HookKind::BeforeEach, body, None)
    }

    pub fn after_each(&mut self, body: Body) -> &mut Self {
        self.push_hook(HookKind::AfterEach, body, None)
    }

    pub fn after_all(&mut self, body: Body) -> &mut Self {
        self.push_hook(HookKind::AfterAll, body, None)
    }

    /// Register a hook of any kind with its own timeout
    pub fn hook_with_timeout(&mut self, kind: HookKind, body: Body, timeout: Duration) -> &mut Self {
        self.push_hook(kind, body, Some(timeout))
    }

    /// Finalize the tree; the first registration error wins
    pub fn build(mut self) -> Result<Suite, RegistrationError> {
        if let Some(err) = self.errors.drain(..).next() {
            return Err(err);
        }
        Ok(self.root)
    }
}

impl Default for SuiteBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a tree from a single registration closure
pub fn register<F>(f: F) -> Result<Suite, RegistrationError>
where
    F: FnOnce(&mut SuiteBuilder),
{
    let mut builder = SuiteBuilder::new();
    f(&mut builder);
    builder.build()
}

fn each_title(template: &str, index: usize, case: &dyn fmt::Debug) -> String {
    let mut title = template.replace("%#", &index.to_string());
    let placeholder = ["%s", "%d", "%i", "%p"]
        .iter()
        .filter_map(|p| title.find(p))
        .min();
    if let Some(pos) = placeholder {
        title.replace_range(pos..pos + 2, &format!("{case:?}"));
    }
    title
}
