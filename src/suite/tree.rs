//! Suite tree
//!
//! Immutable tree produced by [`SuiteBuilder::build`](super::SuiteBuilder::build).
//! Children keep their registration order, tests and suites interleaved.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::body::Body;
use crate::models::HookKind;

/// Selection mode of a suite
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuiteMode {
    #[default]
    Normal,
    Only,
    Skip,
}

/// Selection mode of a test
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestMode {
    #[default]
    Normal,
    Only,
    Skip,
    Todo,
}

/// A lifecycle hook
#[derive(Clone, Debug)]
pub struct Hook {
    pub(crate) body: Body,
    pub(crate) timeout: Option<Duration>,
}

impl Hook {
    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// A registered test
#[derive(Clone, Debug)]
pub struct Test {
    pub(crate) name: String,
    /// None for todo tests
    pub(crate) body: Option<Body>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) mode: TestMode,
}

impl Test {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn mode(&self) -> TestMode {
        self.mode
    }
}

/// A child of a suite
#[derive(Clone, Debug)]
pub enum Node {
    Suite(Suite),
    Test(Test),
}

/// A named group of tests, nested suites and hooks
#[derive(Clone, Debug, Default)]
pub struct Suite {
    pub(crate) name: String,
    pub(crate) mode: SuiteMode,
    pub(crate) children: Vec<Node>,
    pub(crate) before_all: Vec<Hook>,
    pub(crate) before_each: Vec<Hook>,
    pub(crate) after_each: Vec<Hook>,
    pub(crate) after_all: Vec<Hook>,
}

impl Suite {
    pub(crate) fn new(name: impl Into<String>, mode: SuiteMode) -> Self {
        Self {
            name: name.into(),
            mode,
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> SuiteMode {
        self.mode
    }

    /// Children in registration order
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Direct child suites in registration order
    pub fn suites(&self) -> impl Iterator<Item = &Suite> {
        self.children.iter().filter_map(|node| match node {
            Node::Suite(suite) => Some(suite),
            Node::Test(_) => None,
        })
    }

    /// Direct tests in registration order
    pub fn tests(&self) -> impl Iterator<Item = &Test> {
        self.children.iter().filter_map(|node| match node {
            Node::Test(test) => Some(test),
            Node::Suite(_) => None,
        })
    }

    /// Hooks of one kind in registration order
    pub fn hooks(&self, kind: HookKind) -> &[Hook] {
        match kind {
            HookKind::BeforeAll => &self.before_all,
            HookKind::BeforeEach => &self.before_each,
            HookKind::AfterEach => &self.after_each,
            HookKind::AfterAll => &self.after_all,
        }
    }

    pub(crate) fn hooks_mut(&mut self, kind: HookKind) -> &mut Vec<Hook> {
        match kind {
            HookKind::BeforeAll => &mut self.before_all,
            HookKind::BeforeEach => &mut self.before_each,
            HookKind::AfterEach => &mut self.after_each,
            HookKind::AfterAll => &mut self.after_all,
        }
    }

    /// Number of tests in this suite and all descendants
    pub fn test_count(&self) -> usize {
        self.children
            .iter()
            .map(|node| match node {
                Node::Suite(suite) => suite.test_count(),
                Node::Test(_) => 1,
            })
            .sum()
    }

    /// True if this suite or anything below it is marked only
    pub fn has_only(&self) -> bool {
        self.mode == SuiteMode::Only
            || self.children.iter().any(|node| match node {
                Node::Suite(suite) => suite.has_only(),
                Node::Test(test) => test.mode == TestMode::Only,
            })
    }
}
