//! Configuration module
//!
//! Run options, their file format and environment overrides.

mod env;
mod file;

pub use env::{EnvBuilder, EnvConfig, EnvGuard, ENV_PREFIX};
pub use file::ConfigFile;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::timers::DEFAULT_LOOP_LIMIT;

/// Options that shape a run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Default timeout for tests and hooks in milliseconds
    pub test_timeout_ms: u64,

    /// Clear every mock's calls before each test
    pub clear_mocks: bool,

    /// Reset every mock before each test
    pub reset_mocks: bool,

    /// Restore every spy before each test
    pub restore_mocks: bool,

    /// Engage fake timers before each test
    pub fake_timers: bool,

    /// Only run tests whose full name contains this
    pub test_name_pattern: Option<String>,

    /// Cap on timers fired by one virtual clock call
    pub timer_loop_limit: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            test_timeout_ms: 5000,
            clear_mocks: false,
            reset_mocks: false,
            restore_mocks: false,
            fake_timers: false,
            test_name_pattern: None,
            timer_loop_limit: DEFAULT_LOOP_LIMIT,
        }
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn test_timeout(&self) -> Duration {
        Duration::from_millis(self.test_timeout_ms)
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.test_timeout_ms = ms;
        self
    }

    pub fn with_clear_mocks(mut self) -> Self {
        self.clear_mocks = true;
        self
    }

    pub fn with_reset_mocks(mut self) -> Self {
        self.reset_mocks = true;
        self
    }

    pub fn with_restore_mocks(mut self) -> Self {
        self.restore_mocks = true;
        self
    }

    pub fn with_fake_timers(mut self) -> Self {
        self.fake_timers = true;
        self
    }

    pub fn with_test_name_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.test_name_pattern = Some(pattern.into());
        self
    }

    pub fn with_timer_loop_limit(mut self, limit: usize) -> Self {
        self.timer_loop_limit = limit;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.test_timeout_ms == 0 {
            anyhow::bail!("test_timeout_ms must be greater than 0");
        }
        if self.timer_loop_limit == 0 {
            anyhow::bail!("timer_loop_limit must be greater than 0");
        }
        if self
            .test_name_pattern
            .as_deref()
            .is_some_and(|p| p.trim().is_empty())
        {
            anyhow::bail!("test_name_pattern must not be blank");
        }
        Ok(())
    }
}
