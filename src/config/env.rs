//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

use super::file::ConfigFile;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "HARNESS_RT";

/// Configuration read from environment variables
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvConfig {
    /// From HARNESS_RT_TEST_TIMEOUT
    pub test_timeout_ms: Option<u64>,
    /// From HARNESS_RT_CLEAR_MOCKS
    pub clear_mocks: Option<bool>,
    /// From HARNESS_RT_RESET_MOCKS
    pub reset_mocks: Option<bool>,
    /// From HARNESS_RT_RESTORE_MOCKS
    pub restore_mocks: Option<bool>,
    /// From HARNESS_RT_FAKE_TIMERS
    pub fake_timers: Option<bool>,
    /// From HARNESS_RT_TEST_NAME_PATTERN
    pub test_name_pattern: Option<String>,
    /// From HARNESS_RT_TIMER_LOOP_LIMIT
    pub timer_loop_limit: Option<usize>,
    /// From HARNESS_RT_CONFIG
    pub config_file: Option<String>,
    /// From HARNESS_RT_LOG_LEVEL
    pub log_level: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            test_timeout_ms: get_env_parse("TEST_TIMEOUT"),
            clear_mocks: get_env_bool("CLEAR_MOCKS"),
            reset_mocks: get_env_bool("RESET_MOCKS"),
            restore_mocks: get_env_bool("RESTORE_MOCKS"),
            fake_timers: get_env_bool("FAKE_TIMERS"),
            test_name_pattern: get_env("TEST_NAME_PATTERN"),
            timer_loop_limit: get_env_parse("TIMER_LOOP_LIMIT"),
            config_file: get_env("CONFIG"),
            log_level: get_env("LOG_LEVEL"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        *self != Self::default()
    }

    /// Overwrite file settings with whatever the environment sets
    pub fn apply_to(&self, config: &mut ConfigFile) {
        let run = &mut config.run;
        if let Some(ms) = self.test_timeout_ms {
            run.test_timeout_ms = ms;
        }
        if let Some(v) = self.clear_mocks {
            run.clear_mocks = v;
        }
        if let Some(v) = self.reset_mocks {
            run.reset_mocks = v;
        }
        if let Some(v) = self.restore_mocks {
            run.restore_mocks = v;
        }
        if let Some(v) = self.fake_timers {
            run.fake_timers = v;
        }
        if let Some(pattern) = &self.test_name_pattern {
            run.test_name_pattern = Some(pattern.clone());
        }
        if let Some(limit) = self.timer_loop_limit {
            run.timer_loop_limit = limit;
        }
        if let Some(level) = &self.log_level {
            config.log_level = Some(level.clone());
        }
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Builder for setting environment variables in tests
#[derive(Default)]
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

impl EnvBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn var(mut self, name: &str, value: impl ToString) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_{name}"), value.to_string()));
        self
    }

    pub fn test_timeout(self, ms: u64) -> Self {
        self.var("TEST_TIMEOUT", ms)
    }

    pub fn clear_mocks(self, on: bool) -> Self {
        self.var("CLEAR_MOCKS", on)
    }

    pub fn reset_mocks(self, on: bool) -> Self {
        self.var("RESET_MOCKS", on)
    }

    pub fn restore_mocks(self, on: bool) -> Self {
        self.var("RESTORE_MOCKS", on)
    }

    pub fn fake_timers(self, on: bool) -> Self {
        self.var("FAKE_TIMERS", on)
    }

    pub fn test_name_pattern(self, pattern: impl Into<String>) -> Self {
        self.var("TEST_NAME_PATTERN", pattern.into())
    }

    pub fn timer_loop_limit(self, limit: usize) -> Self {
        self.var("TIMER_LOOP_LIMIT", limit)
    }

    pub fn config_file(self, path: impl Into<String>) -> Self {
        self.var("CONFIG", path.into())
    }

    pub fn log_level(self, level: impl Into<String>) -> Self {
        self.var("LOG_LEVEL", level.into())
    }

    /// Apply environment variables
    pub fn apply(self) {
        for (key, value) in self.vars {
            env::set_var(key, value);
        }
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        self.apply();

        EnvGuard { previous }
    }
}

/// Guard that restores environment variables on drop
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}
