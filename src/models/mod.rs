//! Data models for test results
//!
//! This module contains the result records handed to reporters.

mod test_result;

pub use test_result::{
    generate_run_id, hook_timeout_message, timeout_message, AggregatedResult, AssertionResult, FailureDetail,
    FailureKind, HookFailure, HookKind, TestStatus,
};
