//! Suite tree and registration
//!
//! Registration calls go through an explicit [`SuiteBuilder`]; the finished
//! [`Suite`] is immutable and handed to the runner.

mod body;
mod builder;
mod tree;

pub use body::{Body, BodyResult, Done};
pub use builder::{register, SuiteBuilder, TestRef};
pub use tree::{Hook, Node, Suite, SuiteMode, Test, TestMode};
