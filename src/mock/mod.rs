//! Mock engine
//!
//! Call-tracking mock functions, swappable method slots and spies.
//!
//! ## Example
//!
//! ```rust
//! use harness_rt::mock::{Method, MockRegistry};
//!
//! let registry = MockRegistry::new();
//! let greet = Method::new("greet", |name: String| format!("hello {name}"));
//!
//! let spy = registry.spy_on(&greet).unwrap();
//! spy.mock_return_value_once("hi".to_string());
//!
//! assert_eq!(greet.call("ann".to_string()), "hi");
//! assert_eq!(greet.call("bob".to_string()), "hello bob");
//! assert_eq!(spy.call_count(), 2);
//!
//! spy.mock_restore();
//! ```

mod method;
mod mock_fn;
mod registry;

pub use method::Method;
pub use mock_fn::{Implementation, Mock, MockResult, Promise};
pub use registry::MockRegistry;
