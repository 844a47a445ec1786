//! Panic payload helpers

use std::any::Any;

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(err) = payload.downcast_ref::<crate::expect::AssertionError>() {
        err.to_string()
    } else {
        "Box<dyn Any>".to_string()
    }
}
