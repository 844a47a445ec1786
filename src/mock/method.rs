//! Replaceable method slots
//!
//! A [`Method`] is the Rust stand-in for an object property holding a
//! function: code under test calls through the slot, and a spy can swap the
//! function out and later put the exact original back.

use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Weak};

use super::mock_fn::Implementation;

/// A named, shared, swappable function `Fn(A) -> R`
pub struct Method<A, R> {
    name: String,
    receiver: Value,
    cell: Arc<RwLock<Implementation<A, R>>>,
}

impl<A, R> Method<A, R> {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        Self::bound(name, Value::Null, f)
    }

    /// Slot whose calls record `receiver` as `this` when spied on
    pub fn bound<F>(name: impl Into<String>, receiver: Value, f: F) -> Self
    where
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            receiver,
            cell: Arc::new(RwLock::new(Arc::new(f))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn receiver(&self) -> &Value {
        &self.receiver
    }

    /// Call whatever function is currently installed
    pub fn call(&self, args: A) -> R {
        let f = self.current();
        f(args)
    }

    /// The installed function; compare with `Arc::ptr_eq` for identity
    pub fn current(&self) -> Implementation<A, R> {
        Arc::clone(&self.cell.read())
    }

    /// Install `f`, returning the previous function
    pub(crate) fn replace(&self, f: Implementation<A, R>) -> Implementation<A, R> {
        std::mem::replace(&mut *self.cell.write(), f)
    }

    /// Identity of the slot, shared by all clones
    pub(crate) fn key(&self) -> usize {
        Arc::as_ptr(&self.cell) as *const () as usize
    }

    pub(crate) fn downgrade(&self) -> WeakMethod<A, R> {
        WeakMethod {
            cell: Arc::downgrade(&self.cell),
        }
    }
}

impl<A, R> Clone for Method<A, R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            receiver: self.receiver.clone(),
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<A, R> fmt::Debug for Method<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("receiver", &self.receiver)
            .finish_non_exhaustive()
    }
}

/// Handle used by spies so a slot and its spy do not keep each other alive
pub(crate) struct WeakMethod<A, R> {
    cell: Weak<RwLock<Implementation<A, R>>>,
}

impl<A, R> WeakMethod<A, R> {
    /// Install `f` if the slot still exists
    pub(crate) fn replace(&self, f: Implementation<A, R>) {
        if let Some(cell) = self.cell.upgrade() {
            *cell.write() = f;
        }
    }
}
