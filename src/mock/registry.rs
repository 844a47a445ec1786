//! Mock registry
//!
//! Tracks installed spies by method slot, plus registry-created mocks, so
//! bulk clear/reset/restore can reach every one of them.

use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::method::Method;
use super::mock_fn::{Implementation, Mock, WeakMock};
use crate::error::MockError;

/// Type-erased view of a mock for bulk operations
trait TrackedMock: Send + Sync {
    fn clear(&self);
    fn reset(&self);
    fn restore(&self);
    fn as_any(&self) -> &dyn Any;
}

impl<A, R> TrackedMock for Mock<A, R>
where
    A: Clone + Send + 'static,
    R: Clone + Send + 'static,
{
    fn clear(&self) {
        self.mock_clear();
    }

    fn reset(&self) {
        self.mock_reset();
    }

    fn restore(&self) {
        self.mock_restore();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<A, R> TrackedMock for WeakMock<A, R>
where
    A: Clone + Send + 'static,
    R: Clone + Send + 'static,
{
    fn clear(&self) {
        if let Some(mock) = self.upgrade() {
            mock.mock_clear();
        }
    }

    fn reset(&self) {
        if let Some(mock) = self.upgrade() {
            mock.mock_reset();
        }
    }

    fn restore(&self) {
        if let Some(mock) = self.upgrade() {
            mock.mock_restore();
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct SpyEntry {
    method: String,
    spy: Box<dyn TrackedMock>,
}

#[derive(Default)]
struct RegistryState {
    spies: HashMap<usize, SpyEntry>,
    mocks: Vec<Box<dyn TrackedMock>>,
}

/// Owner of spies and tracked mocks
#[derive(Clone, Default)]
pub struct MockRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that bulk operations will reach
    pub fn mock_fn<A, R>(&self) -> Mock<A, R>
    where
        A: Clone + Send + 'static,
        R: Clone + Send + 'static,
    {
        self.track(Mock::new())
    }

    /// Create a tracked mock with a persistent implementation
    pub fn mock_fn_with<A, R, F>(&self, f: F) -> Mock<A, R>
    where
        A: Clone + Send + 'static,
        R: Clone + Send + 'static,
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        self.track(Mock::with_implementation(f))
    }

    fn track<A, R>(&self, mock: Mock<A, R>) -> Mock<A, R>
    where
        A: Clone + Send + 'static,
        R: Clone + Send + 'static,
    {
        self.state.lock().mocks.push(Box::new(mock.downgrade()));
        mock
    }

    /// Replace the method's function with a spy that calls through to it
    ///
    /// Spying on a slot that already has an active spy returns that spy.
    pub fn spy_on<A, R>(&self, method: &Method<A, R>) -> Result<Mock<A, R>, MockError>
    where
        A: Clone + Send + 'static,
        R: Clone + Default + Send + 'static,
    {
        let key = method.key();
        let mut state = self.state.lock();

        if let Some(entry) = state.spies.get(&key) {
            return entry
                .spy
                .as_any()
                .downcast_ref::<Mock<A, R>>()
                .cloned()
                .ok_or_else(|| MockError::SignatureMismatch {
                    method: entry.method.clone(),
                });
        }

        let original = method.current();
        let spy = Mock::from_implementation(Arc::clone(&original));
        spy.mock_name(method.name());

        let forward: Implementation<A, R> = {
            let spy = spy.clone();
            let receiver = method.receiver().clone();
            Arc::new(move |args| spy.call_with(receiver.clone(), args))
        };
        method.replace(forward);

        let restorer = {
            let slot = method.downgrade();
            let registry = Arc::downgrade(&self.state);
            let name = method.name().to_string();
            Arc::new(move || {
                slot.replace(Arc::clone(&original));
                if let Some(registry) = registry.upgrade() {
                    registry.lock().spies.remove(&key);
                }
                debug!("restored spied method {}", name);
            })
        };
        spy.set_restorer(restorer);

        state.spies.insert(
            key,
            SpyEntry {
                method: method.name().to_string(),
                spy: Box::new(spy.clone()),
            },
        );
        debug!("spying on method {}", method.name());
        Ok(spy)
    }

    /// True if the slot currently has an active spy
    pub fn is_spied<A, R>(&self, method: &Method<A, R>) -> bool {
        self.state.lock().spies.contains_key(&method.key())
    }

    pub fn spy_count(&self) -> usize {
        self.state.lock().spies.len()
    }

    /// Clear calls of every tracked mock and spy
    pub fn clear_all_mocks(&self) {
        self.for_each(|mock| mock.clear());
    }

    /// Reset every tracked mock and spy
    pub fn reset_all_mocks(&self) {
        self.for_each(|mock| mock.reset());
    }

    /// Restore every active spy; the spy map is empty afterwards
    pub fn restore_all_mocks(&self) {
        // Restorers remove their own entry, so the lock must be free.
        let spies: Vec<SpyEntry> = self.state.lock().spies.drain().map(|(_, e)| e).collect();
        debug!("restoring {} spies", spies.len());
        for entry in spies {
            entry.spy.restore();
        }
    }

    fn for_each(&self, f: impl Fn(&dyn TrackedMock)) {
        let state = self.state.lock();
        for entry in state.spies.values() {
            f(entry.spy.as_ref());
        }
        for mock in &state.mocks {
            f(mock.as_ref());
        }
    }
}
