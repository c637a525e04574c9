use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// A type-erased, reference-counted event payload.
///
/// Every listener matching a topic receives a clone of the same `Arc`, so
/// fan-out to many collaretto tables copies nothing.
#[derive(Clone)]
pub struct EventPayload {
    inner: Arc<dyn Any + Send + Sync>,
}

impl EventPayload {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }

    /// Returns `None` if the payload is not a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    pub fn type_id(&self) -> TypeId {
        (*self.inner).type_id()
    }
}

impl fmt::Debug for EventPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventPayload")
            .field("type_id", &(*self.inner).type_id())
            .finish()
    }
}

/// Handle identifying one listener registration on an `EventBus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);
