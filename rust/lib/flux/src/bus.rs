use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tracing::trace;

use crate::trie::TopicTrie;
use crate::value::{EventPayload, SubscriptionId};

/// Callback invoked for every event whose topic matches the subscription.
pub type Listener = Arc<dyn Fn(&str, &EventPayload) + Send + Sync>;

#[derive(Clone)]
struct ListenerEntry {
    id: SubscriptionId,
    listener: Listener,
}

struct BusInner {
    listeners: TopicTrie<ListenerEntry>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

/// Publish/subscribe bus owned by one planning session.
///
/// - `publish(topic, payload)` delivers synchronously to every matching
///   listener, in registration order per pattern.
/// - `subscribe(pattern, listener)` returns a [`Subscription`] guard; the
///   listener stays registered until the guard is dropped.
/// - `close()` tears the bus down: listeners are dropped and later
///   publishes are ignored.
///
/// There is no buffering or replay. An event published before a listener
/// subscribes is never seen by it.
///
/// Cloning the bus is cheap and yields a handle to the same listener set.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                listeners: TopicTrie::new(),
                next_id: AtomicU64::new(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Publish a typed payload. Returns the number of listeners reached.
    pub fn publish<T: Any + Send + Sync>(&self, topic: &str, payload: T) -> usize {
        self.publish_payload(topic, EventPayload::new(payload))
    }

    /// Publish a pre-built payload. Returns the number of listeners reached.
    ///
    /// Listeners run after the trie lock is released, so a listener may
    /// itself publish or subscribe.
    pub fn publish_payload(&self, topic: &str, payload: EventPayload) -> usize {
        if self.is_closed() {
            trace!(topic, "bus closed, event dropped");
            return 0;
        }
        let entries = self.inner.listeners.match_topic(topic);
        trace!(topic, listeners = entries.len(), "publish");
        for entry in &entries {
            (entry.listener)(topic, &payload);
        }
        entries.len()
    }

    /// Register a listener for a topic pattern (`+` and `#` wildcards).
    pub fn subscribe<F>(&self, pattern: &str, listener: F) -> Subscription
    where
        F: Fn(&str, &EventPayload) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        if !self.is_closed() {
            self.inner.listeners.insert(
                pattern,
                ListenerEntry {
                    id,
                    listener: Arc::new(listener),
                },
            );
        }
        Subscription {
            bus: Arc::downgrade(&self.inner),
            pattern: pattern.to_string(),
            id,
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Drop every listener and refuse further publishes.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        self.inner.listeners.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII registration returned by [`EventBus::subscribe`].
///
/// Dropping it unsubscribes. It holds only a weak reference, so an
/// outstanding subscription never keeps a torn-down bus alive.
#[must_use = "dropping a Subscription unsubscribes its listener immediately"]
pub struct Subscription {
    bus: Weak<BusInner>,
    pattern: String,
    id: SubscriptionId,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            let id = self.id;
            inner.listeners.remove(&self.pattern, |e| e.id == id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("pattern", &self.pattern)
            .field("id", &self.id)
            .finish()
    }
}
