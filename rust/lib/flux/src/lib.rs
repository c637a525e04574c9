//! Flux: the planning session's event plumbing.
//!
//! Three pieces, all owned by a session and torn down with it:
//!
//! - [`EventBus`]: topic-addressed publish/subscribe with RAII
//!   subscriptions (`sync/layers/{bagno}`, `sync/pieces/{bagno}`, ...)
//! - [`TopicTrie`]: MQTT-style pattern routing behind the bus
//! - [`Debouncer`]: keyed trailing-edge debounce with explicit cancellation
//!
//! # Topic Patterns
//!
//! - Exact: `sync/layers/B12`
//! - Single-level: `sync/+/B12` matches both event kinds for one bagno
//! - Multi-level: `sync/#` matches every sync event
//!
//! # Example
//!
//! ```ignore
//! use cutplan_flux::{Debouncer, EventBus};
//!
//! let bus = EventBus::new();
//! let _sub = bus.subscribe("sync/layers/+", |topic, payload| {
//!     println!("{} changed", topic);
//! });
//!
//! let debounce = Debouncer::new(Duration::from_millis(300));
//! let b = bus.clone();
//! debounce.call("row-1", move || {
//!     b.publish("sync/layers/B12", ());
//! });
//! ```

pub mod bus;
pub mod debounce;
pub mod trie;
pub mod value;

pub use bus::{EventBus, Listener, Subscription};
pub use debounce::Debouncer;
pub use trie::TopicTrie;
pub use value::{EventPayload, SubscriptionId};
