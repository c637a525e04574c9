use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

struct Pending {
    ticket: u64,
    cancel: CancellationToken,
}

/// Keyed trailing-edge debouncer.
///
/// `call(key, action)` runs `action` once `delay` has elapsed without
/// another `call` for the same key. A new call cancels the previous timer
/// for that key (last write wins); calls for different keys never affect
/// each other.
///
/// Timers run as tokio tasks. Outside a tokio runtime there is nothing to
/// schedule on, so the action runs inline.
///
/// Dropping the debouncer cancels every pending action.
pub struct Debouncer<K> {
    delay: Duration,
    pending: Arc<Mutex<HashMap<K, Pending>>>,
    next_ticket: AtomicU64,
    shutdown: CancellationToken,
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_ticket: AtomicU64::new(1),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `action` for `key`, replacing any pending action for it.
    pub fn call<F>(&self, key: K, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(?key, "no runtime, running debounced action inline");
            self.cancel(&key);
            action();
            return;
        };

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let cancel = self.shutdown.child_token();
        {
            let mut pending = self.pending.lock().unwrap();
            let previous = pending.insert(
                key.clone(),
                Pending {
                    ticket,
                    cancel: cancel.clone(),
                },
            );
            if let Some(previous) = previous {
                trace!(?key, "restarting debounce timer");
                previous.cancel.cancel();
            }
        }

        let pending = Arc::clone(&self.pending);
        let delay = self.delay;
        handle.spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let due = {
                        let mut pending = pending.lock().unwrap();
                        match pending.get(&key) {
                            Some(p) if p.ticket == ticket => {
                                pending.remove(&key);
                                true
                            }
                            _ => false,
                        }
                    };
                    if due {
                        action();
                    }
                }
            }
        });
    }

    /// Cancel the pending action for `key`. Returns whether one existed.
    pub fn cancel(&self, key: &K) -> bool {
        match self.pending.lock().unwrap().remove(key) {
            Some(p) => {
                p.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every pending action. The debouncer stays usable.
    pub fn cancel_all(&self) {
        let drained: Vec<Pending> = self.pending.lock().unwrap().drain().map(|(_, p)| p).collect();
        for p in drained {
            p.cancel.cancel();
        }
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.lock().unwrap().contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

impl<K> Drop for Debouncer<K> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
