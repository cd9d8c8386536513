//! Per-key debouncing of delayed actions.
//!
//! Each key has at most one pending action. Scheduling again replaces it, so
//! a burst of signals collapses into the last one, which fires once the key
//! has been quiet for the full delay.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

struct Pending {
    id: u64,
    handle: JoinHandle<()>,
}

/// Coalesces repeated schedules per key into one delayed invocation.
pub struct DebounceScheduler<K> {
    pending: Arc<Mutex<HashMap<K, Pending>>>,
    next_id: Arc<AtomicU64>,
}

impl<K> Clone for DebounceScheduler<K> {
    fn clone(&self) -> Self {
        Self {
            pending: Arc::clone(&self.pending),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<K> Default for DebounceScheduler<K> {
    fn default() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<K> DebounceScheduler<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` after `delay`, replacing any pending action for `key`.
    ///
    /// A zero delay still runs on a later tick, never inline. The action is
    /// a lazy future, so whatever it reads is read when it fires.
    pub fn schedule<F>(&self, key: K, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let pending = Arc::clone(&self.pending);
        let task_key = key.clone();

        // Held across spawn so the task cannot look itself up before insertion.
        let mut map = self.pending.lock();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut map = pending.lock();
                match map.get(&task_key) {
                    Some(p) if p.id == id => {
                        map.remove(&task_key);
                    }
                    _ => return,
                }
            }
            action.await;
        });
        if let Some(previous) = map.insert(key, Pending { id, handle }) {
            previous.handle.abort();
        }
    }

    /// Cancel the pending action for `key`. Safe when nothing is pending.
    ///
    /// An action that has already fired is not interrupted.
    pub fn cancel(&self, key: &K) -> bool {
        match self.pending.lock().remove(key) {
            Some(p) => {
                p.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        for (_, p) in self.pending.lock().drain() {
            p.handle.abort();
        }
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.lock().contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}
