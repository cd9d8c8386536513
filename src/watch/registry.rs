//! The set of watched repositories and the resolve-and-maybe-restart routine.
//!
//! ```text
//! change signal (push, poll tick, file event)
//!        ↓
//! DebounceScheduler (per key)
//!        ↓
//! HeadSource::read_head()  -> BranchRef
//!        ↓
//! LabelBuilder             -> Label
//!        ↓
//! last_applied_label gate  (compare + record, no await in between)
//!        ↓
//! TerminalRestarter::restart()
//! ```

use crate::branch::{Label, LabelBuilder};
use crate::config::{ConfigSource, Settings};
use crate::terminal::{RestartOptions, TerminalRestarter};
use crate::watch::debounce::DebounceScheduler;
use crate::watch::source::{ChangeStream, HeadSource, RepoKey};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Poll period for sources without push notifications.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Per-repository watch state.
pub struct WatchEntry {
    source: Arc<dyn HeadSource>,
    last_applied_label: Option<Label>,
    poll_handle: Option<JoinHandle<()>>,
    subscription: Option<JoinHandle<()>>,
}

impl WatchEntry {
    fn new(source: Arc<dyn HeadSource>) -> Self {
        Self {
            source,
            last_applied_label: None,
            poll_handle: None,
            subscription: None,
        }
    }

    fn release(self) {
        if let Some(handle) = self.poll_handle {
            handle.abort();
        }
        if let Some(handle) = self.subscription {
            handle.abort();
        }
    }
}

/// Result of one resolution cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The label changed and a restart was issued.
    Restarted(Label),
    /// The label matched the last applied one.
    Unchanged(Label),
    /// Nothing could be resolved this cycle.
    Skipped,
}

struct RegistryInner {
    entries: Mutex<HashMap<RepoKey, WatchEntry>>,
    scheduler: DebounceScheduler<RepoKey>,
    restarter: TerminalRestarter,
    config: Arc<dyn ConfigSource>,
}

/// Owns every [`WatchEntry`] and the timers attached to them.
///
/// Cheap to clone; clones share state. Independent instances share nothing.
#[derive(Clone)]
pub struct WatchRegistry {
    inner: Arc<RegistryInner>,
}

impl WatchRegistry {
    pub fn new(restarter: TerminalRestarter, config: Arc<dyn ConfigSource>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                entries: Mutex::new(HashMap::new()),
                scheduler: DebounceScheduler::new(),
                restarter,
                config,
            }),
        }
    }

    fn settings(&self) -> Settings {
        self.inner.config.load()
    }

    fn downgrade(&self) -> Weak<RegistryInner> {
        Arc::downgrade(&self.inner)
    }

    fn upgrade(inner: &Weak<RegistryInner>) -> Option<Self> {
        inner.upgrade().map(|inner| Self { inner })
    }

    /// Start watching a source. Returns `false` if its key is already watched.
    ///
    /// Push-capable sources are resolved on every notification, others are
    /// polled every [`POLL_INTERVAL`]. Either way one immediate resolution
    /// establishes the initial label.
    pub fn start_watch(&self, source: Arc<dyn HeadSource>) -> bool {
        let key = source.key().clone();
        {
            let mut entries = self.inner.entries.lock();
            if entries.contains_key(&key) {
                tracing::debug!("Already watching {}", key);
                return false;
            }

            let mut entry = WatchEntry::new(Arc::clone(&source));
            match source.subscribe() {
                Some(stream) => {
                    entry.subscription = Some(self.spawn_subscription(key.clone(), stream));
                    tracing::info!("Watching {} for repository changes", key);
                }
                None => {
                    entry.poll_handle = Some(self.spawn_poll(key.clone()));
                    tracing::info!("Polling {} every {:?}", key, POLL_INTERVAL);
                }
            }
            entries.insert(key.clone(), entry);
        }

        self.schedule(key, Duration::ZERO);
        true
    }

    fn spawn_subscription(&self, key: RepoKey, mut stream: ChangeStream) -> JoinHandle<()> {
        let weak = self.downgrade();
        tokio::spawn(async move {
            loop {
                match stream.recv().await {
                    Ok(()) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => {
                        tracing::debug!("Change stream for {} closed", key);
                        break;
                    }
                }
                let Some(registry) = Self::upgrade(&weak) else { break };
                registry.notify(&key);
            }
        })
    }

    fn spawn_poll(&self, key: RepoKey) -> JoinHandle<()> {
        let weak = self.downgrade();
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + POLL_INTERVAL;
            let mut ticks = tokio::time::interval_at(start, POLL_INTERVAL);
            loop {
                ticks.tick().await;
                let Some(registry) = Self::upgrade(&weak) else { break };
                registry.notify(&key);
            }
        })
    }

    /// Debounced resolution for a source, creating its entry on first use.
    ///
    /// Lazily created entries have no subscription and are not polled; the
    /// caller is the signal source.
    pub fn signal(&self, source: Arc<dyn HeadSource>) {
        let key = source.key().clone();
        self.inner
            .entries
            .lock()
            .entry(key.clone())
            .or_insert_with(|| WatchEntry::new(source));
        self.schedule(key, self.settings().debounce());
    }

    /// Debounced resolution for an already watched key.
    pub fn notify(&self, key: &RepoKey) {
        if !self.is_watching(key) {
            return;
        }
        self.schedule(key.clone(), self.settings().debounce());
    }

    fn schedule(&self, key: RepoKey, delay: Duration) {
        tracing::debug!("Scheduling resolution of {} in {:?}", key, delay);
        let registry = self.clone();
        let task_key = key.clone();
        self.inner.scheduler.schedule(key, delay, async move {
            registry.resolve(&task_key).await;
        });
    }

    /// Resolve the current label for `key` and restart if it changed.
    pub async fn resolve(&self, key: &RepoKey) -> ResolveOutcome {
        let source = match self.inner.entries.lock().get(key) {
            Some(entry) => Arc::clone(&entry.source),
            None => return ResolveOutcome::Skipped,
        };

        let branch = match source.read_head().await {
            Ok(branch) => branch,
            Err(e) => {
                tracing::warn!("Skipping {} this cycle: {}", key, e);
                return ResolveOutcome::Skipped;
            }
        };

        let settings = self.settings();
        let label = LabelBuilder::new(settings.terminal_name_prefix.as_str())
            .build(source.short_name().as_deref(), &branch);

        {
            let mut entries = self.inner.entries.lock();
            let Some(entry) = entries.get_mut(key) else {
                return ResolveOutcome::Skipped;
            };
            if entry.last_applied_label.as_ref() == Some(&label) {
                return ResolveOutcome::Unchanged(label);
            }
            entry.last_applied_label = Some(label.clone());
        }

        tracing::info!("{} is now on {}, restarting terminal as {}", key, branch, label);
        let options = RestartOptions {
            focus: settings.focus_on_create,
            init_command: settings.init_command,
        };
        match self.inner.restarter.restart(&label, &options).await {
            Ok(report) => tracing::debug!(?report, "Restart finished"),
            Err(e) => tracing::error!("Failed to open terminal {}: {}", label, e),
        }
        ResolveOutcome::Restarted(label)
    }

    /// Resolve a source right away, bypassing the debounce window.
    pub async fn resolve_now(&self, source: Arc<dyn HeadSource>) -> ResolveOutcome {
        let key = source.key().clone();
        self.inner
            .entries
            .lock()
            .entry(key.clone())
            .or_insert_with(|| WatchEntry::new(source));
        self.inner.scheduler.cancel(&key);
        self.resolve(&key).await
    }

    /// Stop watching `key`, cancelling its timers. Returns `false` if unknown.
    pub fn stop_watch(&self, key: &RepoKey) -> bool {
        self.inner.scheduler.cancel(key);
        match self.inner.entries.lock().remove(key) {
            Some(entry) => {
                entry.release();
                tracing::info!("Stopped watching {}", key);
                true
            }
            None => false,
        }
    }

    /// Stop every watch and cancel every timer.
    pub fn teardown_all(&self) {
        let drained: Vec<(RepoKey, WatchEntry)> = self.inner.entries.lock().drain().collect();
        self.inner.scheduler.cancel_all();
        for (key, entry) in drained {
            entry.release();
            tracing::debug!("Released {}", key);
        }
    }

    pub fn last_applied_label(&self, key: &RepoKey) -> Option<Label> {
        self.inner
            .entries
            .lock()
            .get(key)
            .and_then(|entry| entry.last_applied_label.clone())
    }

    pub fn is_watching(&self, key: &RepoKey) -> bool {
        self.inner.entries.lock().contains_key(key)
    }

    pub fn is_pending(&self, key: &RepoKey) -> bool {
        self.inner.scheduler.is_pending(key)
    }

    pub fn keys(&self) -> Vec<RepoKey> {
        self.inner.entries.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
