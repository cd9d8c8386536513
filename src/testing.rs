//! In-memory collaborators for tests.

use crate::adapters::{ApiError, Repository, RepositoryApi, RepositoryEvents};
use crate::branch::{HeadError, HeadState};
use crate::terminal::{SessionId, TerminalError, TerminalHost};
use crate::watch::ChangeStream;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    TerminateAll,
    Create(String),
    Show(String),
    Submit(String, String),
}

/// Records every call; session ids are the session names.
#[derive(Default)]
pub struct RecordingHost {
    calls: Mutex<Vec<HostCall>>,
    fail_terminate: bool,
    fail_create: bool,
}

impl RecordingHost {
    pub fn failing_terminate(mut self) -> Self {
        self.fail_terminate = true;
        self
    }

    pub fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().clone()
    }

    /// Names of sessions opened so far, in order.
    pub fn created(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                HostCall::Create(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl TerminalHost for RecordingHost {
    async fn terminate_all(&self) -> Result<(), TerminalError> {
        self.calls.lock().push(HostCall::TerminateAll);
        if self.fail_terminate {
            return Err(TerminalError::Host("terminate failed".into()));
        }
        Ok(())
    }

    async fn create_session(&self, name: &str) -> Result<SessionId, TerminalError> {
        self.calls.lock().push(HostCall::Create(name.to_string()));
        if self.fail_create {
            return Err(TerminalError::Host("create failed".into()));
        }
        Ok(SessionId(name.to_string()))
    }

    async fn show(&self, session: &SessionId) -> Result<(), TerminalError> {
        self.calls.lock().push(HostCall::Show(session.0.clone()));
        Ok(())
    }

    async fn submit(&self, session: &SessionId, text: &str) -> Result<(), TerminalError> {
        self.calls
            .lock()
            .push(HostCall::Submit(session.0.clone(), text.to_string()));
        Ok(())
    }
}

pub struct FakeRepository {
    root: PathBuf,
    head: Mutex<HeadState>,
    unreadable: AtomicBool,
    changes: Option<broadcast::Sender<()>>,
}

impl FakeRepository {
    /// A repository that pushes change notifications.
    pub fn new(root: &str, branch: &str) -> Arc<Self> {
        let (tx, _) = broadcast::channel(16);
        Arc::new(Self::build(root, branch, Some(tx)))
    }

    /// A repository that must be polled.
    pub fn without_events(root: &str, branch: &str) -> Arc<Self> {
        Arc::new(Self::build(root, branch, None))
    }

    fn build(root: &str, branch: &str, changes: Option<broadcast::Sender<()>>) -> Self {
        Self {
            root: PathBuf::from(root),
            head: Mutex::new(HeadState {
                name: Some(branch.to_string()),
                commit: Some("0123456789abcdef0123456789abcdef01234567".into()),
            }),
            unreadable: AtomicBool::new(false),
            changes,
        }
    }

    pub fn set_branch(&self, branch: &str) {
        self.set_branch_silently(branch);
        self.emit();
    }

    pub fn set_branch_silently(&self, branch: &str) {
        self.head.lock().name = Some(branch.to_string());
    }

    pub fn set_head(&self, head: HeadState) {
        *self.head.lock() = head;
        self.emit();
    }

    pub fn set_unreadable(&self, unreadable: bool) {
        self.unreadable.store(unreadable, Ordering::SeqCst);
    }

    fn emit(&self) {
        if let Some(tx) = &self.changes {
            let _ = tx.send(());
        }
    }
}

impl Repository for FakeRepository {
    fn root(&self) -> &Path {
        &self.root
    }

    fn head(&self) -> Result<Option<HeadState>, HeadError> {
        if self.unreadable.load(Ordering::SeqCst) {
            return Err(HeadError::Repository {
                root: self.root.clone(),
                message: "locked".into(),
            });
        }
        Ok(Some(self.head.lock().clone()))
    }

    fn on_did_change(&self) -> Option<ChangeStream> {
        self.changes.as_ref().map(|tx| tx.subscribe())
    }
}

pub struct FakeRepositoryApi {
    repos: Mutex<Vec<Arc<dyn Repository>>>,
    opened: broadcast::Sender<Arc<dyn Repository>>,
    closed: broadcast::Sender<Arc<dyn Repository>>,
    fail_activation: bool,
}

impl Default for FakeRepositoryApi {
    fn default() -> Self {
        Self {
            repos: Mutex::new(Vec::new()),
            opened: broadcast::channel(16).0,
            closed: broadcast::channel(16).0,
            fail_activation: false,
        }
    }
}

impl FakeRepositoryApi {
    pub fn failing() -> Self {
        Self {
            fail_activation: true,
            ..Self::default()
        }
    }

    pub fn add(&self, repo: Arc<FakeRepository>) {
        self.repos.lock().push(repo);
    }

    pub fn open(&self, repo: Arc<FakeRepository>) {
        self.add(repo.clone());
        let _ = self.opened.send(repo);
    }

    pub fn close(&self, repo: Arc<FakeRepository>) {
        self.repos.lock().retain(|r| r.root() != repo.root());
        let _ = self.closed.send(repo);
    }
}

impl RepositoryApi for FakeRepositoryApi {
    fn activate(&self) -> Result<(), ApiError> {
        if self.fail_activation {
            return Err(ApiError::Unavailable("activation failed".into()));
        }
        Ok(())
    }

    fn repositories(&self) -> Option<Vec<Arc<dyn Repository>>> {
        Some(self.repos.lock().clone())
    }

    fn on_did_open_repository(&self) -> Option<RepositoryEvents> {
        Some(self.opened.subscribe())
    }

    fn on_did_close_repository(&self) -> Option<RepositoryEvents> {
        Some(self.closed.subscribe())
    }
}
