//! Signals from a structured repository-state API.
//!
//! The API is optional and so is every surface on it: an API without open or
//! close events still gets its initial repositories watched, and a repository
//! without change events is polled by the registry.

use crate::branch::{short_name_from_root, BranchRef, HeadError, HeadState};
use crate::watch::{ChangeStream, HeadSource, RepoKey, WatchRegistry};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Repository API unavailable: {0}")]
    Unavailable(String),

    #[error("No repository found at {path}: {source}")]
    Discovery {
        path: PathBuf,
        source: git2::Error,
    },
}

/// Repository open/close notifications.
pub type RepositoryEvents = broadcast::Receiver<Arc<dyn Repository>>;

/// One repository as seen through the API.
pub trait Repository: Send + Sync {
    fn root(&self) -> &Path;

    /// Current head, `None` when the API has no head to report.
    fn head(&self) -> Result<Option<HeadState>, HeadError>;

    fn on_did_change(&self) -> Option<ChangeStream> {
        None
    }
}

/// The repository-state API of a host.
pub trait RepositoryApi: Send + Sync {
    /// Prepare the API. Failing here means the API is unusable.
    fn activate(&self) -> Result<(), ApiError> {
        Ok(())
    }

    fn repositories(&self) -> Option<Vec<Arc<dyn Repository>>>;

    fn on_did_open_repository(&self) -> Option<RepositoryEvents> {
        None
    }

    fn on_did_close_repository(&self) -> Option<RepositoryEvents> {
        None
    }
}

/// A structured repository as a [`HeadSource`], keyed by its root.
pub struct RepositorySource {
    key: RepoKey,
    repository: Arc<dyn Repository>,
}

impl RepositorySource {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self {
            key: RepoKey::new(repository.root()),
            repository,
        }
    }
}

#[async_trait]
impl HeadSource for RepositorySource {
    fn key(&self) -> &RepoKey {
        &self.key
    }

    fn short_name(&self) -> Option<String> {
        short_name_from_root(self.repository.root())
    }

    async fn read_head(&self) -> Result<BranchRef, HeadError> {
        // Repository reads may hit the disk.
        let repository = Arc::clone(&self.repository);
        let head = tokio::task::spawn_blocking(move || repository.head())
            .await
            .map_err(|e| HeadError::Repository {
                root: self.repository.root().to_path_buf(),
                message: e.to_string(),
            })??;
        Ok(head
            .map(|head| BranchRef::from_head_state(&head))
            .unwrap_or(BranchRef::Unknown))
    }

    fn subscribe(&self) -> Option<ChangeStream> {
        self.repository.on_did_change()
    }
}

/// Feeds repositories reported by a [`RepositoryApi`] into the registry.
pub struct StructuredRepoAdapter {
    tasks: Vec<JoinHandle<()>>,
}

impl StructuredRepoAdapter {
    pub fn attach(api: &dyn RepositoryApi, registry: WatchRegistry) -> Result<Self, ApiError> {
        api.activate()?;

        let mut tasks = Vec::new();
        if let Some(opened) = api.on_did_open_repository() {
            let registry = registry.clone();
            tasks.push(spawn_events(opened, move |repo| {
                registry.start_watch(Arc::new(RepositorySource::new(repo)));
            }));
        }
        if let Some(closed) = api.on_did_close_repository() {
            let registry = registry.clone();
            tasks.push(spawn_events(closed, move |repo| {
                registry.stop_watch(&RepoKey::new(repo.root()));
            }));
        }

        let initial = api.repositories().unwrap_or_default();
        tracing::info!("Repository API reports {} repositories", initial.len());
        for repo in initial {
            registry.start_watch(Arc::new(RepositorySource::new(repo)));
        }

        Ok(Self { tasks })
    }

    /// Drop the open/close subscriptions.
    pub fn detach(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for StructuredRepoAdapter {
    fn drop(&mut self) {
        self.detach();
    }
}

fn spawn_events<F>(mut events: RepositoryEvents, mut handler: F) -> JoinHandle<()>
where
    F: FnMut(Arc<dyn Repository>) + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(repo) => handler(repo),
                Err(RecvError::Lagged(count)) => {
                    tracing::warn!("Missed {} repository events", count);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// The repository to use for a manual restart: the one rooted at the
/// workspace, else the first one.
pub fn pick_repository(api: &dyn RepositoryApi, workspace: &Path) -> Option<Arc<dyn Repository>> {
    let repos = api.repositories()?;
    let workspace = RepoKey::new(workspace);
    repos
        .iter()
        .find(|r| RepoKey::new(r.root()) == workspace)
        .or_else(|| repos.first())
        .cloned()
}
