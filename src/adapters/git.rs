//! A [`RepositoryApi`] backed by libgit2.
//!
//! Reports the repository containing the workspace and every repository
//! found under it. It has no change notifications, so the registry polls it.

use crate::adapters::file_watch::{enumerate_heads, HeadPatterns, ENUMERATION_LIMIT};
use crate::adapters::structured::{ApiError, Repository, RepositoryApi};
use crate::branch::{HeadError, HeadState};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct GitRepository {
    root: PathBuf,
    repo: Mutex<git2::Repository>,
}

impl GitRepository {
    pub fn discover(path: &Path) -> Result<Self, ApiError> {
        let repo = git2::Repository::discover(path).map_err(|source| ApiError::Discovery {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_repo(repo))
    }

    /// Open the repository whose working directory is exactly `path`.
    pub fn open(path: &Path) -> Result<Self, ApiError> {
        let repo = git2::Repository::open(path).map_err(|source| ApiError::Discovery {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_repo(repo))
    }

    fn from_repo(repo: git2::Repository) -> Self {
        let root = match repo.workdir() {
            Some(workdir) => workdir.to_path_buf(),
            None => repo.path().to_path_buf(),
        };
        Self {
            root: root.components().collect(),
            repo: Mutex::new(repo),
        }
    }

    fn head_error(&self, err: git2::Error) -> HeadError {
        HeadError::Repository {
            root: self.root.clone(),
            message: err.message().to_string(),
        }
    }
}

impl Repository for GitRepository {
    fn root(&self) -> &Path {
        &self.root
    }

    fn head(&self) -> Result<Option<HeadState>, HeadError> {
        let repo = self.repo.lock();
        let result = match repo.head() {
            Ok(head) => {
                let name = if head.is_branch() {
                    head.shorthand().map(str::to_string)
                } else {
                    None
                };
                let commit = head.target().map(|oid| oid.to_string());
                Ok(Some(HeadState { name, commit }))
            }
            // A fresh repository points HEAD at a branch with no commits yet.
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => {
                let head = repo.find_reference("HEAD").map_err(|e| self.head_error(e))?;
                let name = head
                    .symbolic_target()
                    .map(|target| target.trim_start_matches("refs/heads/").to_string());
                Ok(Some(HeadState { name, commit: None }))
            }
            Err(e) => Err(self.head_error(e)),
        };
        result
    }
}

/// Repositories of a workspace, found once at activation.
pub struct GitRepositoryApi {
    workspace: PathBuf,
    exclude: Vec<String>,
    repositories: Mutex<Option<Vec<Arc<GitRepository>>>>,
}

impl GitRepositoryApi {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            exclude: Vec::new(),
            repositories: Mutex::new(None),
        }
    }

    /// Skip nested repositories matching these globs.
    pub fn with_exclude(mut self, exclude: Vec<String>) -> Self {
        self.exclude = exclude;
        self
    }

    fn nested(&self) -> Result<Vec<GitRepository>, ApiError> {
        let patterns =
            HeadPatterns::new(&self.exclude).map_err(|e| ApiError::Unavailable(e.to_string()))?;
        let mut found = Vec::new();
        for head in enumerate_heads(&self.workspace, &patterns, ENUMERATION_LIMIT) {
            let Some(workdir) = head.parent().and_then(Path::parent) else {
                continue;
            };
            match GitRepository::open(workdir) {
                Ok(repo) => found.push(repo),
                Err(e) => tracing::debug!("Skipping {}: {}", workdir.display(), e),
            }
        }
        Ok(found)
    }
}

impl RepositoryApi for GitRepositoryApi {
    fn activate(&self) -> Result<(), ApiError> {
        let mut repos: Vec<GitRepository> = Vec::new();
        let containing = GitRepository::discover(&self.workspace);
        let discovery_error = match containing {
            Ok(repo) => {
                repos.push(repo);
                None
            }
            Err(e) => Some(e),
        };

        for repo in self.nested()? {
            if repos.iter().all(|known| known.root() != repo.root()) {
                repos.push(repo);
            }
        }

        if repos.is_empty() {
            if let Some(e) = discovery_error {
                return Err(e);
            }
        }
        for repo in &repos {
            tracing::debug!("Discovered repository at {}", repo.root().display());
        }
        *self.repositories.lock() = Some(repos.into_iter().map(Arc::new).collect());
        Ok(())
    }

    fn repositories(&self) -> Option<Vec<Arc<dyn Repository>>> {
        let repos = self.repositories.lock().clone()?;
        Some(
            repos
                .into_iter()
                .map(|repo| repo as Arc<dyn Repository>)
                .collect(),
        )
    }
}
