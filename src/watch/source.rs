//! Keys and the signal-source seam shared by both adapters.

use crate::branch::{BranchRef, HeadError};
use async_trait::async_trait;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use tokio::sync::broadcast;

/// Push notifications meaning "something about this repository changed".
pub type ChangeStream = broadcast::Receiver<()>;

/// Stable identifier of a watched repository or metadata file.
///
/// Always absolute and lexically normalised, so two spellings of the same
/// location share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoKey(PathBuf);

impl RepoKey {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        };
        Self(normalize(&absolute))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for RepoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Something the registry can watch: one repository, one key.
#[async_trait]
pub trait HeadSource: Send + Sync {
    fn key(&self) -> &RepoKey;

    /// Repository short name used in labels.
    fn short_name(&self) -> Option<String>;

    /// Resolve the current branch. Called at resolution time, never cached.
    async fn read_head(&self) -> Result<BranchRef, HeadError>;

    /// Push notifications, if the source has any. Sources without one are polled.
    fn subscribe(&self) -> Option<ChangeStream> {
        None
    }
}
