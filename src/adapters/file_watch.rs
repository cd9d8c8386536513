//! Signals from raw `.git/HEAD` files.
//!
//! Used when no repository API is available. The whole workspace is watched
//! recursively and every event touching a HEAD file signals the registry,
//! keyed by the file's own path. Existing HEAD files are enumerated once at
//! startup so their labels are established without waiting for an event.

use crate::branch::{read_head_file, short_name_from_head_path, BranchRef, HeadError};
use crate::watch::{HeadSource, RepoKey, WatchRegistry};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::{event::ModifyKind, Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use walkdir::WalkDir;

/// Glob matching repository HEAD files.
pub const HEAD_GLOB: &str = "**/.git/HEAD";

/// Upper bound on HEAD files found by the startup enumeration.
pub const ENUMERATION_LIMIT: usize = 50;

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Failed to create watcher: {0}")]
    WatcherCreation(#[from] notify::Error),

    #[error("Failed to watch path {path}: {source}")]
    WatchPath {
        path: PathBuf,
        source: notify::Error,
    },

    #[error("Invalid glob {pattern}: {source}")]
    Pattern {
        pattern: String,
        source: globset::Error,
    },
}

/// Simplified event kinds, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileChangeKind {
    Create,
    Modify,
    Remove,
    Rename,
}

impl FileChangeKind {
    /// `None` for events that do not change the file.
    pub fn from_event_kind(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(FileChangeKind::Create),
            EventKind::Modify(ModifyKind::Name(_)) => Some(FileChangeKind::Rename),
            EventKind::Modify(_) => Some(FileChangeKind::Modify),
            EventKind::Remove(_) => Some(FileChangeKind::Remove),
            EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
        }
    }
}

/// Which paths count as HEAD files.
#[derive(Debug, Clone)]
pub struct HeadPatterns {
    heads: GlobSet,
    excluded: GlobSet,
}

impl HeadPatterns {
    pub fn new(exclude: &[String]) -> Result<Self, WatcherError> {
        Ok(Self {
            heads: build_set(&[HEAD_GLOB.to_string()])?,
            excluded: build_set(exclude)?,
        })
    }

    pub fn is_head(&self, path: &Path) -> bool {
        self.heads.is_match(path) && !self.excluded.is_match(path)
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        self.excluded.is_match(path)
    }
}

fn build_set(patterns: &[String]) -> Result<GlobSet, WatcherError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| WatcherError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| WatcherError::Pattern {
        pattern: patterns.join(", "),
        source,
    })
}

/// One HEAD file as a [`HeadSource`].
pub struct HeadFile {
    key: RepoKey,
}

impl HeadFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            key: RepoKey::new(path),
        }
    }
}

#[async_trait]
impl HeadSource for HeadFile {
    fn key(&self) -> &RepoKey {
        &self.key
    }

    fn short_name(&self) -> Option<String> {
        short_name_from_head_path(self.key.path())
    }

    async fn read_head(&self) -> Result<BranchRef, HeadError> {
        read_head_file(self.key.path()).await
    }
}

/// Find existing HEAD files under `root`, skipping excluded directories and
/// never descending into `.git` itself.
pub fn enumerate_heads(root: &Path, patterns: &HeadPatterns, limit: usize) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        if entry.depth() > 0 && patterns.is_excluded(entry.path()) {
            return false;
        }
        !(entry.file_type().is_dir() && entry.file_name() == ".git")
    });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let head = entry.path().join(".git").join("HEAD");
        if head.is_file() && patterns.is_head(&head) {
            found.push(head);
            if found.len() >= limit {
                break;
            }
        }
    }
    found
}

/// Watches the workspace for HEAD file changes.
pub struct FileWatchAdapter {
    // Dropping the watcher stops event delivery.
    watcher: Option<RecommendedWatcher>,
    tasks: Vec<JoinHandle<()>>,
}

impl FileWatchAdapter {
    pub fn start(
        workspace: &Path,
        patterns: HeadPatterns,
        registry: WatchRegistry,
    ) -> Result<Self, WatcherError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;
        watcher
            .watch(workspace, RecursiveMode::Recursive)
            .map_err(|source| WatcherError::WatchPath {
                path: workspace.to_path_buf(),
                source,
            })?;
        tracing::info!("Watching {} for {} changes", workspace.display(), HEAD_GLOB);

        let pump_registry = registry.clone();
        let pump_patterns = patterns.clone();
        let pump = tokio::spawn(async move {
            while let Some(result) = rx.recv().await {
                match result {
                    Ok(event) => handle_event(&event, &pump_patterns, &pump_registry),
                    Err(e) => tracing::warn!("File watcher error: {}", e),
                }
            }
        });

        let root = workspace.to_path_buf();
        let seed = tokio::spawn(async move {
            let heads = tokio::task::spawn_blocking(move || {
                enumerate_heads(&root, &patterns, ENUMERATION_LIMIT)
            })
            .await;
            match heads {
                Ok(heads) => {
                    tracing::debug!("Found {} existing HEAD files", heads.len());
                    for head in heads {
                        registry.signal(Arc::new(HeadFile::new(head)));
                    }
                }
                Err(e) => tracing::warn!("HEAD file enumeration failed: {}", e),
            }
        });

        Ok(Self {
            watcher: Some(watcher),
            tasks: vec![pump, seed],
        })
    }

    pub fn stop(&mut self) {
        self.watcher.take();
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }
}

impl Drop for FileWatchAdapter {
    fn drop(&mut self) {
        self.stop();
    }
}

fn handle_event(event: &Event, patterns: &HeadPatterns, registry: &WatchRegistry) {
    let Some(kind) = FileChangeKind::from_event_kind(&event.kind) else {
        return;
    };
    for path in event.paths.iter().filter(|p| patterns.is_head(p)) {
        tracing::debug!("{:?}: {}", kind, path.display());
        // A replaced HEAD can be reported as removed while the new one exists.
        if kind == FileChangeKind::Remove && !path.exists() {
            registry.stop_watch(&RepoKey::new(path));
            continue;
        }
        registry.signal(Arc::new(HeadFile::new(path)));
    }
}
