//! Application lifecycle: choose a signal source, run, tear down.

use crate::adapters::{
    enumerate_heads, pick_repository, FileWatchAdapter, HeadFile, HeadPatterns, RepositoryApi,
    RepositorySource, StructuredRepoAdapter,
};
use crate::config::ConfigSource;
use crate::terminal::{TerminalHost, TerminalRestarter};
use crate::watch::{ResolveOutcome, WatchRegistry};
use std::path::PathBuf;
use std::sync::Arc;

/// Which signal source is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMode {
    Structured,
    FileWatch,
    /// Disabled, or no usable source.
    Inert,
}

/// A running branch watcher.
pub struct BranchTerminal {
    workspace: PathBuf,
    config: Arc<dyn ConfigSource>,
    registry: WatchRegistry,
    api: Option<Arc<dyn RepositoryApi>>,
    structured: Option<StructuredRepoAdapter>,
    files: Option<FileWatchAdapter>,
    mode: WatchMode,
}

impl BranchTerminal {
    /// Start watching `workspace`. Must be called within a tokio runtime.
    ///
    /// The repository API is preferred. If it is absent or fails to
    /// activate, HEAD files are watched instead when the fallback is enabled.
    /// Nothing here is fatal: the worst case is an inert watcher.
    pub fn activate(
        workspace: impl Into<PathBuf>,
        config: Arc<dyn ConfigSource>,
        api: Option<Arc<dyn RepositoryApi>>,
        host: Arc<dyn TerminalHost>,
    ) -> Self {
        let workspace = workspace.into();
        let settings = config.load();
        let registry = WatchRegistry::new(TerminalRestarter::new(host), Arc::clone(&config));
        let mut app = Self {
            workspace,
            config,
            registry,
            api: None,
            structured: None,
            files: None,
            mode: WatchMode::Inert,
        };

        if !settings.enable {
            tracing::info!("Disabled by configuration");
            return app;
        }

        if let Some(api) = api {
            match StructuredRepoAdapter::attach(api.as_ref(), app.registry.clone()) {
                Ok(adapter) => {
                    app.structured = Some(adapter);
                    app.api = Some(api);
                    app.mode = WatchMode::Structured;
                    return app;
                }
                Err(e) => tracing::warn!("{}", e),
            }
        }

        if !settings.fallback_to_file_watcher {
            tracing::info!("No repository API and file watching is disabled, staying idle");
            return app;
        }

        let started = HeadPatterns::new(&settings.exclude)
            .and_then(|patterns| FileWatchAdapter::start(&app.workspace, patterns, app.registry.clone()));
        match started {
            Ok(adapter) => {
                app.files = Some(adapter);
                app.mode = WatchMode::FileWatch;
            }
            Err(e) => tracing::error!("Failed to watch {}: {}", app.workspace.display(), e),
        }
        app
    }

    pub fn mode(&self) -> WatchMode {
        self.mode
    }

    pub fn registry(&self) -> &WatchRegistry {
        &self.registry
    }

    /// Run one resolution cycle now, outside of any change signal.
    ///
    /// Uses the repository at the workspace root if there is one, otherwise
    /// the first one found. Never fails; unresolvable states are logged.
    pub async fn restart_now(&self) -> ResolveOutcome {
        match self.mode {
            WatchMode::Structured => {
                let picked = self
                    .api
                    .as_deref()
                    .and_then(|api| pick_repository(api, &self.workspace));
                match picked {
                    Some(repo) => {
                        self.registry
                            .resolve_now(Arc::new(RepositorySource::new(repo)))
                            .await
                    }
                    None => {
                        tracing::info!("No repository to restart for");
                        ResolveOutcome::Skipped
                    }
                }
            }
            WatchMode::FileWatch => match self.find_head_file().await {
                Some(head) => self.registry.resolve_now(Arc::new(HeadFile::new(head))).await,
                None => {
                    tracing::info!("No HEAD file found under {}", self.workspace.display());
                    ResolveOutcome::Skipped
                }
            },
            WatchMode::Inert => {
                tracing::info!("Nothing is being watched, ignoring restart request");
                ResolveOutcome::Skipped
            }
        }
    }

    async fn find_head_file(&self) -> Option<PathBuf> {
        let own = self.workspace.join(".git").join("HEAD");
        if own.is_file() {
            return Some(own);
        }

        let patterns = match HeadPatterns::new(&self.config.load().exclude) {
            Ok(patterns) => patterns,
            Err(e) => {
                tracing::warn!("{}", e);
                return None;
            }
        };
        let root = self.workspace.clone();
        match tokio::task::spawn_blocking(move || enumerate_heads(&root, &patterns, 1)).await {
            Ok(heads) => heads.into_iter().next(),
            Err(e) => {
                tracing::warn!("HEAD file enumeration failed: {}", e);
                None
            }
        }
    }

    /// Stop every adapter and cancel every timer. Safe to call twice.
    pub fn shutdown(&mut self) {
        if let Some(mut adapter) = self.structured.take() {
            adapter.detach();
        }
        if let Some(mut adapter) = self.files.take() {
            adapter.stop();
        }
        self.registry.teardown_all();
        self.mode = WatchMode::Inert;
    }
}

impl Drop for BranchTerminal {
    fn drop(&mut self) {
        self.shutdown();
    }
}
