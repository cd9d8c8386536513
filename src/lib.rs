//! Branch Terminal
//!
//! Watches a workspace for changes to the checked-out git branch and, on
//! change, replaces the terminal session with one labeled after the new
//! branch, optionally running an init command in it.
//!
//! ## Flow
//!
//! ```text
//! RepositoryApi events / poll ticks      .git/HEAD file events
//!        ↓                                      ↓
//! StructuredRepoAdapter                  FileWatchAdapter
//!        └──────────────┬───────────────────────┘
//!                       ↓
//! WatchRegistry::signal / notify  (RepoKey: "something changed")
//!                       ↓
//! DebounceScheduler (per key, default 350ms)
//!                       ↓
//! HeadSource::read_head() → BranchRef → Label
//!                       ↓
//! last_applied_label gate (at most one restart per distinct label)
//!                       ↓
//! TerminalRestarter: terminate all → open → focus → init command
//! ```
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use branch_terminal::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let workspace = std::env::current_dir()?;
//!     let config = Arc::new(FileConfig::discover(None, &workspace));
//!     let host = Arc::new(TmuxHost::new("branch-terminal", workspace.clone())?);
//!     let api: Arc<dyn RepositoryApi> = Arc::new(GitRepositoryApi::new(&workspace));
//!
//!     let mut app = BranchTerminal::activate(workspace, config, Some(api), host);
//!     tokio::signal::ctrl_c().await?;
//!     app.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Module Structure
//!
//! - [`branch`]: HEAD parsing and label composition
//! - [`watch`]: debouncing and the watch registry
//! - [`adapters`]: repository API and HEAD file signal sources
//! - [`terminal`]: terminal hosts and the restart sequence
//! - [`config`]: settings
//! - [`app`]: lifecycle of a running watcher

pub mod adapters;
pub mod app;
pub mod branch;
pub mod config;
pub mod terminal;
pub mod watch;

#[cfg(test)]
pub(crate) mod testing;

/// Re-exports for convenience.
pub mod prelude {
    pub use crate::adapters::{
        FileWatchAdapter, GitRepositoryApi, HeadFile, HeadPatterns, Repository, RepositoryApi,
        RepositorySource, StructuredRepoAdapter,
    };
    pub use crate::app::{BranchTerminal, WatchMode};
    pub use crate::branch::{BranchRef, HeadState, Label, LabelBuilder};
    pub use crate::config::{ConfigSource, FileConfig, Settings, StaticConfig};
    pub use crate::terminal::{TerminalHost, TerminalRestarter, TmuxHost};
    pub use crate::watch::{DebounceScheduler, HeadSource, RepoKey, ResolveOutcome, WatchRegistry};
}
