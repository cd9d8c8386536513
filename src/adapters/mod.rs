//! Signal sources feeding the watch registry.
//!
//! - `structured`: a host repository-state API ([`RepositoryApi`])
//! - `git`: a libgit2 implementation of that API
//! - `file_watch`: raw `.git/HEAD` watching, used when no API is available

pub mod file_watch;
pub mod git;
pub mod structured;

pub use file_watch::{enumerate_heads, FileChangeKind, FileWatchAdapter, HeadFile, HeadPatterns, WatcherError};
pub use git::{GitRepository, GitRepositoryApi};
pub use structured::{
    pick_repository, ApiError, Repository, RepositoryApi, RepositoryEvents, RepositorySource,
    StructuredRepoAdapter,
};
