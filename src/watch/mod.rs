//! Change detection core: debouncing and the per-repository registry.
//!
//! - `source`: [`RepoKey`] and the [`HeadSource`] seam
//! - `debounce`: per-key [`DebounceScheduler`]
//! - `registry`: [`WatchRegistry`], the idempotent resolve-and-restart loop

pub mod debounce;
pub mod registry;
pub mod source;

pub use debounce::DebounceScheduler;
pub use registry::{ResolveOutcome, WatchEntry, WatchRegistry, POLL_INTERVAL};
pub use source::{ChangeStream, HeadSource, RepoKey};
