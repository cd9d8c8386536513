//! Terminal session management.
//!
//! - `host`: the [`TerminalHost`] seam
//! - `tmux`: a tmux implementation of it
//! - `restarter`: the terminate/open/focus/submit sequence

pub mod host;
pub mod restarter;
pub mod tmux;

pub use host::{SessionId, TerminalError, TerminalHost};
pub use restarter::{RestartOptions, RestartPhase, RestartReport, TerminalRestarter};
pub use tmux::TmuxHost;
