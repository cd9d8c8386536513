//! The terminal host seam.

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TerminalError {
    #[error("Terminal program not found: {0}")]
    ProgramNotFound(#[from] which::Error),

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("Terminal host error: {0}")]
    Host(String),
}

/// Host-specific handle of an opened session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(pub String);

/// Operations a terminal host must provide.
#[async_trait]
pub trait TerminalHost: Send + Sync {
    /// Close every session this host manages.
    async fn terminate_all(&self) -> Result<(), TerminalError>;

    async fn create_session(&self, name: &str) -> Result<SessionId, TerminalError>;

    /// Bring a session to the foreground.
    async fn show(&self, session: &SessionId) -> Result<(), TerminalError>;

    /// Type `text` into the session and execute it.
    async fn submit(&self, session: &SessionId, text: &str) -> Result<(), TerminalError>;
}
