//! tmux-backed terminal host.
//!
//! All sessions live in one dedicated tmux session. "Terminate all" kills that
//! session and every new branch session recreates it with a single window
//! named after the label.

use crate::terminal::host::{SessionId, TerminalError, TerminalHost};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;

pub struct TmuxHost {
    program: PathBuf,
    session: String,
    working_dir: PathBuf,
}

impl TmuxHost {
    /// Locate tmux on `PATH`.
    pub fn new(session: impl Into<String>, working_dir: PathBuf) -> Result<Self, TerminalError> {
        let program = which::which("tmux")?;
        Ok(Self::with_program(program, session, working_dir))
    }

    pub fn with_program(
        program: PathBuf,
        session: impl Into<String>,
        working_dir: PathBuf,
    ) -> Self {
        Self {
            program,
            session: session.into(),
            working_dir,
        }
    }

    /// Exact-match target for the managed session.
    fn session_target(&self) -> String {
        format!("={}", self.session)
    }

    fn new_session_args(&self, name: &str) -> Vec<String> {
        vec![
            "new-session".into(),
            "-d".into(),
            "-s".into(),
            self.session.clone(),
            "-n".into(),
            name.into(),
            "-c".into(),
            self.working_dir.display().to_string(),
            "-P".into(),
            "-F".into(),
            "#{window_id}".into(),
        ]
    }

    /// Literal keys for `target`. `--` keeps text starting with `-` out of
    /// option parsing.
    fn send_text_args(target: &str, text: &str) -> Vec<String> {
        vec![
            "send-keys".into(),
            "-t".into(),
            target.into(),
            "-l".into(),
            "--".into(),
            text.into(),
        ]
    }

    async fn output(&self, args: &[String]) -> Result<std::process::Output, TerminalError> {
        tracing::debug!("tmux {}", args.join(" "));
        Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|source| TerminalError::Spawn {
                program: self.program.clone(),
                source,
            })
    }

    async fn run(&self, args: &[String]) -> Result<String, TerminalError> {
        let output = self.output(args).await?;
        if !output.status.success() {
            return Err(TerminalError::Failed {
                command: format!("tmux {}", args.join(" ")),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn session_exists(&self) -> Result<bool, TerminalError> {
        let args = ["has-session".to_string(), "-t".into(), self.session_target()];
        Ok(self.output(&args).await?.status.success())
    }
}

#[async_trait]
impl TerminalHost for TmuxHost {
    async fn terminate_all(&self) -> Result<(), TerminalError> {
        if !self.session_exists().await? {
            return Ok(());
        }
        self.run(&["kill-session".into(), "-t".into(), self.session_target()])
            .await
            .map(|_| ())
    }

    async fn create_session(&self, name: &str) -> Result<SessionId, TerminalError> {
        let window = self.run(&self.new_session_args(name)).await?;
        if window.is_empty() {
            return Err(TerminalError::Host(format!(
                "tmux did not report a window for {name}"
            )));
        }
        Ok(SessionId(window))
    }

    async fn show(&self, session: &SessionId) -> Result<(), TerminalError> {
        self.run(&["select-window".into(), "-t".into(), session.0.clone()])
            .await?;
        // Only an attached client can be switched.
        if std::env::var_os("TMUX").is_some() {
            self.run(&["switch-client".into(), "-t".into(), self.session_target()])
                .await?;
        }
        Ok(())
    }

    async fn submit(&self, session: &SessionId, text: &str) -> Result<(), TerminalError> {
        self.run(&Self::send_text_args(&session.0, text)).await?;
        self.run(&[
            "send-keys".into(),
            "-t".into(),
            session.0.clone(),
            "Enter".into(),
        ])
        .await
        .map(|_| ())
    }
}
