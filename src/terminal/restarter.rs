//! Replacing the terminal session for a new label.
//!
//! A restart walks `Idle -> Terminating -> Opening -> Configuring -> Done`.
//! Failing to terminate old sessions does not stop the new one from opening;
//! failing to open ends the restart; failures while configuring are logged
//! and the remaining steps still run.

use crate::branch::Label;
use crate::terminal::host::{SessionId, TerminalError, TerminalHost};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPhase {
    Idle,
    Terminating,
    Opening,
    Configuring,
    Done,
}

impl fmt::Display for RestartPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RestartPhase::Idle => "idle",
            RestartPhase::Terminating => "terminating",
            RestartPhase::Opening => "opening",
            RestartPhase::Configuring => "configuring",
            RestartPhase::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestartOptions {
    pub focus: bool,
    pub init_command: String,
}

/// What a completed restart actually did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartReport {
    pub label: Label,
    pub session: SessionId,
    pub terminated: bool,
    pub focused: bool,
    pub command_submitted: bool,
}

#[derive(Clone)]
pub struct TerminalRestarter {
    host: Arc<dyn TerminalHost>,
}

impl TerminalRestarter {
    pub fn new(host: Arc<dyn TerminalHost>) -> Self {
        Self { host }
    }

    /// Replace every session with one named `label`. Unconditional: callers
    /// decide whether the label changed.
    pub async fn restart(
        &self,
        label: &Label,
        options: &RestartOptions,
    ) -> Result<RestartReport, TerminalError> {
        let mut phase = RestartPhase::Idle;

        advance(&mut phase, RestartPhase::Terminating, label);
        let terminated = match self.host.terminate_all().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to terminate sessions before opening {}: {}", label, e);
                false
            }
        };

        advance(&mut phase, RestartPhase::Opening, label);
        let session = self.host.create_session(label.as_str()).await?;

        advance(&mut phase, RestartPhase::Configuring, label);
        let mut focused = false;
        if options.focus {
            match self.host.show(&session).await {
                Ok(()) => focused = true,
                Err(e) => tracing::warn!("Failed to focus {}: {}", label, e),
            }
        }

        let mut command_submitted = false;
        let command = options.init_command.trim();
        if !command.is_empty() {
            match self.host.submit(&session, &options.init_command).await {
                Ok(()) => command_submitted = true,
                Err(e) => tracing::warn!("Failed to send init command to {}: {}", label, e),
            }
        }

        advance(&mut phase, RestartPhase::Done, label);
        Ok(RestartReport {
            label: label.clone(),
            session,
            terminated,
            focused,
            command_submitted,
        })
    }
}

fn advance(phase: &mut RestartPhase, next: RestartPhase, label: &Label) {
    tracing::debug!(%label, "restart {} -> {}", phase, next);
    *phase = next;
}
