//! `branch-terminal` command line.
//!
//! `watch` (the default) follows branch changes until Ctrl+C. `restart` runs
//! a single resolution cycle and exits.

use anyhow::{Context, Result};
use branch_terminal::prelude::*;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "branch-terminal", version, about)]
struct Cli {
    /// Workspace to watch (defaults to the current directory)
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    /// Config file (defaults to <workspace>/.branch-terminal.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Watch HEAD files directly instead of asking libgit2
    #[arg(long, global = true)]
    no_git_api: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Restart the terminal whenever the branch changes
    Watch,
    /// Restart the terminal for the current branch once
    Restart,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("branch_terminal={level}"))),
        )
        .init();

    let workspace = match cli.workspace {
        Some(path) => path,
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let workspace = workspace
        .canonicalize()
        .with_context(|| format!("Workspace {} does not exist", workspace.display()))?;

    let config = FileConfig::discover(cli.config.as_deref(), &workspace);
    tracing::debug!("Using config {}", config.path().display());
    let settings = config.load();

    let host = TmuxHost::new(settings.tmux_session.clone(), workspace.clone())
        .context("tmux is required")?;
    let api = if cli.no_git_api {
        None
    } else {
        let git: Arc<dyn RepositoryApi> =
            Arc::new(GitRepositoryApi::new(&workspace).with_exclude(settings.exclude.clone()));
        Some(git)
    };

    let mut app = BranchTerminal::activate(workspace, Arc::new(config), api, Arc::new(host));

    match cli.command.unwrap_or(Command::Watch) {
        Command::Restart => {
            let outcome = app.restart_now().await;
            tracing::info!("Manual restart: {:?}", outcome);
        }
        Command::Watch => {
            tracing::info!("Watching in {:?} mode, press Ctrl+C to exit", app.mode());
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl+C")?;
            tracing::info!("Shutting down");
        }
    }

    app.shutdown();
    Ok(())
}
