//! User settings.
//!
//! Settings are read through a [`ConfigSource`] at every decision point, so
//! edits to the config file take effect without a restart.

use crate::branch::label::DEFAULT_PREFIX;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// File name looked up in the workspace root.
pub const WORKSPACE_CONFIG_FILE: &str = ".branch-terminal.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Master switch, checked once at startup.
    pub enable: bool,
    /// Watch `.git/HEAD` files when no repository API is available.
    pub fallback_to_file_watcher: bool,
    pub debounce_ms: u64,
    pub terminal_name_prefix: String,
    pub focus_on_create: bool,
    /// Submitted to every new session when non-blank.
    pub init_command: String,
    /// Globs excluded from HEAD file discovery.
    pub exclude: Vec<String>,
    pub tmux_session: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enable: true,
            fallback_to_file_watcher: true,
            debounce_ms: 350,
            terminal_name_prefix: DEFAULT_PREFIX.to_string(),
            focus_on_create: true,
            init_command: String::new(),
            exclude: vec!["**/node_modules/**".to_string()],
            tmux_session: "branch-terminal".to_string(),
        }
    }
}

impl Settings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Where settings come from.
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Settings;
}

/// Fixed settings.
#[derive(Debug, Clone, Default)]
pub struct StaticConfig(pub Settings);

impl ConfigSource for StaticConfig {
    fn load(&self) -> Settings {
        self.0.clone()
    }
}

/// Settings re-read from a TOML file on every load.
///
/// A missing file means defaults. A broken file is logged and also means
/// defaults.
#[derive(Debug, Clone)]
pub struct FileConfig {
    path: PathBuf,
}

impl FileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Pick the config file for a workspace: an explicit path, the
    /// workspace file, then the user config directory.
    pub fn discover(explicit: Option<&Path>, workspace: &Path) -> Self {
        if let Some(path) = explicit {
            return Self::new(path);
        }
        let local = workspace.join(WORKSPACE_CONFIG_FILE);
        if local.is_file() {
            return Self::new(local);
        }
        match dirs::config_dir() {
            Some(dir) => Self::new(dir.join("branch-terminal").join("config.toml")),
            None => Self::new(local),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileConfig {
    fn load(&self) -> Settings {
        if !self.path.exists() {
            return Settings::default();
        }
        match Settings::from_file(&self.path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("{}, using defaults", e);
                Settings::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert!(s.enable);
        assert!(s.fallback_to_file_watcher);
        assert_eq!(s.debounce_ms, 350);
        assert_eq!(s.terminal_name_prefix, "git:");
        assert!(s.focus_on_create);
        assert!(s.init_command.is_empty());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let s = Settings::from_toml("debounce_ms = 50\ninit_command = \"make dev\"\n").unwrap();
        assert_eq!(s.debounce_ms, 50);
        assert_eq!(s.init_command, "make dev");
        assert_eq!(s.terminal_name_prefix, "git:");
        assert_eq!(s.exclude, vec!["**/node_modules/**".to_string()]);
    }

    #[test]
    fn test_file_config_is_read_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = FileConfig::new(&path);

        assert_eq!(config.load(), Settings::default());

        std::fs::write(&path, "terminal_name_prefix = \"br:\"\n").unwrap();
        assert_eq!(config.load().terminal_name_prefix, "br:");

        std::fs::write(&path, "terminal_name_prefix = \"wt:\"\n").unwrap();
        assert_eq!(config.load().terminal_name_prefix, "wt:");
    }

    #[test]
    fn test_broken_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "debounce_ms = \"soon\"").unwrap();

        assert!(matches!(
            Settings::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert_eq!(FileConfig::new(&path).load(), Settings::default());
    }

    #[test]
    fn test_discover_prefers_workspace_file() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join(WORKSPACE_CONFIG_FILE);
        std::fs::write(&local, "enable = false").unwrap();

        let config = FileConfig::discover(None, dir.path());
        assert_eq!(config.path(), local);
        assert!(!config.load().enable);

        let explicit = dir.path().join("other.toml");
        assert_eq!(FileConfig::discover(Some(&explicit), dir.path()).path(), explicit);
    }
}
