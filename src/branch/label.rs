//! Terminal session labels.

use crate::branch::head::BranchRef;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Component, Path};

/// Default prefix for session labels.
pub const DEFAULT_PREFIX: &str = "git:";

/// A terminal session name. Equality is exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label(String);

impl Label {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds labels of the form `<prefix>[<repo>/]<branch>`.
#[derive(Debug, Clone)]
pub struct LabelBuilder {
    prefix: String,
}

impl LabelBuilder {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn build(&self, short_name: Option<&str>, branch: &BranchRef) -> Label {
        let mut label = self.prefix.clone();
        if let Some(name) = short_name.filter(|n| !n.is_empty()) {
            label.push_str(name);
            label.push('/');
        }
        label.push_str(&branch.to_string());
        Label(label)
    }
}

impl Default for LabelBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

/// Last segment of a repository root.
pub fn short_name_from_root(root: &Path) -> Option<String> {
    root.file_name()
        .and_then(OsStr::to_str)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

/// Directory holding the last `.git` segment of a HEAD file path.
pub fn short_name_from_head_path(head: &Path) -> Option<String> {
    let segments: Vec<&OsStr> = head
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s),
            _ => None,
        })
        .collect();
    let git_idx = segments.iter().rposition(|s| *s == ".git")?;
    if git_idx == 0 {
        return None;
    }
    segments[git_idx - 1]
        .to_str()
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}
