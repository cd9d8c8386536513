//! Resolution of the current branch from repository metadata.
//!
//! Two inputs are understood: the structured head object reported by a
//! repository API, and the raw bytes of a `.git/HEAD` file.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Number of hex characters kept for a detached commit.
pub const SHORT_HASH_LEN: usize = 7;

/// Errors raised while reading repository metadata.
#[derive(Error, Debug)]
pub enum HeadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read HEAD of {root}: {message}")]
    Repository { root: PathBuf, message: String },
}

/// Head of a repository as reported by a structured repository API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadState {
    /// Branch name, absent when detached.
    pub name: Option<String>,
    /// Full commit id.
    pub commit: Option<String>,
}

/// Resolved branch identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BranchRef {
    Named(String),
    Detached(String),
    Unknown,
}

impl BranchRef {
    /// Resolve from a structured head: the name wins, then the commit.
    pub fn from_head_state(head: &HeadState) -> Self {
        if let Some(name) = head.name.as_deref().filter(|n| !n.is_empty()) {
            return BranchRef::Named(name.to_string());
        }
        match head.commit.as_deref().filter(|c| !c.is_empty()) {
            Some(commit) => BranchRef::Detached(commit.chars().take(SHORT_HASH_LEN).collect()),
            None => BranchRef::Unknown,
        }
    }

    /// Resolve from the raw contents of a HEAD file.
    ///
    /// `ref: refs/heads/<name>` yields `Named(name)`, with any slashes in the
    /// name preserved. A bare 7-40 character hex id yields `Detached`.
    /// Anything else is `Unknown`.
    pub fn from_head_bytes(bytes: &[u8]) -> Self {
        let text = String::from_utf8_lossy(bytes);
        let raw = text.trim();

        if let Some(rest) = raw.strip_prefix("ref:") {
            if !rest.starts_with(char::is_whitespace) {
                return BranchRef::Unknown;
            }
            return match rest.split_whitespace().next().and_then(branch_from_ref) {
                Some(name) => BranchRef::Named(name),
                None => BranchRef::Unknown,
            };
        }

        if is_object_id(raw) {
            return BranchRef::Detached(raw[..SHORT_HASH_LEN].to_string());
        }

        BranchRef::Unknown
    }

    /// Returns the branch name for named heads.
    pub fn name(&self) -> Option<&str> {
        match self {
            BranchRef::Named(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for BranchRef {
    /// Display text used in labels. Detached and unknown heads are not
    /// distinguished.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchRef::Named(name) => f.write_str(name),
            BranchRef::Detached(_) | BranchRef::Unknown => f.write_str("detached"),
        }
    }
}

/// Everything after the first `heads` segment, or the last segment when
/// there is none. `None` when that leaves an empty name.
fn branch_from_ref(target: &str) -> Option<String> {
    let segments: Vec<&str> = target.split('/').collect();
    let name = match segments.iter().position(|s| *s == "heads") {
        Some(idx) if idx + 1 < segments.len() => segments[idx + 1..].join("/"),
        _ => segments.last().copied().unwrap_or_default().to_string(),
    };
    Some(name).filter(|n| !n.is_empty())
}

fn is_object_id(raw: &str) -> bool {
    (SHORT_HASH_LEN..=40).contains(&raw.len()) && raw.chars().all(|c| c.is_ascii_hexdigit())
}

/// Read and resolve a HEAD file.
pub async fn read_head_file(path: &Path) -> Result<BranchRef, HeadError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| HeadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BranchRef::from_head_bytes(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbolic_ref_simple() {
        assert_eq!(
            BranchRef::from_head_bytes(b"ref: refs/heads/main\n"),
            BranchRef::Named("main".into())
        );
    }

    #[test]
    fn test_symbolic_ref_with_slashes() {
        assert_eq!(
            BranchRef::from_head_bytes(b"ref: refs/heads/feature/login\n"),
            BranchRef::Named("feature/login".into())
        );
        assert_eq!(
            BranchRef::from_head_bytes(b"ref:\trefs/heads/a/b/c"),
            BranchRef::Named("a/b/c".into())
        );
    }

    #[test]
    fn test_symbolic_ref_without_heads_uses_last_segment() {
        assert_eq!(
            BranchRef::from_head_bytes(b"ref: refs/remotes/origin/dev"),
            BranchRef::Named("dev".into())
        );
    }

    #[test]
    fn test_symbolic_ref_requires_whitespace() {
        assert_eq!(
            BranchRef::from_head_bytes(b"ref:refs/heads/main"),
            BranchRef::Unknown
        );
        assert_eq!(BranchRef::from_head_bytes(b"ref:"), BranchRef::Unknown);
    }

    #[test]
    fn test_symbolic_ref_with_empty_name_is_unknown() {
        assert_eq!(BranchRef::from_head_bytes(b"ref: refs/heads/\n"), BranchRef::Unknown);
        assert_eq!(BranchRef::from_head_bytes(b"ref: foo/"), BranchRef::Unknown);
        assert_eq!(
            BranchRef::from_head_bytes(b"ref: refs/heads/").to_string(),
            "detached"
        );
    }

    #[test]
    fn test_detached_full_and_short_ids() {
        let full = b"a1b2c3d4e5f60718293a4b5c6d7e8f9012345678\n";
        assert_eq!(
            BranchRef::from_head_bytes(full),
            BranchRef::Detached("a1b2c3d".into())
        );
        assert_eq!(
            BranchRef::from_head_bytes(b"ABCDEF0"),
            BranchRef::Detached("ABCDEF0".into())
        );
        for len in 7..=40 {
            let id = "f".repeat(len);
            assert_eq!(
                BranchRef::from_head_bytes(id.as_bytes()),
                BranchRef::Detached("fffffff".into())
            );
        }
    }

    #[test]
    fn test_garbage_is_unknown() {
        assert_eq!(BranchRef::from_head_bytes(b""), BranchRef::Unknown);
        assert_eq!(BranchRef::from_head_bytes(b"   \n"), BranchRef::Unknown);
        assert_eq!(BranchRef::from_head_bytes(b"abc123"), BranchRef::Unknown);
        assert_eq!(BranchRef::from_head_bytes(b"not a head"), BranchRef::Unknown);
        assert_eq!(
            BranchRef::from_head_bytes("f".repeat(41).as_bytes()),
            BranchRef::Unknown
        );
        assert_eq!(BranchRef::from_head_bytes(&[0xff, 0xfe]), BranchRef::Unknown);
    }

    #[test]
    fn test_head_state_resolution() {
        let named = HeadState {
            name: Some("main".into()),
            commit: Some("0123456789abcdef".into()),
        };
        assert_eq!(BranchRef::from_head_state(&named), BranchRef::Named("main".into()));

        let detached = HeadState {
            name: None,
            commit: Some("0123456789abcdef".into()),
        };
        assert_eq!(
            BranchRef::from_head_state(&detached),
            BranchRef::Detached("0123456".into())
        );

        assert_eq!(BranchRef::from_head_state(&HeadState::default()), BranchRef::Unknown);
    }

    #[test]
    fn test_display() {
        assert_eq!(BranchRef::Named("x/y".into()).to_string(), "x/y");
        assert_eq!(BranchRef::Detached("0123456".into()).to_string(), "detached");
        assert_eq!(BranchRef::Unknown.to_string(), "detached");
    }

    #[tokio::test]
    async fn test_read_head_file() {
        let dir = tempfile::tempdir().unwrap();
        let head = dir.path().join("HEAD");
        std::fs::write(&head, "ref: refs/heads/release/1.0\n").unwrap();

        let branch = read_head_file(&head).await.unwrap();
        assert_eq!(branch, BranchRef::Named("release/1.0".into()));

        let missing = read_head_file(&dir.path().join("nope")).await;
        assert!(matches!(missing, Err(HeadError::Io { .. })));
    }
}
