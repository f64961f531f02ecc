//! Per-identity workspace directories and request tokens.
//!
//! A workspace is a directory keyed by caller identity. It is created lazily
//! and never deleted automatically: uploaded data files live there so later
//! requests can read them. All requests for one identity share the directory,
//! so per-request files are namespaced with a random token instead of locking
//! the directory.

use std::path::{Path, PathBuf};

use rand::{Rng, distributions::Alphanumeric};

use crate::error::{EngineError, Result};

/// Length of a request token in characters. Eight alphanumeric characters
/// carry roughly 47 bits of entropy, plenty to keep concurrent requests in
/// one workspace from colliding.
const TOKEN_LEN: usize = 8;

/// Hands out per-identity workspace directories and collision-free names
/// for temporary files within them.
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Base directory under which workspaces live.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ensure the workspace for `identity` exists and return its path.
    ///
    /// Idempotent; creates parents as needed. Fails if the directory cannot
    /// be created (permissions, disk full) — not retried, since the cause is
    /// usually non-transient.
    pub async fn ensure_workspace(&self, identity: &str) -> Result<PathBuf> {
        validate_identity(identity)?;

        let path = self.root.join(identity);
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|source| EngineError::Workspace {
                path: path.clone(),
                source,
            })?;

        Ok(path)
    }

    /// Generate a fresh request token: a short random alphanumeric string.
    ///
    /// This is a best-effort uniqueness device for filenames within one
    /// workspace, not a security token.
    pub fn new_token() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect()
    }

    /// Script filename for a request: `<token>_script.<ext>`.
    pub fn script_name(token: &str, extension: &str) -> String {
        format!("{}_script.{}", token, extension)
    }

    /// Figure filename for the n-th captured figure: `<token>_figure_<n>.png`.
    pub fn figure_name(token: &str, index: usize) -> String {
        format!("{}_figure_{}.png", token, index)
    }
}

/// Reject identities that cannot safely be used as a single path component.
///
/// The identity is not a security boundary, but it must not be able to
/// escape the workspace root.
fn validate_identity(identity: &str) -> Result<()> {
    let invalid = |reason: &str| EngineError::InvalidIdentity {
        identity: identity.to_string(),
        reason: reason.to_string(),
    };

    if identity.is_empty() {
        return Err(invalid("identity is empty"));
    }
    if identity == "." || identity == ".." {
        return Err(invalid("identity is a relative path component"));
    }
    if !identity
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(invalid(
            "identity may only contain ASCII alphanumerics, '-', '_' and '.'",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_ensure_workspace_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(dir.path());

        let first = manager.ensure_workspace("alice").await.unwrap();
        assert!(first.is_dir());

        let second = manager.ensure_workspace("alice").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_identity_validation() {
        let dir = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(dir.path());

        assert!(manager.ensure_workspace("").await.is_err());
        assert!(manager.ensure_workspace("..").await.is_err());
        assert!(manager.ensure_workspace("a/b").await.is_err());
        assert!(manager.ensure_workspace("../escape").await.is_err());
        assert!(manager.ensure_workspace("user-42_x.y").await.is_ok());
    }

    #[test]
    fn test_tokens_are_alphanumeric() {
        for _ in 0..100 {
            let token = WorkspaceManager::new_token();
            assert_eq!(token.len(), TOKEN_LEN);
            assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_tokens_distinct() {
        let tokens: HashSet<String> = (0..1000).map(|_| WorkspaceManager::new_token()).collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn test_scoped_names() {
        assert_eq!(WorkspaceManager::script_name("ab12", "py"), "ab12_script.py");
        assert_eq!(
            WorkspaceManager::figure_name("ab12", 3),
            "ab12_figure_3.png"
        );
    }
}
