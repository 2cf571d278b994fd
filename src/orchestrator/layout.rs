use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::errors::{ComposerError, PreconditionError};

pub const PRIVATE_KEY: &str = "key";
pub const PUBLIC_KEY: &str = "key.pub";
pub const WORKTREE: &str = "repository";

/// Whether a deployment's repository has been cloned. Derived from the
/// filesystem on every call, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloneState {
    NotCloned,
    Cloned,
}

impl CloneState {
    /// Fail with the precondition naming `expected` when the state differs.
    pub fn require(self, expected: CloneState) -> Result<(), PreconditionError> {
        match (expected, self) {
            (CloneState::Cloned, CloneState::NotCloned) => Err(PreconditionError::NotInitialized),
            (CloneState::NotCloned, CloneState::Cloned) => Err(PreconditionError::AlreadyInitialized),
            _ => Ok(()),
        }
    }
}

/// On-disk layout under the deployments directory:
///
/// ```text
/// <root>/<id>/key
/// <root>/<id>/key.pub
/// <root>/<id>/repository/              working tree, once cloned
/// <root>/<id>/repository/<directory>/  compose project root
/// ```
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn deployment_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    pub fn private_key(&self, id: &str) -> PathBuf {
        self.deployment_dir(id).join(PRIVATE_KEY)
    }

    pub fn public_key(&self, id: &str) -> PathBuf {
        self.deployment_dir(id).join(PUBLIC_KEY)
    }

    pub fn worktree(&self, id: &str) -> PathBuf {
        self.deployment_dir(id).join(WORKTREE)
    }

    /// The compose project root for `directory`, which must be a relative
    /// path that stays inside the working tree.
    pub fn compose_dir(&self, id: &str, directory: &str) -> Result<PathBuf, ComposerError> {
        let relative = Path::new(directory);
        let escapes = relative.components().any(|component| {
            matches!(
                component,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes {
            return Err(ComposerError::InvalidDirectory {
                directory: directory.to_string(),
            });
        }
        Ok(self.worktree(id).join(relative))
    }

    pub fn clone_state(&self, id: &str) -> CloneState {
        if self.worktree(id).is_dir() {
            CloneState::Cloned
        } else {
            CloneState::NotCloned
        }
    }
}
