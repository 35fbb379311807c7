// error.rs — Error types for the activity lifecycle.

use std::path::PathBuf;

use folio_git::GitError;
use folio_workspace::WorkspaceError;
use thiserror::Error;

use crate::conflict::MergeConflict;

/// Errors that can occur during activity operations.
#[derive(Debug, Error)]
pub enum ActivityError {
    /// The working copy moved on since the caller loaded it.
    #[error("working copy is at {actual}, not {expected}; reload and try again")]
    StaleBase { expected: String, actual: String },

    /// Another writer's changes could not be merged automatically.
    #[error("{0}")]
    MergeConflict(Box<MergeConflict>),

    /// The origin could not be reached.
    #[error("cannot reach the origin ({operation}): {message}")]
    Connectivity { operation: String, message: String },

    /// A content path was absolute or escaped the working copy.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// A branch, activity or file does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The activity is not in a state that allows the action.
    #[error("cannot {action} activity {branch} while it is {state}")]
    InvalidState {
        branch: String,
        state: String,
        action: String,
    },

    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("configuration error in {path}: {message}")]
    Config { path: String, message: String },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error(transparent)]
    Git(GitError),

    #[error(transparent)]
    Workspace(WorkspaceError),
}

impl ActivityError {
    pub fn is_merge_conflict(&self) -> bool {
        matches!(self, ActivityError::MergeConflict(_))
    }

    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| ActivityError::IoError { path, source }
    }
}

impl From<MergeConflict> for ActivityError {
    fn from(conflict: MergeConflict) -> Self {
        ActivityError::MergeConflict(Box::new(conflict))
    }
}

impl From<GitError> for ActivityError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::Transport { args, stderr } => ActivityError::Connectivity {
                operation: format!("git {}", args),
                message: stderr,
            },
            other => ActivityError::Git(other),
        }
    }
}

impl From<WorkspaceError> for ActivityError {
    fn from(err: WorkspaceError) -> Self {
        match err {
            WorkspaceError::PathTraversal { path, reason } => {
                ActivityError::InvalidPath { path, reason }
            }
            WorkspaceError::FileNotFound { path } => ActivityError::NotFound(path),
            WorkspaceError::Git(git) => git.into(),
            other => ActivityError::Workspace(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ActivityError>;
