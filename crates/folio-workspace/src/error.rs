// error.rs — Error types for working copies and content edits.

use std::path::PathBuf;

use folio_git::GitError;
use thiserror::Error;

/// Errors that can occur during workspace operations.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The path is absolute, empty, or climbs out of the working copy.
    #[error("invalid path '{path}': {reason}")]
    PathTraversal { path: String, reason: String },

    /// The requested file does not exist in the working copy.
    #[error("file not found in working copy: '{path}'")]
    FileNotFound { path: String },

    /// Refused to overwrite an existing file.
    #[error("path already exists: '{path}'")]
    AlreadyExists { path: String },

    /// Front matter was not a YAML mapping.
    #[error("invalid front matter: {0}")]
    FrontMatter(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Git(#[from] GitError),
}

impl WorkspaceError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| WorkspaceError::IoError { path, source }
    }
}

pub type Result<T> = std::result::Result<T, WorkspaceError>;
