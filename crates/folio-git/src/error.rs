// error.rs — Error types for git plumbing.

use thiserror::Error;

/// Errors produced while running git.
#[derive(Debug, Error)]
pub enum GitError {
    /// The git executable could not be started at all.
    #[error("failed to run git in {dir}: {source}")]
    Spawn {
        dir: String,
        source: std::io::Error,
    },

    /// git ran and exited non-zero.
    #[error("git {args} failed: {stderr}")]
    Command { args: String, stderr: String },

    /// A command talking to a remote (clone, fetch, push, ls-remote) failed.
    #[error("git {args} could not reach the remote: {stderr}")]
    Transport { args: String, stderr: String },

    /// A push was refused because the remote branch moved on.
    #[error("git {args} was rejected by the remote: {stderr}")]
    Rejected { args: String, stderr: String },

    /// git output did not have the expected shape.
    #[error("unexpected git output: {0}")]
    Parse(String),
}

impl GitError {
    /// True for failures caused by the remote being unreachable or unusable.
    pub fn is_transport(&self) -> bool {
        matches!(self, GitError::Transport { .. })
    }

    /// True when a push lost a race against another writer.
    pub fn is_rejected(&self) -> bool {
        matches!(self, GitError::Rejected { .. })
    }
}

pub type Result<T> = std::result::Result<T, GitError>;
