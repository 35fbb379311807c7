//! # folio-git
//!
//! A small typed layer over the `git` executable. Every folio crate talks
//! to repositories through [`Git`], which runs one git process per call in a
//! fixed working directory and, when an [`Identity`] is attached, exports it
//! to that process only.
//!
//! Failures are classified so callers can tell a broken remote
//! ([`GitError::Transport`]) from a refused push ([`GitError::Rejected`])
//! or a plain command failure.

pub mod commit;
pub mod diff;
pub mod error;
pub mod git;
pub mod identity;
pub mod merge;

pub use commit::Commit;
pub use diff::{ChangeKind, TreeChange};
pub use error::{GitError, Result};
pub use git::Git;
pub use identity::Identity;
pub use merge::{MergeOutcome, MergeStrategy};
