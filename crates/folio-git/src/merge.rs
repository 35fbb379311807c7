// merge.rs — Merge strategies and outcomes.

use serde::{Deserialize, Serialize};

/// How [`crate::Git::merge`] combines another revision into `HEAD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Move `HEAD` forward only; never create a merge commit.
    FastForwardOnly,
    /// Always record a merge commit (`--no-ff`), merging content three ways.
    ThreeWay,
    /// Record a merge commit whose tree is exactly the current `HEAD` tree.
    /// Run from the other side, this makes the other side win.
    OursWins,
}

impl MergeStrategy {
    pub(crate) fn args(self) -> &'static [&'static str] {
        match self {
            MergeStrategy::FastForwardOnly => &["--ff-only"],
            MergeStrategy::ThreeWay => &["--no-ff"],
            MergeStrategy::OursWins => &["--no-ff", "-s", "ours"],
        }
    }

    pub(crate) fn takes_message(self) -> bool {
        !matches!(self, MergeStrategy::FastForwardOnly)
    }
}

/// Result of a merge attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// `HEAD` already contained the revision; nothing was done.
    UpToDate,
    /// The merge succeeded; `HEAD` is now this commit.
    Merged(String),
    /// git refused or failed the merge. The working tree may be mid-merge
    /// and must be reset by the caller.
    Conflicted(String),
}

impl MergeOutcome {
    pub fn is_conflicted(&self) -> bool {
        matches!(self, MergeOutcome::Conflicted(_))
    }
}
