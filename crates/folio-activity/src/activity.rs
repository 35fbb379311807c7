// activity.rs — Listing activities and reading their history.
//
// An activity is a branch other than the default branch that shares
// history with it. Published activities survive as tags after their
// branch is deleted.

use std::fmt;

use chrono::{DateTime, Utc};
use folio_git::{Commit, Git};
use serde::{Deserialize, Serialize};

use crate::branch::head_ref;
use crate::error::{ActivityError, Result};
use crate::review::{
    ReviewCache, ReviewStatus, APPROVAL_MESSAGE, FEEDBACK_PREFIX, FEEDBACK_REQUEST_PREFIX,
};
use crate::task::{
    load_task_metadata, TaskMetadata, ACTIVITY_DELETED_MESSAGE, ACTIVITY_STARTED_MESSAGE,
    ACTIVITY_UPDATED_MESSAGE,
};

/// What kind of change a commit on an activity branch represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitCategory {
    /// Activity bookkeeping: started, updated, deleted.
    Info,
    /// Content change.
    Edit,
    /// Approval or request for feedback.
    Review,
    /// Feedback left by a reviewer.
    Comment,
    /// Merge brought in from the origin.
    Sync,
}

pub fn classify_commit(commit: &Commit) -> CommitCategory {
    let summary = commit.summary();
    let message = commit.message.trim();
    if [ACTIVITY_STARTED_MESSAGE, ACTIVITY_UPDATED_MESSAGE, ACTIVITY_DELETED_MESSAGE]
        .iter()
        .any(|marker| summary.contains(marker))
    {
        CommitCategory::Info
    } else if message == APPROVAL_MESSAGE || message.starts_with(FEEDBACK_REQUEST_PREFIX) {
        CommitCategory::Review
    } else if message.starts_with(FEEDBACK_PREFIX) {
        CommitCategory::Comment
    } else if commit.is_merge() {
        CommitCategory::Sync
    } else {
        CommitCategory::Edit
    }
}

/// Whether an activity is in progress, published or gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkingState {
    Active,
    Published,
    Deleted,
}

impl fmt::Display for WorkingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkingState::Active => write!(f, "active"),
            WorkingState::Published => write!(f, "published"),
            WorkingState::Deleted => write!(f, "deleted"),
        }
    }
}

pub fn working_state(git: &Git, branch: &str) -> Result<WorkingState> {
    if git.local_branch(branch)?.is_some() {
        Ok(WorkingState::Active)
    } else if git.tag(branch)?.is_some() {
        Ok(WorkingState::Published)
    } else {
        Ok(WorkingState::Deleted)
    }
}

/// A commit as shown in ahead/behind counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub sha: String,
    pub timestamp: DateTime<Utc>,
    pub author_email: String,
}

impl From<&Commit> for LogEntry {
    fn from(commit: &Commit) -> Self {
        Self {
            sha: commit.sha.clone(),
            timestamp: commit.timestamp,
            author_email: commit.author_email.clone(),
        }
    }
}

/// One commit of an activity's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub sha: String,
    pub author_email: String,
    pub timestamp: DateTime<Utc>,
    pub category: CommitCategory,
    pub summary: String,
}

/// Commits made on `branch` since it forked from the default branch, newest first.
pub fn activity_history(
    git: &Git,
    default_branch: &str,
    branch: &str,
) -> Result<Vec<HistoryEntry>> {
    let tip = git
        .local_branch(branch)?
        .ok_or_else(|| ActivityError::NotFound(format!("branch '{}'", branch)))?;
    let base = git
        .merge_base(&head_ref(default_branch), &tip)?
        .ok_or_else(|| ActivityError::NotFound(format!("common history of '{}'", branch)))?;

    Ok(git
        .log(&[&format!("{}..{}", base, tip)])?
        .iter()
        .map(|c| HistoryEntry {
            sha: c.sha.clone(),
            author_email: c.author_email.clone(),
            timestamp: c.timestamp,
            category: classify_commit(c),
            summary: c.summary().to_string(),
        })
        .collect())
}

/// Summary of one in-progress activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub name: String,
    pub metadata: TaskMetadata,
    pub review: ReviewStatus,
    /// Commits on the activity not yet on the default branch, newest first.
    pub ahead: Vec<LogEntry>,
    /// Commits on the default branch not yet on the activity, newest first.
    pub behind: Vec<LogEntry>,
    pub date_created: Option<DateTime<Utc>>,
    pub date_updated: Option<DateTime<Utc>>,
    pub last_editor: Option<String>,
}

/// Every activity branch in `git`, most recently updated first. Branches
/// with no history in common with the default branch are skipped.
pub fn list_activities(
    git: &Git,
    default_branch: &str,
    cache: &mut ReviewCache,
) -> Result<Vec<ActivitySummary>> {
    let default_ref = head_ref(default_branch);
    let mut activities = Vec::new();

    for name in git.branches()? {
        if name == default_branch {
            continue;
        }
        let branch_ref = head_ref(&name);
        let Some(base) = git.merge_base(&default_ref, &branch_ref)? else {
            tracing::debug!("skipping {}: no history in common with {}", name, default_branch);
            continue;
        };

        let ahead_commits = git.log(&[&format!("{}..{}", base, branch_ref)])?;
        let behind_commits = git.log(&[&format!("{}..{}", base, default_ref)])?;
        let metadata = load_task_metadata(git, &branch_ref)?.unwrap_or_default();
        let review = cache.get_or_compute(git, default_branch, &name)?;
        let last_editor = ahead_commits
            .iter()
            .find(|c| classify_commit(c) == CommitCategory::Edit)
            .map(|c| c.author_email.clone());

        activities.push(ActivitySummary {
            date_created: ahead_commits.last().map(|c| c.timestamp),
            date_updated: ahead_commits.first().map(|c| c.timestamp),
            ahead: ahead_commits.iter().map(LogEntry::from).collect(),
            behind: behind_commits.iter().map(LogEntry::from).collect(),
            name,
            metadata,
            review,
            last_editor,
        });
    }

    activities.sort_by(|a, b| b.date_updated.cmp(&a.date_updated));
    Ok(activities)
}

/// An activity that was merged into the default branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedActivity {
    pub name: String,
    pub sha: String,
    pub metadata: TaskMetadata,
}

/// Activities recorded by publication tags. Tags whose message is not task
/// metadata (release tags and the like) are ignored.
pub fn list_published_activities(git: &Git) -> Result<Vec<PublishedActivity>> {
    let mut published = Vec::new();
    for name in git.tags()? {
        let (Some(sha), Some(message)) = (git.tag(&name)?, git.tag_message(&name)?) else {
            continue;
        };
        let Ok(metadata) = TaskMetadata::parse(&message) else {
            continue;
        };
        if metadata.description().is_none() {
            continue;
        }
        published.push(PublishedActivity { name, sha, metadata });
    }
    Ok(published)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(message: &str, parents: usize) -> Commit {
        Commit {
            sha: "abc".to_string(),
            parents: (0..parents).map(|i| format!("p{}", i)).collect(),
            author_name: "Erica".to_string(),
            author_email: "erica@example.com".to_string(),
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            message: message.to_string(),
        }
    }

    #[test]
    fn classifies_commits() {
        let cases = [
            (
                "The \"Fix\" activity was started\n\nCreated task metadata file",
                1,
                CommitCategory::Info,
            ),
            ("The \"Fix\" activity was updated", 1, CommitCategory::Info),
            ("Approved changes.", 1, CommitCategory::Review),
            ("Requested feedback.\n\nPlease look", 1, CommitCategory::Review),
            ("Provided feedback.\n\nNo.", 1, CommitCategory::Comment),
            ("Merged work from \"master\"", 2, CommitCategory::Sync),
            ("Saved changes to \"index.md\"", 1, CommitCategory::Edit),
        ];
        for (message, parents, expected) in cases {
            assert_eq!(classify_commit(&commit(message, parents)), expected, "{}", message);
        }
    }

    #[test]
    fn working_state_labels() {
        assert_eq!(WorkingState::Published.to_string(), "published");
        assert_eq!(
            serde_json::to_string(&WorkingState::Active).unwrap(),
            "\"active\""
        );
    }
}
