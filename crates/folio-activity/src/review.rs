// review.rs — Peer review derived from commit history.
//
// Review state is never stored; it is read back from the activity branch.
// Reviews are empty marker commits whose messages start with a fixed
// prefix. An approval or rejection only counts when someone other than the
// reviewer authored a commit on the branch since it forked from the default
// branch, which rules out reviewing your own work.

use std::collections::HashMap;
use std::fmt;

use folio_git::{Commit, Git};
use folio_workspace::WorkingCopy;
use serde::{Deserialize, Serialize};

use crate::activity::{classify_commit, CommitCategory};
use crate::branch::{self, head_ref};
use crate::error::{ActivityError, Result};

pub const APPROVAL_MESSAGE: &str = "Approved changes.";
pub const FEEDBACK_PREFIX: &str = "Provided feedback.";
pub const FEEDBACK_REQUEST_PREFIX: &str = "Requested feedback.";

/// Where an activity stands in review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    /// No content edits since the activity started.
    Fresh,
    /// Edited, and nobody has been asked to look yet.
    Edited,
    /// The last editor asked for a review.
    FeedbackRequested,
    /// A peer approved the latest edits.
    Endorsed,
    /// Merged into the default branch.
    Published,
}

impl ReviewState {
    /// Check if transitioning to `next` is valid.
    pub fn can_transition_to(&self, next: &ReviewState) -> bool {
        use ReviewState::*;
        matches!(
            (self, next),
            (Fresh, Edited)
                | (Edited, Edited)
                | (Edited, FeedbackRequested)
                | (FeedbackRequested, Edited)
                | (FeedbackRequested, Endorsed)
                | (Endorsed, Edited)
                | (Endorsed, Published)
        )
    }
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReviewState::Fresh => "fresh",
            ReviewState::Edited => "unreviewed edits",
            ReviewState::FeedbackRequested => "feedback requested",
            ReviewState::Endorsed => "edits endorsed",
            ReviewState::Published => "changes published",
        };
        write!(f, "{}", label)
    }
}

/// A feedback comment left on an activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub author_email: String,
    pub message: String,
}

/// Everything review-related about one activity branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewStatus {
    pub branch: String,
    pub state: ReviewState,
    pub needs_review: bool,
    pub approved: bool,
    pub rejected: bool,
    /// Email of the last content author, who may not review their own work.
    pub ineligible_reviewer: Option<String>,
    /// Newest first.
    pub feedback: Vec<Feedback>,
}

impl ReviewStatus {
    fn published(branch: &str) -> Self {
        Self {
            branch: branch.to_string(),
            state: ReviewState::Published,
            needs_review: false,
            approved: false,
            rejected: false,
            ineligible_reviewer: None,
            feedback: Vec::new(),
        }
    }

    /// Whether `email` may approve or reject right now.
    pub fn can_review(&self, email: &str) -> bool {
        self.needs_review && self.ineligible_reviewer.as_deref() != Some(email)
    }
}

/// Branch history since it forked from the default branch.
struct ReviewContext {
    base: String,
    tip: Commit,
    /// Tip, or its parent when the tip only touched task metadata.
    last_content: Commit,
    /// Commits in `base..tip`, newest first, tip included.
    commits: Vec<Commit>,
}

impl ReviewContext {
    fn load(git: &Git, default_branch: &str, branch: &str) -> Result<Self> {
        let tip_ref = head_ref(branch);
        let tip_sha = git
            .resolve(&tip_ref)?
            .ok_or_else(|| ActivityError::NotFound(format!("branch '{}'", branch)))?;
        let base = git
            .merge_base(&head_ref(default_branch), &tip_sha)?
            .ok_or_else(|| {
                ActivityError::NotFound(format!(
                    "common history of '{}' and '{}'",
                    branch, default_branch
                ))
            })?;

        let commits = git.log(&[&format!("{}..{}", base, tip_sha)])?;
        let tip = git.commit_info(&tip_sha)?;

        let last_content = match tip.first_parent() {
            Some(parent) if !tip.is_merge() && is_metadata_only(git, &tip)? => {
                git.commit_info(parent)?
            }
            _ => tip.clone(),
        };

        Ok(Self {
            base,
            tip,
            last_content,
            commits,
        })
    }

    /// True when someone other than the tip's author committed since the fork.
    fn has_other_author(&self) -> bool {
        let reviewer = &self.tip.author_email;
        self.commits
            .iter()
            .filter(|c| c.sha != self.tip.sha)
            .any(|c| &c.author_email != reviewer)
    }

    fn is_approved(&self) -> bool {
        self.tip.message.trim() == APPROVAL_MESSAGE && self.has_other_author()
    }

    fn is_rejected(&self) -> bool {
        self.tip.message.starts_with(FEEDBACK_PREFIX) && self.has_other_author()
    }

    fn needs_review(&self) -> bool {
        self.base != self.last_content.sha && !self.is_approved() && !self.is_rejected()
    }

    fn has_edits(&self) -> bool {
        self.commits
            .iter()
            .any(|c| classify_commit(c) == CommitCategory::Edit)
    }

    fn feedback(&self) -> Vec<Feedback> {
        self.commits
            .iter()
            .filter_map(|c| {
                c.message.strip_prefix(FEEDBACK_PREFIX).map(|rest| Feedback {
                    author_email: c.author_email.clone(),
                    message: rest.trim().to_string(),
                })
            })
            .collect()
    }

    fn status(&self, branch: &str) -> ReviewStatus {
        let approved = self.is_approved();
        let rejected = self.is_rejected();
        let needs_review = self.needs_review();

        let state = if approved {
            ReviewState::Endorsed
        } else if !self.has_edits() {
            ReviewState::Fresh
        } else if self.tip.message.starts_with(FEEDBACK_REQUEST_PREFIX) {
            ReviewState::FeedbackRequested
        } else {
            ReviewState::Edited
        };

        ReviewStatus {
            branch: branch.to_string(),
            state,
            needs_review,
            approved,
            rejected,
            ineligible_reviewer: needs_review.then(|| self.last_content.author_email.clone()),
            feedback: self.feedback(),
        }
    }
}

fn is_metadata_only(git: &Git, commit: &Commit) -> Result<bool> {
    let paths = git.changed_paths(&commit.sha)?;
    Ok(paths.len() == 1 && paths[0] == folio_workspace::TASK_METADATA_FILENAME)
}

/// True when the branch has content edits that nobody has reviewed yet.
/// A trailing task-metadata-only commit is ignored.
pub fn needs_peer_review(git: &Git, default_branch: &str, branch: &str) -> Result<bool> {
    Ok(ReviewContext::load(git, default_branch, branch)?.needs_review())
}

/// Email of the author who may not review the branch, if it needs review.
pub fn ineligible_peer(git: &Git, default_branch: &str, branch: &str) -> Result<Option<String>> {
    let ctx = ReviewContext::load(git, default_branch, branch)?;
    Ok(ctx
        .needs_review()
        .then(|| ctx.last_content.author_email.clone()))
}

/// True when the tip is an approval by someone other than an earlier author.
pub fn is_peer_approved(git: &Git, default_branch: &str, branch: &str) -> Result<bool> {
    Ok(ReviewContext::load(git, default_branch, branch)?.is_approved())
}

/// True when the tip is feedback from someone other than an earlier author.
pub fn is_peer_rejected(git: &Git, default_branch: &str, branch: &str) -> Result<bool> {
    Ok(ReviewContext::load(git, default_branch, branch)?.is_rejected())
}

/// All feedback left on the branch since it forked, newest first.
pub fn get_rejection_messages(
    git: &Git,
    default_branch: &str,
    branch: &str,
) -> Result<Vec<Feedback>> {
    Ok(ReviewContext::load(git, default_branch, branch)?.feedback())
}

/// Full review status. A branch that no longer exists but carries a
/// publication tag reports [`ReviewState::Published`].
pub fn get_review_state(git: &Git, default_branch: &str, branch: &str) -> Result<ReviewStatus> {
    if git.local_branch(branch)?.is_none() && git.tag(branch)?.is_some() {
        return Ok(ReviewStatus::published(branch));
    }
    Ok(ReviewContext::load(git, default_branch, branch)?.status(branch))
}

/// Approve the checked-out branch's current edits.
pub fn mark_as_reviewed(copy: &WorkingCopy) -> Result<Commit> {
    record_review(copy, APPROVAL_MESSAGE)
}

/// Leave feedback on (and thereby reject) the checked-out branch's edits.
pub fn provide_feedback(copy: &WorkingCopy, comment: &str) -> Result<Commit> {
    record_review(copy, &with_comment(FEEDBACK_PREFIX, comment))
}

/// Ask peers to review the checked-out branch.
pub fn request_feedback(copy: &WorkingCopy, comment: &str) -> Result<Commit> {
    record_review(copy, &with_comment(FEEDBACK_REQUEST_PREFIX, comment))
}

fn with_comment(prefix: &str, comment: &str) -> String {
    let comment = comment.trim();
    if comment.is_empty() {
        prefix.to_string()
    } else {
        format!("{}\n\n{}", prefix, comment)
    }
}

/// Empty marker commit, synced with the branch's own origin copy only.
fn record_review(copy: &WorkingCopy, message: &str) -> Result<Commit> {
    let base = copy.git().head_sha()?;
    let commit = branch::commit_and_publish(copy, message, &base, None)?;
    tracing::info!(author = %commit.author_email, "{}", commit.summary());
    Ok(commit)
}

/// Memoized review status, keyed by branch tip and merge-base.
///
/// Any new commit on either side changes the key, so stale entries are
/// simply never hit again.
#[derive(Debug, Default)]
pub struct ReviewCache {
    entries: HashMap<(String, String), ReviewStatus>,
}

impl ReviewCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compute(
        &mut self,
        git: &Git,
        default_branch: &str,
        branch: &str,
    ) -> Result<ReviewStatus> {
        let Some(tip) = git.local_branch(branch)? else {
            return get_review_state(git, default_branch, branch);
        };
        let base = git
            .merge_base(&head_ref(default_branch), &tip)?
            .unwrap_or_default();

        let key = (tip, base);
        if let Some(hit) = self.entries.get(&key) {
            return Ok(hit.clone());
        }
        let status = get_review_state(git, default_branch, branch)?;
        self.entries.insert(key, status.clone());
        Ok(status)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_git::Identity;
    use std::fs;
    use tempfile::tempdir;

    fn as_user(git: &Git, email: &str) -> Git {
        git.clone().with_identity(Identity::from_email(email))
    }

    fn edit(git: &Git, path: &str, text: &str) {
        fs::write(git.work_dir().join(path), text).unwrap();
        git.stage(path).unwrap();
        git.commit(&format!("Edited {}", path)).unwrap();
    }

    /// Repo with `master` and a branch `task` holding a metadata commit.
    fn repo() -> (tempfile::TempDir, Git) {
        let dir = tempdir().unwrap();
        let git = Git::new(dir.path()).with_identity(Identity::from_email("seed@example.com"));
        git.git_cmd(&["init", "-q"]).unwrap();
        git.git_cmd(&["symbolic-ref", "HEAD", "refs/heads/master"])
            .unwrap();
        edit(&git, "index.md", "home");
        git.checkout_reset("task", "master").unwrap();

        let erica = as_user(&git, "erica@example.com");
        fs::write(dir.path().join("_task.yml"), "task_description: x\n").unwrap();
        erica.stage("_task.yml").unwrap();
        erica.commit("The \"x\" activity was started").unwrap();
        (dir, git)
    }

    #[test]
    fn fresh_branch_needs_no_review() {
        let (_dir, git) = repo();
        let status = get_review_state(&git, "master", "task").unwrap();
        assert_eq!(status.state, ReviewState::Fresh);
        assert!(!status.needs_review);
        assert_eq!(status.ineligible_reviewer, None);
    }

    #[test]
    fn edits_need_review_by_someone_else() {
        let (_dir, git) = repo();
        edit(&as_user(&git, "erica@example.com"), "index.md", "edited");

        assert!(needs_peer_review(&git, "master", "task").unwrap());
        assert_eq!(
            ineligible_peer(&git, "master", "task").unwrap().as_deref(),
            Some("erica@example.com")
        );
        let status = get_review_state(&git, "master", "task").unwrap();
        assert_eq!(status.state, ReviewState::Edited);
        assert!(status.can_review("frances@example.com"));
        assert!(!status.can_review("erica@example.com"));
    }

    #[test]
    fn trailing_metadata_commit_is_ignored() {
        let (dir, git) = repo();
        let erica = as_user(&git, "erica@example.com");
        edit(&erica, "index.md", "edited");
        fs::write(dir.path().join("_task.yml"), "task_description: y\n").unwrap();
        erica.stage("_task.yml").unwrap();
        erica.commit("The \"y\" activity was updated").unwrap();

        assert!(needs_peer_review(&git, "master", "task").unwrap());
    }

    #[test]
    fn peer_approval_endorses() {
        let (_dir, git) = repo();
        edit(&as_user(&git, "erica@example.com"), "index.md", "edited");
        as_user(&git, "frances@example.com")
            .commit(APPROVAL_MESSAGE)
            .unwrap();

        assert!(is_peer_approved(&git, "master", "task").unwrap());
        assert!(!needs_peer_review(&git, "master", "task").unwrap());
        assert_eq!(
            get_review_state(&git, "master", "task").unwrap().state,
            ReviewState::Endorsed
        );
    }

    #[test]
    fn self_approval_does_not_count() {
        let (_dir, git) = repo();
        let erica = as_user(&git, "erica@example.com");
        edit(&erica, "index.md", "edited");
        erica.commit(APPROVAL_MESSAGE).unwrap();

        assert!(!is_peer_approved(&git, "master", "task").unwrap());
        assert!(needs_peer_review(&git, "master", "task").unwrap());
    }

    #[test]
    fn feedback_rejects_and_is_collected_newest_first() {
        let (_dir, git) = repo();
        let erica = as_user(&git, "erica@example.com");
        let frances = as_user(&git, "frances@example.com");
        edit(&erica, "index.md", "edited");
        frances
            .commit(&format!("{}\n\nToo long.", FEEDBACK_PREFIX))
            .unwrap();
        edit(&erica, "index.md", "shorter");
        frances
            .commit(&format!("{}\n\nTypo in line 2.", FEEDBACK_PREFIX))
            .unwrap();

        assert!(is_peer_rejected(&git, "master", "task").unwrap());
        assert!(!needs_peer_review(&git, "master", "task").unwrap());
        let feedback = get_rejection_messages(&git, "master", "task").unwrap();
        assert_eq!(feedback.len(), 2);
        assert_eq!(feedback[0].message, "Typo in line 2.");
        assert_eq!(feedback[1].message, "Too long.");
        assert_eq!(feedback[0].author_email, "frances@example.com");
    }

    #[test]
    fn feedback_request_state() {
        let (_dir, git) = repo();
        let erica = as_user(&git, "erica@example.com");
        edit(&erica, "index.md", "edited");
        erica.commit(FEEDBACK_REQUEST_PREFIX).unwrap();

        let status = get_review_state(&git, "master", "task").unwrap();
        assert_eq!(status.state, ReviewState::FeedbackRequested);
        assert!(status.needs_review);
        assert_eq!(status.ineligible_reviewer.as_deref(), Some("erica@example.com"));
    }

    #[test]
    fn published_tag_reports_published() {
        let (_dir, git) = repo();
        git.checkout("master").unwrap();
        git.tag_annotated("task", "task_description: |-\n  x", "refs/heads/task")
            .unwrap();
        git.delete_local_branch("task").unwrap();

        assert_eq!(
            get_review_state(&git, "master", "task").unwrap().state,
            ReviewState::Published
        );
        assert!(matches!(
            get_review_state(&git, "master", "nope"),
            Err(ActivityError::NotFound(_))
        ));
    }

    #[test]
    fn cache_reuses_status_until_tip_moves() {
        let (_dir, git) = repo();
        let mut cache = ReviewCache::new();

        let first = cache.get_or_compute(&git, "master", "task").unwrap();
        let again = cache.get_or_compute(&git, "master", "task").unwrap();
        assert_eq!(first, again);
        assert_eq!(cache.len(), 1);

        edit(&as_user(&git, "erica@example.com"), "index.md", "edited");
        let moved = cache.get_or_compute(&git, "master", "task").unwrap();
        assert_eq!(moved.state, ReviewState::Edited);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn transitions() {
        assert!(ReviewState::Fresh.can_transition_to(&ReviewState::Edited));
        assert!(ReviewState::FeedbackRequested.can_transition_to(&ReviewState::Endorsed));
        assert!(ReviewState::Endorsed.can_transition_to(&ReviewState::Published));
        assert!(!ReviewState::Edited.can_transition_to(&ReviewState::Published));
        assert!(!ReviewState::Published.can_transition_to(&ReviewState::Edited));
        assert_eq!(ReviewState::Endorsed.to_string(), "edits endorsed");
    }
}
