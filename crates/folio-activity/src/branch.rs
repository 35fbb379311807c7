// branch.rs — Activity branch lifecycle: start, save, move, complete,
// abandon and clobber.
//
// All functions act on a WorkingCopy and leave the origin in a consistent
// state: local commits are merged with the origin's copy of the branch (and
// usually the default branch) before they are pushed, and a failed merge
// resets the working copy instead of pushing anything half-merged.
//
// Revisions are always spelled as full refs because publication tags share
// their names with the branches they publish.

use std::fs;

use folio_git::{Commit, Git, MergeOutcome, MergeStrategy};
use folio_workspace::{paths, WorkingCopy, ORIGIN, TASK_METADATA_FILENAME};
use serde::{Deserialize, Serialize};

use crate::conflict::MergeConflict;
use crate::error::{ActivityError, Result};
use crate::task::{self, TaskMetadata, ACTIVITY_DELETED_MESSAGE};

/// A local branch and the commit it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub sha: String,
}

pub(crate) fn head_ref(name: &str) -> String {
    format!("refs/heads/{}", name)
}

pub(crate) fn origin_ref(name: &str) -> String {
    format!("refs/remotes/{}/{}", ORIGIN, name)
}

fn push_refspec(name: &str) -> String {
    format!("refs/heads/{0}:refs/heads/{0}", name)
}

/// Where a branch called `name` should start: its origin tip if the origin
/// has it, else the origin's default branch, else the local default branch.
pub fn branch_start_point(git: &Git, default_branch: &str, name: &str) -> Result<String> {
    if let Some(sha) = git.remote_branch(ORIGIN, name)? {
        return Ok(sha);
    }
    if let Some(sha) = git.remote_branch(ORIGIN, default_branch)? {
        return Ok(sha);
    }
    git.local_branch(default_branch)?
        .ok_or_else(|| ActivityError::NotFound(format!("default branch '{}'", default_branch)))
}

/// Find an activity branch without creating one.
///
/// Fetches first. A local branch already at its start point is returned
/// as is; a branch the origin has is brought up to date locally. The
/// checked-out branch is unchanged afterwards.
pub fn get_existing_branch(
    copy: &WorkingCopy,
    default_branch: &str,
    name: &str,
) -> Result<Option<Branch>> {
    let git = copy.git();
    git.fetch(ORIGIN)?;
    let start = branch_start_point(git, default_branch, name)?;

    if let Some(sha) = git.local_branch(name)? {
        if sha == start {
            return Ok(Some(Branch {
                name: name.to_string(),
                sha,
            }));
        }
    }

    if git.remote_branch(ORIGIN, name)?.is_none() {
        return Ok(None);
    }

    let previous = git.current_branch()?;
    if git.local_branch(name)?.is_some() {
        git.checkout(name)?;
    } else {
        git.checkout_reset(name, &origin_ref(name))?;
    }
    merge_remote(git, name)?;
    let sha = git.head_sha()?;
    return_to(git, &previous, name)?;

    Ok(Some(Branch {
        name: name.to_string(),
        sha,
    }))
}

/// Get or create the activity branch `name`, recording `metadata` on it.
///
/// A new branch starts at [`branch_start_point`], is pushed, and gets a
/// first commit holding the task metadata. If another working copy pushes
/// the same name first, that branch is adopted instead.
pub fn start_branch(
    copy: &WorkingCopy,
    default_branch: &str,
    name: &str,
    metadata: &TaskMetadata,
) -> Result<Branch> {
    if let Some(existing) = get_existing_branch(copy, default_branch, name)? {
        return Ok(existing);
    }

    let git = copy.git();
    let start = branch_start_point(git, default_branch, name)?;
    let previous = git.current_branch()?;
    git.checkout_reset(name, &start)?;

    match git.push(ORIGIN, &[&push_refspec(name)]) {
        Ok(()) => {}
        Err(err) if err.is_rejected() => {
            tracing::info!("branch {} was created elsewhere first; adopting it", name);
            return_to(git, &previous, name)?;
            return get_existing_branch(copy, default_branch, name)?
                .ok_or_else(|| ActivityError::NotFound(format!("branch '{}'", name)));
        }
        Err(err) => {
            return_to(git, &previous, name)?;
            return Err(err.into());
        }
    }

    tracing::info!(branch = %name, start = %start, "started activity branch");
    task::save_task_metadata(copy, default_branch, metadata)?;

    let sha = git.head_sha()?;
    return_to(git, &previous, name)?;
    Ok(Branch {
        name: name.to_string(),
        sha,
    })
}

/// Commit `path` on the checked-out branch, sync with the origin and push.
///
/// `base_sha` must be the commit the caller's edit was made against; if the
/// working copy has moved on, nothing is committed. A present path is
/// staged as is, an absent one as a deletion.
pub fn save_working_file(
    copy: &WorkingCopy,
    path: &str,
    message: &str,
    base_sha: &str,
    default_branch: &str,
) -> Result<Commit> {
    check_base(copy.git(), base_sha)?;
    let (path, _) = copy.resolve(path)?;
    copy.git().stage(&path)?;
    commit_and_publish(copy, message, base_sha, Some(default_branch))
}

/// Move a file or directory on the checked-out branch, then sync and push.
pub fn move_existing_file(
    copy: &WorkingCopy,
    old_path: &str,
    new_path: &str,
    base_sha: &str,
    default_branch: &str,
) -> Result<Commit> {
    let git = copy.git();
    check_base(git, base_sha)?;

    let (old, old_full) = copy.resolve(old_path)?;
    let (new, new_full) = copy.resolve(new_path)?;
    if !old_full.exists() {
        return Err(ActivityError::NotFound(old));
    }
    if old_full.is_dir() && paths::is_within(&new, &old) {
        return Err(ActivityError::InvalidPath {
            path: new,
            reason: "cannot move a directory inside itself".to_string(),
        });
    }
    if new_full.exists() {
        return Err(ActivityError::InvalidPath {
            path: new,
            reason: "destination already exists".to_string(),
        });
    }
    if let Some(parent) = new_full.parent() {
        fs::create_dir_all(parent).map_err(ActivityError::io(parent))?;
    }

    git.move_path(&old, &new)?;
    let message = format!("Renamed \"{}\" to \"{}\"", old, new);
    commit_and_publish(copy, &message, base_sha, Some(default_branch))
}

/// Merge an activity into the default branch and publish it.
///
/// The task metadata file is dropped from the merge commit, a publication
/// tag is pushed, and the branch is deleted locally and at the origin. On a
/// conflict the default branch is reset, the activity branch is checked
/// out, and the conflict names the origin's default tip and the activity tip.
pub fn complete_branch(copy: &WorkingCopy, default_branch: &str, name: &str) -> Result<Commit> {
    let git = copy.git();
    let branch = get_existing_branch(copy, default_branch, name)?
        .ok_or_else(|| ActivityError::NotFound(format!("branch '{}'", name)))?;
    let metadata = task::load_task_metadata(git, &head_ref(name))?;

    let fields = metadata
        .as_ref()
        .map(|m| (m.author_email(), m.description(), m.beneficiary()));
    let message = match fields {
        Some((Some(email), Some(description), Some(beneficiary))) => format!(
            "Merged work by {} for the task {} (for {}) from branch {}",
            email, description, beneficiary, name
        ),
        _ => format!("Merged work from \"{}\"", name),
    };

    checkout_default(git, default_branch)?;
    merge_remote(git, default_branch)?;
    let pre_merge = git.head_sha()?;

    let outcome = git.merge(&head_ref(name), MergeStrategy::ThreeWay, &message)?;
    if let MergeOutcome::Conflicted(detail) = &outcome {
        tracing::info!("completing {} conflicted: {}", name, detail);
        git.reset_hard(&pre_merge)?;
        git.checkout(name)?;
        let remote = git
            .remote_branch(ORIGIN, default_branch)?
            .unwrap_or(pre_merge);
        return Err(MergeConflict::new(git, remote, branch.sha).into());
    }

    strip_task_metadata(copy, metadata.as_ref(), matches!(outcome, MergeOutcome::Merged(_)))?;
    publish(copy, default_branch, name, metadata.as_ref())?;
    tracing::info!(branch = %name, "completed activity");
    Ok(git.commit_info("HEAD")?)
}

/// Give up on an activity: record an empty marker commit on the default
/// branch and delete the branch. Deleting an already-missing branch is fine.
pub fn abandon_branch(copy: &WorkingCopy, default_branch: &str, name: &str) -> Result<Commit> {
    let git = copy.git();
    git.fetch(ORIGIN)?;

    let metadata = match task::load_task_metadata(git, &head_ref(name))? {
        Some(meta) => Some(meta),
        None => task::load_task_metadata(git, &origin_ref(name))?,
    };
    let mut message = format!("Abandoned work from \"{}\"", name);
    if let Some(description) = metadata.as_ref().and_then(TaskMetadata::description) {
        message.push_str(&format!("\n\nThe \"{}\" activity was abandoned", description));
    }

    checkout_default(git, default_branch)?;
    merge_remote(git, default_branch)?;
    git.commit(&message)?;
    push_branch(git, default_branch)?;

    git.delete_remote_branch(ORIGIN, name)?;
    git.delete_local_branch(name)?;
    tracing::info!(branch = %name, "abandoned activity");
    Ok(git.commit_info("HEAD")?)
}

/// Make an activity's tree the new default branch, discarding whatever the
/// default branch changed since, then publish and delete the activity.
pub fn clobber_default_branch(
    copy: &WorkingCopy,
    default_branch: &str,
    name: &str,
) -> Result<Commit> {
    let git = copy.git();
    get_existing_branch(copy, default_branch, name)?
        .ok_or_else(|| ActivityError::NotFound(format!("branch '{}'", name)))?;
    let metadata = task::load_task_metadata(git, &head_ref(name))?;

    git.checkout(name)?;
    let pre_merge = git.head_sha()?;
    let remote_default = git
        .remote_branch(ORIGIN, default_branch)?
        .ok_or_else(|| ActivityError::NotFound(format!("branch '{}' at origin", default_branch)))?;
    let message = format!("Clobbered with work from \"{}\"", name);

    let outcome = git.merge(&remote_default, MergeStrategy::OursWins, &message)?;
    if outcome.is_conflicted() {
        git.reset_hard(&pre_merge)?;
        return Err(MergeConflict::new(git, remote_default, pre_merge).into());
    }

    checkout_default(git, default_branch)?;
    merge_remote(git, default_branch)?;
    if git
        .merge(&head_ref(name), MergeStrategy::FastForwardOnly, "")?
        .is_conflicted()
    {
        let default_sha = git.head_sha()?;
        let branch_sha = git.local_branch(name)?.unwrap_or(pre_merge);
        return Err(MergeConflict::new(git, default_sha, branch_sha).into());
    }

    strip_task_metadata(copy, metadata.as_ref(), matches!(outcome, MergeOutcome::Merged(_)))?;
    publish(copy, default_branch, name, metadata.as_ref())?;
    tracing::info!(branch = %name, "clobbered default branch");
    Ok(git.commit_info("HEAD")?)
}

/// Merge the origin's copies of the checked-out branch and (optionally) the
/// default branch into it.
pub fn sync_with_origin(git: &Git, branch: &str, default_branch: Option<&str>) -> Result<()> {
    git.fetch(ORIGIN)?;
    merge_remote(git, branch)?;
    if let Some(default_branch) = default_branch.filter(|d| *d != branch) {
        merge_remote(git, default_branch)?;
    }
    Ok(())
}

/// Commit whatever is staged, sync, push. Any failure after the commit
/// resets the branch to `base_sha` so nothing half-done remains.
pub(crate) fn commit_and_publish(
    copy: &WorkingCopy,
    message: &str,
    base_sha: &str,
    default_branch: Option<&str>,
) -> Result<Commit> {
    let git = copy.git();
    let branch = git.current_branch()?;
    git.commit(message)?;

    let published =
        sync_with_origin(git, &branch, default_branch).and_then(|()| push_branch(git, &branch));
    if let Err(err) = published {
        tracing::warn!("save on {} failed, resetting to {}: {}", branch, base_sha, err);
        git.reset_hard(base_sha)?;
        return Err(err);
    }

    Ok(git.commit_info("HEAD")?)
}

pub(crate) fn check_base(git: &Git, base_sha: &str) -> Result<()> {
    let actual = git.head_sha()?;
    if actual != base_sha {
        return Err(ActivityError::StaleBase {
            expected: base_sha.to_string(),
            actual,
        });
    }
    Ok(())
}

/// Merge `origin/<name>` into `HEAD`, fast-forwarding when possible.
/// A failed merge is undone and reported as a conflict.
fn merge_remote(git: &Git, name: &str) -> Result<()> {
    let Some(remote) = git.remote_branch(ORIGIN, name)? else {
        return Ok(());
    };
    let pre_merge = git.head_sha()?;

    let outcome = if git.is_ancestor(&pre_merge, &remote)? {
        git.merge(&remote, MergeStrategy::FastForwardOnly, "")?
    } else {
        let message = format!("Merged work from \"{}\"", name);
        git.merge(&remote, MergeStrategy::ThreeWay, &message)?
    };

    if outcome.is_conflicted() {
        git.reset_hard(&pre_merge)?;
        return Err(MergeConflict::new(git, remote, pre_merge).into());
    }
    Ok(())
}

/// Push a branch; if the origin moved on meanwhile, merge its tip and retry once.
fn push_branch(git: &Git, name: &str) -> Result<()> {
    let refspec = push_refspec(name);
    match git.push(ORIGIN, &[&refspec]) {
        Err(err) if err.is_rejected() => {
            tracing::info!("push of {} was rejected; merging origin and retrying", name);
            git.fetch(ORIGIN)?;
            merge_remote(git, name)?;
            Ok(git.push(ORIGIN, &[&refspec])?)
        }
        other => Ok(other?),
    }
}

fn checkout_default(git: &Git, default_branch: &str) -> Result<()> {
    if git.local_branch(default_branch)?.is_some() {
        git.checkout(default_branch)?;
    } else if git.remote_branch(ORIGIN, default_branch)?.is_some() {
        git.checkout_reset(default_branch, &origin_ref(default_branch))?;
    } else {
        return Err(ActivityError::NotFound(format!("default branch '{}'", default_branch)));
    }
    Ok(())
}

/// Check out `previous` again unless it is the branch just worked on.
fn return_to(git: &Git, previous: &str, current: &str) -> Result<()> {
    if previous != current && previous != "HEAD" {
        git.checkout(previous)?;
    }
    Ok(())
}

/// Drop the task metadata file from the default branch, folding the removal
/// into the merge commit just made when there is one.
fn strip_task_metadata(
    copy: &WorkingCopy,
    metadata: Option<&TaskMetadata>,
    fold_into_head: bool,
) -> Result<()> {
    if !copy.path().join(TASK_METADATA_FILENAME).exists() {
        return Ok(());
    }
    let git = copy.git();
    git.remove_path(TASK_METADATA_FILENAME)?;
    if fold_into_head {
        git.amend()?;
    } else {
        let description = metadata.and_then(TaskMetadata::description).unwrap_or_default();
        git.commit(&format!(
            "The \"{}\" {}\n\nDeleted task metadata file \"{}\"",
            description, ACTIVITY_DELETED_MESSAGE, TASK_METADATA_FILENAME
        ))?;
    }
    Ok(())
}

/// Push the default branch, tag its tip and push the tag, delete the activity.
fn publish(
    copy: &WorkingCopy,
    default_branch: &str,
    name: &str,
    metadata: Option<&TaskMetadata>,
) -> Result<()> {
    let git = copy.git();
    let tag_message = match metadata {
        Some(meta) => meta.render(),
        None => format!("Published work from \"{}\"", name),
    };
    // Fetching prunes unpushed local tags, so tag only once the push is done.
    push_branch(git, default_branch)?;
    git.tag_annotated(name, &tag_message, "HEAD")?;
    git.push(ORIGIN, &[&format!("+refs/tags/{0}:refs/tags/{0}", name)])?;
    git.delete_remote_branch(ORIGIN, name)?;
    git.delete_local_branch(name)?;
    Ok(())
}
