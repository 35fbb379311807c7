//! Git command runner bound to one working directory.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::commit::{self, Commit, LOG_FORMAT};
use crate::diff::{self, TreeChange};
use crate::error::{GitError, Result};
use crate::identity::Identity;
use crate::merge::{MergeOutcome, MergeStrategy};

/// A repository (bare or not) driven through the `git` executable.
///
/// Cloning a `Git` is cheap; it only holds the directory and the identity.
/// The identity is exported to each spawned process and never to the
/// current process environment, so two `Git` values with different
/// identities can be used side by side.
#[derive(Debug, Clone)]
pub struct Git {
    work_dir: PathBuf,
    identity: Option<Identity>,
}

impl Git {
    /// Create a runner for the given directory.
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            identity: None,
        }
    }

    /// Attach the author/committer used for commits, merges and tags.
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Clone `source` into `dest`. The parent of `dest` must exist.
    pub fn clone_repo(source: &Path, dest: &Path) -> Result<Self> {
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        let source = source.display().to_string();
        let dest_str = dest.display().to_string();
        Git::new(parent).remote_cmd(&["clone", "-q", &source, &dest_str])?;
        Ok(Git::new(dest))
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(&self.work_dir)
            // Stable English messages, no prompts, no editors.
            .env("LC_ALL", "C")
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_MERGE_AUTOEDIT", "no");
        if let Some(identity) = &self.identity {
            cmd.envs(identity.env());
        }
        cmd
    }

    fn output(&self, args: &[&str]) -> Result<Output> {
        tracing::debug!(dir = %self.work_dir.display(), "git {}", args.join(" "));
        self.command(args)
            .output()
            .map_err(|source| GitError::Spawn {
                dir: self.work_dir.display().to_string(),
                source,
            })
    }

    /// Run git and return untrimmed stdout, failing on a non-zero exit.
    fn git_raw(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args)?;
        if !output.status.success() {
            return Err(GitError::Command {
                args: args.join(" "),
                stderr: stderr_of(&output),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run a git command in the working directory and return trimmed stdout.
    pub fn git_cmd(&self, args: &[&str]) -> Result<String> {
        Ok(self.git_raw(args)?.trim().to_string())
    }

    /// Like [`Git::git_cmd`], but a non-zero exit yields `Ok(None)`.
    pub fn try_git_cmd(&self, args: &[&str]) -> Result<Option<String>> {
        let output = self.output(args)?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(
            String::from_utf8_lossy(&output.stdout).trim().to_string(),
        ))
    }

    /// Run a command that talks to a remote, classifying its failures.
    pub fn remote_cmd(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args)?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
        }

        let args = args.join(" ");
        let stderr = stderr_of(&output);
        if is_push_rejection(&stderr) {
            tracing::info!("git {} rejected: {}", args, stderr);
            Err(GitError::Rejected { args, stderr })
        } else if is_unreachable(&stderr) {
            tracing::warn!("git {} failed to reach remote: {}", args, stderr);
            Err(GitError::Transport { args, stderr })
        } else {
            tracing::warn!("git {} failed: {}", args, stderr);
            Err(GitError::Command { args, stderr })
        }
    }

    // ── references ──────────────────────────────────────────────

    /// Sha of `HEAD`.
    pub fn head_sha(&self) -> Result<String> {
        self.git_cmd(&["rev-parse", "HEAD"])
    }

    /// Name of the checked-out branch (`HEAD` when detached).
    ///
    /// Read from the symbolic ref so a tag of the same name cannot turn the
    /// answer into `heads/<name>`.
    pub fn current_branch(&self) -> Result<String> {
        let head = self.try_git_cmd(&["symbolic-ref", "-q", "HEAD"])?;
        Ok(match head {
            Some(full) => full
                .strip_prefix("refs/heads/")
                .unwrap_or(&full)
                .to_string(),
            None => "HEAD".to_string(),
        })
    }

    /// Resolve any revision to a commit sha, or `None` if it does not exist.
    pub fn resolve(&self, rev: &str) -> Result<Option<String>> {
        let spec = format!("{}^{{commit}}", rev);
        Ok(self
            .try_git_cmd(&["rev-parse", "--verify", "--quiet", &spec])?
            .filter(|sha| !sha.is_empty()))
    }

    pub fn local_branch(&self, name: &str) -> Result<Option<String>> {
        self.resolve(&format!("refs/heads/{}", name))
    }

    pub fn remote_branch(&self, remote: &str, name: &str) -> Result<Option<String>> {
        self.resolve(&format!("refs/remotes/{}/{}", remote, name))
    }

    /// Commit a tag points at (annotated tags are peeled).
    pub fn tag(&self, name: &str) -> Result<Option<String>> {
        self.resolve(&format!("refs/tags/{}", name))
    }

    /// Names of all local branches, without the `refs/heads/` prefix.
    pub fn branches(&self) -> Result<Vec<String>> {
        let out = self.git_cmd(&["for-each-ref", "--format=%(refname:lstrip=2)", "refs/heads"])?;
        Ok(out.lines().map(str::to_string).collect())
    }

    /// Names of all tags, without the `refs/tags/` prefix.
    pub fn tags(&self) -> Result<Vec<String>> {
        let out = self.git_cmd(&["for-each-ref", "--format=%(refname:lstrip=2)", "refs/tags"])?;
        Ok(out.lines().map(str::to_string).collect())
    }

    /// Oldest root commit reachable from `HEAD`.
    pub fn first_commit(&self) -> Result<String> {
        let out = self.git_cmd(&["rev-list", "--max-parents=0", "HEAD"])?;
        out.lines()
            .last()
            .map(str::to_string)
            .ok_or_else(|| GitError::Parse("repository has no root commit".to_string()))
    }

    pub fn merge_base(&self, a: &str, b: &str) -> Result<Option<String>> {
        Ok(self
            .try_git_cmd(&["merge-base", a, b])?
            .filter(|sha| !sha.is_empty()))
    }

    /// True when `ancestor` is reachable from `descendant`.
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        let output = self.output(&["merge-base", "--is-ancestor", ancestor, descendant])?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(GitError::Command {
                args: format!("merge-base --is-ancestor {} {}", ancestor, descendant),
                stderr: stderr_of(&output),
            }),
        }
    }

    /// Absolute path of the `.git` directory (the repository itself when bare).
    pub fn git_dir(&self) -> Result<PathBuf> {
        let dir = PathBuf::from(self.git_cmd(&["rev-parse", "--git-dir"])?);
        Ok(if dir.is_absolute() {
            dir
        } else {
            self.work_dir.join(dir)
        })
    }

    pub fn config_set(&self, key: &str, value: &str) -> Result<()> {
        self.git_cmd(&["config", key, value]).map(drop)
    }

    // ── working tree ────────────────────────────────────────────

    pub fn checkout(&self, name: &str) -> Result<()> {
        self.git_cmd(&["checkout", "-q", name]).map(drop)
    }

    /// Check out `name`, creating or resetting it to `start_point`.
    pub fn checkout_reset(&self, name: &str, start_point: &str) -> Result<()> {
        self.git_cmd(&["checkout", "-q", "-B", name, start_point])
            .map(drop)
    }

    pub fn reset_hard(&self, rev: &str) -> Result<()> {
        self.git_cmd(&["reset", "-q", "--hard", rev]).map(drop)
    }

    /// Remove untracked files and directories.
    pub fn clean(&self) -> Result<()> {
        self.git_cmd(&["clean", "-q", "-f", "-d"]).map(drop)
    }

    /// Stage `path` as it is on disk; a missing path stages its removal.
    pub fn stage(&self, path: &str) -> Result<()> {
        if self.work_dir.join(path).exists() {
            self.git_cmd(&["add", "-A", "--", path])?;
        } else {
            self.git_cmd(&["rm", "-r", "-q", "--cached", "--ignore-unmatch", "--", path])?;
        }
        Ok(())
    }

    /// Move a tracked file or directory.
    pub fn move_path(&self, old: &str, new: &str) -> Result<()> {
        self.git_cmd(&["mv", "--", old, new]).map(drop)
    }

    /// Remove a tracked path from the index and the working tree.
    pub fn remove_path(&self, path: &str) -> Result<()> {
        self.git_cmd(&["rm", "-r", "-q", "--", path]).map(drop)
    }

    /// Record a commit of whatever is staged (possibly nothing) and return its sha.
    pub fn commit(&self, message: &str) -> Result<String> {
        self.git_cmd(&["commit", "-q", "--allow-empty", "-m", message])?;
        self.head_sha()
    }

    /// Fold staged changes into `HEAD`, keeping its message and parents.
    pub fn amend(&self) -> Result<String> {
        self.git_cmd(&["commit", "-q", "--amend", "--allow-empty", "--no-edit"])?;
        self.head_sha()
    }

    /// Merge `rev` into `HEAD`.
    ///
    /// A conflicted merge leaves the working tree mid-merge; callers reset it.
    pub fn merge(&self, rev: &str, strategy: MergeStrategy, message: &str) -> Result<MergeOutcome> {
        if self.is_ancestor(rev, "HEAD")? {
            return Ok(MergeOutcome::UpToDate);
        }

        let mut args = vec!["merge", "-q"];
        args.extend_from_slice(strategy.args());
        if strategy.takes_message() {
            args.extend_from_slice(&["-m", message]);
        }
        args.push(rev);

        let output = self.output(&args)?;
        if output.status.success() {
            return Ok(MergeOutcome::Merged(self.head_sha()?));
        }

        let mut detail = stderr_of(&output);
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            detail = format!("{}\n{}", stdout.trim(), detail);
        }
        tracing::info!("merge of {} into {} failed", rev, self.work_dir.display());
        Ok(MergeOutcome::Conflicted(detail))
    }

    // ── history ─────────────────────────────────────────────────

    /// Commits listed by `git log <args>`, newest first.
    pub fn log(&self, args: &[&str]) -> Result<Vec<Commit>> {
        let mut full = vec!["log", LOG_FORMAT];
        full.extend_from_slice(args);
        commit::parse_log(&self.git_raw(&full)?)
    }

    /// The single commit `rev` resolves to.
    pub fn commit_info(&self, rev: &str) -> Result<Commit> {
        self.log(&["-1", rev, "--"])?
            .into_iter()
            .next()
            .ok_or_else(|| GitError::Parse(format!("no commit for '{}'", rev)))
    }

    /// Paths touched by a non-merge commit relative to its first parent.
    pub fn changed_paths(&self, sha: &str) -> Result<Vec<String>> {
        let out = self.git_cmd(&[
            "diff-tree",
            "--no-commit-id",
            "--name-only",
            "-r",
            "--root",
            sha,
        ])?;
        Ok(out.lines().map(str::to_string).collect())
    }

    /// Paths that differ between the trees of `from` and `to`.
    pub fn diff_trees(&self, from: &str, to: &str) -> Result<Vec<TreeChange>> {
        let raw = self.git_raw(&["diff", "--no-renames", "--name-status", "-z", from, to, "--"])?;
        diff::parse_name_status(&raw)
    }

    /// Contents of `path` at `rev`, or `None` if it is not there.
    pub fn show_file(&self, rev: &str, path: &str) -> Result<Option<String>> {
        let spec = format!("{}:{}", rev, path);
        let output = self.output(&["show", &spec])?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
    }

    // ── tags ────────────────────────────────────────────────────

    /// Create (or move) an annotated tag on `rev`.
    pub fn tag_annotated(&self, name: &str, message: &str, rev: &str) -> Result<()> {
        self.git_cmd(&["tag", "-f", "-a", name, "-m", message, rev])
            .map(drop)
    }

    /// Message of an annotated tag.
    pub fn tag_message(&self, name: &str) -> Result<Option<String>> {
        let tag_ref = format!("refs/tags/{}", name);
        let out = self.git_raw(&["for-each-ref", "--format=%(contents)", &tag_ref])?;
        Ok(if out.trim().is_empty() {
            None
        } else {
            Some(out.trim_end().to_string())
        })
    }

    // ── remotes ─────────────────────────────────────────────────

    /// Fetch all branches and tags from `remote`, pruning refs deleted there.
    pub fn fetch(&self, remote: &str) -> Result<()> {
        let heads = format!("+refs/heads/*:refs/remotes/{}/*", remote);
        self.remote_cmd(&["fetch", "-q", "--prune", remote, &heads, "+refs/tags/*:refs/tags/*"])
            .map(drop)
    }

    pub fn push(&self, remote: &str, refspecs: &[&str]) -> Result<()> {
        let mut args = vec!["push", "-q", remote];
        args.extend_from_slice(refspecs);
        self.remote_cmd(&args).map(drop)
    }

    /// Whether `remote` currently has a branch called `name`.
    pub fn remote_has_branch(&self, remote: &str, name: &str) -> Result<bool> {
        let head_ref = format!("refs/heads/{}", name);
        let out = self.remote_cmd(&["ls-remote", remote, &head_ref])?;
        Ok(!out.is_empty())
    }

    /// Delete a branch on `remote`. Returns `false` if it was already gone.
    pub fn delete_remote_branch(&self, remote: &str, name: &str) -> Result<bool> {
        let refspec = format!(":refs/heads/{}", name);
        match self.push(remote, &[&refspec]) {
            Ok(()) => {}
            Err(err) => {
                if self.remote_has_branch(remote, name)? {
                    return Err(err);
                }
                tracing::warn!("remote branch {} was already deleted", name);
                self.forget_remote_branch(remote, name)?;
                return Ok(false);
            }
        }
        self.forget_remote_branch(remote, name)?;
        Ok(true)
    }

    /// Drop the local remote-tracking ref for `remote/name`, if any.
    fn forget_remote_branch(&self, remote: &str, name: &str) -> Result<()> {
        let tracking = format!("refs/remotes/{}/{}", remote, name);
        self.try_git_cmd(&["update-ref", "-d", &tracking])?;
        Ok(())
    }

    /// Delete a local branch. Returns `false` if it did not exist.
    pub fn delete_local_branch(&self, name: &str) -> Result<bool> {
        if self.local_branch(name)?.is_none() {
            return Ok(false);
        }
        self.git_cmd(&["branch", "-q", "-D", name])?;
        Ok(true)
    }
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

fn is_push_rejection(stderr: &str) -> bool {
    stderr.contains("[rejected]")
        || stderr.contains("non-fast-forward")
        || stderr.contains("fetch first")
}

/// Failures that mean the remote could not be reached or is not a repository.
fn is_unreachable(stderr: &str) -> bool {
    const MARKERS: &[&str] = &[
        "Could not read from remote",
        "unable to access",
        "does not appear to be a git repository",
        "Could not resolve host",
        "Connection refused",
        "Connection timed out",
        "Connection reset",
        "unable to connect",
        "repository not found",
        "does not exist",
    ];
    MARKERS.iter().any(|m| stderr.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn author() -> Identity {
        Identity::new("Test User", "test@example.com")
    }

    fn init_git_repo(dir: &Path) -> Git {
        let git = Git::new(dir).with_identity(author());
        git.git_cmd(&["init", "-q"]).unwrap();
        git.git_cmd(&["symbolic-ref", "HEAD", "refs/heads/master"])
            .unwrap();
        fs::write(dir.join("README.md"), "# Test\n").unwrap();
        git.stage("README.md").unwrap();
        git.commit("Initial commit").unwrap();
        git
    }

    #[test]
    fn commit_uses_attached_identity() {
        let dir = tempdir().unwrap();
        let git = init_git_repo(dir.path());

        let other = git.clone().with_identity(Identity::from_email("erica@example.com"));
        other.commit("Empty marker").unwrap();

        let head = git.commit_info("HEAD").unwrap();
        assert_eq!(head.author_email, "erica@example.com");
        assert_eq!(head.summary(), "Empty marker");
        assert_eq!(head.parents.len(), 1);
    }

    #[test]
    fn resolve_missing_revision_is_none() {
        let dir = tempdir().unwrap();
        let git = init_git_repo(dir.path());

        assert!(git.resolve("no-such-branch").unwrap().is_none());
        assert_eq!(git.local_branch("master").unwrap(), Some(git.head_sha().unwrap()));
        assert_eq!(git.current_branch().unwrap(), "master");
    }

    #[test]
    fn stage_records_deletions() {
        let dir = tempdir().unwrap();
        let git = init_git_repo(dir.path());

        fs::remove_file(dir.path().join("README.md")).unwrap();
        git.stage("README.md").unwrap();
        let sha = git.commit("Remove readme").unwrap();

        assert!(git.show_file(&sha, "README.md").unwrap().is_none());
        assert_eq!(git.changed_paths(&sha).unwrap(), vec!["README.md"]);
    }

    #[test]
    fn three_way_merge_and_up_to_date() {
        let dir = tempdir().unwrap();
        let git = init_git_repo(dir.path());

        git.checkout_reset("side", "master").unwrap();
        fs::write(dir.path().join("side.md"), "side\n").unwrap();
        git.stage("side.md").unwrap();
        git.commit("Side work").unwrap();
        git.checkout("master").unwrap();

        let outcome = git.merge("side", MergeStrategy::ThreeWay, "Merged side").unwrap();
        assert!(matches!(outcome, MergeOutcome::Merged(_)));
        let head = git.commit_info("HEAD").unwrap();
        assert!(head.is_merge());
        assert_eq!(head.summary(), "Merged side");

        let again = git.merge("side", MergeStrategy::ThreeWay, "again").unwrap();
        assert_eq!(again, MergeOutcome::UpToDate);
    }

    #[test]
    fn conflicting_merge_is_reported_not_raised() {
        let dir = tempdir().unwrap();
        let git = init_git_repo(dir.path());

        git.checkout_reset("side", "master").unwrap();
        fs::write(dir.path().join("README.md"), "side\n").unwrap();
        git.stage("README.md").unwrap();
        git.commit("Side edit").unwrap();

        git.checkout("master").unwrap();
        fs::write(dir.path().join("README.md"), "master\n").unwrap();
        git.stage("README.md").unwrap();
        let before = git.commit("Master edit").unwrap();

        let outcome = git.merge("side", MergeStrategy::ThreeWay, "Merge").unwrap();
        assert!(outcome.is_conflicted());

        git.reset_hard(&before).unwrap();
        assert_eq!(git.head_sha().unwrap(), before);
        let changes = git.diff_trees("side", &before).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "README.md");
    }

    #[test]
    fn ours_wins_keeps_head_tree() {
        let dir = tempdir().unwrap();
        let git = init_git_repo(dir.path());

        git.checkout_reset("side", "master").unwrap();
        fs::write(dir.path().join("README.md"), "side\n").unwrap();
        git.stage("README.md").unwrap();
        git.commit("Side edit").unwrap();

        git.checkout("master").unwrap();
        fs::write(dir.path().join("README.md"), "master\n").unwrap();
        git.stage("README.md").unwrap();
        git.commit("Master edit").unwrap();

        git.checkout("side").unwrap();
        let outcome = git.merge("master", MergeStrategy::OursWins, "Clobber").unwrap();
        assert!(matches!(outcome, MergeOutcome::Merged(_)));
        assert_eq!(fs::read_to_string(dir.path().join("README.md")).unwrap(), "side\n");
        assert!(git.is_ancestor("master", "side").unwrap());
    }

    #[test]
    fn fetch_from_missing_remote_is_transport_error() {
        let dir = tempdir().unwrap();
        let git = init_git_repo(dir.path());
        let missing = dir.path().join("nowhere.git");
        git.git_cmd(&["remote", "add", "origin", &missing.display().to_string()])
            .unwrap();

        let err = git.fetch("origin").unwrap_err();
        assert!(err.is_transport(), "unexpected error: {}", err);
    }

    #[test]
    fn local_push_errors_are_not_transport_errors() {
        let dir = tempdir().unwrap();
        let git = init_git_repo(dir.path());
        let origin = dir.path().join("origin.git");
        Git::new(dir.path())
            .git_cmd(&["init", "-q", "--bare", &origin.display().to_string()])
            .unwrap();
        git.git_cmd(&["remote", "add", "origin", &origin.display().to_string()])
            .unwrap();

        let err = git
            .push("origin", &["refs/heads/missing:refs/heads/missing"])
            .unwrap_err();
        assert!(!err.is_transport(), "unexpected error: {}", err);
        assert!(matches!(err, GitError::Command { .. }));
    }

    #[test]
    fn branch_names_survive_a_tag_of_the_same_name() {
        let dir = tempdir().unwrap();
        let git = init_git_repo(dir.path());

        git.checkout_reset("abc1234", "master").unwrap();
        git.tag_annotated("abc1234", "published", "HEAD").unwrap();

        assert_eq!(git.current_branch().unwrap(), "abc1234");
        assert_eq!(git.branches().unwrap(), vec!["abc1234", "master"]);
        assert_eq!(git.tags().unwrap(), vec!["abc1234"]);
    }

    #[test]
    fn detached_head_is_reported_as_head() {
        let dir = tempdir().unwrap();
        let git = init_git_repo(dir.path());
        let head = git.head_sha().unwrap();

        git.checkout(&head).unwrap();
        assert_eq!(git.current_branch().unwrap(), "HEAD");
    }

    #[test]
    fn annotated_tag_round_trip() {
        let dir = tempdir().unwrap();
        let git = init_git_repo(dir.path());
        let head = git.head_sha().unwrap();

        git.tag_annotated("abc1234", "task_description: |-\n  Fix typo", "HEAD")
            .unwrap();

        assert_eq!(git.tag("abc1234").unwrap(), Some(head));
        let message = git.tag_message("abc1234").unwrap().unwrap();
        assert!(message.contains("Fix typo"));
        assert!(git.tag_message("missing").unwrap().is_none());
    }
}
