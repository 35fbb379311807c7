// working_copy.rs — Per-identity clones of the content origin.
//
// Every user gets a private, non-bare clone under the work path, keyed by
// the origin's first commit and a slug of the user's email. Opening it
// always hands back a clean tree: leftovers from a failed operation are
// discarded and remote refs are refreshed.

use std::fs;
use std::path::{Path, PathBuf};

use folio_git::{Git, GitError, Identity};

use crate::error::{Result, WorkspaceError};
use crate::paths;

/// Name of the remote every working copy tracks.
pub const ORIGIN: &str = "origin";

/// Per-activity metadata file living at the root of each activity branch.
pub const TASK_METADATA_FILENAME: &str = "_task.yml";

/// A user's private clone of the origin.
#[derive(Debug, Clone)]
pub struct WorkingCopy {
    root: PathBuf,
    git: Git,
    identity: Identity,
}

impl WorkingCopy {
    /// Return a ready working copy for `identity`, cloning on first use.
    ///
    /// An existing clone is hard-reset to its current branch tip, cleaned of
    /// untracked files and fetched. Either way the task metadata file is
    /// registered to merge with the "keep ours" driver.
    pub fn open(origin: &Path, work_path: &Path, identity: &Identity) -> Result<Self> {
        if !origin.is_dir() {
            return Err(WorkspaceError::Git(GitError::Transport {
                args: "clone".to_string(),
                stderr: format!("origin '{}' does not exist", origin.display()),
            }));
        }

        let first_commit = Git::new(origin).first_commit()?;
        let root = clone_dir(work_path, &first_commit, &identity.email);
        fs::create_dir_all(work_path).map_err(WorkspaceError::io(work_path))?;

        let git = if root.join(".git").is_dir() {
            let git = Git::new(&root).with_identity(identity.clone());
            git.reset_hard("HEAD")?;
            git.clean()?;
            git.fetch(ORIGIN)?;
            tracing::debug!("reusing working copy at {}", root.display());
            git
        } else {
            tracing::info!("cloning {} into {}", origin.display(), root.display());
            Git::clone_repo(origin, &root)?.with_identity(identity.clone())
        };

        let copy = Self {
            root,
            git,
            identity: identity.clone(),
        };
        copy.ignore_task_metadata_on_merge()?;
        Ok(copy)
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Git runner for this clone, carrying the owner's identity.
    pub fn git(&self) -> &Git {
        &self.git
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Validate a relative path and return it normalized along with its
    /// absolute location. Nothing on disk is touched.
    pub fn resolve(&self, relative: &str) -> Result<(String, PathBuf)> {
        let normalized = paths::normalize(relative)?;
        let full = self.root.join(&normalized);
        Ok((normalized, full))
    }

    /// Resolve `dir/name` and create any missing parent directories.
    pub fn make_working_file(&self, dir: &str, name: &str) -> Result<(String, PathBuf)> {
        let (relative, full) = self.resolve(&paths::join(dir, name)?)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(WorkspaceError::io(parent))?;
        }
        Ok((relative, full))
    }

    pub fn exists(&self, relative: &str) -> Result<bool> {
        Ok(self.resolve(relative)?.1.exists())
    }

    /// Make conflicting edits to the task metadata file resolve to our side.
    fn ignore_task_metadata_on_merge(&self) -> Result<()> {
        let info = self.git.git_dir()?.join("info");
        fs::create_dir_all(&info).map_err(WorkspaceError::io(&info))?;

        let attributes = info.join("attributes");
        let line = format!("{} merge=ignored", TASK_METADATA_FILENAME);
        let existing = match fs::read_to_string(&attributes) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(source) => {
                return Err(WorkspaceError::IoError {
                    path: attributes,
                    source,
                })
            }
        };
        if !existing.lines().any(|l| l.trim() == line) {
            let mut text = existing;
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&line);
            text.push('\n');
            fs::write(&attributes, text).map_err(WorkspaceError::io(&attributes))?;
        }

        self.git.config_set("merge.ignored.driver", "true")?;
        Ok(())
    }
}

/// Directory of the working copy for `email` under `work_path`.
pub fn clone_dir(work_path: &Path, first_commit: &str, email: &str) -> PathBuf {
    let short = &first_commit[..first_commit.len().min(8)];
    work_path.join(format!("repo-{}-{}", short, paths::slugify(email)))
}
