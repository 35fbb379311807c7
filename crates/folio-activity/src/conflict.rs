// conflict.rs — Merge conflicts and the files they involve.
//
// A conflict records two commits: the remote tip that could not be merged
// and the local commit as it stood just before the merge. The affected
// files are recomputed from those commits each time they are asked for, so
// a conflict stays meaningful after the working tree has been reset.

use std::fmt;

use folio_git::{ChangeKind, Git};
use folio_workspace::TASK_METADATA_FILENAME;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Files that differ between the remote and local sides of a conflict,
/// partitioned from the local side's point of view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictFiles {
    /// Present locally, absent remotely.
    pub new: Vec<String>,
    /// Present remotely, absent locally.
    pub gone: Vec<String>,
    /// Present on both sides with different contents.
    pub changed: Vec<String>,
}

impl ConflictFiles {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.gone.is_empty() && self.changed.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.new.len() + self.gone.len() + self.changed.len()
    }

    /// Every affected path, sorted.
    pub fn all(&self) -> Vec<&str> {
        let mut all: Vec<&str> = self
            .new
            .iter()
            .chain(&self.gone)
            .chain(&self.changed)
            .map(String::as_str)
            .collect();
        all.sort_unstable();
        all
    }

    /// Human-readable one-liner for error messages.
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "No files were affected.".to_string();
        }

        let mut parts = Vec::new();
        for (label, files) in [
            ("Changed", &self.changed),
            ("New", &self.new),
            ("Gone", &self.gone),
        ] {
            if !files.is_empty() {
                parts.push(format!("{}: {}", label, files.join(", ")));
            }
        }
        format!("Affected files: {}", parts.join("; "))
    }
}

/// Two commits that could not be merged.
#[derive(Debug, Clone)]
pub struct MergeConflict {
    remote_commit: String,
    local_commit: String,
    git: Git,
}

impl MergeConflict {
    pub fn new(
        git: &Git,
        remote_commit: impl Into<String>,
        local_commit: impl Into<String>,
    ) -> Self {
        Self {
            remote_commit: remote_commit.into(),
            local_commit: local_commit.into(),
            git: git.clone(),
        }
    }

    pub fn remote_commit(&self) -> &str {
        &self.remote_commit
    }

    pub fn local_commit(&self) -> &str {
        &self.local_commit
    }

    /// Files that differ between the two commits. The task metadata file
    /// never blocks a merge and is left out.
    pub fn files(&self) -> Result<ConflictFiles> {
        let mut files = ConflictFiles::default();
        for change in self.git.diff_trees(&self.remote_commit, &self.local_commit)? {
            if change.path == TASK_METADATA_FILENAME {
                continue;
            }
            match change.kind {
                ChangeKind::Added => files.new.push(change.path),
                ChangeKind::Deleted => files.gone.push(change.path),
                ChangeKind::Modified => files.changed.push(change.path),
            }
        }
        files.new.sort();
        files.gone.sort();
        files.changed.sort();
        Ok(files)
    }
}

impl fmt::Display for MergeConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "merge conflict between remote {} and local {}",
            short(&self.remote_commit),
            short(&self.local_commit)
        )
    }
}

fn short(sha: &str) -> &str {
    &sha[..sha.len().min(7)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_git::Identity;
    use std::fs;
    use tempfile::tempdir;

    fn commit_file(git: &Git, path: &str, contents: Option<&str>, message: &str) -> String {
        let full = git.work_dir().join(path);
        match contents {
            Some(text) => fs::write(&full, text).unwrap(),
            None => fs::remove_file(&full).unwrap(),
        }
        git.stage(path).unwrap();
        git.commit(message).unwrap()
    }

    #[test]
    fn partitions_files_from_local_point_of_view() {
        let dir = tempdir().unwrap();
        let git = Git::new(dir.path()).with_identity(Identity::from_email("a@example.com"));
        git.git_cmd(&["init", "-q"]).unwrap();
        commit_file(&git, "shared.md", Some("base"), "base");
        commit_file(&git, "remote-only.md", Some("r"), "base 2");
        let base = git.head_sha().unwrap();

        let remote = commit_file(&git, "shared.md", Some("remote"), "remote edit");

        git.reset_hard(&base).unwrap();
        commit_file(&git, "shared.md", Some("local"), "local edit");
        commit_file(&git, "local-only.md", Some("l"), "local add");
        commit_file(&git, TASK_METADATA_FILENAME, Some("x: y"), "metadata");
        let local = commit_file(&git, "remote-only.md", None, "local delete");

        let conflict = MergeConflict::new(&git, &remote, &local);
        let files = conflict.files().unwrap();

        assert_eq!(files.changed, vec!["shared.md"]);
        assert_eq!(files.new, vec!["local-only.md"]);
        assert_eq!(files.gone, vec!["remote-only.md"]);
        assert_eq!(files.file_count(), 3);
        assert_eq!(
            files.summary(),
            "Affected files: Changed: shared.md; New: local-only.md; Gone: remote-only.md"
        );
        // Recomputed, not cached.
        assert_eq!(conflict.files().unwrap(), files);
        assert!(conflict.to_string().starts_with("merge conflict between remote"));
    }

    #[test]
    fn empty_summary() {
        assert_eq!(ConflictFiles::default().summary(), "No files were affected.");
    }
}
