// diff.rs — Tree-level differences between two commits.

use serde::{Deserialize, Serialize};

use crate::error::{GitError, Result};

/// What happened to a path going from one tree to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Deleted,
    Modified,
}

/// One changed path between two trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeChange {
    pub kind: ChangeKind,
    pub path: String,
}

/// Parse `git diff --name-status -z --no-renames` output.
pub(crate) fn parse_name_status(raw: &str) -> Result<Vec<TreeChange>> {
    let mut fields = raw.split('\0').filter(|f| !f.is_empty());
    let mut changes = Vec::new();

    while let Some(status) = fields.next() {
        let path = fields
            .next()
            .ok_or_else(|| GitError::Parse(format!("status '{}' without a path", status)))?;
        let kind = match status.chars().next() {
            Some('A') => ChangeKind::Added,
            Some('D') => ChangeKind::Deleted,
            // M (content), T (type change) and anything else git may report.
            _ => ChangeKind::Modified,
        };
        changes.push(TreeChange {
            kind,
            path: path.to_string(),
        });
    }

    Ok(changes)
}
