// commit.rs — Commit records parsed from `git log`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GitError, Result};

/// `git log --format` producing unit-separated fields and record-separated commits.
pub(crate) const LOG_FORMAT: &str = "--format=%H%x1f%P%x1f%an%x1f%ae%x1f%at%x1f%B%x1e";

/// A commit as folio sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub parents: Vec<String>,
    pub author_name: String,
    pub author_email: String,
    pub timestamp: DateTime<Utc>,
    /// Full message, trailing whitespace removed.
    pub message: String,
}

impl Commit {
    /// First line of the message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or_default()
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    pub fn first_parent(&self) -> Option<&str> {
        self.parents.first().map(String::as_str)
    }

    fn parse_record(record: &str) -> Result<Self> {
        let fields: Vec<&str> = record.splitn(6, '\x1f').collect();
        if fields.len() != 6 {
            return Err(GitError::Parse(format!(
                "commit record has {} fields: {:?}",
                fields.len(),
                record
            )));
        }

        let secs: i64 = fields[4]
            .parse()
            .map_err(|_| GitError::Parse(format!("bad commit time '{}'", fields[4])))?;
        let timestamp = DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| GitError::Parse(format!("commit time out of range: {}", secs)))?;

        Ok(Self {
            sha: fields[0].to_string(),
            parents: fields[1].split_whitespace().map(str::to_string).collect(),
            author_name: fields[2].to_string(),
            author_email: fields[3].to_string(),
            timestamp,
            message: fields[5].trim_end().to_string(),
        })
    }
}

/// Parse the output of `git log` run with [`LOG_FORMAT`].
pub(crate) fn parse_log(raw: &str) -> Result<Vec<Commit>> {
    raw.split('\x1e')
        .map(|record| record.trim_start_matches('\n'))
        .filter(|record| !record.trim().is_empty())
        .map(Commit::parse_record)
        .collect()
}
