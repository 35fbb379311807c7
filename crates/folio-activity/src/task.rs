// task.rs — Task metadata: the small key/value document on each activity branch.
//
// The document lives at the branch root in TASK_METADATA_FILENAME and names
// the task, who it is for and who started it. Branch names are derived from
// those three values, so starting the same task twice lands on the same branch.

use std::collections::BTreeMap;
use std::fs;

use folio_git::{Commit, Git};
use folio_workspace::document::{load_mapping, render_block_yaml};
use folio_workspace::{WorkingCopy, TASK_METADATA_FILENAME};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::branch;
use crate::error::{ActivityError, Result};

/// Length of generated branch names.
pub const BRANCH_NAME_LENGTH: usize = 7;

/// Longest description shown in short labels.
pub const DESCRIPTION_MAX_LENGTH: usize = 15;

pub const ACTIVITY_STARTED_MESSAGE: &str = "activity was started";
pub const ACTIVITY_UPDATED_MESSAGE: &str = "activity was updated";
pub const ACTIVITY_DELETED_MESSAGE: &str = "activity was deleted";

pub const AUTHOR_EMAIL: &str = "author_email";
pub const TASK_DESCRIPTION: &str = "task_description";
pub const TASK_BENEFICIARY: &str = "task_beneficiary";

/// Key/value task metadata. Keys beyond the three well-known ones are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetadata {
    values: BTreeMap<String, String>,
}

impl TaskMetadata {
    pub fn new(description: &str, beneficiary: &str, author_email: &str) -> Self {
        let mut meta = Self::default();
        meta.set(TASK_DESCRIPTION, description);
        meta.set(TASK_BENEFICIARY, beneficiary);
        meta.set(AUTHOR_EMAIL, author_email);
        meta
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    pub fn description(&self) -> Option<&str> {
        self.get(TASK_DESCRIPTION)
    }

    pub fn beneficiary(&self) -> Option<&str> {
        self.get(TASK_BENEFICIARY)
    }

    pub fn author_email(&self) -> Option<&str> {
        self.get(AUTHOR_EMAIL)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(Self {
            values: load_mapping(text)?,
        })
    }

    /// Block-literal YAML, one key per entry.
    pub fn render(&self) -> String {
        render_block_yaml(self.iter())
    }

    /// Deterministic branch name for this task.
    pub fn branch_name(&self, length: usize) -> String {
        make_branch_name(
            self.description().unwrap_or_default(),
            self.beneficiary().unwrap_or_default(),
            self.author_email().unwrap_or_default(),
            length,
        )
    }
}

/// Hash description, beneficiary and author into a short hex branch name.
pub fn make_branch_name(
    description: &str,
    beneficiary: &str,
    author_email: &str,
    length: usize,
) -> String {
    let seed = format!("{}{}{}", description, beneficiary, author_email);
    let digest = format!("{:x}", Sha256::digest(seed.as_bytes()));
    digest[..length.clamp(1, digest.len())].to_string()
}

/// Shorten a description for labels, cutting on a word boundary when that
/// keeps at least two thirds of the allowed length.
pub fn shorten_description(description: &str) -> String {
    let chars: Vec<char> = description.chars().collect();
    if chars.len() <= DESCRIPTION_MAX_LENGTH {
        return description.to_string();
    }

    let hard_cut: String = chars[..DESCRIPTION_MAX_LENGTH].iter().collect();
    if !hard_cut.contains(' ') {
        return hard_cut;
    }

    // Look one past the limit so a word ending exactly at the limit is kept.
    let window: String = chars[..=DESCRIPTION_MAX_LENGTH].iter().collect();
    let words: Vec<&str> = window.split(' ').collect();
    let suggested = words[..words.len() - 1].join(" ");
    if (suggested.chars().count() as f64) < DESCRIPTION_MAX_LENGTH as f64 * 0.66 {
        return hard_cut;
    }
    suggested
}

/// Task metadata committed at `rev`, if that commit has any.
pub fn load_task_metadata(git: &Git, rev: &str) -> Result<Option<TaskMetadata>> {
    match git.show_file(rev, TASK_METADATA_FILENAME)? {
        Some(text) => Ok(Some(TaskMetadata::parse(&text)?)),
        None => Ok(None),
    }
}

/// Task metadata in the working tree of the checked-out branch.
pub fn local_task_metadata(copy: &WorkingCopy) -> Result<TaskMetadata> {
    let path = copy.path().join(TASK_METADATA_FILENAME);
    if !path.is_file() {
        return Ok(TaskMetadata::default());
    }
    let text = fs::read_to_string(&path).map_err(ActivityError::io(&path))?;
    TaskMetadata::parse(&text)
}

/// Merge `updates` into the checked-out branch's task metadata and commit.
///
/// Returns `None` when nothing changed. The first save creates the file and
/// marks the activity as started; later saves mark it as updated.
pub fn save_task_metadata(
    copy: &WorkingCopy,
    default_branch: &str,
    updates: &TaskMetadata,
) -> Result<Option<Commit>> {
    let current = local_task_metadata(copy)?;
    let mut merged = current.clone();
    let mut details = Vec::new();
    for (key, value) in updates.iter() {
        if current.get(key) != Some(value) {
            details.push(format!("Set {} to {}", key, value));
        }
        merged.set(key, value);
    }

    if merged == current {
        return Ok(None);
    }

    let description = merged.description().unwrap_or_default();
    let message = if current.is_empty() {
        format!(
            "The \"{}\" {}\n\nCreated task metadata file \"{}\"\n{}",
            description,
            ACTIVITY_STARTED_MESSAGE,
            TASK_METADATA_FILENAME,
            details.join("\n")
        )
    } else {
        format!(
            "The \"{}\" {}\n\nUpdated task metadata file \"{}\"\n{}",
            description,
            ACTIVITY_UPDATED_MESSAGE,
            TASK_METADATA_FILENAME,
            details.join("\n")
        )
    };

    let path = copy.path().join(TASK_METADATA_FILENAME);
    fs::write(&path, merged.render()).map_err(ActivityError::io(&path))?;

    let base = copy.git().head_sha()?;
    let commit = branch::save_working_file(
        copy,
        TASK_METADATA_FILENAME,
        &message,
        &base,
        default_branch,
    )?;
    Ok(Some(commit))
}

/// Remove the task metadata file from the checked-out branch and commit.
pub fn delete_task_metadata(copy: &WorkingCopy, default_branch: &str) -> Result<Option<Commit>> {
    let current = local_task_metadata(copy)?;
    let path = copy.path().join(TASK_METADATA_FILENAME);
    if !path.exists() {
        return Ok(None);
    }
    fs::remove_file(&path).map_err(ActivityError::io(&path))?;

    let message = format!(
        "The \"{}\" {}\n\nDeleted task metadata file \"{}\"",
        current.description().unwrap_or_default(),
        ACTIVITY_DELETED_MESSAGE,
        TASK_METADATA_FILENAME
    );
    let base = copy.git().head_sha()?;
    let commit = branch::save_working_file(
        copy,
        TASK_METADATA_FILENAME,
        &message,
        &base,
        default_branch,
    )?;
    Ok(Some(commit))
}
