//! Engine configuration from `folio.toml`.

use std::path::{Path, PathBuf};

use folio_workspace::lock;
use serde::{Deserialize, Serialize};

use crate::error::{ActivityError, Result};
use crate::task::BRANCH_NAME_LENGTH;

/// Conventional config file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "folio.toml";

/// Where the content lives and how activities behave.
///
/// ```toml
/// origin_path = "/srv/content/origin.git"
/// work_path = "/var/lib/folio/work"
/// default_branch = "master"
/// single_user = false
/// events_log = "/var/log/folio/events.jsonl"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// The shared bare repository every working copy clones.
    pub origin_path: PathBuf,

    /// Directory holding one working copy per user.
    pub work_path: PathBuf,

    /// Branch activities fork from and publish to.
    #[serde(default = "default_branch")]
    pub default_branch: String,

    /// Skip review gating when one person does everything.
    #[serde(default)]
    pub single_user: bool,

    /// Length of generated activity branch names.
    #[serde(default = "default_branch_name_length")]
    pub branch_name_length: usize,

    /// Optional JSONL file receiving lifecycle events.
    #[serde(default)]
    pub events_log: Option<PathBuf>,
}

// Serde default functions
fn default_branch() -> String {
    "master".to_string()
}

fn default_branch_name_length() -> usize {
    BRANCH_NAME_LENGTH
}

impl EngineConfig {
    /// Defaults for the given origin and work path.
    pub fn for_origin(origin_path: impl Into<PathBuf>, work_path: impl Into<PathBuf>) -> Self {
        Self {
            origin_path: origin_path.into(),
            work_path: work_path.into(),
            default_branch: default_branch(),
            single_user: false,
            branch_name_length: default_branch_name_length(),
            events_log: None,
        }
    }

    /// Load a config file. Relative paths in it are taken relative to the
    /// file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = lock::read_locked(path)?;
        let mut config: EngineConfig = toml::from_str(&content).map_err(|e| ActivityError::Config {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        if !(1..=64).contains(&config.branch_name_length) {
            return Err(ActivityError::Config {
                path: path.display().to_string(),
                message: format!(
                    "branch_name_length must be between 1 and 64, got {}",
                    config.branch_name_length
                ),
            });
        }

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.origin_path = base.join(&config.origin_path);
        config.work_path = base.join(&config.work_path);
        config.events_log = config.events_log.map(|p| base.join(p));
        Ok(config)
    }

    /// Write the config to `path` under an exclusive lock.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ActivityError::Config {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        lock::write_locked(path, &content)?;
        Ok(())
    }

    /// Load `path` if it exists, otherwise `None`.
    pub fn load_if_present(path: &Path) -> Result<Option<Self>> {
        if path.is_file() {
            Self::load(path).map(Some)
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn minimal_config_gets_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "origin_path = \"origin.git\"\nwork_path = \"/tmp/work\"\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.default_branch, "master");
        assert!(!config.single_user);
        assert_eq!(config.branch_name_length, 7);
        assert_eq!(config.origin_path, dir.path().join("origin.git"));
        assert_eq!(config.work_path, PathBuf::from("/tmp/work"));
        assert!(config.events_log.is_none());
    }

    #[test]
    fn full_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(
            &path,
            r#"
origin_path = "/srv/origin.git"
work_path = "work"
default_branch = "main"
single_user = true
branch_name_length = 10
events_log = "events.jsonl"
"#,
        )
        .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.default_branch, "main");
        assert!(config.single_user);
        assert_eq!(config.branch_name_length, 10);
        assert_eq!(config.events_log, Some(dir.path().join("events.jsonl")));
    }

    #[test]
    fn bad_config_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(&path, "work_path = 3").unwrap();

        let err = EngineConfig::load(&path).unwrap_err();
        assert!(matches!(err, ActivityError::Config { .. }));
        assert!(err.to_string().contains(DEFAULT_CONFIG_FILE));
    }

    #[test]
    fn branch_name_length_is_bounded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(
            &path,
            "origin_path = \"o\"\nwork_path = \"w\"\nbranch_name_length = 0\n",
        )
        .unwrap();
        assert!(EngineConfig::load(&path).is_err());
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        let mut config =
            EngineConfig::for_origin(dir.path().join("origin.git"), dir.path().join("work"));
        config.single_user = true;
        config.save(&path).unwrap();

        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempdir().unwrap();
        assert!(EngineConfig::load_if_present(&dir.path().join("absent.toml"))
            .unwrap()
            .is_none());
    }
}
