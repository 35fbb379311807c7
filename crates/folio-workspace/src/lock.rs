// lock.rs — Advisory file locks for small side-channel files.
//
// Several folio processes may share one work path. Files they all touch
// (configuration, the event log) are read under a shared lock and written
// under an exclusive one. Locks are released when the file handle drops.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use fs2::FileExt;

use crate::error::{Result, WorkspaceError};

/// Read a whole file while holding a shared lock.
pub fn read_locked(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(WorkspaceError::io(path))?;
    file.lock_shared().map_err(WorkspaceError::io(path))?;

    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(WorkspaceError::io(path))?;
    Ok(contents)
}

/// Replace a file's contents while holding an exclusive lock.
pub fn write_locked(path: &Path, contents: &str) -> Result<()> {
    ensure_parent(path)?;
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(WorkspaceError::io(path))?;
    file.lock_exclusive().map_err(WorkspaceError::io(path))?;

    // Truncate only once the lock is held so readers never see a half-empty file.
    file.set_len(0).map_err(WorkspaceError::io(path))?;
    file.write_all(contents.as_bytes())
        .map_err(WorkspaceError::io(path))?;
    file.flush().map_err(WorkspaceError::io(path))
}

/// Append one line to a file while holding an exclusive lock.
pub fn append_locked(path: &Path, line: &str) -> Result<()> {
    ensure_parent(path)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(WorkspaceError::io(path))?;
    file.lock_exclusive().map_err(WorkspaceError::io(path))?;

    writeln!(file, "{}", line).map_err(WorkspaceError::io(path))
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(WorkspaceError::io(parent))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.toml");

        write_locked(&path, "first = true\nlonger = \"value\"\n").unwrap();
        write_locked(&path, "x = 1\n").unwrap();

        assert_eq!(read_locked(&path).unwrap(), "x = 1\n");
    }

    #[test]
    fn append_adds_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.jsonl");

        append_locked(&path, "{\"n\":1}").unwrap();
        append_locked(&path, "{\"n\":2}").unwrap();

        let text = read_locked(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn reading_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = read_locked(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, WorkspaceError::IoError { .. }));
    }
}
