// paths.rs — Relative content paths and slugs.

use std::path::{Component, Path};

use crate::error::{Result, WorkspaceError};

fn invalid(path: &str, reason: &str) -> WorkspaceError {
    WorkspaceError::PathTraversal {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

/// Normalize a path relative to the working-copy root.
///
/// Rejects absolute paths and any `..` segment; drops `.` segments and
/// redundant separators. The result uses `/` separators.
pub fn normalize(path: &str) -> Result<String> {
    if path.trim().is_empty() {
        return Err(invalid(path, "path is empty"));
    }

    let mut parts = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir => return Err(invalid(path, "'..' segments are not allowed")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid(path, "absolute paths are not allowed"))
            }
        }
    }

    if parts.is_empty() {
        return Err(invalid(path, "path names the working-copy root"));
    }
    Ok(parts.join("/"))
}

/// Join a directory (possibly empty) and a name, then normalize.
pub fn join(dir: &str, name: &str) -> Result<String> {
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        normalize(name)
    } else {
        normalize(&format!("{}/{}", dir, name))
    }
}

/// True when `inner` is `outer` itself or lies beneath it.
pub fn is_within(inner: &str, outer: &str) -> bool {
    inner == outer
        || inner
            .strip_prefix(outer)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Lowercase ASCII slug: runs of anything else become a single `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// Slugify each `/`-separated segment of a path.
pub fn slug_path(path: &str) -> String {
    path.split('/')
        .map(slugify)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
