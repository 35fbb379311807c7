// edit.rs — File-level content edits inside a working copy.
//
// These functions only touch the working tree. Each returns a ContentEdit
// describing the path it changed and whether there is anything to commit;
// committing and syncing is the activity layer's job.

use std::fs;

use serde::Serialize;

use crate::document::{Document, FrontMatter};
use crate::error::{Result, WorkspaceError};
use crate::paths;
use crate::working_copy::WorkingCopy;

/// File name of the page that represents a directory.
pub const INDEX_FILENAME: &str = "index.markdown";

/// Layout given to category index pages.
pub const CATEGORY_LAYOUT: &str = "category";

/// Layout given to article pages.
pub const ARTICLE_LAYOUT: &str = "article";

/// What an edit did, and what to commit for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentEdit {
    /// Path relative to the working-copy root.
    pub path: String,
    /// Whether the working tree changed and should be committed.
    pub do_save: bool,
    /// Suggested commit message.
    pub message: String,
}

/// Overwrite an existing page.
pub fn update_page(
    copy: &WorkingCopy,
    path: &str,
    front_matter: &FrontMatter,
    body: &str,
) -> Result<ContentEdit> {
    let (path, full) = copy.resolve(path)?;
    if !full.is_file() {
        return Err(WorkspaceError::FileNotFound { path });
    }

    let text = Document::new(front_matter.clone(), body).render();
    fs::write(&full, text).map_err(WorkspaceError::io(&full))?;

    Ok(ContentEdit {
        message: format!("Saved changes to \"{}\"", path),
        path,
        do_save: true,
    })
}

/// Read a page from the working tree.
pub fn read_page(copy: &WorkingCopy, path: &str) -> Result<Document> {
    let (path, full) = copy.resolve(path)?;
    if !full.is_file() {
        return Err(WorkspaceError::FileNotFound { path });
    }
    let text = fs::read_to_string(&full).map_err(WorkspaceError::io(&full))?;
    Document::parse(&text)
}

/// Create a new page at `dir/request_path`, slugging every directory
/// segment of `request_path` but keeping its file name.
///
/// An empty `title` falls back to the name of the page's directory.
pub fn create_page(
    copy: &WorkingCopy,
    dir: &str,
    request_path: &str,
    front_matter: &FrontMatter,
    body: &str,
) -> Result<ContentEdit> {
    let request_path = paths::normalize(request_path)?;
    let (parent, file_name) = match request_path.rsplit_once('/') {
        Some((parent, name)) => (paths::slug_path(parent), name.to_string()),
        None => (String::new(), request_path.clone()),
    };
    let slug_path = paths::join(&parent, &file_name)?;

    let mut front = front_matter.clone();
    if front.get("title").map_or(true, |t| t.trim().is_empty()) {
        let fallback = request_path
            .rsplit('/')
            .nth(1)
            .unwrap_or(file_name.as_str())
            .to_string();
        front.insert("title".to_string(), fallback);
    }

    let (path, full) = copy.make_working_file(dir, &slug_path)?;
    if full.exists() {
        return Err(WorkspaceError::AlreadyExists { path });
    }
    fs::write(&full, Document::new(front, body).render()).map_err(WorkspaceError::io(&full))?;

    tracing::debug!("created page {}", path);
    Ok(ContentEdit {
        message: format!("Created new file \"{}\"", path),
        path,
        do_save: true,
    })
}

/// Create an article page `dir/<slug(title)>/index.markdown`.
pub fn create_article(copy: &WorkingCopy, dir: &str, title: &str) -> Result<ContentEdit> {
    let front = FrontMatter::from([
        ("layout".to_string(), ARTICLE_LAYOUT.to_string()),
        ("title".to_string(), title.to_string()),
    ]);
    let request_path = format!("{}/{}", title, INDEX_FILENAME);
    create_page(copy, dir, &request_path, &front, "")
}

/// Create the category `dir/<name>`, building an index page for every
/// segment of `name` that does not have one yet.
pub fn create_category(copy: &WorkingCopy, dir: &str, name: &str) -> Result<ContentEdit> {
    let name = paths::normalize(name)?;
    let segments: Vec<&str> = name.split('/').collect();

    let mut created = Vec::new();
    let mut last_dir = String::new();
    for depth in 1..=segments.len() {
        let category = segments[..depth].join("/");
        let slug_dir = paths::join(dir, &paths::slug_path(&category))?;
        last_dir = slug_dir.clone();
        if copy.exists(&paths::join(&slug_dir, INDEX_FILENAME)?)? {
            continue;
        }

        let front = FrontMatter::from([
            ("layout".to_string(), CATEGORY_LAYOUT.to_string()),
            ("title".to_string(), segments[depth - 1].to_string()),
        ]);
        let edit = create_page(
            copy,
            dir,
            &format!("{}/{}", category, INDEX_FILENAME),
            &front,
            "",
        )?;
        created.push(edit.path);
    }

    // Staging the shallowest new directory picks up every level below it.
    let path = created
        .first()
        .and_then(|p| p.rsplit_once('/'))
        .map_or_else(|| last_dir.clone(), |(parent, _)| parent.to_string());
    Ok(ContentEdit {
        do_save: !created.is_empty(),
        message: format!("Created category \"{}\"", last_dir),
        path,
    })
}

/// Write an uploaded file into `dir`. An existing file is left untouched.
pub fn upload_file(
    copy: &WorkingCopy,
    dir: &str,
    file_name: &str,
    contents: &[u8],
) -> Result<ContentEdit> {
    let (path, full) = copy.make_working_file(dir, file_name)?;
    let do_save = !full.exists();
    if do_save {
        fs::write(&full, contents).map_err(WorkspaceError::io(&full))?;
    }

    Ok(ContentEdit {
        message: format!("Uploaded file \"{}\"", path),
        path,
        do_save,
    })
}

/// Delete a file or a whole directory. A missing path is not an error;
/// there is simply nothing to save.
pub fn delete_path(copy: &WorkingCopy, dir: &str, name: &str) -> Result<ContentEdit> {
    let (path, full) = copy.resolve(&paths::join(dir, name)?)?;

    let do_save = if full.is_dir() {
        fs::remove_dir_all(&full).map_err(WorkspaceError::io(&full))?;
        true
    } else if full.exists() {
        fs::remove_file(&full).map_err(WorkspaceError::io(&full))?;
        true
    } else {
        false
    };

    Ok(ContentEdit {
        message: format!("The file \"{}\" was deleted", path),
        path,
        do_save,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_git::{Git, Identity};
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    fn open_copy() -> (TempDir, WorkingCopy) {
        let dir = tempdir().unwrap();
        let seed = dir.path().join("seed");
        fs::create_dir_all(&seed).unwrap();
        let git = Git::new(&seed).with_identity(Identity::from_email("seed@example.com"));
        git.git_cmd(&["init", "-q"]).unwrap();
        fs::write(seed.join("index.md"), "Welcome\n").unwrap();
        git.stage("index.md").unwrap();
        git.commit("Initial commit").unwrap();
        Git::new(dir.path())
            .git_cmd(&["clone", "-q", "--bare", "seed", "origin.git"])
            .unwrap();

        let copy = WorkingCopy::open(
            &dir.path().join("origin.git"),
            &dir.path().join("work"),
            &Identity::from_email("erica@example.com"),
        )
        .unwrap();
        (dir, copy)
    }

    fn read(copy: &WorkingCopy, path: &str) -> String {
        fs::read_to_string(copy.path().join(Path::new(path))).unwrap()
    }

    #[test]
    fn create_page_slugs_directories_and_falls_back_to_dir_title() {
        let (_dir, copy) = open_copy();
        let front = FrontMatter::from([("title".to_string(), String::new())]);

        let edit =
            create_page(&copy, "guides", "Getting Started/index.markdown", &front, "Hi").unwrap();

        assert_eq!(edit.path, "guides/getting-started/index.markdown");
        assert!(edit.do_save);
        let doc = read_page(&copy, &edit.path).unwrap();
        assert_eq!(doc.title(), Some("Getting Started"));
        assert_eq!(doc.body, "Hi");
    }

    #[test]
    fn create_page_refuses_to_overwrite() {
        let (_dir, copy) = open_copy();
        let front = FrontMatter::from([("title".to_string(), "A".to_string())]);

        create_page(&copy, "", "a.md", &front, "").unwrap();
        let err = create_page(&copy, "", "a.md", &front, "").unwrap_err();
        assert!(matches!(err, WorkspaceError::AlreadyExists { .. }));
    }

    #[test]
    fn create_category_builds_each_level_once() {
        let (_dir, copy) = open_copy();

        let edit = create_category(&copy, "", "Health Care/Clinics").unwrap();
        assert_eq!(edit.path, "health-care");
        assert_eq!(edit.message, "Created category \"health-care/clinics\"");
        assert!(edit.do_save);
        let top = read_page(&copy, "health-care/index.markdown").unwrap();
        assert_eq!(top.front_matter["layout"], CATEGORY_LAYOUT);
        assert_eq!(top.title(), Some("Health Care"));

        let again = create_category(&copy, "", "Health Care/Clinics").unwrap();
        assert!(!again.do_save);
    }

    #[test]
    fn create_article_uses_article_layout() {
        let (_dir, copy) = open_copy();
        let edit = create_article(&copy, "news", "Big News").unwrap();
        assert_eq!(edit.path, "news/big-news/index.markdown");
        assert!(read(&copy, &edit.path).contains("article"));
    }

    #[test]
    fn update_page_requires_existing_file() {
        let (_dir, copy) = open_copy();
        let front = FrontMatter::from([("title".to_string(), "Home".to_string())]);

        let err = update_page(&copy, "missing.md", &front, "x").unwrap_err();
        assert!(matches!(err, WorkspaceError::FileNotFound { .. }));

        let edit = update_page(&copy, "index.md", &front, "New body\n").unwrap();
        assert!(edit.do_save);
        assert_eq!(read(&copy, "index.md"), "---\ntitle: |-\n  Home\n---\nNew body\n");
    }

    #[test]
    fn upload_keeps_existing_file() {
        let (_dir, copy) = open_copy();

        let first = upload_file(&copy, "img", "logo.png", b"one").unwrap();
        let second = upload_file(&copy, "img", "logo.png", b"two").unwrap();

        assert!(first.do_save);
        assert!(!second.do_save);
        assert_eq!(read(&copy, "img/logo.png"), "one");
    }

    #[test]
    fn delete_handles_files_directories_and_absence() {
        let (_dir, copy) = open_copy();
        upload_file(&copy, "docs/deep", "a.txt", b"a").unwrap();

        assert!(delete_path(&copy, "", "docs").unwrap().do_save);
        assert!(!copy.path().join("docs").exists());
        assert!(delete_path(&copy, "", "index.md").unwrap().do_save);
        assert!(!delete_path(&copy, "", "index.md").unwrap().do_save);
    }

    #[test]
    fn edits_reject_parent_segments_before_touching_disk() {
        let (_dir, copy) = open_copy();
        let front = FrontMatter::new();

        assert!(matches!(
            create_page(&copy, "", "../escape.md", &front, ""),
            Err(WorkspaceError::PathTraversal { .. })
        ));
        assert!(matches!(
            upload_file(&copy, "..", "x.bin", b"x"),
            Err(WorkspaceError::PathTraversal { .. })
        ));
        assert!(matches!(
            delete_path(&copy, "docs/../..", "x"),
            Err(WorkspaceError::PathTraversal { .. })
        ));
        assert!(!copy.path().parent().unwrap().join("escape.md").exists());
    }
}
