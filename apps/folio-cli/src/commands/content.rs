// content.rs — Page subcommands: read, save, create, article, category, upload, delete, move.

use std::fs;
use std::path::PathBuf;

use clap::Subcommand;
use folio_activity::Engine;
use folio_git::Commit;

use super::{parse_front_matter, read_body, short};

#[derive(Subcommand)]
pub enum PageCommands {
    /// Print a page; the commit it was read at goes to stderr.
    Read {
        /// Activity branch name.
        branch: String,
        /// Page path relative to the site root.
        path: String,
    },
    /// Overwrite an existing page.
    Save {
        branch: String,
        path: String,
        /// Commit the edit was made against (from `page read`).
        #[arg(long)]
        base: String,
        /// Front matter field, as key=value. Repeatable.
        #[arg(long = "set")]
        fields: Vec<String>,
        #[arg(long)]
        body: Option<String>,
        #[arg(long)]
        body_file: Option<PathBuf>,
    },
    /// Create a new page.
    Create {
        branch: String,
        /// Path of the new page; directory names are slugged.
        path: String,
        #[arg(long, default_value = "")]
        dir: String,
        #[arg(long = "set")]
        fields: Vec<String>,
        #[arg(long)]
        body: Option<String>,
        #[arg(long)]
        body_file: Option<PathBuf>,
    },
    /// Create an article page from a title.
    Article {
        branch: String,
        title: String,
        #[arg(long, default_value = "")]
        dir: String,
    },
    /// Create a category (and any missing parent categories).
    Category {
        branch: String,
        /// Category path, e.g. "Health/Clinics".
        name: String,
        #[arg(long, default_value = "")]
        dir: String,
    },
    /// Add a file. An existing file of the same name is kept.
    Upload {
        branch: String,
        file: PathBuf,
        #[arg(long, default_value = "")]
        dir: String,
        /// Name to store it under (defaults to the file's name).
        #[arg(long)]
        name: Option<String>,
    },
    /// Delete a file or directory.
    Delete {
        branch: String,
        path: String,
    },
    /// Move or rename a file or directory.
    Move {
        branch: String,
        from: String,
        to: String,
        #[arg(long)]
        base: Option<String>,
    },
}

pub fn execute(cmd: &PageCommands, engine: &Engine) -> anyhow::Result<()> {
    match cmd {
        PageCommands::Read { branch, path } => {
            let (document, sha) = engine.read_page(branch, path)?;
            eprintln!("base: {}", sha);
            print!("{}", document.render());
            Ok(())
        }
        PageCommands::Save {
            branch,
            path,
            base,
            fields,
            body,
            body_file,
        } => {
            let front = parse_front_matter(fields)?;
            let body = read_body(body.as_deref(), body_file.as_deref())?;
            report(engine.save_page(branch, path, &front, &body, base)?)
        }
        PageCommands::Create {
            branch,
            path,
            dir,
            fields,
            body,
            body_file,
        } => {
            let front = parse_front_matter(fields)?;
            let body = read_body(body.as_deref(), body_file.as_deref())?;
            report(engine.create_page(branch, dir, path, &front, &body)?)
        }
        PageCommands::Article { branch, title, dir } => {
            report(engine.create_article(branch, dir, title)?)
        }
        PageCommands::Category { branch, name, dir } => {
            report(engine.create_category(branch, dir, name)?)
        }
        PageCommands::Upload {
            branch,
            file,
            dir,
            name,
        } => {
            let name = match name {
                Some(name) => name.clone(),
                None => file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| anyhow::anyhow!("{} has no file name", file.display()))?,
            };
            let contents = fs::read(file)
                .map_err(|e| anyhow::anyhow!("cannot read {}: {}", file.display(), e))?;
            report(engine.upload_file(branch, dir, &name, &contents)?)
        }
        PageCommands::Delete { branch, path } => {
            let (dir, name) = path.rsplit_once('/').unwrap_or(("", path.as_str()));
            report(engine.delete_path(branch, dir, name)?)
        }
        PageCommands::Move {
            branch,
            from,
            to,
            base,
        } => report(Some(engine.move_path(branch, from, to, base.as_deref())?)),
    }
}

fn report(commit: Option<Commit>) -> anyhow::Result<()> {
    match commit {
        Some(commit) => println!("{} ({})", commit.summary(), short(&commit.sha)),
        None => println!("Nothing to save."),
    }
    Ok(())
}
