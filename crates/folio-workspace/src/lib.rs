//! # folio-workspace
//!
//! Per-user working copies of the content origin, and the file-level edit
//! primitives that run inside them.
//!
//! ## Key components
//!
//! - [`WorkingCopy`] — a private clone of the origin for one identity,
//!   reset to a clean tree every time it is opened.
//! - [`Document`] — a content page: YAML front matter plus a body.
//! - [`edit`] — create, update, upload, delete; each returns a
//!   [`ContentEdit`] telling the caller what to commit.
//! - [`lock`] — advisory locks for small files shared between processes.

pub mod document;
pub mod edit;
pub mod error;
pub mod lock;
pub mod paths;
pub mod working_copy;

pub use document::{Document, FrontMatter};
pub use edit::ContentEdit;
pub use error::{Result, WorkspaceError};
pub use working_copy::{WorkingCopy, ORIGIN, TASK_METADATA_FILENAME};
