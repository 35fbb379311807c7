//! # folio-activity
//!
//! Activities are the unit of editorial work: a branch of the content
//! origin, named after the task it serves, that collects edits, gets peer
//! review and is finally merged into the default branch (or abandoned).
//!
//! ## Key components
//!
//! - [`branch`] — starting, saving to, completing, abandoning and
//!   clobbering activity branches, keeping every working copy in sync with
//!   the origin.
//! - [`review`] — the review state machine derived from commit history.
//! - [`task`] — the task metadata file carried on each activity branch.
//! - [`conflict`] — what a failed merge touched.
//! - [`Engine`] — the operations a front-end calls, with review gating
//!   and lifecycle events.

pub mod activity;
pub mod branch;
pub mod config;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod events;
pub mod review;
pub mod task;

pub use activity::{ActivitySummary, CommitCategory, HistoryEntry, PublishedActivity, WorkingState};
pub use branch::Branch;
pub use config::{EngineConfig, DEFAULT_CONFIG_FILE};
pub use conflict::{ConflictFiles, MergeConflict};
pub use engine::Engine;
pub use error::{ActivityError, Result};
pub use events::{ActivityEvent, EventDispatcher, LogSink, NotificationSink};
pub use review::{Feedback, ReviewCache, ReviewState, ReviewStatus};
pub use task::TaskMetadata;
