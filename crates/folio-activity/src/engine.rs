// engine.rs — The operations a front-end calls, with review gating and events.
//
// Every mutating call opens the caller's working copy fresh, checks out the
// activity, does one lifecycle step and emits an event. Read-only queries
// go straight to the origin, whose refs are authoritative.

use chrono::Utc;
use folio_git::{Commit, Git, Identity};
use folio_workspace::{edit, ContentEdit, Document, FrontMatter, WorkingCopy};
use uuid::Uuid;

use crate::activity::{self, ActivitySummary, HistoryEntry, PublishedActivity, WorkingState};
use crate::branch::{self, Branch};
use crate::config::EngineConfig;
use crate::error::{ActivityError, Result};
use crate::events::{ActivityEvent, EventDispatcher, LogSink, NotificationSink};
use crate::review::{self, ReviewCache, ReviewState, ReviewStatus};
use crate::task::TaskMetadata;

/// Content engine bound to one origin and acting as one identity.
pub struct Engine {
    config: EngineConfig,
    identity: Identity,
    events: EventDispatcher,
    review_cache: ReviewCache,
}

impl Engine {
    pub fn new(config: EngineConfig, identity: Identity) -> Self {
        let mut events = EventDispatcher::new();
        if let Some(path) = &config.events_log {
            events.add_sink(Box::new(LogSink::new(path)));
        }
        Self {
            config,
            identity,
            events,
            review_cache: ReviewCache::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn add_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.events.add_sink(sink);
    }

    fn default_branch(&self) -> &str {
        &self.config.default_branch
    }

    fn origin(&self) -> Git {
        Git::new(&self.config.origin_path)
    }

    /// The caller's working copy, clean and freshly fetched.
    pub fn working_copy(&self) -> Result<WorkingCopy> {
        Ok(WorkingCopy::open(
            &self.config.origin_path,
            &self.config.work_path,
            &self.identity,
        )?)
    }

    /// Open the working copy with `name` checked out and up to date.
    pub fn checkout_activity(&self, name: &str) -> Result<(WorkingCopy, Branch)> {
        let copy = self.working_copy()?;
        let found = branch::get_existing_branch(&copy, self.default_branch(), name)?
            .ok_or_else(|| ActivityError::NotFound(format!("activity '{}'", name)))?;
        copy.git().checkout(name)?;
        Ok((copy, found))
    }

    // ── lifecycle ───────────────────────────────────────────────

    /// Start (or rejoin) the activity for this task and this identity.
    pub fn start_activity(&self, description: &str, beneficiary: &str) -> Result<Branch> {
        let metadata = TaskMetadata::new(description, beneficiary, &self.identity.email);
        let name = metadata.branch_name(self.config.branch_name_length);
        let copy = self.working_copy()?;

        let started = self.observe(
            &name,
            branch::start_branch(&copy, self.default_branch(), &name, &metadata),
        )?;
        self.events.dispatch(&ActivityEvent::ActivityStarted {
            event_id: Uuid::new_v4(),
            branch: started.name.clone(),
            description: description.to_string(),
            beneficiary: beneficiary.to_string(),
            author_email: self.identity.email.clone(),
            timestamp: Utc::now(),
        });
        Ok(started)
    }

    /// Merge an endorsed activity into the default branch.
    pub fn complete(&mut self, name: &str) -> Result<Commit> {
        self.require_state(name, "publish", |s| {
            s.state.can_transition_to(&ReviewState::Published)
        })?;
        let copy = self.working_copy()?;
        let commit = self.observe(
            name,
            branch::complete_branch(&copy, self.default_branch(), name),
        )?;
        self.events.dispatch(&ActivityEvent::ActivityCompleted {
            event_id: Uuid::new_v4(),
            branch: name.to_string(),
            commit: commit.sha.clone(),
            author_email: self.identity.email.clone(),
            timestamp: Utc::now(),
        });
        Ok(commit)
    }

    pub fn abandon(&self, name: &str) -> Result<Commit> {
        let copy = self.working_copy()?;
        let commit = self.observe(
            name,
            branch::abandon_branch(&copy, self.default_branch(), name),
        )?;
        self.events.dispatch(&ActivityEvent::ActivityAbandoned {
            event_id: Uuid::new_v4(),
            branch: name.to_string(),
            author_email: self.identity.email.clone(),
            timestamp: Utc::now(),
        });
        Ok(commit)
    }

    /// Replace the default branch's content with an endorsed activity's.
    pub fn clobber(&mut self, name: &str) -> Result<Commit> {
        self.require_state(name, "publish", |s| {
            s.state.can_transition_to(&ReviewState::Published)
        })?;
        let copy = self.working_copy()?;
        let commit = self.observe(
            name,
            branch::clobber_default_branch(&copy, self.default_branch(), name),
        )?;
        self.events.dispatch(&ActivityEvent::DefaultClobbered {
            event_id: Uuid::new_v4(),
            branch: name.to_string(),
            commit: commit.sha.clone(),
            author_email: self.identity.email.clone(),
            timestamp: Utc::now(),
        });
        Ok(commit)
    }

    // ── content ─────────────────────────────────────────────────

    pub fn read_page(&self, name: &str, path: &str) -> Result<(Document, String)> {
        let (copy, found) = self.checkout_activity(name)?;
        Ok((edit::read_page(&copy, path)?, found.sha))
    }

    /// Overwrite an existing page. `base_sha` is the branch tip the edit was made against.
    pub fn save_page(
        &self,
        name: &str,
        path: &str,
        front_matter: &FrontMatter,
        body: &str,
        base_sha: &str,
    ) -> Result<Option<Commit>> {
        self.edit_and_save(name, Some(base_sha), |copy| {
            edit::update_page(copy, path, front_matter, body)
        })
    }

    pub fn create_page(
        &self,
        name: &str,
        dir: &str,
        request_path: &str,
        front_matter: &FrontMatter,
        body: &str,
    ) -> Result<Option<Commit>> {
        self.edit_and_save(name, None, |copy| {
            edit::create_page(copy, dir, request_path, front_matter, body)
        })
    }

    pub fn create_article(&self, name: &str, dir: &str, title: &str) -> Result<Option<Commit>> {
        self.edit_and_save(name, None, |copy| edit::create_article(copy, dir, title))
    }

    pub fn create_category(&self, name: &str, dir: &str, category: &str) -> Result<Option<Commit>> {
        self.edit_and_save(name, None, |copy| edit::create_category(copy, dir, category))
    }

    pub fn upload_file(
        &self,
        name: &str,
        dir: &str,
        file_name: &str,
        contents: &[u8],
    ) -> Result<Option<Commit>> {
        self.edit_and_save(name, None, |copy| {
            edit::upload_file(copy, dir, file_name, contents)
        })
    }

    pub fn delete_path(&self, name: &str, dir: &str, file_name: &str) -> Result<Option<Commit>> {
        self.edit_and_save(name, None, |copy| edit::delete_path(copy, dir, file_name))
    }

    pub fn move_path(
        &self,
        name: &str,
        old_path: &str,
        new_path: &str,
        base_sha: Option<&str>,
    ) -> Result<Commit> {
        let (copy, found) = self.checkout_activity(name)?;
        let base = base_sha.unwrap_or(&found.sha);
        let commit = self.observe(
            name,
            branch::move_existing_file(&copy, old_path, new_path, base, self.default_branch()),
        )?;
        self.saved(name, &commit, new_path);
        Ok(commit)
    }

    /// Check out, apply one edit, and commit it if it changed anything.
    fn edit_and_save(
        &self,
        name: &str,
        base_sha: Option<&str>,
        apply: impl FnOnce(&WorkingCopy) -> folio_workspace::Result<ContentEdit>,
    ) -> Result<Option<Commit>> {
        let (copy, found) = self.checkout_activity(name)?;
        let base = base_sha.unwrap_or(&found.sha);
        branch::check_base(copy.git(), base)?;

        let change = apply(&copy)?;
        if !change.do_save {
            return Ok(None);
        }

        let commit = self.observe(
            name,
            branch::save_working_file(
                &copy,
                &change.path,
                &change.message,
                base,
                self.default_branch(),
            ),
        )?;
        self.saved(name, &commit, &change.path);
        Ok(Some(commit))
    }

    fn saved(&self, name: &str, commit: &Commit, path: &str) {
        self.events.dispatch(&ActivityEvent::ChangesSaved {
            event_id: Uuid::new_v4(),
            branch: name.to_string(),
            commit: commit.sha.clone(),
            path: path.to_string(),
            author_email: self.identity.email.clone(),
            timestamp: Utc::now(),
        });
    }

    // ── review ──────────────────────────────────────────────────

    pub fn approve(&mut self, name: &str) -> Result<Commit> {
        let email = self.identity.email.clone();
        self.require_state(name, "approve", |s| s.can_review(&email))?;
        let (copy, _) = self.checkout_activity(name)?;
        let commit = self.observe(name, review::mark_as_reviewed(&copy))?;
        self.reviewed(name, &commit);
        Ok(commit)
    }

    pub fn provide_feedback(&mut self, name: &str, comment: &str) -> Result<Commit> {
        let email = self.identity.email.clone();
        self.require_state(name, "give feedback on", |s| s.can_review(&email))?;
        let (copy, _) = self.checkout_activity(name)?;
        let commit = self.observe(name, review::provide_feedback(&copy, comment))?;
        self.reviewed(name, &commit);
        Ok(commit)
    }

    pub fn request_feedback(&mut self, name: &str, comment: &str) -> Result<Commit> {
        self.require_state(name, "request feedback on", |s| {
            s.state.can_transition_to(&ReviewState::FeedbackRequested)
        })?;
        let (copy, _) = self.checkout_activity(name)?;
        let commit = self.observe(name, review::request_feedback(&copy, comment))?;
        self.reviewed(name, &commit);
        Ok(commit)
    }

    fn reviewed(&self, name: &str, commit: &Commit) {
        self.events.dispatch(&ActivityEvent::ReviewRecorded {
            event_id: Uuid::new_v4(),
            branch: name.to_string(),
            commit: commit.sha.clone(),
            summary: commit.summary().to_string(),
            author_email: self.identity.email.clone(),
            timestamp: Utc::now(),
        });
    }

    /// Refuse `action` unless the activity's review status allows it.
    /// Single-user setups skip the check.
    fn require_state(
        &mut self,
        name: &str,
        action: &str,
        allowed: impl FnOnce(&ReviewStatus) -> bool,
    ) -> Result<()> {
        if self.config.single_user {
            return Ok(());
        }
        let status = self.review_state(name)?;
        if allowed(&status) {
            Ok(())
        } else {
            Err(ActivityError::InvalidState {
                branch: name.to_string(),
                state: status.state.to_string(),
                action: action.to_string(),
            })
        }
    }

    // ── queries ─────────────────────────────────────────────────

    pub fn review_state(&mut self, name: &str) -> Result<ReviewStatus> {
        let origin = self.origin();
        let default_branch = self.config.default_branch.clone();
        self.review_cache.get_or_compute(&origin, &default_branch, name)
    }

    pub fn list_activities(&mut self) -> Result<Vec<ActivitySummary>> {
        let origin = self.origin();
        let default_branch = self.config.default_branch.clone();
        activity::list_activities(&origin, &default_branch, &mut self.review_cache)
    }

    pub fn published_activities(&self) -> Result<Vec<PublishedActivity>> {
        activity::list_published_activities(&self.origin())
    }

    pub fn history(&self, name: &str) -> Result<Vec<HistoryEntry>> {
        activity::activity_history(&self.origin(), self.default_branch(), name)
    }

    pub fn working_state(&self, name: &str) -> Result<WorkingState> {
        activity::working_state(&self.origin(), name)
    }

    /// Report merge conflicts as events before handing the error back.
    fn observe<T>(&self, name: &str, result: Result<T>) -> Result<T> {
        if let Err(ActivityError::MergeConflict(conflict)) = &result {
            let files = conflict
                .files()
                .map(|f| f.all().into_iter().map(str::to_string).collect())
                .unwrap_or_default();
            self.events.dispatch(&ActivityEvent::ConflictDetected {
                event_id: Uuid::new_v4(),
                branch: name.to_string(),
                remote_commit: conflict.remote_commit().to_string(),
                local_commit: conflict.local_commit().to_string(),
                files,
                timestamp: Utc::now(),
            });
        }
        result
    }
}
