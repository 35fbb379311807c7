// events.rs — Activity lifecycle events and notification dispatch.
//
// The engine emits an event after each lifecycle step succeeds (and when a
// merge conflict stops one). Sinks decide what to do with them; the log sink
// appends JSONL under an exclusive lock so several processes can share a file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use folio_workspace::lock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ActivityError, Result};

/// Events emitted at activity lifecycle points.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ActivityEvent {
    /// A new activity branch was started (or an existing one adopted).
    ActivityStarted {
        event_id: Uuid,
        branch: String,
        description: String,
        beneficiary: String,
        author_email: String,
        timestamp: DateTime<Utc>,
    },

    /// A content change was committed and pushed.
    ChangesSaved {
        event_id: Uuid,
        branch: String,
        commit: String,
        path: String,
        author_email: String,
        timestamp: DateTime<Utc>,
    },

    /// Approval, feedback, or a request for feedback was recorded.
    ReviewRecorded {
        event_id: Uuid,
        branch: String,
        commit: String,
        summary: String,
        author_email: String,
        timestamp: DateTime<Utc>,
    },

    /// The activity was merged into the default branch.
    ActivityCompleted {
        event_id: Uuid,
        branch: String,
        commit: String,
        author_email: String,
        timestamp: DateTime<Utc>,
    },

    /// The activity was abandoned.
    ActivityAbandoned {
        event_id: Uuid,
        branch: String,
        author_email: String,
        timestamp: DateTime<Utc>,
    },

    /// The activity replaced the default branch's content.
    DefaultClobbered {
        event_id: Uuid,
        branch: String,
        commit: String,
        author_email: String,
        timestamp: DateTime<Utc>,
    },

    /// A merge conflict stopped an operation.
    ConflictDetected {
        event_id: Uuid,
        branch: String,
        remote_commit: String,
        local_commit: String,
        files: Vec<String>,
        timestamp: DateTime<Utc>,
    },
}

impl ActivityEvent {
    /// Matches the `event_type` tag in serialized events.
    pub fn event_type(&self) -> &str {
        match self {
            ActivityEvent::ActivityStarted { .. } => "activity_started",
            ActivityEvent::ChangesSaved { .. } => "changes_saved",
            ActivityEvent::ReviewRecorded { .. } => "review_recorded",
            ActivityEvent::ActivityCompleted { .. } => "activity_completed",
            ActivityEvent::ActivityAbandoned { .. } => "activity_abandoned",
            ActivityEvent::DefaultClobbered { .. } => "default_clobbered",
            ActivityEvent::ConflictDetected { .. } => "conflict_detected",
        }
    }

    pub fn branch(&self) -> &str {
        match self {
            ActivityEvent::ActivityStarted { branch, .. }
            | ActivityEvent::ChangesSaved { branch, .. }
            | ActivityEvent::ReviewRecorded { branch, .. }
            | ActivityEvent::ActivityCompleted { branch, .. }
            | ActivityEvent::ActivityAbandoned { branch, .. }
            | ActivityEvent::DefaultClobbered { branch, .. }
            | ActivityEvent::ConflictDetected { branch, .. } => branch,
        }
    }
}

/// Somewhere activity events are delivered.
pub trait NotificationSink: Send {
    /// Deliver one event. A failure is reported by the dispatcher and does
    /// not undo the operation.
    fn send(&self, event: &ActivityEvent) -> Result<()>;
}

/// Appends events as JSONL to a file.
pub struct LogSink {
    path: PathBuf,
}

impl LogSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl NotificationSink for LogSink {
    fn send(&self, event: &ActivityEvent) -> Result<()> {
        let json = serde_json::to_string(event)?;
        lock::append_locked(&self.path, &json).map_err(ActivityError::from)
    }
}

/// Fans each activity event out to every registered sink, in the order the
/// sinks were added. A sink that fails is logged and skipped; the git
/// operation that raised the event has already happened.
#[derive(Default)]
pub struct EventDispatcher {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    pub fn dispatch(&self, event: &ActivityEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.send(event) {
                tracing::warn!(
                    event = event.event_type(),
                    branch = event.branch(),
                    "event sink failed: {}",
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn abandoned(branch: &str) -> ActivityEvent {
        ActivityEvent::ActivityAbandoned {
            event_id: Uuid::new_v4(),
            branch: branch.to_string(),
            author_email: "erica@example.com".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn event_serialization_round_trip() {
        let event = abandoned("1a2b3c4");
        let json = serde_json::to_string(&event).unwrap();
        let restored: ActivityEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(event.event_type(), restored.event_type());
        assert_eq!(restored.branch(), "1a2b3c4");
        assert!(json.contains("\"activity_abandoned\""));
    }

    #[test]
    fn log_sink_appends_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("events.jsonl");
        let sink = LogSink::new(&path);

        sink.send(&abandoned("a")).unwrap();
        sink.send(&abandoned("b")).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn dispatcher_sends_to_all_sinks() {
        let dir = tempdir().unwrap();
        let path1 = dir.path().join("sink1.jsonl");
        let path2 = dir.path().join("sink2.jsonl");

        let mut dispatcher = EventDispatcher::new();
        dispatcher.add_sink(Box::new(LogSink::new(&path1)));
        dispatcher.add_sink(Box::new(LogSink::new(&path2)));
        dispatcher.dispatch(&abandoned("a"));

        assert!(fs::read_to_string(&path1).unwrap().contains("activity_abandoned"));
        assert!(fs::read_to_string(&path2).unwrap().contains("activity_abandoned"));
    }

    #[test]
    fn failing_sink_does_not_stop_others() {
        let dir = tempdir().unwrap();
        // A directory where the log file should be makes the first sink fail.
        let blocked = dir.path().join("blocked");
        fs::create_dir_all(&blocked).unwrap();
        let good = dir.path().join("good.jsonl");

        let mut dispatcher = EventDispatcher::new();
        dispatcher.add_sink(Box::new(LogSink::new(&blocked)));
        dispatcher.add_sink(Box::new(LogSink::new(&good)));
        dispatcher.dispatch(&abandoned("a"));

        assert_eq!(fs::read_to_string(&good).unwrap().lines().count(), 1);
    }
}
