//! In-memory service backend.
//!
//! Records every call and hands back deterministic ids. This is the
//! backend the binary ships with, and the one engine tests drive to
//! simulate outages and credential loss.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use valet_core::types::{Timestamp, UserId};

use crate::{
    CalendarEvent, CalendarService, ChatService, EmailService, ServiceError, ServiceFactory,
    TaskService,
};

/// A calendar event created through the in-memory backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub event_id: String,
    pub calendar_id: String,
    pub title: String,
    pub start: Timestamp,
    pub duration_minutes: u32,
}

/// An email draft created through the in-memory backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedDraft {
    pub draft_id: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// An email sent through the in-memory backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEmail {
    pub message_id: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// A task created through the in-memory backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTask {
    pub task_id: String,
    pub title: String,
    pub notes: Option<String>,
    pub due: Option<Timestamp>,
}

/// A status change applied through the in-memory backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedStatus {
    pub status: String,
    pub until: Option<Timestamp>,
}

/// A channel message posted through the in-memory backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPost {
    pub message_ts: String,
    pub channel: String,
    pub message: String,
}

#[derive(Default)]
struct State {
    events: Vec<RecordedEvent>,
    deleted_events: Vec<String>,
    drafts: Vec<RecordedDraft>,
    deleted_drafts: Vec<String>,
    sent: Vec<RecordedEmail>,
    tasks: Vec<RecordedTask>,
    deleted_tasks: Vec<String>,
    statuses: Vec<RecordedStatus>,
    posts: Vec<RecordedPost>,
    failing: HashSet<&'static str>,
    revoked: HashSet<&'static str>,
}

/// Shared recording backend for all four service traits.
///
/// Clones share state. User ids are accepted and ignored: this backend
/// is single tenant, which is all the local binary and the tests need.
#[derive(Clone, Default)]
pub struct InMemoryServices {
    inner: Arc<Mutex<State>>,
}

impl InMemoryServices {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(
        &self,
        service: &'static str,
        f: impl FnOnce(&mut State) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        let mut state = self.inner.lock().map_err(|_| ServiceError::Request {
            service,
            message: "state lock poisoned".to_string(),
        })?;
        if state.revoked.contains(service) {
            return Err(ServiceError::NoCredentials { service });
        }
        if state.failing.contains(service) {
            return Err(ServiceError::Request {
                service,
                message: "simulated outage".to_string(),
            });
        }
        f(&mut state)
    }

    fn read_state<T>(&self, f: impl FnOnce(&State) -> T) -> T {
        match self.inner.lock() {
            Ok(state) => f(&state),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    // ---- test and demo knobs ----

    /// Make one service fail every call with a simulated outage.
    pub fn set_failing(&self, service: &'static str, failing: bool) {
        if let Ok(mut state) = self.inner.lock() {
            if failing {
                state.failing.insert(service);
            } else {
                state.failing.remove(service);
            }
        }
    }

    /// Make one service fail every call with a missing-credentials error.
    pub fn revoke_credentials(&self, service: &'static str) {
        if let Ok(mut state) = self.inner.lock() {
            state.revoked.insert(service);
        }
    }

    // ---- recorded history ----

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.read_state(|s| s.events.clone())
    }

    pub fn deleted_events(&self) -> Vec<String> {
        self.read_state(|s| s.deleted_events.clone())
    }

    pub fn drafts(&self) -> Vec<RecordedDraft> {
        self.read_state(|s| s.drafts.clone())
    }

    pub fn deleted_drafts(&self) -> Vec<String> {
        self.read_state(|s| s.deleted_drafts.clone())
    }

    pub fn sent_emails(&self) -> Vec<RecordedEmail> {
        self.read_state(|s| s.sent.clone())
    }

    pub fn tasks(&self) -> Vec<RecordedTask> {
        self.read_state(|s| s.tasks.clone())
    }

    pub fn deleted_tasks(&self) -> Vec<String> {
        self.read_state(|s| s.deleted_tasks.clone())
    }

    pub fn status_history(&self) -> Vec<RecordedStatus> {
        self.read_state(|s| s.statuses.clone())
    }

    pub fn current_status(&self) -> Option<String> {
        self.read_state(|s| s.statuses.last().map(|r| r.status.clone()))
    }

    pub fn posts(&self) -> Vec<RecordedPost> {
        self.read_state(|s| s.posts.clone())
    }
}

#[async_trait]
impl CalendarService for InMemoryServices {
    async fn create_event(
        &self,
        title: &str,
        start: Timestamp,
        duration_minutes: u32,
    ) -> Result<CalendarEvent, ServiceError> {
        self.with_state("calendar", |state| {
            let event_id = format!("evt-{}", state.events.len() + 1);
            let event = RecordedEvent {
                event_id: event_id.clone(),
                calendar_id: "primary".to_string(),
                title: title.to_string(),
                start,
                duration_minutes,
            };
            debug!(event_id = %event_id, title = %title, "Calendar event created");
            state.events.push(event);
            Ok(CalendarEvent {
                event_id,
                calendar_id: "primary".to_string(),
            })
        })
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), ServiceError> {
        self.with_state("calendar", |state| {
            let exists = state
                .events
                .iter()
                .any(|e| e.event_id == event_id && e.calendar_id == calendar_id);
            if !exists || state.deleted_events.iter().any(|d| d == event_id) {
                return Err(ServiceError::Request {
                    service: "calendar",
                    message: format!("event not found: {}", event_id),
                });
            }
            debug!(event_id = %event_id, "Calendar event deleted");
            state.deleted_events.push(event_id.to_string());
            Ok(())
        })
    }
}

#[async_trait]
impl EmailService for InMemoryServices {
    async fn create_draft(
        &self,
        to: &[String],
        subject: &str,
        body: &str,
    ) -> Result<String, ServiceError> {
        self.with_state("email", |state| {
            let draft_id = format!("draft-{}", state.drafts.len() + 1);
            debug!(draft_id = %draft_id, subject = %subject, "Email draft created");
            state.drafts.push(RecordedDraft {
                draft_id: draft_id.clone(),
                to: to.to_vec(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
            Ok(draft_id)
        })
    }

    async fn delete_draft(&self, draft_id: &str) -> Result<(), ServiceError> {
        self.with_state("email", |state| {
            let exists = state.drafts.iter().any(|d| d.draft_id == draft_id);
            if !exists || state.deleted_drafts.iter().any(|d| d == draft_id) {
                return Err(ServiceError::Request {
                    service: "email",
                    message: format!("draft not found: {}", draft_id),
                });
            }
            debug!(draft_id = %draft_id, "Email draft deleted");
            state.deleted_drafts.push(draft_id.to_string());
            Ok(())
        })
    }

    async fn send_message(
        &self,
        to: &[String],
        cc: &[String],
        subject: &str,
        body: &str,
    ) -> Result<String, ServiceError> {
        self.with_state("email", |state| {
            let message_id = format!("msg-{}", state.sent.len() + 1);
            debug!(message_id = %message_id, subject = %subject, "Email sent");
            state.sent.push(RecordedEmail {
                message_id: message_id.clone(),
                to: to.to_vec(),
                cc: cc.to_vec(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
            Ok(message_id)
        })
    }
}

#[async_trait]
impl TaskService for InMemoryServices {
    async fn create_task(
        &self,
        title: &str,
        notes: Option<&str>,
        due: Option<Timestamp>,
    ) -> Result<String, ServiceError> {
        self.with_state("tasks", |state| {
            let task_id = format!("task-{}", state.tasks.len() + 1);
            debug!(task_id = %task_id, title = %title, "Task created");
            state.tasks.push(RecordedTask {
                task_id: task_id.clone(),
                title: title.to_string(),
                notes: notes.map(str::to_string),
                due,
            });
            Ok(task_id)
        })
    }

    async fn delete_task(&self, task_id: &str) -> Result<(), ServiceError> {
        self.with_state("tasks", |state| {
            let exists = state.tasks.iter().any(|t| t.task_id == task_id);
            if !exists || state.deleted_tasks.iter().any(|d| d == task_id) {
                return Err(ServiceError::Request {
                    service: "tasks",
                    message: format!("task not found: {}", task_id),
                });
            }
            debug!(task_id = %task_id, "Task deleted");
            state.deleted_tasks.push(task_id.to_string());
            Ok(())
        })
    }
}

#[async_trait]
impl ChatService for InMemoryServices {
    async fn set_status(
        &self,
        status: &str,
        until: Option<Timestamp>,
    ) -> Result<Option<String>, ServiceError> {
        self.with_state("chat", |state| {
            let previous = state.statuses.last().map(|r| r.status.clone());
            debug!(status = %status, previous = ?previous, "Status set");
            state.statuses.push(RecordedStatus {
                status: status.to_string(),
                until,
            });
            Ok(previous)
        })
    }

    async fn post_message(&self, channel: &str, message: &str) -> Result<String, ServiceError> {
        self.with_state("chat", |state| {
            let message_ts = format!("ts-{}", state.posts.len() + 1);
            debug!(channel = %channel, ts = %message_ts, "Message posted");
            state.posts.push(RecordedPost {
                message_ts: message_ts.clone(),
                channel: channel.to_string(),
                message: message.to_string(),
            });
            Ok(message_ts)
        })
    }
}

impl ServiceFactory for InMemoryServices {
    fn calendar(&self, _user: &UserId) -> Arc<dyn CalendarService> {
        Arc::new(self.clone())
    }

    fn email(&self, _user: &UserId) -> Arc<dyn EmailService> {
        Arc::new(self.clone())
    }

    fn tasks(&self, _user: &UserId) -> Arc<dyn TaskService> {
        Arc::new(self.clone())
    }

    fn chat(&self, _user: &UserId) -> Arc<dyn ChatService> {
        Arc::new(self.clone())
    }
}
