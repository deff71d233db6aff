//! Notification request shape and notify-side errors.

use thiserror::Error;
use uuid::Uuid;

use valet_core::types::{
    NotificationKind, NotificationPriority, NotificationRecord, Timestamp, UserId,
};

/// Errors from notification delivery plumbing.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Email transport failed: {0}")]
    Transport(String),
}

/// What the engine asks the dispatcher to deliver.
///
/// Channel selection is not part of the request; the dispatcher works
/// that out from the user's preferences.
#[derive(Debug, Clone)]
pub struct NotificationRequest {
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub priority: NotificationPriority,
    pub title: String,
    pub message: String,
    pub action_url: Option<String>,
    pub action_label: Option<String>,
    pub related_action_id: Option<Uuid>,
    /// Seconds until the in-app row may be purged. None keeps it forever.
    pub expires_in: Option<i64>,
}

impl NotificationRequest {
    pub fn new(
        user_id: UserId,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            kind,
            priority: NotificationPriority::Normal,
            title: title.into(),
            message: message.into(),
            action_url: None,
            action_label: None,
            related_action_id: None,
            expires_in: None,
        }
    }

    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_action_link(
        mut self,
        url: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        self.action_url = Some(url.into());
        self.action_label = Some(label.into());
        self
    }

    pub fn with_related_action(mut self, action_id: Uuid) -> Self {
        self.related_action_id = Some(action_id);
        self
    }

    pub fn with_expiry(mut self, seconds: i64) -> Self {
        self.expires_in = Some(seconds);
        self
    }

    /// Materialize the in-app row for this request.
    pub fn to_record(&self, now: Timestamp) -> NotificationRecord {
        NotificationRecord {
            id: Uuid::new_v4(),
            user_id: self.user_id.clone(),
            kind: self.kind,
            priority: self.priority,
            title: self.title.clone(),
            message: self.message.clone(),
            action_url: self.action_url.clone(),
            action_label: self.action_label.clone(),
            related_action_id: self.related_action_id,
            read: false,
            read_at: None,
            dismissed: false,
            dismissed_at: None,
            expires_at: self.expires_in.map(|s| now.plus_seconds(s)),
            created_at: now,
        }
    }
}
