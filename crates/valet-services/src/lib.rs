//! Outward-facing service seams for valet.
//!
//! Executors act on the world through these traits: calendar, email,
//! tasks, and chat. The shipped implementation is the in-memory backend
//! in [`memory`]; real integrations plug in behind the same traits.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use valet_core::types::{Timestamp, UserId};

pub use memory::InMemoryServices;

/// Errors surfaced by a backing service.
///
/// These never escape the engine; they are folded into the failure text
/// on the action record.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("No credentials on file for {service}")]
    NoCredentials { service: &'static str },

    #[error("{service} request failed: {message}")]
    Request {
        service: &'static str,
        message: String,
    },
}

/// A created calendar event, as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub event_id: String,
    pub calendar_id: String,
}

/// Calendar operations.
#[async_trait]
pub trait CalendarService: Send + Sync {
    /// Create a blocking event. Returns the backend's event handle.
    async fn create_event(
        &self,
        title: &str,
        start: Timestamp,
        duration_minutes: u32,
    ) -> Result<CalendarEvent, ServiceError>;

    /// Remove an event previously created through this service.
    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), ServiceError>;
}

/// Email operations.
#[async_trait]
pub trait EmailService: Send + Sync {
    /// Create a draft in the user's mailbox. Returns the draft id.
    async fn create_draft(
        &self,
        to: &[String],
        subject: &str,
        body: &str,
    ) -> Result<String, ServiceError>;

    /// Discard a draft previously created through this service.
    async fn delete_draft(&self, draft_id: &str) -> Result<(), ServiceError>;

    /// Send a message immediately. Returns the backend message id.
    ///
    /// There is no corresponding delete: a sent message is gone.
    async fn send_message(
        &self,
        to: &[String],
        cc: &[String],
        subject: &str,
        body: &str,
    ) -> Result<String, ServiceError>;
}

/// Task tracker operations.
#[async_trait]
pub trait TaskService: Send + Sync {
    /// Create a task. Returns the backend task id.
    async fn create_task(
        &self,
        title: &str,
        notes: Option<&str>,
        due: Option<Timestamp>,
    ) -> Result<String, ServiceError>;

    /// Remove a task previously created through this service.
    async fn delete_task(&self, task_id: &str) -> Result<(), ServiceError>;
}

/// Chat workspace operations.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Set the user's presence status, optionally until a given time.
    ///
    /// Returns the previous status when the backend reports one. A `None`
    /// here means the old status is unknown and cannot be restored later.
    async fn set_status(
        &self,
        status: &str,
        until: Option<Timestamp>,
    ) -> Result<Option<String>, ServiceError>;

    /// Post a message to a channel. Returns the backend message timestamp.
    async fn post_message(&self, channel: &str, message: &str) -> Result<String, ServiceError>;
}

/// Hands out per-user service handles.
///
/// The engine resolves services through this at execution time, so a
/// swap of backend (or of credentials) never touches executor code.
pub trait ServiceFactory: Send + Sync {
    fn calendar(&self, user: &UserId) -> Arc<dyn CalendarService>;
    fn email(&self, user: &UserId) -> Arc<dyn EmailService>;
    fn tasks(&self, user: &UserId) -> Arc<dyn TaskService>;
    fn chat(&self, user: &UserId) -> Arc<dyn ChatService>;
}
