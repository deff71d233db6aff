//! Notification fan-out for valet.
//!
//! One dispatcher delivers over three channels: in-app rows written
//! synchronously, email queued to a background outbox, and a push stub.
//! Delivery is best effort on every channel. A failed or dropped
//! notification never fails the action that triggered it.

pub mod dispatcher;
pub mod outbox;
pub mod types;

pub use dispatcher::{NotificationDispatcher, NotificationRateLimiter, Notifier};
pub use outbox::{EmailTransport, LogTransport, OutboundEmail, OutboxWorker};
pub use types::{NotificationRequest, NotifyError};
