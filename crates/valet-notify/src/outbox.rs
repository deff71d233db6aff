//! Background email outbox.
//!
//! The dispatcher enqueues; this worker drains the queue and hands each
//! email to a transport. Best effort only: a transport error is logged
//! and the email is gone. There is no retry queue.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};
use tracing::{info, warn};
use uuid::Uuid;

use valet_core::types::UserId;

use crate::types::NotifyError;

/// An email waiting for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub user_id: UserId,
    pub subject: String,
    pub body: String,
    pub related_action_id: Option<Uuid>,
}

/// Delivery backend for outbound email.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn deliver(&self, email: &OutboundEmail) -> Result<(), NotifyError>;
}

/// Default transport: writes the email to the log and calls it sent.
pub struct LogTransport;

#[async_trait]
impl EmailTransport for LogTransport {
    async fn deliver(&self, email: &OutboundEmail) -> Result<(), NotifyError> {
        info!(
            user = %email.user_id,
            subject = %email.subject,
            "Outbound email (log transport)"
        );
        Ok(())
    }
}

/// Consumes the outbox queue until shutdown.
pub struct OutboxWorker {
    rx: mpsc::Receiver<OutboundEmail>,
    transport: Arc<dyn EmailTransport>,
    shutdown: Arc<Notify>,
}

impl OutboxWorker {
    pub fn new(
        rx: mpsc::Receiver<OutboundEmail>,
        transport: Arc<dyn EmailTransport>,
        shutdown: Arc<Notify>,
    ) -> Self {
        Self {
            rx,
            transport,
            shutdown,
        }
    }

    /// Deliver queued emails until the shutdown signal or until every
    /// sender is gone. On shutdown, drains what is already queued first.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                received = self.rx.recv() => {
                    match received {
                        Some(email) => self.deliver(email).await,
                        None => return,
                    }
                }
                _ = self.shutdown.notified() => {
                    while let Ok(email) = self.rx.try_recv() {
                        self.deliver(email).await;
                    }
                    return;
                }
            }
        }
    }

    async fn deliver(&self, email: OutboundEmail) {
        if let Err(e) = self.transport.deliver(&email).await {
            warn!(user = %email.user_id, error = %e, "Email delivery failed, dropping");
        }
    }
}
