//! Multi-channel notification dispatcher.
//!
//! In-app is written synchronously, email is queued for the outbox
//! worker, push is a stub. Each channel reports its own boolean; a
//! failure on one channel never blocks another and `send` never errors.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use valet_core::types::{ChannelPrefs, NotifyChannel, Timestamp};
use valet_store::{NotificationRepository, PrefsRepository};

use crate::outbox::OutboundEmail;
use crate::types::NotificationRequest;

/// Delivery seam the engine depends on.
///
/// The map says which channels were attempted and whether each one
/// accepted the notification. For email "accepted" means queued, not
/// delivered. For push it means nothing at all; see the dispatcher.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, req: NotificationRequest) -> HashMap<NotifyChannel, bool>;
}

/// Token-bucket rate limiter for notification delivery.
///
/// Prevents notification flooding by limiting to N notifications per minute.
pub struct NotificationRateLimiter {
    max_per_minute: u32,
    tokens: std::sync::Mutex<(u32, std::time::Instant)>,
}

impl NotificationRateLimiter {
    /// Create a rate limiter allowing `max_per_minute` notifications per minute.
    pub fn new(max_per_minute: u32) -> Self {
        Self {
            max_per_minute,
            tokens: std::sync::Mutex::new((max_per_minute, std::time::Instant::now())),
        }
    }

    /// Try to acquire a token. Returns `true` if allowed, `false` if rate-limited.
    pub fn try_acquire(&self) -> bool {
        let mut state = match self.tokens.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        let elapsed = state.1.elapsed();
        if elapsed >= std::time::Duration::from_secs(60) {
            // Reset bucket
            state.0 = self.max_per_minute;
            state.1 = std::time::Instant::now();
        }
        if state.0 > 0 {
            state.0 -= 1;
            true
        } else {
            false
        }
    }
}

/// The shipped [`Notifier`].
pub struct NotificationDispatcher {
    notifications: Arc<NotificationRepository>,
    prefs: Arc<PrefsRepository>,
    outbox: mpsc::Sender<OutboundEmail>,
    limiter: NotificationRateLimiter,
}

impl NotificationDispatcher {
    pub fn new(
        notifications: Arc<NotificationRepository>,
        prefs: Arc<PrefsRepository>,
        outbox: mpsc::Sender<OutboundEmail>,
        max_per_minute: u32,
    ) -> Self {
        Self {
            notifications,
            prefs,
            outbox,
            limiter: NotificationRateLimiter::new(max_per_minute),
        }
    }
}

#[async_trait]
impl Notifier for NotificationDispatcher {
    async fn send(&self, req: NotificationRequest) -> HashMap<NotifyChannel, bool> {
        let mut delivered = HashMap::new();

        if !self.limiter.try_acquire() {
            warn!(user = %req.user_id, title = %req.title, "Notification rate limit hit, dropping");
            delivered.insert(NotifyChannel::InApp, false);
            delivered.insert(NotifyChannel::Email, false);
            delivered.insert(NotifyChannel::Push, false);
            return delivered;
        }

        let prefs = match self.prefs.get(&req.user_id) {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!(user = %req.user_id, error = %e, "Channel prefs lookup failed, using defaults");
                ChannelPrefs::default_for(req.user_id.clone())
            }
        };

        // In-app is always on.
        let record = req.to_record(Timestamp::now());
        let in_app = match self.notifications.insert(&record) {
            Ok(()) => true,
            Err(e) => {
                warn!(user = %req.user_id, error = %e, "In-app notification insert failed");
                false
            }
        };
        delivered.insert(NotifyChannel::InApp, in_app);

        if prefs.email_enabled {
            let email = OutboundEmail {
                user_id: req.user_id.clone(),
                subject: req.title.clone(),
                body: req.message.clone(),
                related_action_id: req.related_action_id,
            };
            // Fire and forget: success here means queued, nothing more.
            let queued = match self.outbox.try_send(email) {
                Ok(()) => true,
                Err(e) => {
                    warn!(user = %req.user_id, error = %e, "Email outbox rejected notification");
                    false
                }
            };
            delivered.insert(NotifyChannel::Email, queued);
        }

        if prefs.push_enabled {
            // Stub channel: reports success with no delivery behind it.
            debug!(user = %req.user_id, title = %req.title, "Push delivery stubbed");
            delivered.insert(NotifyChannel::Push, true);
        }

        delivered
    }
}
