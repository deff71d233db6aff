//! Application state shared across all route handlers.
//!
//! AppState holds the engine and the read-side repositories. It is
//! passed to handlers via axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use valet_engine::{ActionEngine, PolicyResolver};
use valet_store::{ActionRepository, NotificationRepository, SettingsRepository};

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    /// The action engine: submission, approval, rejection, undo.
    pub engine: Arc<ActionEngine>,
    /// Policy resolution for the settings read side.
    pub policy: Arc<PolicyResolver>,
    /// Stored autonomy overrides.
    pub settings: Arc<SettingsRepository>,
    /// In-app notification feed.
    pub notifications: Arc<NotificationRepository>,
    /// Action records, for health counts.
    pub actions: Arc<ActionRepository>,
    /// Bearer token required on every non-public route.
    pub api_token: String,
    /// Port the server listens on, used for the CORS allow list.
    pub port: u16,
    /// Request body cap in kilobytes.
    pub max_body_kb: usize,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        engine: Arc<ActionEngine>,
        policy: Arc<PolicyResolver>,
        settings: Arc<SettingsRepository>,
        notifications: Arc<NotificationRepository>,
        actions: Arc<ActionRepository>,
        api_token: String,
        port: u16,
        max_body_kb: usize,
    ) -> Self {
        Self {
            engine,
            policy,
            settings,
            notifications,
            actions,
            api_token,
            port,
            max_body_kb,
            start_time: Instant::now(),
        }
    }
}
