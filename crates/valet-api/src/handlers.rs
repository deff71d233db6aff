//! Route handler functions for all API endpoints.
//!
//! Each handler extracts the acting user from `X-User-Id`, validates
//! parameters, calls into the engine or a repository, and returns JSON.
//! Engine outcomes pass through unchanged; only their HTTP status code
//! is decided here.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use valet_core::plan::Plan;
use valet_core::types::{
    ActionKind, ActionRecord, ActionStatus, AutonomyLevel, AutonomySetting, NotificationRecord,
    Timestamp,
};
use valet_engine::{Outcome, OutcomeStatus};

use crate::auth::require_user;
use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Query parameter types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListActionsParams {
    pub status: Option<String>,
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ListNotificationsParams {
    pub limit: Option<u64>,
}

// =============================================================================
// Request bodies
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingRequest {
    pub level: AutonomyLevel,
    pub require_notification: Option<bool>,
    pub require_confirmation: Option<bool>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub total_actions: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionListResponse {
    pub actions: Vec<ActionRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RejectResponse {
    pub rejected: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UndoResponse {
    pub undone: bool,
}

/// One kind's effective autonomy configuration. `stored` is true when
/// the user has overridden the built-in default for this kind.
#[derive(Debug, Serialize, Deserialize)]
pub struct SettingEntry {
    pub kind: ActionKind,
    pub level: AutonomyLevel,
    pub require_notification: bool,
    pub require_confirmation: bool,
    pub stored: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SettingsResponse {
    pub settings: Vec<SettingEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationListResponse {
    pub notifications: Vec<NotificationRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkReadResponse {
    pub read: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DismissResponse {
    pub dismissed: bool,
}

// =============================================================================
// Health
// =============================================================================

/// GET /health - health check, no auth required.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let uptime = state.start_time.elapsed().as_secs();
    let total_actions = state.actions.count().unwrap_or(0);

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: uptime,
        total_actions,
    }))
}

// =============================================================================
// Actions
// =============================================================================

/// POST /api/actions - submit a plan for execution.
///
/// 201 when the action executed, 200 when it is pending approval or
/// failed in a contained way, 422 when the plan was refused outright.
pub async fn submit_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(plan): Json<Plan>,
) -> Result<(StatusCode, Json<Outcome>), ApiError> {
    let user = require_user(&headers)?;
    let outcome = state.engine.submit(&user, plan).await?;
    let status = match outcome.status {
        OutcomeStatus::Executed => StatusCode::CREATED,
        OutcomeStatus::Invalid => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::OK,
    };
    Ok((status, Json(outcome)))
}

/// GET /api/actions - list the caller's actions, newest first.
pub async fn list_actions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListActionsParams>,
) -> Result<Json<ActionListResponse>, ApiError> {
    let user = require_user(&headers)?;
    let limit = params.limit.unwrap_or(50).min(200).max(1);

    let status = match params.status.as_deref() {
        Some(raw) => Some(
            raw.parse::<ActionStatus>()
                .map_err(ApiError::BadRequest)?,
        ),
        None => None,
    };

    let actions = state.engine.list(&user, status, limit)?;
    Ok(Json(ActionListResponse { actions }))
}

/// GET /api/actions/{id} - fetch one action record.
pub async fn get_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionRecord>, ApiError> {
    let user = require_user(&headers)?;
    match state.engine.get(id, &user)? {
        Some(record) => Ok(Json(record)),
        None => Err(ApiError::NotFound(format!("No action with id {}", id))),
    }
}

/// POST /api/actions/{id}/approve - approve a pending action.
///
/// The outcome body is uniform with submission; a 404 status carries the
/// not_found outcome rather than an error envelope.
pub async fn approve_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<Outcome>), ApiError> {
    let user = require_user(&headers)?;
    let outcome = state.engine.approve(id, &user).await?;
    let status = match outcome.status {
        OutcomeStatus::NotFound => StatusCode::NOT_FOUND,
        _ => StatusCode::OK,
    };
    Ok((status, Json(outcome)))
}

/// POST /api/actions/{id}/reject - reject a pending action.
///
/// The body is optional; `{"reason": "..."}` attaches a reason to the
/// record.
pub async fn reject_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<RejectResponse>, ApiError> {
    let user = require_user(&headers)?;
    let reason = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<RejectRequest>(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))?
            .reason
    };
    let rejected = state.engine.reject(id, &user, reason.as_deref()).await?;
    Ok(Json(RejectResponse { rejected }))
}

/// POST /api/actions/{id}/undo - reverse an executed action.
pub async fn undo_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<UndoResponse>, ApiError> {
    let user = require_user(&headers)?;
    let undone = state.engine.undo(id, &user).await?;
    Ok(Json(UndoResponse { undone }))
}

// =============================================================================
// Settings
// =============================================================================

/// GET /api/settings - effective autonomy settings for every kind.
pub async fn get_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SettingsResponse>, ApiError> {
    let user = require_user(&headers)?;

    let stored: Vec<ActionKind> = state
        .settings
        .list_for_user(&user)?
        .into_iter()
        .map(|s| s.kind)
        .collect();

    let settings = ActionKind::ALL
        .into_iter()
        .map(|kind| {
            let setting = state.policy.resolve_setting(&user, kind);
            SettingEntry {
                kind,
                level: setting.level,
                require_notification: setting.require_notification,
                require_confirmation: setting.require_confirmation,
                stored: stored.contains(&kind),
            }
        })
        .collect();

    Ok(Json(SettingsResponse { settings }))
}

/// PUT /api/settings/{kind} - upsert an autonomy override for one kind.
pub async fn update_setting(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(kind): Path<String>,
    Json(body): Json<UpdateSettingRequest>,
) -> Result<Json<SettingEntry>, ApiError> {
    let user = require_user(&headers)?;
    let kind = kind.parse::<ActionKind>().map_err(ApiError::BadRequest)?;

    // Unspecified flags keep their current effective values.
    let current = state.policy.resolve_setting(&user, kind);
    let setting = AutonomySetting {
        user_id: user.clone(),
        kind,
        level: body.level,
        require_notification: body
            .require_notification
            .unwrap_or(current.require_notification),
        require_confirmation: body
            .require_confirmation
            .unwrap_or(current.require_confirmation),
        updated_at: Timestamp::now(),
    };
    state.settings.upsert(&setting)?;
    tracing::info!(user = %user, kind = %kind, level = %setting.level, "Autonomy setting updated");

    Ok(Json(SettingEntry {
        kind,
        level: setting.level,
        require_notification: setting.require_notification,
        require_confirmation: setting.require_confirmation,
        stored: true,
    }))
}

// =============================================================================
// Notifications
// =============================================================================

/// GET /api/notifications - recent notifications, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListNotificationsParams>,
) -> Result<Json<NotificationListResponse>, ApiError> {
    let user = require_user(&headers)?;
    let limit = params.limit.unwrap_or(50).min(200).max(1);
    let notifications = state.notifications.list_recent(&user, limit)?;
    Ok(Json(NotificationListResponse { notifications }))
}

/// GET /api/notifications/unread_count - badge count.
pub async fn unread_count(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    let user = require_user(&headers)?;
    let count = state.notifications.unread_count(&user)?;
    Ok(Json(UnreadCountResponse { count }))
}

/// POST /api/notifications/{id}/read - mark one notification read.
pub async fn mark_notification_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<MarkReadResponse>, ApiError> {
    let user = require_user(&headers)?;
    let read = state.notifications.mark_read(id, &user)?;
    Ok(Json(MarkReadResponse { read }))
}

/// POST /api/notifications/{id}/dismiss - dismiss one notification.
pub async fn dismiss_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<DismissResponse>, ApiError> {
    let user = require_user(&headers)?;
    let dismissed = state.notifications.dismiss(id, &user)?;
    Ok(Json(DismissResponse { dismissed }))
}
