//! Repository implementations for SQLite-backed persistence.
//!
//! Provides ActionRepository, SettingsRepository, NotificationRepository,
//! and PrefsRepository that operate on the Database struct using raw SQL.
//!
//! Action status changes go through `ActionRepository::transition`, a
//! guarded conditional UPDATE keyed on the previous status. Rows-affected
//! is the race verdict: concurrent writers both issue the update and
//! exactly one sees 1 row changed.

use std::str::FromStr;
use std::sync::Arc;

use uuid::Uuid;

use valet_core::error::ValetError;
use valet_core::plan::{ActionReceipt, UndoData};
use valet_core::types::{
    ActionKind, ActionRecord, ActionStatus, ApprovedBy, AutonomyLevel, AutonomySetting,
    ChannelPrefs, NotificationKind, NotificationPriority, NotificationRecord, NotifyChannel,
    Timestamp, UserId,
};

use crate::db::Database;

/// Columns of action_records in stable order, shared by every SELECT.
const ACTION_COLUMNS: &str = "id, user_id, action_type, description, params, goal_id, status, \
     autonomy_level_used, requires_approval, approved_by, approved_at, rejection_reason, \
     result, error, is_undoable, undo_data, undo_deadline, undone_at, \
     notified_via, notification_sent, notified_at, created_at, updated_at";

// =============================================================================
// ActionRepository
// =============================================================================

/// Column payload for a status transition.
///
/// Each variant names its destination status and carries exactly the
/// write-once fields that transition sets.
#[derive(Debug)]
pub enum TransitionPatch<'a> {
    /// PendingApproval -> Queued. Claims the record for execution.
    Claim,
    /// Queued -> Executed. Writes the receipt and, when present, the undo
    /// payload and deadline.
    Executed {
        receipt: &'a ActionReceipt,
        undo: Option<&'a UndoData>,
        undo_deadline: Option<Timestamp>,
        approved_by: ApprovedBy,
        approved_at: Timestamp,
    },
    /// Queued -> Failed. Writes the contained error text.
    Failed { error: &'a str },
    /// PendingApproval -> Rejected.
    Rejected { reason: Option<&'a str> },
    /// Executed -> Undone.
    Undone { undone_at: Timestamp },
}

impl TransitionPatch<'_> {
    /// Destination status this patch writes.
    pub fn target(&self) -> ActionStatus {
        match self {
            TransitionPatch::Claim => ActionStatus::Queued,
            TransitionPatch::Executed { .. } => ActionStatus::Executed,
            TransitionPatch::Failed { .. } => ActionStatus::Failed,
            TransitionPatch::Rejected { .. } => ActionStatus::Rejected,
            TransitionPatch::Undone { .. } => ActionStatus::Undone,
        }
    }
}

/// Repository for action records.
pub struct ActionRepository {
    db: Arc<Database>,
}

impl ActionRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store a new action record.
    pub fn insert(&self, record: &ActionRecord) -> Result<(), ValetError> {
        let params_json = serde_json::to_string(&record.params)?;
        let result_json = record
            .result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let undo_json = record
            .undo_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let notified_json = serde_json::to_string(&record.notified_via)?;

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO action_records
                    (id, user_id, action_type, description, params, goal_id, status,
                     autonomy_level_used, requires_approval, approved_by, approved_at,
                     rejection_reason, result, error, is_undoable, undo_data,
                     undo_deadline, undone_at, notified_via, notification_sent,
                     notified_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                         ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)",
                rusqlite::params![
                    record.id.to_string(),
                    record.user_id.as_str(),
                    record.kind.to_string(),
                    record.description,
                    params_json,
                    record.goal_id.map(|g| g.to_string()),
                    record.status.to_string(),
                    record.autonomy_level_used.to_string(),
                    record.requires_approval as i32,
                    record.approved_by.map(|a| a.to_string()),
                    record.approved_at.map(|t| t.0),
                    record.rejection_reason,
                    result_json,
                    record.error,
                    record.is_undoable as i32,
                    undo_json,
                    record.undo_deadline.map(|t| t.0),
                    record.undone_at.map(|t| t.0),
                    notified_json,
                    record.notification_sent as i32,
                    record.notified_at.map(|t| t.0),
                    record.created_at.0,
                    record.updated_at.0,
                ],
            )
            .map_err(|e| ValetError::Storage(format!("Failed to insert action: {}", e)))?;
            Ok(())
        })
    }

    /// Find an action record by id, scoped to its owner.
    ///
    /// A foreign user's id is indistinguishable from a missing one.
    pub fn find(&self, id: Uuid, user: &UserId) -> Result<Option<ActionRecord>, ValetError> {
        self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM action_records WHERE id = ?1 AND user_id = ?2",
                ACTION_COLUMNS
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| ValetError::Storage(e.to_string()))?;

            let result = stmt
                .query_row(rusqlite::params![id.to_string(), user.as_str()], |row| {
                    Ok(row_to_action_record(row))
                })
                .optional()
                .map_err(|e| ValetError::Storage(e.to_string()))?;

            match result {
                Some(record) => Ok(Some(record?)),
                None => Ok(None),
            }
        })
    }

    /// Conditionally advance a record's status.
    ///
    /// Issues one UPDATE guarded on `(id, user, status = from)`. Returns
    /// false when zero rows changed: the record is missing, foreign, or no
    /// longer in `from` because a concurrent writer got there first.
    ///
    /// An edge not in the lifecycle graph is a programming error and
    /// returns `Err` without touching the database.
    pub fn transition(
        &self,
        id: Uuid,
        user: &UserId,
        from: ActionStatus,
        patch: TransitionPatch<'_>,
    ) -> Result<bool, ValetError> {
        let to = patch.target();
        if !from.can_transition_to(to) {
            return Err(ValetError::Storage(format!(
                "Illegal status transition: {} -> {}",
                from, to
            )));
        }

        let now = Timestamp::now();
        let rows = match patch {
            TransitionPatch::Claim => self.db.with_conn(|conn| {
                conn.execute(
                    "UPDATE action_records SET status = 'queued', updated_at = ?4
                     WHERE id = ?1 AND user_id = ?2 AND status = ?3",
                    rusqlite::params![id.to_string(), user.as_str(), from.to_string(), now.0],
                )
                .map_err(|e| ValetError::Storage(format!("Failed to claim action: {}", e)))
            })?,
            TransitionPatch::Executed {
                receipt,
                undo,
                undo_deadline,
                approved_by,
                approved_at,
            } => {
                let receipt_json = serde_json::to_string(receipt)?;
                let undo_json = undo.map(serde_json::to_string).transpose()?;
                self.db.with_conn(|conn| {
                    conn.execute(
                        "UPDATE action_records
                         SET status = 'executed', result = ?4, undo_data = ?5,
                             undo_deadline = ?6, approved_by = ?7, approved_at = ?8,
                             updated_at = ?9
                         WHERE id = ?1 AND user_id = ?2 AND status = ?3",
                        rusqlite::params![
                            id.to_string(),
                            user.as_str(),
                            from.to_string(),
                            receipt_json,
                            undo_json,
                            undo_deadline.map(|t| t.0),
                            approved_by.to_string(),
                            approved_at.0,
                            now.0,
                        ],
                    )
                    .map_err(|e| {
                        ValetError::Storage(format!("Failed to mark executed: {}", e))
                    })
                })?
            }
            TransitionPatch::Failed { error } => self.db.with_conn(|conn| {
                conn.execute(
                    "UPDATE action_records
                     SET status = 'failed', error = ?4, updated_at = ?5
                     WHERE id = ?1 AND user_id = ?2 AND status = ?3",
                    rusqlite::params![
                        id.to_string(),
                        user.as_str(),
                        from.to_string(),
                        error,
                        now.0
                    ],
                )
                .map_err(|e| ValetError::Storage(format!("Failed to mark failed: {}", e)))
            })?,
            TransitionPatch::Rejected { reason } => self.db.with_conn(|conn| {
                conn.execute(
                    "UPDATE action_records
                     SET status = 'rejected', rejection_reason = ?4, updated_at = ?5
                     WHERE id = ?1 AND user_id = ?2 AND status = ?3",
                    rusqlite::params![
                        id.to_string(),
                        user.as_str(),
                        from.to_string(),
                        reason,
                        now.0
                    ],
                )
                .map_err(|e| ValetError::Storage(format!("Failed to mark rejected: {}", e)))
            })?,
            TransitionPatch::Undone { undone_at } => self.db.with_conn(|conn| {
                conn.execute(
                    "UPDATE action_records
                     SET status = 'undone', undone_at = ?4, updated_at = ?5
                     WHERE id = ?1 AND user_id = ?2 AND status = ?3",
                    rusqlite::params![
                        id.to_string(),
                        user.as_str(),
                        from.to_string(),
                        undone_at.0,
                        now.0
                    ],
                )
                .map_err(|e| ValetError::Storage(format!("Failed to mark undone: {}", e)))
            })?,
        };

        Ok(rows == 1)
    }

    /// Record which channels a notification about this action went out on.
    ///
    /// Metadata only; does not touch status and is not guarded.
    pub fn record_notification(
        &self,
        id: Uuid,
        channels: &[NotifyChannel],
        at: Timestamp,
    ) -> Result<(), ValetError> {
        let channels_json = serde_json::to_string(channels)?;
        let sent = !channels.is_empty();
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE action_records
                 SET notified_via = ?2, notification_sent = ?3, notified_at = ?4
                 WHERE id = ?1",
                rusqlite::params![id.to_string(), channels_json, sent as i32, at.0],
            )
            .map_err(|e| ValetError::Storage(format!("Failed to record notification: {}", e)))?;
            Ok(())
        })
    }

    /// List a user's records in one status, newest first.
    pub fn list_by_status(
        &self,
        user: &UserId,
        status: ActionStatus,
        limit: u64,
    ) -> Result<Vec<ActionRecord>, ValetError> {
        self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM action_records
                 WHERE user_id = ?1 AND status = ?2
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?3",
                ACTION_COLUMNS
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| ValetError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(
                    rusqlite::params![user.as_str(), status.to_string(), limit],
                    |row| Ok(row_to_action_record(row)),
                )
                .map_err(|e| ValetError::Storage(e.to_string()))?;

            let mut records = Vec::new();
            for row in rows {
                let record = row.map_err(|e| ValetError::Storage(e.to_string()))??;
                records.push(record);
            }
            Ok(records)
        })
    }

    /// List a user's records across all statuses, newest first.
    pub fn list_recent(&self, user: &UserId, limit: u64) -> Result<Vec<ActionRecord>, ValetError> {
        self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM action_records
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2",
                ACTION_COLUMNS
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| ValetError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![user.as_str(), limit], |row| {
                    Ok(row_to_action_record(row))
                })
                .map_err(|e| ValetError::Storage(e.to_string()))?;

            let mut records = Vec::new();
            for row in rows {
                let record = row.map_err(|e| ValetError::Storage(e.to_string()))??;
                records.push(record);
            }
            Ok(records)
        })
    }

    /// Total number of action records, all users.
    pub fn count(&self) -> Result<u64, ValetError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM action_records", [], |row| row.get(0))
                .map_err(|e| ValetError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }
}

// =============================================================================
// SettingsRepository
// =============================================================================

/// Repository for per-user autonomy overrides.
pub struct SettingsRepository {
    db: Arc<Database>,
}

impl SettingsRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Fetch the stored override for one (user, kind), if any.
    pub fn get(
        &self,
        user: &UserId,
        kind: ActionKind,
    ) -> Result<Option<AutonomySetting>, ValetError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT user_id, action_type, level, require_notification,
                            require_confirmation, updated_at
                     FROM autonomy_settings
                     WHERE user_id = ?1 AND action_type = ?2",
                )
                .map_err(|e| ValetError::Storage(e.to_string()))?;

            let result = stmt
                .query_row(rusqlite::params![user.as_str(), kind.to_string()], |row| {
                    Ok(row_to_setting(row))
                })
                .optional()
                .map_err(|e| ValetError::Storage(e.to_string()))?;

            match result {
                Some(setting) => Ok(Some(setting?)),
                None => Ok(None),
            }
        })
    }

    /// Insert or overwrite the override for (user, kind).
    pub fn upsert(&self, setting: &AutonomySetting) -> Result<(), ValetError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO autonomy_settings
                    (user_id, action_type, level, require_notification,
                     require_confirmation, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (user_id, action_type) DO UPDATE SET
                    level = excluded.level,
                    require_notification = excluded.require_notification,
                    require_confirmation = excluded.require_confirmation,
                    updated_at = excluded.updated_at",
                rusqlite::params![
                    setting.user_id.as_str(),
                    setting.kind.to_string(),
                    setting.level.to_string(),
                    setting.require_notification as i32,
                    setting.require_confirmation as i32,
                    setting.updated_at.0,
                ],
            )
            .map_err(|e| ValetError::Storage(format!("Failed to upsert setting: {}", e)))?;
            Ok(())
        })
    }

    /// All stored overrides for a user.
    pub fn list_for_user(&self, user: &UserId) -> Result<Vec<AutonomySetting>, ValetError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT user_id, action_type, level, require_notification,
                            require_confirmation, updated_at
                     FROM autonomy_settings
                     WHERE user_id = ?1
                     ORDER BY action_type",
                )
                .map_err(|e| ValetError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![user.as_str()], |row| {
                    Ok(row_to_setting(row))
                })
                .map_err(|e| ValetError::Storage(e.to_string()))?;

            let mut settings = Vec::new();
            for row in rows {
                let setting = row.map_err(|e| ValetError::Storage(e.to_string()))??;
                settings.push(setting);
            }
            Ok(settings)
        })
    }
}

// =============================================================================
// NotificationRepository
// =============================================================================

/// Repository for in-app notification rows.
pub struct NotificationRepository {
    db: Arc<Database>,
}

impl NotificationRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store a new notification.
    pub fn insert(&self, record: &NotificationRecord) -> Result<(), ValetError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications
                    (id, user_id, kind, priority, title, message, action_url,
                     action_label, related_action_id, read, read_at, dismissed,
                     dismissed_at, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                rusqlite::params![
                    record.id.to_string(),
                    record.user_id.as_str(),
                    record.kind.to_string(),
                    record.priority.to_string(),
                    record.title,
                    record.message,
                    record.action_url,
                    record.action_label,
                    record.related_action_id.map(|a| a.to_string()),
                    record.read as i32,
                    record.read_at.map(|t| t.0),
                    record.dismissed as i32,
                    record.dismissed_at.map(|t| t.0),
                    record.expires_at.map(|t| t.0),
                    record.created_at.0,
                ],
            )
            .map_err(|e| ValetError::Storage(format!("Failed to insert notification: {}", e)))?;
            Ok(())
        })
    }

    /// List a user's notifications, newest first.
    pub fn list_recent(
        &self,
        user: &UserId,
        limit: u64,
    ) -> Result<Vec<NotificationRecord>, ValetError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, user_id, kind, priority, title, message, action_url,
                            action_label, related_action_id, read, read_at, dismissed,
                            dismissed_at, expires_at, created_at
                     FROM notifications
                     WHERE user_id = ?1
                     ORDER BY created_at DESC, id DESC
                     LIMIT ?2",
                )
                .map_err(|e| ValetError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![user.as_str(), limit], |row| {
                    Ok(row_to_notification(row))
                })
                .map_err(|e| ValetError::Storage(e.to_string()))?;

            let mut records = Vec::new();
            for row in rows {
                let record = row.map_err(|e| ValetError::Storage(e.to_string()))??;
                records.push(record);
            }
            Ok(records)
        })
    }

    /// How many notifications the user has not read or dismissed.
    pub fn unread_count(&self, user: &UserId) -> Result<u64, ValetError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM notifications
                     WHERE user_id = ?1 AND read = 0 AND dismissed = 0",
                    rusqlite::params![user.as_str()],
                    |row| row.get(0),
                )
                .map_err(|e| ValetError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }

    /// Mark one notification read. Returns false if it is missing, foreign,
    /// or already read.
    pub fn mark_read(&self, id: Uuid, user: &UserId) -> Result<bool, ValetError> {
        let now = Timestamp::now();
        self.db.with_conn(|conn| {
            let rows = conn
                .execute(
                    "UPDATE notifications SET read = 1, read_at = ?3
                     WHERE id = ?1 AND user_id = ?2 AND read = 0",
                    rusqlite::params![id.to_string(), user.as_str(), now.0],
                )
                .map_err(|e| ValetError::Storage(format!("Failed to mark read: {}", e)))?;
            Ok(rows == 1)
        })
    }

    /// Dismiss one notification. Returns false if it is missing, foreign,
    /// or already dismissed.
    pub fn dismiss(&self, id: Uuid, user: &UserId) -> Result<bool, ValetError> {
        let now = Timestamp::now();
        self.db.with_conn(|conn| {
            let rows = conn
                .execute(
                    "UPDATE notifications SET dismissed = 1, dismissed_at = ?3
                     WHERE id = ?1 AND user_id = ?2 AND dismissed = 0",
                    rusqlite::params![id.to_string(), user.as_str(), now.0],
                )
                .map_err(|e| ValetError::Storage(format!("Failed to dismiss: {}", e)))?;
            Ok(rows == 1)
        })
    }

    /// Delete notifications whose expiry has passed. Returns how many went.
    pub fn purge_expired(&self, now: Timestamp) -> Result<usize, ValetError> {
        self.db.with_conn(|conn| {
            let rows = conn
                .execute(
                    "DELETE FROM notifications
                     WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                    rusqlite::params![now.0],
                )
                .map_err(|e| ValetError::Storage(format!("Failed to purge: {}", e)))?;
            Ok(rows)
        })
    }
}

// =============================================================================
// PrefsRepository
// =============================================================================

/// Repository for per-user channel preferences.
pub struct PrefsRepository {
    db: Arc<Database>,
}

impl PrefsRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Fetch a user's channel preferences, falling back to the defaults
    /// (email on, push off) when no row is stored.
    pub fn get(&self, user: &UserId) -> Result<ChannelPrefs, ValetError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT user_id, email_enabled, push_enabled, updated_at
                     FROM channel_prefs WHERE user_id = ?1",
                )
                .map_err(|e| ValetError::Storage(e.to_string()))?;

            let result = stmt
                .query_row(rusqlite::params![user.as_str()], |row| {
                    Ok(row_to_prefs(row))
                })
                .optional()
                .map_err(|e| ValetError::Storage(e.to_string()))?;

            match result {
                Some(prefs) => Ok(prefs?),
                None => Ok(ChannelPrefs::default_for(user.clone())),
            }
        })
    }

    /// Insert or overwrite a user's channel preferences.
    pub fn upsert(&self, prefs: &ChannelPrefs) -> Result<(), ValetError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO channel_prefs (user_id, email_enabled, push_enabled, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (user_id) DO UPDATE SET
                    email_enabled = excluded.email_enabled,
                    push_enabled = excluded.push_enabled,
                    updated_at = excluded.updated_at",
                rusqlite::params![
                    prefs.user_id.as_str(),
                    prefs.email_enabled as i32,
                    prefs.push_enabled as i32,
                    prefs.updated_at.0,
                ],
            )
            .map_err(|e| ValetError::Storage(format!("Failed to upsert prefs: {}", e)))?;
            Ok(())
        })
    }
}

// =============================================================================
// Row mappers
// =============================================================================

fn row_to_action_record(row: &rusqlite::Row<'_>) -> Result<ActionRecord, ValetError> {
    let id_str: String = row.get(0).map_err(|e| ValetError::Storage(e.to_string()))?;
    let user_id: String = row.get(1).map_err(|e| ValetError::Storage(e.to_string()))?;
    let kind_str: String = row.get(2).map_err(|e| ValetError::Storage(e.to_string()))?;
    let description: String = row.get(3).map_err(|e| ValetError::Storage(e.to_string()))?;
    let params_json: String = row.get(4).map_err(|e| ValetError::Storage(e.to_string()))?;
    let goal_id_str: Option<String> =
        row.get(5).map_err(|e| ValetError::Storage(e.to_string()))?;
    let status_str: String = row.get(6).map_err(|e| ValetError::Storage(e.to_string()))?;
    let level_str: String = row.get(7).map_err(|e| ValetError::Storage(e.to_string()))?;
    let requires_approval: i32 = row.get(8).map_err(|e| ValetError::Storage(e.to_string()))?;
    let approved_by_str: Option<String> =
        row.get(9).map_err(|e| ValetError::Storage(e.to_string()))?;
    let approved_at: Option<i64> = row.get(10).map_err(|e| ValetError::Storage(e.to_string()))?;
    let rejection_reason: Option<String> =
        row.get(11).map_err(|e| ValetError::Storage(e.to_string()))?;
    let result_json: Option<String> =
        row.get(12).map_err(|e| ValetError::Storage(e.to_string()))?;
    let error: Option<String> = row.get(13).map_err(|e| ValetError::Storage(e.to_string()))?;
    let is_undoable: i32 = row.get(14).map_err(|e| ValetError::Storage(e.to_string()))?;
    let undo_json: Option<String> =
        row.get(15).map_err(|e| ValetError::Storage(e.to_string()))?;
    let undo_deadline: Option<i64> =
        row.get(16).map_err(|e| ValetError::Storage(e.to_string()))?;
    let undone_at: Option<i64> = row.get(17).map_err(|e| ValetError::Storage(e.to_string()))?;
    let notified_json: String = row.get(18).map_err(|e| ValetError::Storage(e.to_string()))?;
    let notification_sent: i32 = row.get(19).map_err(|e| ValetError::Storage(e.to_string()))?;
    let notified_at: Option<i64> =
        row.get(20).map_err(|e| ValetError::Storage(e.to_string()))?;
    let created_at: i64 = row.get(21).map_err(|e| ValetError::Storage(e.to_string()))?;
    let updated_at: i64 = row.get(22).map_err(|e| ValetError::Storage(e.to_string()))?;

    Ok(ActionRecord {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| ValetError::Storage(format!("Invalid UUID: {}", e)))?,
        user_id: UserId::new(user_id),
        kind: ActionKind::from_str(&kind_str).map_err(ValetError::Storage)?,
        description,
        params: serde_json::from_str(&params_json)?,
        goal_id: goal_id_str
            .map(|g| Uuid::parse_str(&g))
            .transpose()
            .map_err(|e| ValetError::Storage(format!("Invalid goal UUID: {}", e)))?,
        status: ActionStatus::from_str(&status_str).map_err(ValetError::Storage)?,
        autonomy_level_used: AutonomyLevel::from_str(&level_str).map_err(ValetError::Storage)?,
        requires_approval: requires_approval != 0,
        approved_by: approved_by_str
            .map(|a| ApprovedBy::from_str(&a))
            .transpose()
            .map_err(ValetError::Storage)?,
        approved_at: approved_at.map(Timestamp),
        rejection_reason,
        result: result_json.map(|r| serde_json::from_str(&r)).transpose()?,
        error,
        is_undoable: is_undoable != 0,
        undo_data: undo_json.map(|u| serde_json::from_str(&u)).transpose()?,
        undo_deadline: undo_deadline.map(Timestamp),
        undone_at: undone_at.map(Timestamp),
        notified_via: serde_json::from_str(&notified_json)?,
        notification_sent: notification_sent != 0,
        notified_at: notified_at.map(Timestamp),
        created_at: Timestamp(created_at),
        updated_at: Timestamp(updated_at),
    })
}

fn row_to_setting(row: &rusqlite::Row<'_>) -> Result<AutonomySetting, ValetError> {
    let user_id: String = row.get(0).map_err(|e| ValetError::Storage(e.to_string()))?;
    let kind_str: String = row.get(1).map_err(|e| ValetError::Storage(e.to_string()))?;
    let level_str: String = row.get(2).map_err(|e| ValetError::Storage(e.to_string()))?;
    let require_notification: i32 =
        row.get(3).map_err(|e| ValetError::Storage(e.to_string()))?;
    let require_confirmation: i32 =
        row.get(4).map_err(|e| ValetError::Storage(e.to_string()))?;
    let updated_at: i64 = row.get(5).map_err(|e| ValetError::Storage(e.to_string()))?;

    Ok(AutonomySetting {
        user_id: UserId::new(user_id),
        kind: ActionKind::from_str(&kind_str).map_err(ValetError::Storage)?,
        level: AutonomyLevel::from_str(&level_str).map_err(ValetError::Storage)?,
        require_notification: require_notification != 0,
        require_confirmation: require_confirmation != 0,
        updated_at: Timestamp(updated_at),
    })
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> Result<NotificationRecord, ValetError> {
    let id_str: String = row.get(0).map_err(|e| ValetError::Storage(e.to_string()))?;
    let user_id: String = row.get(1).map_err(|e| ValetError::Storage(e.to_string()))?;
    let kind_str: String = row.get(2).map_err(|e| ValetError::Storage(e.to_string()))?;
    let priority_str: String = row.get(3).map_err(|e| ValetError::Storage(e.to_string()))?;
    let title: String = row.get(4).map_err(|e| ValetError::Storage(e.to_string()))?;
    let message: String = row.get(5).map_err(|e| ValetError::Storage(e.to_string()))?;
    let action_url: Option<String> =
        row.get(6).map_err(|e| ValetError::Storage(e.to_string()))?;
    let action_label: Option<String> =
        row.get(7).map_err(|e| ValetError::Storage(e.to_string()))?;
    let related_str: Option<String> =
        row.get(8).map_err(|e| ValetError::Storage(e.to_string()))?;
    let read: i32 = row.get(9).map_err(|e| ValetError::Storage(e.to_string()))?;
    let read_at: Option<i64> = row.get(10).map_err(|e| ValetError::Storage(e.to_string()))?;
    let dismissed: i32 = row.get(11).map_err(|e| ValetError::Storage(e.to_string()))?;
    let dismissed_at: Option<i64> =
        row.get(12).map_err(|e| ValetError::Storage(e.to_string()))?;
    let expires_at: Option<i64> =
        row.get(13).map_err(|e| ValetError::Storage(e.to_string()))?;
    let created_at: i64 = row.get(14).map_err(|e| ValetError::Storage(e.to_string()))?;

    Ok(NotificationRecord {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| ValetError::Storage(format!("Invalid UUID: {}", e)))?,
        user_id: UserId::new(user_id),
        kind: NotificationKind::from_str(&kind_str).map_err(ValetError::Storage)?,
        priority: NotificationPriority::from_str(&priority_str).map_err(ValetError::Storage)?,
        title,
        message,
        action_url,
        action_label,
        related_action_id: related_str
            .map(|r| Uuid::parse_str(&r))
            .transpose()
            .map_err(|e| ValetError::Storage(format!("Invalid action UUID: {}", e)))?,
        read: read != 0,
        read_at: read_at.map(Timestamp),
        dismissed: dismissed != 0,
        dismissed_at: dismissed_at.map(Timestamp),
        expires_at: expires_at.map(Timestamp),
        created_at: Timestamp(created_at),
    })
}

fn row_to_prefs(row: &rusqlite::Row<'_>) -> Result<ChannelPrefs, ValetError> {
    let user_id: String = row.get(0).map_err(|e| ValetError::Storage(e.to_string()))?;
    let email_enabled: i32 = row.get(1).map_err(|e| ValetError::Storage(e.to_string()))?;
    let push_enabled: i32 = row.get(2).map_err(|e| ValetError::Storage(e.to_string()))?;
    let updated_at: i64 = row.get(3).map_err(|e| ValetError::Storage(e.to_string()))?;

    Ok(ChannelPrefs {
        user_id: UserId::new(user_id),
        email_enabled: email_enabled != 0,
        push_enabled: push_enabled != 0,
        updated_at: Timestamp(updated_at),
    })
}

/// Extension trait for rusqlite to support optional query results.
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
