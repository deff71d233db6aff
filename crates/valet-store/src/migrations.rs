//! Database schema migrations.
//!
//! Applies the initial schema including the action_records,
//! autonomy_settings, notifications, channel_prefs, and schema_migrations
//! tables.

use rusqlite::Connection;
use tracing::info;

use valet_core::error::ValetError;

/// Run all pending database migrations.
///
/// Currently implements the initial schema (version 1). Future migrations
/// can be added by checking the current version and applying incremental changes.
pub fn run_migrations(conn: &Connection) -> Result<(), ValetError> {
    // Create the migrations tracking table first.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| ValetError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| ValetError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<(), ValetError> {
    conn.execute_batch(
        "
        -- Per-user autonomy overrides. Absence of a row means the kind's
        -- built-in default applies.
        CREATE TABLE IF NOT EXISTS autonomy_settings (
            user_id              TEXT NOT NULL,
            action_type          TEXT NOT NULL
                                 CHECK (action_type IN ('calendar_block', 'email_draft',
                                        'task_create', 'status_set', 'email_send', 'message_post')),
            level                TEXT NOT NULL
                                 CHECK (level IN ('high', 'medium', 'low')),
            require_notification INTEGER NOT NULL DEFAULT 1,
            require_confirmation INTEGER NOT NULL DEFAULT 0,
            updated_at           INTEGER NOT NULL,
            PRIMARY KEY (user_id, action_type)
        );

        -- One row per proposed action, append-mostly. Status changes are
        -- guarded conditional updates keyed on the previous status.
        CREATE TABLE IF NOT EXISTS action_records (
            id                  TEXT PRIMARY KEY NOT NULL,
            user_id             TEXT NOT NULL,
            action_type         TEXT NOT NULL,
            description         TEXT NOT NULL DEFAULT '',
            params              TEXT NOT NULL,
            goal_id             TEXT,
            status              TEXT NOT NULL
                                CHECK (status IN ('pending_approval', 'queued', 'executed',
                                       'failed', 'rejected', 'undone')),
            autonomy_level_used TEXT NOT NULL
                                CHECK (autonomy_level_used IN ('high', 'medium', 'low')),
            requires_approval   INTEGER NOT NULL DEFAULT 0,
            approved_by         TEXT
                                CHECK (approved_by IS NULL OR approved_by IN ('auto', 'user')),
            approved_at         INTEGER,
            rejection_reason    TEXT,
            result              TEXT,
            error               TEXT,
            is_undoable         INTEGER NOT NULL DEFAULT 0,
            undo_data           TEXT,
            undo_deadline       INTEGER,
            undone_at           INTEGER,
            notified_via        TEXT NOT NULL DEFAULT '[]',
            notification_sent   INTEGER NOT NULL DEFAULT 0,
            notified_at         INTEGER,
            created_at          INTEGER NOT NULL,
            updated_at          INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_actions_user_status
            ON action_records (user_id, status);

        CREATE INDEX IF NOT EXISTS idx_actions_user_created
            ON action_records (user_id, created_at DESC);

        CREATE INDEX IF NOT EXISTS idx_actions_undo_window
            ON action_records (user_id, undo_deadline)
            WHERE is_undoable = 1 AND status = 'executed';

        -- In-app notification rows, read by clients.
        CREATE TABLE IF NOT EXISTS notifications (
            id                TEXT PRIMARY KEY NOT NULL,
            user_id           TEXT NOT NULL,
            kind              TEXT NOT NULL
                              CHECK (kind IN ('approval_needed', 'action_notice',
                                     'action_completed')),
            priority          TEXT NOT NULL DEFAULT 'normal'
                              CHECK (priority IN ('low', 'normal', 'high')),
            title             TEXT NOT NULL,
            message           TEXT NOT NULL DEFAULT '',
            action_url        TEXT,
            action_label      TEXT,
            related_action_id TEXT,
            read              INTEGER NOT NULL DEFAULT 0,
            read_at           INTEGER,
            dismissed         INTEGER NOT NULL DEFAULT 0,
            dismissed_at      INTEGER,
            expires_at        INTEGER,
            created_at        INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_user_created
            ON notifications (user_id, created_at DESC);

        CREATE INDEX IF NOT EXISTS idx_notifications_unread
            ON notifications (user_id)
            WHERE read = 0 AND dismissed = 0;

        -- Per-user channel opt-ins. In-app is always on and not stored.
        CREATE TABLE IF NOT EXISTS channel_prefs (
            user_id       TEXT PRIMARY KEY NOT NULL,
            email_enabled INTEGER NOT NULL DEFAULT 1,
            push_enabled  INTEGER NOT NULL DEFAULT 0,
            updated_at    INTEGER NOT NULL
        );

        -- Record migration.
        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| ValetError::Storage(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}
