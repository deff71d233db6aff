use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::plan::{ActionParams, ActionReceipt, Plan, UndoData};

// =============================================================================
// Enums
// =============================================================================

/// The kind of action the engine can execute on a user's behalf.
///
/// Closed set: an unrecognized kind string fails at the deserialization
/// boundary and never produces a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Block time on the user's calendar.
    CalendarBlock,
    /// Create an email draft in the user's mailbox.
    EmailDraft,
    /// Create a task in the user's task list.
    TaskCreate,
    /// Set the user's chat presence status.
    StatusSet,
    /// Send an email on the user's behalf.
    EmailSend,
    /// Post a message to a chat channel.
    MessagePost,
}

impl ActionKind {
    /// All kinds, in a stable order. Used by the settings API and registry
    /// wiring.
    pub const ALL: [ActionKind; 6] = [
        ActionKind::CalendarBlock,
        ActionKind::EmailDraft,
        ActionKind::TaskCreate,
        ActionKind::StatusSet,
        ActionKind::EmailSend,
        ActionKind::MessagePost,
    ];

    /// Autonomy level applied when the user has no stored override.
    ///
    /// Actions invisible to other people (calendar blocks, drafts, private
    /// tasks) default to High. Visible-but-benign presence changes default
    /// to Medium. Anything outward-facing defaults to Low.
    pub fn default_autonomy(&self) -> AutonomyLevel {
        match self {
            ActionKind::CalendarBlock => AutonomyLevel::High,
            ActionKind::EmailDraft => AutonomyLevel::High,
            ActionKind::TaskCreate => AutonomyLevel::High,
            ActionKind::StatusSet => AutonomyLevel::Medium,
            ActionKind::EmailSend => AutonomyLevel::Low,
            ActionKind::MessagePost => AutonomyLevel::Low,
        }
    }

    /// Whether an executed action of this kind can be reversed.
    ///
    /// Sent email and posted messages cannot be unsent.
    pub fn is_undoable(&self) -> bool {
        match self {
            ActionKind::CalendarBlock => true,
            ActionKind::EmailDraft => true,
            ActionKind::TaskCreate => true,
            ActionKind::StatusSet => true,
            ActionKind::EmailSend => false,
            ActionKind::MessagePost => false,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::CalendarBlock => write!(f, "calendar_block"),
            ActionKind::EmailDraft => write!(f, "email_draft"),
            ActionKind::TaskCreate => write!(f, "task_create"),
            ActionKind::StatusSet => write!(f, "status_set"),
            ActionKind::EmailSend => write!(f, "email_send"),
            ActionKind::MessagePost => write!(f, "message_post"),
        }
    }
}

impl std::str::FromStr for ActionKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "calendar_block" => Ok(ActionKind::CalendarBlock),
            "email_draft" => Ok(ActionKind::EmailDraft),
            "task_create" => Ok(ActionKind::TaskCreate),
            "status_set" => Ok(ActionKind::StatusSet),
            "email_send" => Ok(ActionKind::EmailSend),
            "message_post" => Ok(ActionKind::MessagePost),
            _ => Err(format!("Unknown action kind: {}", s)),
        }
    }
}

/// How much trust the user extends to a given action kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutonomyLevel {
    /// Execute immediately, notify after success.
    High,
    /// Notify (best effort), then execute without waiting.
    Medium,
    /// Queue for explicit approval before executing.
    Low,
}

impl fmt::Display for AutonomyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutonomyLevel::High => write!(f, "high"),
            AutonomyLevel::Medium => write!(f, "medium"),
            AutonomyLevel::Low => write!(f, "low"),
        }
    }
}

impl std::str::FromStr for AutonomyLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(AutonomyLevel::High),
            "medium" => Ok(AutonomyLevel::Medium),
            "low" => Ok(AutonomyLevel::Low),
            _ => Err(format!("Unknown autonomy level: {}", s)),
        }
    }
}

/// Lifecycle state of an action record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Waiting for the user to approve or reject.
    PendingApproval,
    /// Claimed for execution. Transient: an executor call is in flight.
    Queued,
    /// Executed successfully. Terminal except for the undo edge.
    Executed,
    /// Execution failed. Terminal; failed actions are never auto-retried.
    Failed,
    /// Rejected by the user. Terminal.
    Rejected,
    /// Executed, then reversed within the undo window. Terminal.
    Undone,
}

impl ActionStatus {
    /// Whether `self -> to` is a legal lifecycle transition.
    ///
    /// The full edge set:
    /// - PendingApproval -> Queued (approval claims the record)
    /// - PendingApproval -> Rejected
    /// - Queued -> Executed
    /// - Queued -> Failed
    /// - Executed -> Undone
    pub fn can_transition_to(&self, to: ActionStatus) -> bool {
        matches!(
            (self, to),
            (ActionStatus::PendingApproval, ActionStatus::Queued)
                | (ActionStatus::PendingApproval, ActionStatus::Rejected)
                | (ActionStatus::Queued, ActionStatus::Executed)
                | (ActionStatus::Queued, ActionStatus::Failed)
                | (ActionStatus::Executed, ActionStatus::Undone)
        )
    }

    /// Whether no further transition can ever leave this state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActionStatus::Failed | ActionStatus::Rejected | ActionStatus::Undone
        )
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionStatus::PendingApproval => write!(f, "pending_approval"),
            ActionStatus::Queued => write!(f, "queued"),
            ActionStatus::Executed => write!(f, "executed"),
            ActionStatus::Failed => write!(f, "failed"),
            ActionStatus::Rejected => write!(f, "rejected"),
            ActionStatus::Undone => write!(f, "undone"),
        }
    }
}

impl std::str::FromStr for ActionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending_approval" => Ok(ActionStatus::PendingApproval),
            "queued" => Ok(ActionStatus::Queued),
            "executed" => Ok(ActionStatus::Executed),
            "failed" => Ok(ActionStatus::Failed),
            "rejected" => Ok(ActionStatus::Rejected),
            "undone" => Ok(ActionStatus::Undone),
            _ => Err(format!("Unknown action status: {}", s)),
        }
    }
}

/// Who authorized an execution.
///
/// High and Medium auto-executions are both marked `Auto`; only an approved
/// Low action carries `User`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovedBy {
    Auto,
    User,
}

impl fmt::Display for ApprovedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovedBy::Auto => write!(f, "auto"),
            ApprovedBy::User => write!(f, "user"),
        }
    }
}

impl std::str::FromStr for ApprovedBy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(ApprovedBy::Auto),
            "user" => Ok(ApprovedBy::User),
            _ => Err(format!("Unknown approver: {}", s)),
        }
    }
}

/// Delivery channel for a notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyChannel {
    /// Notification row in the store, read by clients. Always enabled.
    InApp,
    /// Outbound email via the outbox queue. Per-user opt-out, default on.
    Email,
    /// Push provider. Per-user opt-in, default off.
    Push,
}

impl fmt::Display for NotifyChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyChannel::InApp => write!(f, "in_app"),
            NotifyChannel::Email => write!(f, "email"),
            NotifyChannel::Push => write!(f, "push"),
        }
    }
}

impl std::str::FromStr for NotifyChannel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_app" => Ok(NotifyChannel::InApp),
            "email" => Ok(NotifyChannel::Email),
            "push" => Ok(NotifyChannel::Push),
            _ => Err(format!("Unknown notify channel: {}", s)),
        }
    }
}

/// Why a notification was sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A Low-autonomy action is waiting for approval.
    ApprovalNeeded,
    /// A Medium-autonomy action is about to execute.
    ActionNotice,
    /// An action executed successfully.
    ActionCompleted,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::ApprovalNeeded => write!(f, "approval_needed"),
            NotificationKind::ActionNotice => write!(f, "action_notice"),
            NotificationKind::ActionCompleted => write!(f, "action_completed"),
        }
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approval_needed" => Ok(NotificationKind::ApprovalNeeded),
            "action_notice" => Ok(NotificationKind::ActionNotice),
            "action_completed" => Ok(NotificationKind::ActionCompleted),
            _ => Err(format!("Unknown notification kind: {}", s)),
        }
    }
}

/// Display priority for a notification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    #[default]
    Normal,
    High,
}

impl fmt::Display for NotificationPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationPriority::Low => write!(f, "low"),
            NotificationPriority::Normal => write!(f, "normal"),
            NotificationPriority::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for NotificationPriority {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(NotificationPriority::Low),
            "normal" => Ok(NotificationPriority::Normal),
            "high" => Ok(NotificationPriority::High),
            _ => Err(format!("Unknown notification priority: {}", s)),
        }
    }
}

// =============================================================================
// Newtype Wrappers
// =============================================================================

/// Opaque user identifier. The engine scopes every record and every query
/// by it but never interprets the contents.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unix timestamp in seconds since epoch.
///
/// Compared by value. Two Timestamps with the same inner value are equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.0, 0).unwrap_or_default()
    }

    pub fn plus_seconds(&self, secs: i64) -> Self {
        Self(self.0 + secs)
    }
}

// =============================================================================
// Entity Structs (defined in valet-core for shared use)
// =============================================================================

/// A user's stored autonomy override for one action kind.
///
/// Absence of a row means the kind's built-in default applies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutonomySetting {
    pub user_id: UserId,
    pub kind: ActionKind,
    pub level: AutonomyLevel,
    /// Surface notifications for this kind. Stored and reported; the
    /// engine branches on `level` only.
    pub require_notification: bool,
    /// Reserved stricter-than-level flag. Stored and reported; the engine
    /// branches on `level` only.
    pub require_confirmation: bool,
    pub updated_at: Timestamp,
}

impl AutonomySetting {
    /// The effective setting for a kind with no stored override.
    pub fn default_for(user_id: UserId, kind: ActionKind) -> Self {
        Self {
            user_id,
            kind,
            level: kind.default_autonomy(),
            require_notification: true,
            require_confirmation: false,
            updated_at: Timestamp::now(),
        }
    }
}

/// One proposed action and everything that happened to it.
///
/// Append-mostly: `result`, `error`, `rejection_reason`, and `undo_data`
/// are each written by exactly one transition and never overwritten.
/// `autonomy_level_used` is frozen at submission; later settings changes
/// never affect a record already in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: Uuid,
    pub user_id: UserId,
    pub kind: ActionKind,
    pub description: String,
    pub params: ActionParams,
    pub goal_id: Option<Uuid>,
    pub status: ActionStatus,
    pub autonomy_level_used: AutonomyLevel,
    pub requires_approval: bool,
    pub approved_by: Option<ApprovedBy>,
    pub approved_at: Option<Timestamp>,
    pub rejection_reason: Option<String>,
    pub result: Option<ActionReceipt>,
    pub error: Option<String>,
    pub is_undoable: bool,
    pub undo_data: Option<UndoData>,
    /// Set iff the record executed, the kind is undoable, and the executor
    /// returned undo data.
    pub undo_deadline: Option<Timestamp>,
    pub undone_at: Option<Timestamp>,
    pub notified_via: Vec<NotifyChannel>,
    pub notification_sent: bool,
    pub notified_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ActionRecord {
    /// Build a fresh record from a plan under a resolved autonomy level.
    ///
    /// Low level inserts as PendingApproval; High and Medium insert as
    /// Queued, ready for the immediate execution that follows.
    pub fn new(user_id: UserId, plan: Plan, level: AutonomyLevel) -> Self {
        let kind = plan.action.kind();
        let requires_approval = level == AutonomyLevel::Low;
        let status = if requires_approval {
            ActionStatus::PendingApproval
        } else {
            ActionStatus::Queued
        };
        let now = Timestamp::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            description: plan.description,
            params: plan.action,
            goal_id: plan.goal_id,
            status,
            autonomy_level_used: level,
            requires_approval,
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            result: None,
            error: None,
            is_undoable: kind.is_undoable(),
            undo_data: None,
            undo_deadline: None,
            undone_at: None,
            notified_via: Vec::new(),
            notification_sent: false,
            notified_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// An in-app notification row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub priority: NotificationPriority,
    pub title: String,
    pub message: String,
    /// Deep link for the client (e.g. the approval surface for a pending
    /// action).
    pub action_url: Option<String>,
    pub action_label: Option<String>,
    pub related_action_id: Option<Uuid>,
    pub read: bool,
    pub read_at: Option<Timestamp>,
    pub dismissed: bool,
    pub dismissed_at: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// Per-user channel opt-ins. A user with no stored row gets the defaults:
/// email on, push off. In-app is always on and not represented here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelPrefs {
    pub user_id: UserId,
    pub email_enabled: bool,
    pub push_enabled: bool,
    pub updated_at: Timestamp,
}

impl ChannelPrefs {
    pub fn default_for(user_id: UserId) -> Self {
        Self {
            user_id,
            email_enabled: true,
            push_enabled: false,
            updated_at: Timestamp::now(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
