//! Typed action plans, execution receipts, and undo payloads.
//!
//! One payload shape per action kind, enforced by the type system at the
//! submit boundary. Row mapping in the store is the only place these are
//! flattened to JSON text; engine logic never touches untyped blobs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ActionKind, Timestamp};

// =============================================================================
// Inbound plan
// =============================================================================

/// A proposed action, as handed to the engine by an upstream planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Kind tag plus the kind's payload.
    #[serde(flatten)]
    pub action: ActionParams,
    /// Human-readable summary, shown in notifications and approval surfaces.
    pub description: String,
    /// Optional link back to the goal that produced this plan.
    #[serde(default)]
    pub goal_id: Option<Uuid>,
}

/// Parameters for each action kind.
///
/// Wire shape: `{"type": "task_create", "params": {...}}`. An unrecognized
/// `type` tag fails deserialization, so no record is ever created for an
/// unknown kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "snake_case")]
pub enum ActionParams {
    CalendarBlock(CalendarBlockParams),
    EmailDraft(EmailDraftParams),
    TaskCreate(TaskCreateParams),
    StatusSet(StatusSetParams),
    EmailSend(EmailSendParams),
    MessagePost(MessagePostParams),
}

impl ActionParams {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionParams::CalendarBlock(_) => ActionKind::CalendarBlock,
            ActionParams::EmailDraft(_) => ActionKind::EmailDraft,
            ActionParams::TaskCreate(_) => ActionKind::TaskCreate,
            ActionParams::StatusSet(_) => ActionKind::StatusSet,
            ActionParams::EmailSend(_) => ActionKind::EmailSend,
            ActionParams::MessagePost(_) => ActionKind::MessagePost,
        }
    }

    /// Semantic checks beyond what the type system enforces.
    ///
    /// Runs at the submit boundary; a failure means no record is created.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            ActionParams::CalendarBlock(p) => {
                if p.title.trim().is_empty() {
                    return Err("calendar block title must not be empty".to_string());
                }
                if p.duration_minutes == 0 {
                    return Err("calendar block duration must be positive".to_string());
                }
            }
            ActionParams::EmailDraft(p) => {
                if p.to.is_empty() || p.to.iter().any(|a| a.trim().is_empty()) {
                    return Err("email draft needs at least one recipient".to_string());
                }
                if p.subject.trim().is_empty() {
                    return Err("email draft subject must not be empty".to_string());
                }
            }
            ActionParams::TaskCreate(p) => {
                if p.title.trim().is_empty() {
                    return Err("task title must not be empty".to_string());
                }
            }
            ActionParams::StatusSet(p) => {
                if p.status.trim().is_empty() {
                    return Err("status must not be empty".to_string());
                }
            }
            ActionParams::EmailSend(p) => {
                if p.to.is_empty() || p.to.iter().any(|a| a.trim().is_empty()) {
                    return Err("email needs at least one recipient".to_string());
                }
                if p.subject.trim().is_empty() {
                    return Err("email subject must not be empty".to_string());
                }
            }
            ActionParams::MessagePost(p) => {
                if p.channel.trim().is_empty() {
                    return Err("message channel must not be empty".to_string());
                }
                if p.message.trim().is_empty() {
                    return Err("message body must not be empty".to_string());
                }
            }
        }
        Ok(())
    }
}

/// Block time on the user's calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarBlockParams {
    pub title: String,
    /// Event start, epoch seconds.
    pub start: Timestamp,
    pub duration_minutes: u32,
}

/// Create a draft in the user's mailbox without sending it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailDraftParams {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Create a task in the user's task list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCreateParams {
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub due: Option<Timestamp>,
}

/// Set the user's chat presence status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSetParams {
    pub status: String,
    /// Clear the status automatically at this time.
    #[serde(default)]
    pub until: Option<Timestamp>,
}

/// Send an email on the user's behalf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailSendParams {
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Post a message to a chat channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePostParams {
    pub channel: String,
    pub message: String,
}

// =============================================================================
// Execution receipts
// =============================================================================

/// What an executor produced. Written once when a record reaches EXECUTED.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionReceipt {
    CalendarBlock {
        event_id: String,
        calendar_id: String,
    },
    EmailDraft {
        draft_id: String,
    },
    TaskCreate {
        task_id: String,
    },
    StatusSet {
        status: String,
        /// Status before the change, when the chat service reported one.
        previous: Option<String>,
    },
    EmailSend {
        message_id: String,
    },
    MessagePost {
        channel: String,
        message_ts: String,
    },
}

// =============================================================================
// Undo payloads
// =============================================================================

/// Everything needed to reverse an executed action. Only kinds with a
/// reversal path have a variant; EmailSend and MessagePost never produce
/// undo data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UndoData {
    CalendarBlock {
        event_id: String,
        calendar_id: String,
    },
    EmailDraft {
        draft_id: String,
    },
    TaskCreate {
        task_id: String,
    },
    StatusSet {
        previous: String,
    },
}

impl UndoData {
    pub fn kind(&self) -> ActionKind {
        match self {
            UndoData::CalendarBlock { .. } => ActionKind::CalendarBlock,
            UndoData::EmailDraft { .. } => ActionKind::EmailDraft,
            UndoData::TaskCreate { .. } => ActionKind::TaskCreate,
            UndoData::StatusSet { .. } => ActionKind::StatusSet,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_wire_shape() {
        let params = ActionParams::TaskCreate(TaskCreateParams {
            title: "Prep board deck".to_string(),
            notes: None,
            due: Some(Timestamp(1_700_000_000)),
        });
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["type"], "task_create");
        assert_eq!(json["params"]["title"], "Prep board deck");
        assert_eq!(json["params"]["due"], 1_700_000_000i64);
    }

    #[test]
    fn test_unknown_type_tag_rejected() {
        let raw = r#"{"type": "rocket_launch", "params": {"target": "mars"}}"#;
        let result: Result<ActionParams, _> = serde_json::from_str(raw);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_type_tag_rejected() {
        let raw = r#"{"params": {"title": "x"}}"#;
        let result: Result<ActionParams, _> = serde_json::from_str(raw);
        assert!(result.is_err());
    }

    #[test]
    fn test_plan_flattens_action() {
        let raw = r##"{
            "type": "message_post",
            "params": {"channel": "#eng", "message": "deploy done"},
            "description": "Announce the deploy",
            "goal_id": null
        }"##;
        let plan: Plan = serde_json::from_str(raw).unwrap();
        assert_eq!(plan.action.kind(), ActionKind::MessagePost);
        assert_eq!(plan.description, "Announce the deploy");
        assert!(plan.goal_id.is_none());
    }

    #[test]
    fn test_plan_goal_id_optional() {
        let raw = r#"{
            "type": "status_set",
            "params": {"status": "focus"},
            "description": "Go heads-down"
        }"#;
        let plan: Plan = serde_json::from_str(raw).unwrap();
        assert!(plan.goal_id.is_none());
        assert_eq!(plan.action.kind(), ActionKind::StatusSet);
    }

    #[test]
    fn test_kind_mapping_covers_all_variants() {
        let cases = [
            (
                ActionParams::CalendarBlock(CalendarBlockParams {
                    title: "Focus".into(),
                    start: Timestamp(0),
                    duration_minutes: 30,
                }),
                ActionKind::CalendarBlock,
            ),
            (
                ActionParams::EmailDraft(EmailDraftParams {
                    to: vec!["a@b.c".into()],
                    subject: "s".into(),
                    body: "b".into(),
                }),
                ActionKind::EmailDraft,
            ),
            (
                ActionParams::TaskCreate(TaskCreateParams {
                    title: "t".into(),
                    notes: None,
                    due: None,
                }),
                ActionKind::TaskCreate,
            ),
            (
                ActionParams::StatusSet(StatusSetParams {
                    status: "away".into(),
                    until: None,
                }),
                ActionKind::StatusSet,
            ),
            (
                ActionParams::EmailSend(EmailSendParams {
                    to: vec!["a@b.c".into()],
                    cc: vec![],
                    subject: "s".into(),
                    body: "b".into(),
                }),
                ActionKind::EmailSend,
            ),
            (
                ActionParams::MessagePost(MessagePostParams {
                    channel: "#x".into(),
                    message: "m".into(),
                }),
                ActionKind::MessagePost,
            ),
        ];
        for (params, kind) in cases {
            assert_eq!(params.kind(), kind);
        }
    }

    // ---- validate ----

    #[test]
    fn test_validate_accepts_good_params() {
        let params = ActionParams::CalendarBlock(CalendarBlockParams {
            title: "Deep work".into(),
            start: Timestamp(1_700_000_000),
            duration_minutes: 90,
        });
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_title() {
        let params = ActionParams::CalendarBlock(CalendarBlockParams {
            title: "   ".into(),
            start: Timestamp(1_700_000_000),
            duration_minutes: 90,
        });
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_duration() {
        let params = ActionParams::CalendarBlock(CalendarBlockParams {
            title: "Deep work".into(),
            start: Timestamp(1_700_000_000),
            duration_minutes: 0,
        });
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_no_recipients() {
        let params = ActionParams::EmailSend(EmailSendParams {
            to: vec![],
            cc: vec![],
            subject: "Weekly update".into(),
            body: "All green.".into(),
        });
        let err = params.validate().unwrap_err();
        assert!(err.contains("recipient"));
    }

    #[test]
    fn test_validate_rejects_blank_recipient() {
        let params = ActionParams::EmailSend(EmailSendParams {
            to: vec!["".into()],
            cc: vec![],
            subject: "Weekly update".into(),
            body: "All green.".into(),
        });
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_message() {
        let params = ActionParams::MessagePost(MessagePostParams {
            channel: "#eng".into(),
            message: " ".into(),
        });
        assert!(params.validate().is_err());
    }

    // ---- receipts / undo payloads ----

    #[test]
    fn test_receipt_wire_shape() {
        let receipt = ActionReceipt::TaskCreate {
            task_id: "task-991".into(),
        };
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["kind"], "task_create");
        assert_eq!(json["task_id"], "task-991");
    }

    #[test]
    fn test_undo_data_round_trip() {
        let undo = UndoData::CalendarBlock {
            event_id: "evt-7".into(),
            calendar_id: "primary".into(),
        };
        let json = serde_json::to_string(&undo).unwrap();
        let back: UndoData = serde_json::from_str(&json).unwrap();
        assert_eq!(back, undo);
        assert_eq!(back.kind(), ActionKind::CalendarBlock);
    }

    #[test]
    fn test_status_set_receipt_carries_previous() {
        let receipt = ActionReceipt::StatusSet {
            status: "focus".into(),
            previous: Some("available".into()),
        };
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["previous"], "available");
    }
}
