//! Undo window rules.
//!
//! Undo is offered for a fixed window after execution, and only when the
//! executor recorded how to reverse itself. Eligibility is a pure check
//! over the stored record; the engine does the actual reversal.

use std::fmt;

use valet_core::types::{ActionRecord, ActionStatus, Timestamp};

/// How long an executed action stays reversible, in seconds.
pub const UNDO_WINDOW_SECS: i64 = 300;

/// Why a record cannot be undone right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoIneligible {
    /// Only executed actions can be undone.
    NotExecuted(ActionStatus),
    /// The kind has no reversal at all.
    NotUndoable,
    /// Executed, undoable kind, but no window was recorded. Happens when
    /// the executor could not produce undo data.
    NoDeadline,
    /// The window closed.
    WindowExpired,
}

impl fmt::Display for UndoIneligible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UndoIneligible::NotExecuted(status) => {
                write!(f, "action is {}, not executed", status)
            }
            UndoIneligible::NotUndoable => write!(f, "action kind does not support undo"),
            UndoIneligible::NoDeadline => write!(f, "no undo window was recorded"),
            UndoIneligible::WindowExpired => write!(f, "undo window has expired"),
        }
    }
}

/// Check whether `record` may be undone at `now`.
///
/// The deadline itself is outside the window: `now >= deadline` fails.
pub fn undo_eligibility(record: &ActionRecord, now: Timestamp) -> Result<(), UndoIneligible> {
    if record.status != ActionStatus::Executed {
        return Err(UndoIneligible::NotExecuted(record.status));
    }
    if !record.is_undoable {
        return Err(UndoIneligible::NotUndoable);
    }
    let deadline = match record.undo_deadline {
        Some(deadline) => deadline,
        None => return Err(UndoIneligible::NoDeadline),
    };
    if now >= deadline {
        return Err(UndoIneligible::WindowExpired);
    }
    Ok(())
}
