//! Calendar block executor.
//!
//! Blocks time on the user's calendar; undo deletes the created event.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use valet_core::plan::{ActionParams, ActionReceipt, UndoData};
use valet_core::types::{ActionKind, UserId};
use valet_services::ServiceFactory;

use crate::executor::{ActionExecutor, ExecError, Execution, UndoHandler};

pub struct CalendarBlockExecutor {
    factory: Arc<dyn ServiceFactory>,
}

impl CalendarBlockExecutor {
    pub fn new(factory: Arc<dyn ServiceFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl ActionExecutor for CalendarBlockExecutor {
    fn kind(&self) -> ActionKind {
        ActionKind::CalendarBlock
    }

    async fn execute(
        &self,
        user: &UserId,
        params: &ActionParams,
    ) -> Result<Execution, ExecError> {
        let p = match params {
            ActionParams::CalendarBlock(p) => p,
            other => {
                return Err(ExecError::WrongParams {
                    expected: self.kind(),
                    got: other.kind(),
                })
            }
        };

        let calendar = self.factory.calendar(user);
        let event = calendar
            .create_event(&p.title, p.start, p.duration_minutes)
            .await?;
        info!(user = %user, event_id = %event.event_id, title = %p.title, "Calendar block created");

        Ok(Execution {
            receipt: ActionReceipt::CalendarBlock {
                event_id: event.event_id.clone(),
                calendar_id: event.calendar_id.clone(),
            },
            undo: Some(UndoData::CalendarBlock {
                event_id: event.event_id,
                calendar_id: event.calendar_id,
            }),
        })
    }
}

pub struct CalendarBlockUndo {
    factory: Arc<dyn ServiceFactory>,
}

impl CalendarBlockUndo {
    pub fn new(factory: Arc<dyn ServiceFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl UndoHandler for CalendarBlockUndo {
    fn kind(&self) -> ActionKind {
        ActionKind::CalendarBlock
    }

    async fn undo(&self, user: &UserId, undo: &UndoData) -> Result<(), ExecError> {
        let (event_id, calendar_id) = match undo {
            UndoData::CalendarBlock {
                event_id,
                calendar_id,
            } => (event_id, calendar_id),
            other => {
                return Err(ExecError::WrongParams {
                    expected: self.kind(),
                    got: other.kind(),
                })
            }
        };

        self.factory
            .calendar(user)
            .delete_event(calendar_id, event_id)
            .await?;
        info!(user = %user, event_id = %event_id, "Calendar block removed");
        Ok(())
    }
}
