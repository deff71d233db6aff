//! Presence status executor.
//!
//! Sets the user's chat status. Undo restores the previous status, which
//! only works when the chat backend reported one at execution time; a
//! run with no reported previous status produces no undo data at all.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use valet_core::plan::{ActionParams, ActionReceipt, UndoData};
use valet_core::types::{ActionKind, UserId};
use valet_services::ServiceFactory;

use crate::executor::{ActionExecutor, ExecError, Execution, UndoHandler};

pub struct StatusSetExecutor {
    factory: Arc<dyn ServiceFactory>,
}

impl StatusSetExecutor {
    pub fn new(factory: Arc<dyn ServiceFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl ActionExecutor for StatusSetExecutor {
    fn kind(&self) -> ActionKind {
        ActionKind::StatusSet
    }

    async fn execute(
        &self,
        user: &UserId,
        params: &ActionParams,
    ) -> Result<Execution, ExecError> {
        let p = match params {
            ActionParams::StatusSet(p) => p,
            other => {
                return Err(ExecError::WrongParams {
                    expected: self.kind(),
                    got: other.kind(),
                })
            }
        };

        let chat = self.factory.chat(user);
        let previous = chat.set_status(&p.status, p.until).await?;
        info!(user = %user, status = %p.status, previous = ?previous, "Status set");

        Ok(Execution {
            receipt: ActionReceipt::StatusSet {
                status: p.status.clone(),
                previous: previous.clone(),
            },
            undo: previous.map(|prev| UndoData::StatusSet { previous: prev }),
        })
    }
}

pub struct StatusSetUndo {
    factory: Arc<dyn ServiceFactory>,
}

impl StatusSetUndo {
    pub fn new(factory: Arc<dyn ServiceFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl UndoHandler for StatusSetUndo {
    fn kind(&self) -> ActionKind {
        ActionKind::StatusSet
    }

    async fn undo(&self, user: &UserId, undo: &UndoData) -> Result<(), ExecError> {
        let previous = match undo {
            UndoData::StatusSet { previous } => previous,
            other => {
                return Err(ExecError::WrongParams {
                    expected: self.kind(),
                    got: other.kind(),
                })
            }
        };

        self.factory.chat(user).set_status(previous, None).await?;
        info!(user = %user, status = %previous, "Status restored");
        Ok(())
    }
}
