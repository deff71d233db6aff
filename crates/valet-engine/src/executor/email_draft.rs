//! Email draft executor.
//!
//! Writes a draft into the user's mailbox without sending anything;
//! undo discards the draft.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use valet_core::plan::{ActionParams, ActionReceipt, UndoData};
use valet_core::types::{ActionKind, UserId};
use valet_services::ServiceFactory;

use crate::executor::{ActionExecutor, ExecError, Execution, UndoHandler};

pub struct EmailDraftExecutor {
    factory: Arc<dyn ServiceFactory>,
}

impl EmailDraftExecutor {
    pub fn new(factory: Arc<dyn ServiceFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl ActionExecutor for EmailDraftExecutor {
    fn kind(&self) -> ActionKind {
        ActionKind::EmailDraft
    }

    async fn execute(
        &self,
        user: &UserId,
        params: &ActionParams,
    ) -> Result<Execution, ExecError> {
        let p = match params {
            ActionParams::EmailDraft(p) => p,
            other => {
                return Err(ExecError::WrongParams {
                    expected: self.kind(),
                    got: other.kind(),
                })
            }
        };

        let email = self.factory.email(user);
        let draft_id = email.create_draft(&p.to, &p.subject, &p.body).await?;
        info!(user = %user, draft_id = %draft_id, "Email draft created");

        Ok(Execution {
            receipt: ActionReceipt::EmailDraft {
                draft_id: draft_id.clone(),
            },
            undo: Some(UndoData::EmailDraft { draft_id }),
        })
    }
}

pub struct EmailDraftUndo {
    factory: Arc<dyn ServiceFactory>,
}

impl EmailDraftUndo {
    pub fn new(factory: Arc<dyn ServiceFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl UndoHandler for EmailDraftUndo {
    fn kind(&self) -> ActionKind {
        ActionKind::EmailDraft
    }

    async fn undo(&self, user: &UserId, undo: &UndoData) -> Result<(), ExecError> {
        let draft_id = match undo {
            UndoData::EmailDraft { draft_id } => draft_id,
            other => {
                return Err(ExecError::WrongParams {
                    expected: self.kind(),
                    got: other.kind(),
                })
            }
        };

        self.factory.email(user).delete_draft(draft_id).await?;
        info!(user = %user, draft_id = %draft_id, "Email draft discarded");
        Ok(())
    }
}
