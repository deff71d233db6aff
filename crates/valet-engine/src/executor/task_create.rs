//! Task creation executor.
//!
//! Adds a task to the user's task list; undo removes it again.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use valet_core::plan::{ActionParams, ActionReceipt, UndoData};
use valet_core::types::{ActionKind, UserId};
use valet_services::ServiceFactory;

use crate::executor::{ActionExecutor, ExecError, Execution, UndoHandler};

pub struct TaskCreateExecutor {
    factory: Arc<dyn ServiceFactory>,
}

impl TaskCreateExecutor {
    pub fn new(factory: Arc<dyn ServiceFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl ActionExecutor for TaskCreateExecutor {
    fn kind(&self) -> ActionKind {
        ActionKind::TaskCreate
    }

    async fn execute(
        &self,
        user: &UserId,
        params: &ActionParams,
    ) -> Result<Execution, ExecError> {
        let p = match params {
            ActionParams::TaskCreate(p) => p,
            other => {
                return Err(ExecError::WrongParams {
                    expected: self.kind(),
                    got: other.kind(),
                })
            }
        };

        let tasks = self.factory.tasks(user);
        let task_id = tasks
            .create_task(&p.title, p.notes.as_deref(), p.due)
            .await?;
        info!(user = %user, task_id = %task_id, title = %p.title, "Task created");

        Ok(Execution {
            receipt: ActionReceipt::TaskCreate {
                task_id: task_id.clone(),
            },
            undo: Some(UndoData::TaskCreate { task_id }),
        })
    }
}

pub struct TaskCreateUndo {
    factory: Arc<dyn ServiceFactory>,
}

impl TaskCreateUndo {
    pub fn new(factory: Arc<dyn ServiceFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl UndoHandler for TaskCreateUndo {
    fn kind(&self) -> ActionKind {
        ActionKind::TaskCreate
    }

    async fn undo(&self, user: &UserId, undo: &UndoData) -> Result<(), ExecError> {
        let task_id = match undo {
            UndoData::TaskCreate { task_id } => task_id,
            other => {
                return Err(ExecError::WrongParams {
                    expected: self.kind(),
                    got: other.kind(),
                })
            }
        };

        self.factory.tasks(user).delete_task(task_id).await?;
        info!(user = %user, task_id = %task_id, "Task removed");
        Ok(())
    }
}
