//! Executors that carry out plans against backing services.
//!
//! One executor per action kind, registered by kind in
//! [`ExecutorRegistry`]. Undoable kinds pair with an [`UndoHandler`]
//! that reverses a past execution from its recorded undo data.

mod calendar_block;
mod email_draft;
mod email_send;
mod message_post;
mod status_set;
mod task_create;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use valet_core::plan::{ActionParams, ActionReceipt, UndoData};
use valet_core::types::{ActionKind, UserId};
use valet_services::{ServiceError, ServiceFactory};

pub use calendar_block::{CalendarBlockExecutor, CalendarBlockUndo};
pub use email_draft::{EmailDraftExecutor, EmailDraftUndo};
pub use email_send::EmailSendExecutor;
pub use message_post::MessagePostExecutor;
pub use status_set::{StatusSetExecutor, StatusSetUndo};
pub use task_create::{TaskCreateExecutor, TaskCreateUndo};

/// Why an execution or undo did not complete.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// The backing service cannot be reached for this user at all.
    #[error("Service unavailable: {0}")]
    Capability(String),
    /// The service took the call and refused it.
    #[error("Operation failed: {0}")]
    Service(String),
    /// Params of another kind reached this executor. The engine routes
    /// by kind, so this indicates a wiring bug, not bad user input.
    #[error("Wrong params for {expected}: got {got}")]
    WrongParams {
        expected: ActionKind,
        got: ActionKind,
    },
}

impl From<ServiceError> for ExecError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::NoCredentials { .. } => ExecError::Capability(e.to_string()),
            ServiceError::Request { .. } => ExecError::Service(e.to_string()),
        }
    }
}

/// What a successful execution produced.
///
/// `undo` is None when this particular run cannot be reversed, even for
/// kinds that usually can.
#[derive(Debug, Clone)]
pub struct Execution {
    pub receipt: ActionReceipt,
    pub undo: Option<UndoData>,
}

/// Performs one kind of action against the outside world.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    fn kind(&self) -> ActionKind;

    async fn execute(&self, user: &UserId, params: &ActionParams)
        -> Result<Execution, ExecError>;
}

/// Reverses one kind of action from its recorded undo data.
#[async_trait]
pub trait UndoHandler: Send + Sync {
    fn kind(&self) -> ActionKind;

    async fn undo(&self, user: &UserId, undo: &UndoData) -> Result<(), ExecError>;
}

/// Kind-indexed lookup for executors and undo handlers.
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: HashMap<ActionKind, Arc<dyn ActionExecutor>>,
    undo_handlers: HashMap<ActionKind, Arc<dyn UndoHandler>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full standard wiring: all six executors and the four undo
    /// handlers, all drawing services from `factory`.
    pub fn with_defaults(factory: Arc<dyn ServiceFactory>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CalendarBlockExecutor::new(factory.clone())));
        registry.register(Arc::new(EmailDraftExecutor::new(factory.clone())));
        registry.register(Arc::new(TaskCreateExecutor::new(factory.clone())));
        registry.register(Arc::new(StatusSetExecutor::new(factory.clone())));
        registry.register(Arc::new(EmailSendExecutor::new(factory.clone())));
        registry.register(Arc::new(MessagePostExecutor::new(factory.clone())));
        registry.register_undo(Arc::new(CalendarBlockUndo::new(factory.clone())));
        registry.register_undo(Arc::new(EmailDraftUndo::new(factory.clone())));
        registry.register_undo(Arc::new(TaskCreateUndo::new(factory.clone())));
        registry.register_undo(Arc::new(StatusSetUndo::new(factory)));
        registry
    }

    pub fn register(&mut self, executor: Arc<dyn ActionExecutor>) {
        self.executors.insert(executor.kind(), executor);
    }

    pub fn register_undo(&mut self, handler: Arc<dyn UndoHandler>) {
        self.undo_handlers.insert(handler.kind(), handler);
    }

    pub fn executor(&self, kind: ActionKind) -> Option<Arc<dyn ActionExecutor>> {
        self.executors.get(&kind).cloned()
    }

    pub fn undo_handler(&self, kind: ActionKind) -> Option<Arc<dyn UndoHandler>> {
        self.undo_handlers.get(&kind).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use valet_services::InMemoryServices;

    #[test]
    fn test_with_defaults_covers_every_kind() {
        let registry = ExecutorRegistry::with_defaults(Arc::new(InMemoryServices::new()));
        for kind in ActionKind::ALL {
            assert!(registry.executor(kind).is_some(), "missing executor: {}", kind);
        }
    }

    #[test]
    fn test_with_defaults_undo_matches_undoable_kinds() {
        let registry = ExecutorRegistry::with_defaults(Arc::new(InMemoryServices::new()));
        for kind in ActionKind::ALL {
            assert_eq!(
                registry.undo_handler(kind).is_some(),
                kind.is_undoable(),
                "undo wiring mismatch: {}",
                kind
            );
        }
    }

    #[test]
    fn test_empty_registry_has_no_executors() {
        let registry = ExecutorRegistry::new();
        assert!(registry.executor(ActionKind::CalendarBlock).is_none());
        assert!(registry.undo_handler(ActionKind::CalendarBlock).is_none());
    }

    #[test]
    fn test_exec_error_from_service_error() {
        let err: ExecError = ServiceError::NoCredentials { service: "chat" }.into();
        assert!(matches!(err, ExecError::Capability(_)));
        assert!(err.to_string().contains("chat"));

        let err: ExecError = ServiceError::Request {
            service: "calendar",
            message: "rate limited".to_string(),
        }
        .into();
        assert!(matches!(err, ExecError::Service(_)));
        assert!(err.to_string().contains("rate limited"));
    }

    #[test]
    fn test_exec_error_wrong_params_display() {
        let err = ExecError::WrongParams {
            expected: ActionKind::CalendarBlock,
            got: ActionKind::EmailSend,
        };
        assert_eq!(
            err.to_string(),
            "Wrong params for calendar_block: got email_send"
        );
    }
}
