//! Email send executor.
//!
//! Sends mail on the user's behalf. A sent email cannot be recalled, so
//! this executor never produces undo data.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use valet_core::plan::{ActionParams, ActionReceipt};
use valet_core::types::{ActionKind, UserId};
use valet_services::ServiceFactory;

use crate::executor::{ActionExecutor, ExecError, Execution};

pub struct EmailSendExecutor {
    factory: Arc<dyn ServiceFactory>,
}

impl EmailSendExecutor {
    pub fn new(factory: Arc<dyn ServiceFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl ActionExecutor for EmailSendExecutor {
    fn kind(&self) -> ActionKind {
        ActionKind::EmailSend
    }

    async fn execute(
        &self,
        user: &UserId,
        params: &ActionParams,
    ) -> Result<Execution, ExecError> {
        let p = match params {
            ActionParams::EmailSend(p) => p,
            other => {
                return Err(ExecError::WrongParams {
                    expected: self.kind(),
                    got: other.kind(),
                })
            }
        };

        let email = self.factory.email(user);
        let message_id = email.send_message(&p.to, &p.cc, &p.subject, &p.body).await?;
        info!(user = %user, message_id = %message_id, subject = %p.subject, "Email sent");

        Ok(Execution {
            receipt: ActionReceipt::EmailSend { message_id },
            undo: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use valet_core::plan::EmailSendParams;
    use valet_services::InMemoryServices;

    fn make_params() -> ActionParams {
        ActionParams::EmailSend(EmailSendParams {
            to: vec!["sam@example.com".to_string()],
            cc: vec![],
            subject: "Weekly update".to_string(),
            body: "All milestones on track.".to_string(),
        })
    }

    #[tokio::test]
    async fn test_execute_sends_without_undo() {
        let services = Arc::new(InMemoryServices::new());
        let executor = EmailSendExecutor::new(services.clone());

        let execution = executor
            .execute(&UserId::new("alice"), &make_params())
            .await
            .unwrap();
        assert_eq!(
            execution.receipt,
            ActionReceipt::EmailSend {
                message_id: "msg-1".to_string(),
            }
        );
        assert!(execution.undo.is_none());
        assert_eq!(services.sent_emails().len(), 1);
    }

    #[tokio::test]
    async fn test_execute_surfaces_send_failure() {
        let services = Arc::new(InMemoryServices::new());
        services.set_failing("email", true);
        let executor = EmailSendExecutor::new(services.clone());

        let err = executor
            .execute(&UserId::new("alice"), &make_params())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Service(_)));
        assert!(services.sent_emails().is_empty());
    }
}
