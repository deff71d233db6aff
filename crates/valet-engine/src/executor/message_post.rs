//! Channel message executor.
//!
//! Posts to a chat channel on the user's behalf. Posts are visible to
//! other people the moment they land, so there is no undo data.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use valet_core::plan::{ActionParams, ActionReceipt};
use valet_core::types::{ActionKind, UserId};
use valet_services::ServiceFactory;

use crate::executor::{ActionExecutor, ExecError, Execution};

pub struct MessagePostExecutor {
    factory: Arc<dyn ServiceFactory>,
}

impl MessagePostExecutor {
    pub fn new(factory: Arc<dyn ServiceFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl ActionExecutor for MessagePostExecutor {
    fn kind(&self) -> ActionKind {
        ActionKind::MessagePost
    }

    async fn execute(
        &self,
        user: &UserId,
        params: &ActionParams,
    ) -> Result<Execution, ExecError> {
        let p = match params {
            ActionParams::MessagePost(p) => p,
            other => {
                return Err(ExecError::WrongParams {
                    expected: self.kind(),
                    got: other.kind(),
                })
            }
        };

        let chat = self.factory.chat(user);
        let message_ts = chat.post_message(&p.channel, &p.message).await?;
        info!(user = %user, channel = %p.channel, ts = %message_ts, "Message posted");

        Ok(Execution {
            receipt: ActionReceipt::MessagePost {
                channel: p.channel.clone(),
                message_ts,
            },
            undo: None,
        })
    }
}
