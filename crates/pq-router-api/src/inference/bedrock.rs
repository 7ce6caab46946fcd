//! AWS Bedrock backend using the model-agnostic Converse API.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_bedrockruntime::Client as BedrockClient;
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ConversationRole, ConverseOutput, Message, SystemContentBlock,
};
use pq_protocol::{ContractError, ModelRequest};
use tokio::time::timeout;

use super::prompts::{SYSTEM_PROMPT, render};
use super::{ModelClient, ModelError};

pub struct BedrockModelClient {
    client: BedrockClient,
    model_id: String,
    timeout: Duration,
}

impl BedrockModelClient {
    /// Create a client around a pre-built Bedrock SDK client.
    pub fn new(client: BedrockClient, model_id: String, timeout: Duration) -> Self {
        Self {
            client,
            model_id,
            timeout,
        }
    }

    async fn converse(&self, request: &ModelRequest) -> Result<String, ModelError> {
        let user_message = Message::builder()
            .role(ConversationRole::User)
            .content(ContentBlock::Text(render(request)))
            .build()
            .map_err(|e| ModelError::Transport(format!("failed to build message: {e}")))?;

        let response = self
            .client
            .converse()
            .model_id(&self.model_id)
            .system(SystemContentBlock::Text(SYSTEM_PROMPT.to_string()))
            .messages(user_message)
            .send()
            .await
            .map_err(|e| ModelError::Transport(format!("bedrock converse error: {e}")))?;

        let text = match response.output() {
            Some(ConverseOutput::Message(msg)) => msg.content().iter().find_map(|block| {
                if let ContentBlock::Text(t) = block {
                    Some(t.clone())
                } else {
                    None
                }
            }),
            _ => None,
        };
        text.ok_or(ModelError::InvalidResponse(ContractError::MissingField(
            "output",
        )))
    }
}

#[async_trait]
impl ModelClient for BedrockModelClient {
    async fn complete(&self, request: &ModelRequest) -> Result<String, ModelError> {
        match timeout(self.timeout, self.converse(request)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "bedrock inference timed out"
                );
                Err(ModelError::Timeout)
            }
        }
    }

    fn backend_name(&self) -> &str {
        "bedrock"
    }
}
