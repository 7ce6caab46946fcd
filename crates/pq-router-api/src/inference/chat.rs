//! Chat-completion backend for Ollama-style `/api/chat` endpoints.
//!
//! Requests JSON-formatted, non-streamed answers. The raw `message.content`
//! is returned untouched; validation happens in the resilience layer.

use async_trait::async_trait;
use pq_protocol::{ContractError, ModelRequest};
use serde::{Deserialize, Serialize};

use super::prompts::{SYSTEM_PROMPT, render};
use super::{ModelClient, ModelError};
use crate::config::ModelConfig;

/// Chat API request body.
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    format: &'a str,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Chat API response (only fields we need).
#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

pub struct ChatModelClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl ChatModelClient {
    pub fn new(config: &ModelConfig) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ModelError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

fn transport_error(e: reqwest::Error) -> ModelError {
    if e.is_timeout() {
        ModelError::Timeout
    } else {
        ModelError::Transport(e.to_string())
    }
}

#[async_trait]
impl ModelClient for ChatModelClient {
    async fn complete(&self, request: &ModelRequest) -> Result<String, ModelError> {
        let url = format!("{}/api/chat", self.endpoint);
        let user = render(request);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
            format: "json",
            stream: false,
        };

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(error = %e, "chat model request failed");
            transport_error(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "chat model returned non-200");
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ModelError::Timeout
            } else {
                tracing::warn!(error = %e, "failed to parse chat response body");
                ModelError::InvalidResponse(ContractError::Json(e.to_string()))
            }
        })?;

        chat.message
            .map(|m| m.content)
            .ok_or(ModelError::InvalidResponse(ContractError::MissingField(
                "message",
            )))
    }

    fn backend_name(&self) -> &str {
        "chat"
    }
}
