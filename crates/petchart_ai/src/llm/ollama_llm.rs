use std::time::Duration;

use petchart_core::error::AppError;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, GenerationOptions, Llm};
use crate::ollama::OllamaClient;

#[derive(Debug, Clone)]
pub struct OllamaLlm {
    client: OllamaClient,
}

impl OllamaLlm {
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

impl Llm for OllamaLlm {
    fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: GenerationOptions,
    ) -> Result<String, AppError> {
        let req = ChatRequest {
            model,
            messages,
            stream: false,
            options: ChatOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        };
        let body = serde_json::to_value(req).map_err(|e| {
            AppError::new("AI_COMPLETION_FAILED", "Failed to encode chat request")
                .with_details(e.to_string())
        })?;

        let resp: ChatResponse = self.client.post_json(
            "/api/chat",
            body,
            Duration::from_secs(60),
            "AI_COMPLETION_FAILED",
        )?;
        if resp.message.content.trim().is_empty() {
            return Err(AppError::new("AI_COMPLETION_FAILED", "Chat response was empty"));
        }
        Ok(resp.message.content)
    }
}
