mod client;
pub(crate) mod types;

use std::time::Duration;

use crate::error::{AiError, Result};

use client::OpenAiClient;
pub use types::{Message, MessageRole};
use types::{ChatRequest, WireMessage};

pub const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// Per-request sampling options.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChatOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ChatOptions {
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

// =============================================================================
// OpenAi Agent
// =============================================================================

#[derive(Clone)]
pub struct OpenAi {
    model: String,
    client: OpenAiClient,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            client: OpenAiClient::new(&api_key.into(), OPENAI_API_URL),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.client = self.client.with_base_url(&url.into());
        self
    }

    /// Bound every request (connect + response) by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = self.client.with_timeout(timeout);
        self
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a non-streamed conversation and return the first choice's content.
    ///
    /// A response with no choices, or whose first choice carries no content,
    /// is an `AiError::EmptyResponse`. Empty-string content is returned as is.
    pub async fn chat(&self, messages: Vec<Message>, options: ChatOptions) -> Result<String> {
        let request = ChatRequest::new(&self.model)
            .messages(messages.into_iter().map(WireMessage::from))
            .temperature(options.temperature)
            .max_tokens(options.max_tokens);

        let response = self.client.chat(&request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AiError::EmptyResponse(format!("no choices from {}", self.model)))
    }

    /// Simple system + user chat completion (convenience method).
    pub async fn chat_completion(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
        options: ChatOptions,
    ) -> Result<String> {
        self.chat(vec![Message::system(system), Message::user(user)], options)
            .await
    }
}
