use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

use super::types::*;
use crate::error::{AiError, Result};
use crate::util::truncate_to_char_boundary;

/// Upper bound on how much of an error body is kept in `AiError::Api`.
const MAX_ERROR_BODY: usize = 512;

#[derive(Clone)]
pub(crate) struct OpenAiClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
    timeout: Option<Duration>,
}

impl OpenAiClient {
    pub fn new(api_key: &str, base_url: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: None,
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| AiError::Config(format!("invalid API key header: {e}")))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = %request.model, url = %url, "Chat completion request");

        let mut builder = self.http.post(&url).headers(self.headers()?).json(request);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AiError::Api {
                status: status.as_u16(),
                message: truncate_to_char_boundary(&body, MAX_ERROR_BODY).to_string(),
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body)?;
        if let Some(usage) = &parsed.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "Chat completion usage"
            );
        }
        Ok(parsed)
    }
}
