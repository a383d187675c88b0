//! Anthropic messages backend (`POST {base_url}/v1/messages`).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::backend::{truncate_body, BackendError, GenerationBackend};

const API_VERSION: &str = "2023-06-01";

/// Upper bound on generated tokens per request.
const MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone)]
pub struct AnthropicSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

pub struct AnthropicBackend {
    name: String,
    settings: AnthropicSettings,
    client: reqwest::Client,
}

impl AnthropicBackend {
    pub fn new(
        name: impl Into<String>,
        settings: AnthropicSettings,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            name: name.into(),
            settings,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.settings.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl GenerationBackend for AnthropicBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let body = serde_json::json!({
            "model": self.settings.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.settings.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                body: truncate_body(body),
            });
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        // Concatenate the text blocks; other block types are ignored.
        Ok(parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
