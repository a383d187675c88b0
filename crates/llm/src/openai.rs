//! OpenAI-compatible chat completions backend.
//!
//! Sends a single user message to `POST {base_url}/chat/completions` and
//! returns the first choice's message content. Works with any server that
//! speaks the same API (vLLM, Ollama, LiteLLM, ...).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::backend::{truncate_body, BackendError, GenerationBackend};

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

pub struct OpenAiBackend {
    name: String,
    settings: OpenAiSettings,
    client: reqwest::Client,
}

impl OpenAiBackend {
    pub fn new(
        name: impl Into<String>,
        settings: OpenAiSettings,
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
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let body = serde_json::json!({
            "model": self.settings.model,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
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

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| BackendError::InvalidResponse("response has no choices".into()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
