use std::sync::Arc;
use std::time::Duration;

use crate::anthropic::{AnthropicBackend, AnthropicSettings};
use crate::backend::BackendError;
use crate::gateway::ModelGateway;
use crate::openai::{OpenAiBackend, OpenAiSettings};

/// Name the OpenAI-compatible backend is registered under.
pub const OPENAI_BACKEND: &str = "openai";
/// Name the Anthropic backend is registered under.
pub const ANTHROPIC_BACKEND: &str = "anthropic";

/// Generation backend configuration loaded from environment variables.
///
/// A backend is only configured when its API key is set.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Default fallback order when a job does not name its own.
    pub default_order: Vec<String>,
    /// Per-request timeout applied to every backend client.
    pub request_timeout_secs: u64,
    pub openai: Option<OpenAiSettings>,
    pub anthropic: Option<AnthropicSettings>,
}

impl LlmConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                         |
    /// |----------------------------|---------------------------------|
    /// | `LLM_BACKEND_ORDER`        | `openai,anthropic`              |
    /// | `LLM_REQUEST_TIMEOUT_SECS` | `120`                           |
    /// | `OPENAI_API_KEY`           | unset (backend disabled)        |
    /// | `OPENAI_BASE_URL`          | `https://api.openai.com/v1`     |
    /// | `OPENAI_MODEL`             | `gpt-4o-mini`                   |
    /// | `ANTHROPIC_API_KEY`        | unset (backend disabled)        |
    /// | `ANTHROPIC_BASE_URL`       | `https://api.anthropic.com`     |
    /// | `ANTHROPIC_MODEL`          | `claude-3-5-haiku-latest`       |
    pub fn from_env() -> Self {
        let default_order = parse_order(
            &std::env::var("LLM_BACKEND_ORDER")
                .unwrap_or_else(|_| format!("{OPENAI_BACKEND},{ANTHROPIC_BACKEND}")),
        );

        let request_timeout_secs: u64 = std::env::var("LLM_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".into())
            .parse()
            .expect("LLM_REQUEST_TIMEOUT_SECS must be a valid u64");

        let openai = non_empty_var("OPENAI_API_KEY").map(|api_key| OpenAiSettings {
            api_key,
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".into()),
            model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into()),
        });

        let anthropic = non_empty_var("ANTHROPIC_API_KEY").map(|api_key| AnthropicSettings {
            api_key,
            base_url: std::env::var("ANTHROPIC_BASE_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com".into()),
            model: std::env::var("ANTHROPIC_MODEL")
                .unwrap_or_else(|_| "claude-3-5-haiku-latest".into()),
        });

        Self {
            default_order,
            request_timeout_secs,
            openai,
            anthropic,
        }
    }

    /// Build a gateway with every configured backend registered.
    pub fn build_gateway(&self) -> Result<ModelGateway, BackendError> {
        let timeout = Duration::from_secs(self.request_timeout_secs);
        let mut gateway = ModelGateway::new();

        if let Some(settings) = &self.openai {
            gateway.register(Arc::new(OpenAiBackend::new(
                OPENAI_BACKEND,
                settings.clone(),
                timeout,
            )?));
        }
        if let Some(settings) = &self.anthropic {
            gateway.register(Arc::new(AnthropicBackend::new(
                ANTHROPIC_BACKEND,
                settings.clone(),
                timeout,
            )?));
        }

        for name in &self.default_order {
            if !gateway.is_registered(name) {
                tracing::warn!(backend = %name, "Backend in default order is not configured");
            }
        }

        Ok(gateway)
    }
}

/// Split a comma-separated backend order, dropping blanks.
pub fn parse_order(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_order_trims_and_drops_blanks() {
        assert_eq!(parse_order(" openai, ,anthropic ,"), vec!["openai", "anthropic"]);
        assert!(parse_order("").is_empty());
    }

    #[test]
    fn gateway_registers_only_configured_backends() {
        let config = LlmConfig {
            default_order: vec![OPENAI_BACKEND.into(), ANTHROPIC_BACKEND.into()],
            request_timeout_secs: 5,
            openai: None,
            anthropic: Some(AnthropicSettings {
                api_key: "k".into(),
                base_url: "http://127.0.0.1:9".into(),
                model: "m".into(),
            }),
        };
        let gateway = config.build_gateway().expect("gateway");
        assert_eq!(gateway.names(), vec![ANTHROPIC_BACKEND]);
    }
}
