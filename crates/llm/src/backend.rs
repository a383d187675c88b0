//! The backend contract and its error type.

use async_trait::async_trait;

/// A text-generation provider.
///
/// Implementations perform exactly one call per `generate`; retrying and
/// fallback belong to [`crate::ModelGateway`].
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Name the backend is registered under.
    fn name(&self) -> &str;

    /// Generate text for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, BackendError>;
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Network, DNS, TLS, or client-side timeout.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered with a non-2xx status.
    #[error("Backend returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// The provider answered 2xx but the body was not in the expected shape.
    #[error("Unexpected response from backend: {0}")]
    InvalidResponse(String),

    /// The provider produced only whitespace.
    #[error("Backend '{backend}' returned empty output")]
    EmptyOutput { backend: String },

    /// The requested name is not registered with the gateway.
    #[error("Unknown backend '{0}'")]
    UnknownBackend(String),

    /// The ordered candidate list was empty.
    #[error("No generation backends configured")]
    NoBackends,
}

/// Truncate an error body so provider error pages don't flood logs and job rows.
pub(crate) fn truncate_body(body: String) -> String {
    const MAX_ERROR_BODY: usize = 512;
    if body.len() <= MAX_ERROR_BODY {
        return body;
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
