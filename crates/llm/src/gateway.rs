//! Ordered-fallback dispatch across registered backends.

use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::{BackendError, GenerationBackend};

/// Registry of generation backends keyed by name.
#[derive(Clone, Default)]
pub struct ModelGateway {
    backends: HashMap<String, Arc<dyn GenerationBackend>>,
}

impl ModelGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `backend` under its own name, replacing any previous entry.
    pub fn register(&mut self, backend: Arc<dyn GenerationBackend>) {
        self.backends.insert(backend.name().to_string(), backend);
    }

    pub fn with_backend(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.register(backend);
        self
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.backends.contains_key(name)
    }

    /// Registered backend names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Try each backend in `order` and return `(backend_name, text)` from the
    /// first that produces non-blank output.
    ///
    /// A candidate fails when it is not registered, its call errors, or its
    /// output is blank. Failures are logged and the next candidate is tried;
    /// the last candidate's failure is returned as-is. Candidates after the
    /// first success are never called.
    pub async fn generate(
        &self,
        prompt: &str,
        order: &[String],
    ) -> Result<(String, String), BackendError> {
        let mut last_err = BackendError::NoBackends;

        for (position, name) in order.iter().enumerate() {
            match self.try_backend(name, prompt).await {
                Ok(text) => {
                    tracing::info!(backend = %name, position, "Generation succeeded");
                    return Ok((name.clone(), text));
                }
                Err(e) => {
                    tracing::warn!(
                        backend = %name,
                        position,
                        remaining = order.len() - position - 1,
                        error = %e,
                        "Generation backend failed",
                    );
                    last_err = e;
                }
            }
        }

        Err(last_err)
    }

    async fn try_backend(&self, name: &str, prompt: &str) -> Result<String, BackendError> {
        let backend = self
            .backends
            .get(name)
            .ok_or_else(|| BackendError::UnknownBackend(name.to_string()))?;

        let text = backend.generate(prompt).await?;
        if text.trim().is_empty() {
            return Err(BackendError::EmptyOutput {
                backend: name.to_string(),
            });
        }
        Ok(text)
    }
}

impl std::fmt::Debug for ModelGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelGateway")
            .field("backends", &self.names())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
