use std::sync::Arc;

use scriptforge_pipeline::{ExecutionEngine, JobProcessor};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything is behind `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Database pool, `None` when running on in-memory stores.
    pub pool: Option<scriptforge_db::DbPool>,
    pub config: Arc<ServerConfig>,
    /// Background generation jobs.
    pub jobs: Arc<JobProcessor>,
    /// Synchronous script execution.
    pub engine: Arc<ExecutionEngine>,
}
