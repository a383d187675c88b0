//! Persistence contracts for jobs, scripts, and execution records.
//!
//! The pipeline only sees these traits. `scriptforge-db` implements them on
//! Postgres; [`memory`] implements them in process for tests and for running
//! the server without a database.

pub mod memory;

use async_trait::async_trait;

use crate::error::CoreError;
use crate::execution::{ExecutionRecord, NewExecution};
use crate::job::{Job, JobPatch, NewJob};
use crate::script::{Script, ScriptPatch};
use crate::types::DbId;

/// Boxed error from a concrete storage backend.
pub type BackendError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by store implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Domain-level rejection (missing row, invariant violation).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The storage backend itself failed.
    #[error("Storage backend error: {0}")]
    Backend(#[source] BackendError),
}

impl StoreError {
    pub fn backend(err: impl Into<BackendError>) -> Self {
        Self::Backend(err.into())
    }

    pub fn not_found(entity: &'static str, id: DbId) -> Self {
        Self::Core(CoreError::NotFound { entity, id })
    }
}

/// Maximum page size for list operations.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Default page size for list operations.
pub const DEFAULT_PAGE_SIZE: i64 = 25;

/// Clamp caller-supplied pagination into `(limit, offset)`.
pub fn clamp_page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, new: NewJob) -> Result<Job, StoreError>;

    async fn get(&self, id: DbId) -> Result<Option<Job>, StoreError>;

    /// Apply `patch`, enforcing [`Job::check_patch`]. Unknown ids are `NotFound`.
    async fn update(&self, id: DbId, patch: JobPatch) -> Result<Job, StoreError>;

    /// Jobs owned by `owner_id`, newest first.
    async fn list_by_owner(
        &self,
        owner_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Job>, StoreError>;
}

#[async_trait]
pub trait ScriptStore: Send + Sync {
    async fn get(&self, id: DbId) -> Result<Option<Script>, StoreError>;

    async fn update(&self, id: DbId, patch: ScriptPatch) -> Result<Script, StoreError>;
}

#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Persist a finalized attempt, enforcing [`NewExecution::check`].
    async fn create(&self, new: NewExecution) -> Result<ExecutionRecord, StoreError>;

    async fn get(&self, id: DbId) -> Result<Option<ExecutionRecord>, StoreError>;

    /// Executions of one script, newest first.
    async fn list_by_script(
        &self,
        script_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ExecutionRecord>, StoreError>;
}
