//! Postgres implementations of the core store traits.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use scriptforge_core::error::CoreError;
use scriptforge_core::execution::{ExecutionRecord, NewExecution};
use scriptforge_core::job::{Job, JobPatch, NewJob};
use scriptforge_core::script::{Script, ScriptPatch};
use scriptforge_core::store::{ExecutionStore, JobStore, ScriptStore, StoreError};
use scriptforge_core::types::DbId;

use crate::models::status::JobStatusId;
use crate::repositories::{JobRepo, ScriptExecutionRepo, ScriptRepo};

fn backend(err: sqlx::Error) -> StoreError {
    tracing::error!(error = %err, "Database error");
    StoreError::backend(err)
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, new: NewJob) -> Result<Job, StoreError> {
        let row = JobRepo::create(&self.pool, &new).await.map_err(backend)?;
        Ok(Job::try_from(row)?)
    }

    async fn get(&self, id: DbId) -> Result<Option<Job>, StoreError> {
        let row = JobRepo::find_by_id(&self.pool, id).await.map_err(backend)?;
        Ok(row.map(Job::try_from).transpose()?)
    }

    /// Validate the patch against the current row, then write it back under
    /// a status guard so a concurrent writer cannot be overwritten.
    async fn update(&self, id: DbId, patch: JobPatch) -> Result<Job, StoreError> {
        let mut job = self
            .get(id)
            .await?
            .ok_or(StoreError::not_found("job", id))?;
        let expected_status = JobStatusId::from(job.status).id();

        job.apply(patch, Utc::now())?;

        let row = JobRepo::save(&self.pool, &job, expected_status)
            .await
            .map_err(backend)?
            .ok_or_else(|| {
                CoreError::Conflict(format!("Job {id} was modified concurrently"))
            })?;
        Ok(Job::try_from(row)?)
    }

    async fn list_by_owner(
        &self,
        owner_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Job>, StoreError> {
        let rows = JobRepo::list_by_owner(&self.pool, owner_id, limit, offset)
            .await
            .map_err(backend)?;
        Ok(rows
            .into_iter()
            .map(Job::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }
}

// ---------------------------------------------------------------------------
// Scripts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PgScriptStore {
    pool: PgPool,
}

impl PgScriptStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScriptStore for PgScriptStore {
    async fn get(&self, id: DbId) -> Result<Option<Script>, StoreError> {
        let row = ScriptRepo::find_by_id(&self.pool, id)
            .await
            .map_err(backend)?;
        Ok(row.map(Script::from))
    }

    async fn update(&self, id: DbId, patch: ScriptPatch) -> Result<Script, StoreError> {
        let row = match patch.last_run_at {
            Some(last_run_at) => ScriptRepo::touch_last_run(&self.pool, id, last_run_at)
                .await
                .map_err(backend)?,
            None => ScriptRepo::find_by_id(&self.pool, id)
                .await
                .map_err(backend)?,
        };
        row.map(Script::from)
            .ok_or(StoreError::not_found("script", id))
    }
}

// ---------------------------------------------------------------------------
// Executions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PgExecutionStore {
    pool: PgPool,
}

impl PgExecutionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExecutionStore for PgExecutionStore {
    async fn create(&self, new: NewExecution) -> Result<ExecutionRecord, StoreError> {
        new.check()?;
        let row = ScriptExecutionRepo::create(&self.pool, &new)
            .await
            .map_err(backend)?;
        Ok(ExecutionRecord::try_from(row)?)
    }

    async fn get(&self, id: DbId) -> Result<Option<ExecutionRecord>, StoreError> {
        let row = ScriptExecutionRepo::find_by_id(&self.pool, id)
            .await
            .map_err(backend)?;
        Ok(row.map(ExecutionRecord::try_from).transpose()?)
    }

    async fn list_by_script(
        &self,
        script_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ExecutionRecord>, StoreError> {
        let rows = ScriptExecutionRepo::list_by_script(&self.pool, script_id, limit, offset)
            .await
            .map_err(backend)?;
        Ok(rows
            .into_iter()
            .map(ExecutionRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }
}
