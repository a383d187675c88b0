//! In-process store implementations backed by `RwLock<HashMap>`.
//!
//! Ids are assigned from a per-store counter starting at 1. Data lives only
//! as long as the store value.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{ExecutionStore, JobStore, ScriptStore, StoreError};
use crate::execution::{ExecutionRecord, NewExecution};
use crate::job::{Job, JobPatch, NewJob};
use crate::script::{NewScript, Script, ScriptPatch};
use crate::types::DbId;

fn page<T: Clone>(mut rows: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    let offset = usize::try_from(offset).unwrap_or(0);
    let limit = usize::try_from(limit).unwrap_or(0);
    if offset >= rows.len() {
        return Vec::new();
    }
    rows.drain(..offset);
    rows.truncate(limit);
    rows
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryJobStore {
    next_id: AtomicI64,
    rows: RwLock<HashMap<DbId, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, new: NewJob) -> Result<Job, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let job = Job::pending(id, new, Utc::now());
        self.rows.write().await.insert(id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: DbId) -> Result<Option<Job>, StoreError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn update(&self, id: DbId, patch: JobPatch) -> Result<Job, StoreError> {
        let mut rows = self.rows.write().await;
        let job = rows.get_mut(&id).ok_or(StoreError::not_found("job", id))?;
        job.apply(patch, Utc::now())?;
        Ok(job.clone())
    }

    async fn list_by_owner(
        &self,
        owner_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Job>, StoreError> {
        let mut jobs: Vec<Job> = self
            .rows
            .read()
            .await
            .values()
            .filter(|job| job.owner_id == owner_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(page(jobs, limit, offset))
    }
}

// ---------------------------------------------------------------------------
// Scripts
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryScriptStore {
    next_id: AtomicI64,
    rows: RwLock<HashMap<DbId, Script>>,
}

impl MemoryScriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a script. Script CRUD belongs to the host system; this exists
    /// so tests and local runs have something to execute.
    pub async fn insert(&self, new: NewScript) -> Script {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        let script = Script {
            id,
            name: new.name,
            source: new.source,
            dependencies: new.dependencies,
            timeout_secs: new.timeout_secs,
            last_run_at: None,
            created_at: now,
            updated_at: now,
        };
        self.rows.write().await.insert(id, script.clone());
        script
    }
}

#[async_trait]
impl ScriptStore for MemoryScriptStore {
    async fn get(&self, id: DbId) -> Result<Option<Script>, StoreError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn update(&self, id: DbId, patch: ScriptPatch) -> Result<Script, StoreError> {
        let mut rows = self.rows.write().await;
        let script = rows
            .get_mut(&id)
            .ok_or(StoreError::not_found("script", id))?;
        if let Some(last_run_at) = patch.last_run_at {
            script.last_run_at = Some(last_run_at);
        }
        script.updated_at = Utc::now();
        Ok(script.clone())
    }
}

// ---------------------------------------------------------------------------
// Executions
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryExecutionStore {
    next_id: AtomicI64,
    rows: RwLock<HashMap<DbId, ExecutionRecord>>,
}

impl MemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionStore for MemoryExecutionStore {
    async fn create(&self, new: NewExecution) -> Result<ExecutionRecord, StoreError> {
        new.check()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let record = new.into_record(id, Utc::now());
        self.rows.write().await.insert(id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: DbId) -> Result<Option<ExecutionRecord>, StoreError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn list_by_script(
        &self,
        script_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ExecutionRecord>, StoreError> {
        let mut records: Vec<ExecutionRecord> = self
            .rows
            .read()
            .await
            .values()
            .filter(|record| record.script_id == script_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(page(records, limit, offset))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
