//! Shared fixtures for pipeline integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use scriptforge_core::job::{Job, JobPatch, JobStatus, NewJob};
use scriptforge_core::store::memory::MemoryJobStore;
use scriptforge_core::store::{JobStore, StoreError};
use scriptforge_core::types::DbId;
use scriptforge_llm::{BackendError, GenerationBackend};

/// A backend that always gives the same answer and counts its calls.
pub struct StubBackend {
    name: &'static str,
    reply: Result<String, u16>,
    calls: AtomicUsize,
    last_prompt: std::sync::Mutex<Option<String>>,
}

impl StubBackend {
    pub fn ok(name: &'static str, text: &str) -> Arc<Self> {
        Self::build(name, Ok(text.to_string()))
    }

    pub fn failing(name: &'static str, status: u16) -> Arc<Self> {
        Self::build(name, Err(status))
    }

    fn build(name: &'static str, reply: Result<String, u16>) -> Arc<Self> {
        Arc::new(Self {
            name,
            reply,
            calls: AtomicUsize::new(0),
            last_prompt: std::sync::Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for StubBackend {
    fn name(&self) -> &str {
        self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err(status) => Err(BackendError::Api {
                status: *status,
                body: format!("{} unavailable", self.name),
            }),
        }
    }
}

/// A backend that blocks until released, for observing in-flight jobs.
pub struct GatedBackend {
    pub release: Notify,
    pub text: String,
}

impl GatedBackend {
    pub fn new(text: &str) -> Arc<Self> {
        Arc::new(Self {
            release: Notify::new(),
            text: text.to_string(),
        })
    }
}

#[async_trait]
impl GenerationBackend for GatedBackend {
    fn name(&self) -> &str {
        "gated"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, BackendError> {
        self.release.notified().await;
        Ok(self.text.clone())
    }
}

/// Poll the store until the job reaches a terminal status, recording every
/// observed snapshot.
pub async fn wait_terminal(store: &dyn JobStore, job_id: i64) -> Vec<Job> {
    let mut seen = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let job = store
            .get(job_id)
            .await
            .expect("store get")
            .expect("job exists");
        let terminal = job.status.is_terminal();
        seen.push(job);
        if terminal {
            return seen;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {job_id} did not finish in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub fn status_rank(status: JobStatus) -> u8 {
    match status {
        JobStatus::Pending => 0,
        JobStatus::Processing => 1,
        JobStatus::Completed | JobStatus::Failed => 2,
    }
}

/// A job store whose writes fail on demand with a backend error.
#[derive(Default)]
pub struct FlakyJobStore {
    pub inner: MemoryJobStore,
    /// Reject every `processing` patch.
    pub reject_processing: bool,
    /// Number of terminal patches to reject before accepting one.
    pub terminal_failures: AtomicUsize,
}

impl FlakyJobStore {
    fn outage() -> StoreError {
        StoreError::backend(std::io::Error::other("connection reset"))
    }
}

#[async_trait]
impl JobStore for FlakyJobStore {
    async fn create(&self, new: NewJob) -> Result<Job, StoreError> {
        self.inner.create(new).await
    }

    async fn get(&self, id: DbId) -> Result<Option<Job>, StoreError> {
        self.inner.get(id).await
    }

    async fn update(&self, id: DbId, patch: JobPatch) -> Result<Job, StoreError> {
        match patch.status {
            Some(JobStatus::Processing) if self.reject_processing => return Err(Self::outage()),
            Some(status) if status.is_terminal() => {
                let remaining = self.terminal_failures.load(Ordering::SeqCst);
                if remaining > 0 {
                    self.terminal_failures.store(remaining - 1, Ordering::SeqCst);
                    return Err(Self::outage());
                }
            }
            _ => {}
        }
        self.inner.update(id, patch).await
    }

    async fn list_by_owner(
        &self,
        owner_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Job>, StoreError> {
        self.inner.list_by_owner(owner_id, limit, offset).await
    }
}
