//! Background generation jobs.
//!
//! [`JobProcessor::submit`] persists a pending job and returns at once. The
//! job itself runs on a [`TaskTracker`] detached from the submitting request:
//! it is marked processing, rendered into a prompt, sent through the
//! [`ModelGateway`], and finished as completed or failed. The processor is
//! the only writer of a job after submission.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio_util::task::TaskTracker;

use scriptforge_core::extraction::extract;
use scriptforge_core::job::{GenerationInput, GenerationOutput, Job, JobKind, JobPatch, NewJob};
use scriptforge_core::prompt::PromptTemplates;
use scriptforge_core::store::{JobStore, StoreError};
use scriptforge_core::types::DbId;
use scriptforge_llm::ModelGateway;

/// Error message recorded on a job whose task panicked.
const PANIC_MESSAGE: &str = "Job processing aborted unexpectedly";

/// Error message recorded on a job that could not be moved to processing.
const START_FAILED_MESSAGE: &str = "Job could not be started";

/// Backoff between attempts to record a job's terminal state.
const FINISH_RETRY_DELAYS: [Duration; 3] = [
    Duration::from_millis(100),
    Duration::from_millis(500),
    Duration::from_secs(2),
];

pub struct JobProcessor {
    worker: Arc<JobWorker>,
    tracker: TaskTracker,
}

/// State shared with every background job task.
struct JobWorker {
    store: Arc<dyn JobStore>,
    gateway: ModelGateway,
    templates: PromptTemplates,
    default_backends: Vec<String>,
}

impl JobProcessor {
    pub fn new(
        store: Arc<dyn JobStore>,
        gateway: ModelGateway,
        templates: PromptTemplates,
        default_backends: Vec<String>,
    ) -> Self {
        Self {
            worker: Arc::new(JobWorker {
                store,
                gateway,
                templates,
                default_backends,
            }),
            tracker: TaskTracker::new(),
        }
    }

    /// Create a pending job and launch its background task.
    ///
    /// Only the insert can fail; everything after it is reported through the
    /// job's own status.
    pub async fn submit(
        &self,
        owner_id: DbId,
        kind: JobKind,
        input: Value,
    ) -> Result<Job, StoreError> {
        let job = self
            .worker
            .store
            .create(NewJob {
                owner_id,
                kind,
                input,
            })
            .await?;

        tracing::info!(job_id = job.id, owner_id, kind = %kind, "Job submitted");
        self.spawn(job.id);
        Ok(job)
    }

    pub async fn get(&self, job_id: DbId) -> Result<Option<Job>, StoreError> {
        self.worker.store.get(job_id).await
    }

    /// Jobs owned by `owner_id`, newest first.
    pub async fn list(
        &self,
        owner_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Job>, StoreError> {
        self.worker.store.list_by_owner(owner_id, limit, offset).await
    }

    /// Number of job tasks still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Close the tracker and wait up to `grace` for in-flight jobs. Returns
    /// `true` when every job finished in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        let in_flight = self.tracker.len();
        if in_flight > 0 {
            tracing::info!(in_flight, "Waiting for in-flight jobs to finish");
        }

        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(
                    remaining = self.tracker.len(),
                    grace_secs = grace.as_secs(),
                    "Shutdown grace period elapsed with jobs still running",
                );
                false
            }
        }
    }

    /// Run the job on its own task, supervised by a tracked task that turns a
    /// panic into a failed job.
    fn spawn(&self, job_id: DbId) {
        let worker = Arc::clone(&self.worker);
        self.tracker.spawn(async move {
            let handle = tokio::spawn({
                let worker = Arc::clone(&worker);
                async move { worker.run(job_id).await }
            });

            match handle.await {
                Ok(()) => {}
                Err(e) if e.is_panic() => {
                    tracing::error!(job_id, "Job task panicked");
                    worker.finish(job_id, JobPatch::failed(PANIC_MESSAGE, Utc::now())).await;
                }
                Err(e) => {
                    tracing::warn!(job_id, error = %e, "Job task was cancelled");
                }
            }
        });
    }
}

impl JobWorker {
    async fn run(&self, job_id: DbId) {
        let job = match self
            .store
            .update(job_id, JobPatch::processing(Utc::now()))
            .await
        {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(job_id, error = %e, "Failed to mark job as processing");
                self.finish(job_id, JobPatch::failed(START_FAILED_MESSAGE, Utc::now()))
                    .await;
                return;
            }
        };

        let patch = match self.generate(&job).await {
            Ok(result) => JobPatch::completed(result, Utc::now()),
            Err(message) => {
                tracing::warn!(job_id, error = %message, "Job failed");
                JobPatch::failed(message, Utc::now())
            }
        };
        self.finish(job_id, patch).await;
    }

    /// Produce the job's result payload, or the message to fail it with.
    async fn generate(&self, job: &Job) -> Result<Value, String> {
        let input: GenerationInput = serde_json::from_value(job.input.clone())
            .map_err(|e| format!("Invalid job input: {e}"))?;
        if input.prompt.trim().is_empty() {
            return Err("Invalid job input: prompt must not be empty".into());
        }

        let prompt = self.templates.render(job.kind, &input);
        let order = if input.backends.is_empty() {
            &self.default_backends
        } else {
            &input.backends
        };

        let (backend, raw) = self
            .gateway
            .generate(&prompt, order)
            .await
            .map_err(|e| format!("Generation failed: {e}"))?;

        let extracted = extract(&raw);
        tracing::info!(
            job_id = job.id,
            backend = %backend,
            script_name = %extracted.metadata.name,
            "Generation completed",
        );

        serde_json::to_value(GenerationOutput {
            text: extracted.body,
            metadata: extracted.metadata,
            backend,
        })
        .map_err(|e| format!("Failed to encode job result: {e}"))
    }

    /// Write a terminal patch, retrying while the storage backend is failing.
    async fn finish(&self, job_id: DbId, patch: JobPatch) {
        let mut delays = FINISH_RETRY_DELAYS.iter();
        loop {
            match self.store.update(job_id, patch.clone()).await {
                Ok(_) => return,
                Err(StoreError::Backend(e)) => match delays.next() {
                    Some(delay) => {
                        tracing::warn!(
                            job_id,
                            error = %e,
                            retry_in_ms = delay.as_millis() as u64,
                            "Failed to record job outcome; retrying",
                        );
                        tokio::time::sleep(*delay).await;
                    }
                    None => {
                        tracing::error!(job_id, error = %e, "Failed to record job outcome; giving up");
                        return;
                    }
                },
                Err(e) => {
                    tracing::error!(job_id, error = %e, "Job outcome was rejected");
                    return;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
