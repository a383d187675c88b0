//! Generation job lifecycle rules.
//!
//! A [`Job`] moves `pending -> processing -> {completed | failed}` and never
//! backwards. [`Job::check_patch`] is the single place those rules live;
//! every [`JobStore`](crate::store::JobStore) implementation calls it before
//! writing so the invariants hold no matter which backend is configured.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::extraction::ScriptMetadata;
use crate::types::{DbId, Timestamp};

/// Progress reported once a job has been picked up by the processor.
pub const PROGRESS_STARTED: i16 = 10;

/// Progress reported for a completed job.
pub const PROGRESS_DONE: i16 = 100;

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

/// What a job asks the model to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Generation,
    Analysis,
    Annotation,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::Generation, JobKind::Analysis, JobKind::Annotation];

    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Generation => "generation",
            JobKind::Analysis => "analysis",
            JobKind::Annotation => "annotation",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown job kind: {s}")))
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Completed and failed jobs accept no further writes.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether a job currently in `self` may be written with status `next`.
    ///
    /// Staying in a non-terminal status is allowed (progress updates).
    /// A pending job may fail directly when processing cannot start.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Pending)
                | (Pending, Processing)
                | (Pending, Failed)
                | (Processing, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A durable record tracking one asynchronous generation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    pub id: DbId,
    pub owner_id: DbId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub input: Value,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub progress: i16,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a pending job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub owner_id: DbId,
    pub kind: JobKind,
    pub input: Value,
}

/// Partial update applied by the job processor. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub progress: Option<i16>,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl JobPatch {
    /// Mark the job as picked up by the processor.
    pub fn processing(now: Timestamp) -> Self {
        Self {
            status: Some(JobStatus::Processing),
            progress: Some(PROGRESS_STARTED),
            started_at: Some(now),
            ..Self::default()
        }
    }

    /// Terminal success with the given result payload.
    pub fn completed(result: Value, now: Timestamp) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(PROGRESS_DONE),
            result: Some(result),
            completed_at: Some(now),
            ..Self::default()
        }
    }

    /// Terminal failure with a human-readable message.
    pub fn failed(message: impl Into<String>, now: Timestamp) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(message.into()),
            completed_at: Some(now),
            ..Self::default()
        }
    }
}

impl Job {
    /// Build the in-memory representation of a freshly submitted job.
    pub fn pending(id: DbId, new: NewJob, now: Timestamp) -> Self {
        Self {
            id,
            owner_id: new.owner_id,
            kind: new.kind,
            status: JobStatus::Pending,
            input: new.input,
            result: None,
            error: None,
            progress: 0,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate `patch` against the lifecycle invariants without applying it.
    pub fn check_patch(&self, patch: &JobPatch) -> Result<(), CoreError> {
        let next = patch.status.unwrap_or(self.status);

        if self.status.is_terminal() {
            return Err(CoreError::Conflict(format!(
                "Job {} is already {} and cannot be modified",
                self.id, self.status
            )));
        }
        if !self.status.can_transition_to(next) {
            return Err(CoreError::Conflict(format!(
                "Job {} cannot move from {} to {next}",
                self.id, self.status
            )));
        }

        if let Some(progress) = patch.progress {
            if !(0..=PROGRESS_DONE).contains(&progress) {
                return Err(CoreError::Validation(format!(
                    "Progress must be between 0 and {PROGRESS_DONE} (got {progress})"
                )));
            }
            if progress < self.progress {
                return Err(CoreError::Conflict(format!(
                    "Job {} progress cannot decrease from {} to {progress}",
                    self.id, self.progress
                )));
            }
        }

        let has_result = patch.result.is_some() || self.result.is_some();
        let has_error = patch.error.is_some() || self.error.is_some();
        match next {
            JobStatus::Completed if !has_result || has_error => Err(CoreError::Validation(
                "A completed job must carry a result and no error".into(),
            )),
            JobStatus::Failed if !has_error || has_result => Err(CoreError::Validation(
                "A failed job must carry an error and no result".into(),
            )),
            JobStatus::Pending | JobStatus::Processing if has_result || has_error => {
                Err(CoreError::Validation(
                    "Only terminal jobs may carry a result or error".into(),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Validate and apply `patch`, stamping `updated_at`.
    pub fn apply(&mut self, patch: JobPatch, now: Timestamp) -> Result<(), CoreError> {
        self.check_patch(&patch)?;

        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(progress) = patch.progress {
            self.progress = progress;
        }
        if patch.result.is_some() {
            self.result = patch.result;
        }
        if patch.error.is_some() {
            self.error = patch.error;
        }
        if patch.started_at.is_some() {
            self.started_at = patch.started_at;
        }
        if patch.completed_at.is_some() {
            self.completed_at = patch.completed_at;
        }
        self.updated_at = now;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// The structured input a generation job is submitted with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationInput {
    /// Free-form request text inserted into the kind's prompt template.
    pub prompt: String,
    /// Preferred backend order. Empty means "use the configured default".
    #[serde(default)]
    pub backends: Vec<String>,
    /// Optional extra material (existing source, notes) for the template.
    #[serde(default)]
    pub context: Option<Value>,
}

/// The result payload stored on a completed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub text: String,
    pub metadata: ScriptMetadata,
    /// Name of the backend that produced the text.
    pub backend: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
