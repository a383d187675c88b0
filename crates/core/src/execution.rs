//! Script execution records and their terminal-state invariants.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Exit code recorded when the deadline fired and the process was killed.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code recorded when the process was terminated by a signal.
pub const SIGNAL_EXIT_CODE: i32 = -1;

/// Exit code recorded when the attempt failed before the script could run.
pub const SETUP_FAILURE_EXIT_CODE: i32 = -2;

/// Prefix for every line the engine itself writes into a record's stderr.
pub const ENGINE_MARKER: &str = "[scriptforge]";

/// The stderr text of a timed-out execution.
pub fn timeout_marker(timeout_secs: u64) -> String {
    format!("{ENGINE_MARKER} execution timed out after {timeout_secs}s")
}

/// The stderr text of an execution that failed during setup.
pub fn setup_failure_marker(reason: &str) -> String {
    format!("{ENGINE_MARKER} execution setup failed: {reason}")
}

/// Execution lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Timeout,
}

impl ExecutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Queued => "queued",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Timeout => "timeout",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, ExecutionStatus::Queued | ExecutionStatus::Running)
    }

    /// Status for a process that exited on its own.
    pub fn from_exit_code(exit_code: i32) -> Self {
        if exit_code == 0 {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted execution attempt with full I/O capture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRecord {
    pub id: DbId,
    pub script_id: DbId,
    pub triggered_by: Option<DbId>,
    pub status: ExecutionStatus,
    pub inputs: Value,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub duration_ms: Option<i64>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub is_scheduled: bool,
    pub created_at: Timestamp,
}

/// A finalized attempt, ready to be persisted.
#[derive(Debug, Clone)]
pub struct NewExecution {
    pub script_id: DbId,
    pub triggered_by: Option<DbId>,
    pub status: ExecutionStatus,
    pub inputs: Value,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub duration_ms: Option<i64>,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub is_scheduled: bool,
}

impl NewExecution {
    /// Verify the record is internally consistent with its status.
    pub fn check(&self) -> Result<(), CoreError> {
        if self.status.is_terminal() != self.exit_code.is_some() {
            return Err(CoreError::Validation(format!(
                "Execution with status {} must {}have an exit code",
                self.status,
                if self.status.is_terminal() { "" } else { "not " }
            )));
        }
        if self.status == ExecutionStatus::Timeout
            && (self.exit_code != Some(TIMEOUT_EXIT_CODE) || !self.stderr.contains(ENGINE_MARKER))
        {
            return Err(CoreError::Validation(
                "A timed-out execution must carry the timeout exit code and stderr marker".into(),
            ));
        }
        if let (Some(started), Some(completed)) = (self.started_at, self.completed_at) {
            let expected = (completed - started).num_milliseconds();
            if self.duration_ms != Some(expected) {
                return Err(CoreError::Validation(format!(
                    "duration_ms must equal completed_at - started_at ({expected}ms)"
                )));
            }
        }
        Ok(())
    }

    /// Attach store-assigned identity.
    pub fn into_record(self, id: DbId, created_at: Timestamp) -> ExecutionRecord {
        ExecutionRecord {
            id,
            script_id: self.script_id,
            triggered_by: self.triggered_by,
            status: self.status,
            inputs: self.inputs,
            stdout: self.stdout,
            stderr: self.stderr,
            exit_code: self.exit_code,
            duration_ms: self.duration_ms,
            started_at: self.started_at,
            completed_at: self.completed_at,
            is_scheduled: self.is_scheduled,
            created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
