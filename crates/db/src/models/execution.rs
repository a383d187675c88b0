//! Row model for the `script_executions` table.

use serde_json::Value;
use sqlx::FromRow;

use scriptforge_core::error::CoreError;
use scriptforge_core::execution::ExecutionRecord;
use scriptforge_core::types::{DbId, Timestamp};

use super::status::{ExecutionStatusId, StatusId};

/// A row from `script_executions`.
#[derive(Debug, Clone, FromRow)]
pub struct ExecutionRow {
    pub id: DbId,
    pub script_id: DbId,
    pub triggered_by: Option<DbId>,
    pub status_id: StatusId,
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

impl TryFrom<ExecutionRow> for ExecutionRecord {
    type Error = CoreError;

    fn try_from(row: ExecutionRow) -> Result<Self, Self::Error> {
        Ok(ExecutionRecord {
            id: row.id,
            script_id: row.script_id,
            triggered_by: row.triggered_by,
            status: ExecutionStatusId::from_id(row.status_id)?.into(),
            inputs: row.inputs,
            stdout: row.stdout,
            stderr: row.stderr,
            exit_code: row.exit_code,
            duration_ms: row.duration_ms,
            started_at: row.started_at,
            completed_at: row.completed_at,
            is_scheduled: row.is_scheduled,
            created_at: row.created_at,
        })
    }
}
