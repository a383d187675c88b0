//! Row model for the `jobs` table.

use serde_json::Value;
use sqlx::FromRow;

use scriptforge_core::error::CoreError;
use scriptforge_core::job::{Job, JobKind};
use scriptforge_core::types::{DbId, Timestamp};

use super::status::{JobStatusId, StatusId};

/// A row from `jobs`.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: DbId,
    pub owner_id: DbId,
    pub kind: String,
    pub status_id: StatusId,
    pub input: Value,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub progress: i16,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<JobRow> for Job {
    type Error = CoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let kind: JobKind = row.kind.parse().map_err(|_| {
            CoreError::Internal(format!("Job {} has unknown kind '{}'", row.id, row.kind))
        })?;

        Ok(Job {
            id: row.id,
            owner_id: row.owner_id,
            kind,
            status: JobStatusId::from_id(row.status_id)?.into(),
            input: row.input,
            result: row.result,
            error: row.error,
            progress: row.progress,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
