//! Repository for the `script_executions` table.
//!
//! Records are written once, already finalized; there is no update path.

use sqlx::PgPool;

use scriptforge_core::execution::NewExecution;
use scriptforge_core::types::DbId;

use crate::models::execution::ExecutionRow;
use crate::models::status::ExecutionStatusId;

const COLUMNS: &str = "\
    id, script_id, triggered_by, status_id, inputs, stdout, stderr, \
    exit_code, duration_ms, started_at, completed_at, is_scheduled, created_at";

pub struct ScriptExecutionRepo;

impl ScriptExecutionRepo {
    pub async fn create(pool: &PgPool, dto: &NewExecution) -> Result<ExecutionRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO script_executions \
                (script_id, triggered_by, status_id, inputs, stdout, stderr, \
                 exit_code, duration_ms, started_at, completed_at, is_scheduled) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ExecutionRow>(&query)
            .bind(dto.script_id)
            .bind(dto.triggered_by)
            .bind(ExecutionStatusId::from(dto.status).id())
            .bind(&dto.inputs)
            .bind(&dto.stdout)
            .bind(&dto.stderr)
            .bind(dto.exit_code)
            .bind(dto.duration_ms)
            .bind(dto.started_at)
            .bind(dto.completed_at)
            .bind(dto.is_scheduled)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ExecutionRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM script_executions WHERE id = $1");
        sqlx::query_as::<_, ExecutionRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Executions of one script, newest first.
    pub async fn list_by_script(
        pool: &PgPool,
        script_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ExecutionRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM script_executions \
             WHERE script_id = $1 \
             ORDER BY id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, ExecutionRow>(&query)
            .bind(script_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
