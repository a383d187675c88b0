//! Repository for the `jobs` table.

use sqlx::PgPool;

use scriptforge_core::job::{Job, NewJob};
use scriptforge_core::types::DbId;

use crate::models::job::JobRow;
use crate::models::status::{JobStatusId, StatusId};

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, owner_id, kind, status_id, input, result, error, progress, \
    started_at, completed_at, created_at, updated_at";

pub struct JobRepo;

impl JobRepo {
    /// Insert a pending job.
    pub async fn create(pool: &PgPool, dto: &NewJob) -> Result<JobRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (owner_id, kind, status_id, input) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(dto.owner_id)
            .bind(dto.kind.as_str())
            .bind(JobStatusId::Pending.id())
            .bind(&dto.input)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<JobRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Write back every mutable field of `job`, but only if the row is still
    /// in `expected_status`. Returns `None` when the guard did not match.
    pub async fn save(
        pool: &PgPool,
        job: &Job,
        expected_status: StatusId,
    ) -> Result<Option<JobRow>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs SET \
                status_id = $3, \
                progress = $4, \
                result = $5, \
                error = $6, \
                started_at = $7, \
                completed_at = $8, \
                updated_at = now() \
             WHERE id = $1 AND status_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(job.id)
            .bind(expected_status)
            .bind(JobStatusId::from(job.status).id())
            .bind(job.progress)
            .bind(&job.result)
            .bind(&job.error)
            .bind(job.started_at)
            .bind(job.completed_at)
            .fetch_optional(pool)
            .await
    }

    /// Jobs owned by `owner_id`, newest first.
    pub async fn list_by_owner(
        pool: &PgPool,
        owner_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<JobRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE owner_id = $1 \
             ORDER BY id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(owner_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
