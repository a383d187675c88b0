//! Repository for the `scripts` table.

use sqlx::PgPool;

use scriptforge_core::script::NewScript;
use scriptforge_core::types::{DbId, Timestamp};

use crate::models::script::ScriptRow;

const COLUMNS: &str = "\
    id, name, source, dependencies, timeout_secs, last_run_at, \
    created_at, updated_at";

pub struct ScriptRepo;

impl ScriptRepo {
    /// Insert a script. Authoring lives outside this service; this is used
    /// by seeding and tests.
    pub async fn create(pool: &PgPool, dto: &NewScript) -> Result<ScriptRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO scripts (name, source, dependencies, timeout_secs) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ScriptRow>(&query)
            .bind(&dto.name)
            .bind(&dto.source)
            .bind(&dto.dependencies)
            .bind(dto.timeout_secs)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ScriptRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM scripts WHERE id = $1");
        sqlx::query_as::<_, ScriptRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Stamp `last_run_at`. Returns `None` for an unknown id.
    pub async fn touch_last_run(
        pool: &PgPool,
        id: DbId,
        last_run_at: Timestamp,
    ) -> Result<Option<ScriptRow>, sqlx::Error> {
        let query = format!(
            "UPDATE scripts SET last_run_at = $2, updated_at = now() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ScriptRow>(&query)
            .bind(id)
            .bind(last_run_at)
            .fetch_optional(pool)
            .await
    }
}
