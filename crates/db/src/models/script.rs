//! Row model for the `scripts` table.

use sqlx::FromRow;

use scriptforge_core::script::Script;
use scriptforge_core::types::{DbId, Timestamp};

/// A row from `scripts`.
#[derive(Debug, Clone, FromRow)]
pub struct ScriptRow {
    pub id: DbId,
    pub name: String,
    pub source: String,
    pub dependencies: Vec<String>,
    pub timeout_secs: Option<i32>,
    pub last_run_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<ScriptRow> for Script {
    fn from(row: ScriptRow) -> Self {
        Script {
            id: row.id,
            name: row.name,
            source: row.source,
            dependencies: row.dependencies,
            timeout_secs: row.timeout_secs,
            last_run_at: row.last_run_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
