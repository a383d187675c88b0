//! Stored script entity as seen by the execution engine.
//!
//! Scripts are owned by the surrounding CRUD system; the engine only reads
//! them and stamps `last_run_at` after each attempt.

use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

/// A runnable script with its ordered dependency specifiers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Script {
    pub id: DbId,
    pub name: String,
    pub source: String,
    /// Installer specifiers (e.g. `requests==2.32.3`), installed in order.
    pub dependencies: Vec<String>,
    /// Per-script wall-clock limit; the engine default applies when `None`.
    pub timeout_secs: Option<i32>,
    pub last_run_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a script (used by seeding and tests).
#[derive(Debug, Clone, Deserialize)]
pub struct NewScript {
    pub name: String,
    pub source: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub timeout_secs: Option<i32>,
}

/// Fields the execution engine is allowed to update.
#[derive(Debug, Clone, Default)]
pub struct ScriptPatch {
    pub last_run_at: Option<Timestamp>,
}
