//! Synchronous script execution.
//!
//! [`ExecutionEngine::execute`] drives one attempt from start to a persisted,
//! finalized [`ExecutionRecord`] within the caller's future:
//!
//! 1. Load the script.
//! 2. Resolve the deadline (request, script setting, default; clamped).
//! 3. Run the attempt in a fresh workspace via [`ScriptRuntime::run_attempt`].
//! 4. Persist the record and stamp the script's `last_run_at`.
//!
//! Every attempt that starts produces exactly one record, whatever its
//! outcome. Steps 3 and 4 run on their own task, so dropping the caller's
//! future (client disconnect, request timeout) does not abandon the attempt.

use std::sync::Arc;
use std::time::Duration;

use chrono::{SubsecRound, Utc};
use serde_json::Value;

use scriptforge_core::execution::{ExecutionRecord, NewExecution};
use scriptforge_core::script::{Script, ScriptPatch};
use scriptforge_core::scripting::runtime::{AttemptRequest, ScriptRuntime};
use scriptforge_core::store::{ExecutionStore, ScriptStore, StoreError};
use scriptforge_core::types::DbId;

use crate::config::ExecutionConfig;

/// Parameters of one execution call.
#[derive(Debug, Clone, Default)]
pub struct ExecuteRequest {
    /// Caller-supplied parameters made visible to the script.
    pub inputs: Value,
    /// Deadline override in seconds.
    pub timeout_secs: Option<u64>,
    pub triggered_by: Option<DbId>,
    pub is_scheduled: bool,
}

pub struct ExecutionEngine {
    scripts: Arc<dyn ScriptStore>,
    executions: Arc<dyn ExecutionStore>,
    config: ExecutionConfig,
    runtime: Arc<ScriptRuntime>,
}

impl ExecutionEngine {
    /// Engine using the Python runtime described by `config`.
    pub fn new(
        scripts: Arc<dyn ScriptStore>,
        executions: Arc<dyn ExecutionStore>,
        config: ExecutionConfig,
    ) -> Self {
        let runtime = config.runtime();
        Self::with_runtime(scripts, executions, config, runtime)
    }

    pub fn with_runtime(
        scripts: Arc<dyn ScriptStore>,
        executions: Arc<dyn ExecutionStore>,
        config: ExecutionConfig,
        runtime: ScriptRuntime,
    ) -> Self {
        Self {
            scripts,
            executions,
            config,
            runtime: Arc::new(runtime),
        }
    }

    /// Run script `script_id` once and return the persisted record.
    ///
    /// Errors only when no attempt was started (unknown script, invalid
    /// deadline) or when persisting the record fails.
    pub async fn execute(
        &self,
        script_id: DbId,
        request: ExecuteRequest,
    ) -> Result<ExecutionRecord, StoreError> {
        let script = self
            .scripts
            .get(script_id)
            .await?
            .ok_or(StoreError::not_found("script", script_id))?;

        let timeout = self
            .config
            .resolve_timeout(request.timeout_secs, script.timeout_secs)?;

        tracing::info!(
            script_id,
            script_name = %script.name,
            timeout_secs = timeout.as_secs(),
            dependencies = script.dependencies.len(),
            "Executing script",
        );

        let attempt = tokio::spawn(run_and_record(
            Arc::clone(&self.runtime),
            Arc::clone(&self.scripts),
            Arc::clone(&self.executions),
            script,
            request,
            timeout,
        ));

        match attempt.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(script_id, error = %e, "Execution task aborted");
                Err(StoreError::backend(e))
            }
        }
    }

    pub async fn get_execution(&self, id: DbId) -> Result<Option<ExecutionRecord>, StoreError> {
        self.executions.get(id).await
    }

    /// Execution history of one script, newest first.
    pub async fn list_for_script(
        &self,
        script_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ExecutionRecord>, StoreError> {
        if self.scripts.get(script_id).await?.is_none() {
            return Err(StoreError::not_found("script", script_id));
        }
        self.executions
            .list_by_script(script_id, limit, offset)
            .await
    }
}

/// Run one attempt of `script` and persist its record.
async fn run_and_record(
    runtime: Arc<ScriptRuntime>,
    scripts: Arc<dyn ScriptStore>,
    executions: Arc<dyn ExecutionStore>,
    script: Script,
    request: ExecuteRequest,
    timeout: Duration,
) -> Result<ExecutionRecord, StoreError> {
    let script_id = script.id;

    // Millisecond precision so the stored duration is exactly the
    // difference of the stored timestamps.
    let started_at = Utc::now().trunc_subsecs(3);
    let outcome = runtime
        .run_attempt(AttemptRequest {
            source: &script.source,
            dependencies: &script.dependencies,
            inputs: &request.inputs,
            timeout,
        })
        .await;
    let completed_at = Utc::now().trunc_subsecs(3);

    let record = executions
        .create(NewExecution {
            script_id,
            triggered_by: request.triggered_by,
            status: outcome.status,
            inputs: request.inputs,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            exit_code: Some(outcome.exit_code),
            duration_ms: Some((completed_at - started_at).num_milliseconds()),
            started_at: Some(started_at),
            completed_at: Some(completed_at),
            is_scheduled: request.is_scheduled,
        })
        .await?;

    if let Err(e) = scripts
        .update(
            script_id,
            ScriptPatch {
                last_run_at: Some(completed_at),
            },
        )
        .await
    {
        tracing::warn!(script_id, error = %e, "Failed to update script last_run_at");
    }

    tracing::info!(
        script_id,
        execution_id = record.id,
        status = %record.status,
        exit_code = outcome.exit_code,
        duration_ms = record.duration_ms,
        "Script execution finished",
    );

    Ok(record)
}
