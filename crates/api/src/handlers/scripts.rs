//! Handlers for script execution and execution history.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use scriptforge_core::error::CoreError;
use scriptforge_core::types::DbId;
use scriptforge_pipeline::ExecuteRequest;

use crate::error::AppResult;
use crate::extract::AppJson;
use crate::middleware::caller::CallerId;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /scripts/{id}/execute`.
#[derive(Debug, Default, Deserialize)]
pub struct ExecuteScriptRequest {
    #[serde(default)]
    pub inputs: Value,
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub is_scheduled: bool,
}

/// POST /api/v1/scripts/{id}/execute
///
/// Run the script now and return the finalized execution record. The
/// request blocks for the whole run, bounded by the script deadline.
pub async fn execute_script(
    CallerId(caller): CallerId,
    State(state): State<AppState>,
    Path(script_id): Path<DbId>,
    AppJson(body): AppJson<ExecuteScriptRequest>,
) -> AppResult<impl IntoResponse> {
    let record = state
        .engine
        .execute(
            script_id,
            ExecuteRequest {
                inputs: body.inputs,
                timeout_secs: body.timeout_secs,
                triggered_by: Some(caller),
                is_scheduled: body.is_scheduled,
            },
        )
        .await?;

    Ok(Json(DataResponse { data: record }))
}

/// GET /api/v1/scripts/{id}/executions
pub async fn list_executions(
    _caller: CallerId,
    State(state): State<AppState>,
    Path(script_id): Path<DbId>,
    Query(params): Query<PaginationParams>,
) -> AppResult<impl IntoResponse> {
    let (limit, offset) = params.page();
    let records = state
        .engine
        .list_for_script(script_id, limit, offset)
        .await?;
    Ok(Json(DataResponse { data: records }))
}

/// GET /api/v1/executions/{id}
pub async fn get_execution(
    _caller: CallerId,
    State(state): State<AppState>,
    Path(execution_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let record = state
        .engine
        .get_execution(execution_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "execution",
            id: execution_id,
        })?;
    Ok(Json(DataResponse { data: record }))
}
