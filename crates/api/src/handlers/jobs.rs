//! Handlers for the `/jobs` resource.
//!
//! Callers only ever see their own jobs; another caller's job is reported
//! as not found.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use scriptforge_core::error::CoreError;
use scriptforge_core::job::{Job, JobKind, JobStatus};
use scriptforge_core::types::DbId;

use crate::error::AppResult;
use crate::extract::AppJson;
use crate::middleware::caller::CallerId;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /jobs`.
#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub kind: String,
    /// Kind-specific payload; validated when the job runs, not here.
    #[serde(default)]
    pub input: Value,
}

#[derive(Debug, Serialize)]
pub struct SubmittedJob {
    pub id: DbId,
    pub status: JobStatus,
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Create a pending job and return its id immediately (201). Processing
/// happens in the background; poll `GET /jobs/{id}` for the outcome.
pub async fn submit_job(
    CallerId(caller): CallerId,
    State(state): State<AppState>,
    AppJson(body): AppJson<SubmitJobRequest>,
) -> AppResult<impl IntoResponse> {
    let kind: JobKind = body.kind.parse()?;
    let job = state.jobs.submit(caller, kind, body.input).await?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: SubmittedJob {
                id: job.id,
                status: job.status,
            },
        }),
    ))
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
///
/// The caller's jobs, newest first. Supports `limit` and `offset`.
pub async fn list_jobs(
    CallerId(caller): CallerId,
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<impl IntoResponse> {
    let (limit, offset) = params.page();
    let jobs = state.jobs.list(caller, limit, offset).await?;
    Ok(Json(DataResponse { data: jobs }))
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    CallerId(caller): CallerId,
    State(state): State<AppState>,
    Path(job_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Job>>> {
    let job = state
        .jobs
        .get(job_id)
        .await?
        .filter(|job| job.owner_id == caller)
        .ok_or(CoreError::NotFound {
            entity: "job",
            id: job_id,
        })?;

    Ok(Json(DataResponse { data: job }))
}
