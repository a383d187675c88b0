pub mod health;
pub mod jobs;
pub mod scripts;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /jobs                               submit (POST), list (GET)
/// /jobs/{id}                          poll
///
/// /scripts/{id}/execute               run now (POST)
/// /scripts/{id}/executions            history
/// /executions/{id}                    one record
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/jobs", jobs::router())
        .merge(scripts::router())
}
