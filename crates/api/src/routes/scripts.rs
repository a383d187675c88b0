use axum::routing::{get, post};
use axum::Router;

use crate::handlers::scripts;
use crate::state::AppState;

/// Script execution routes.
///
/// ```text
/// POST   /scripts/{id}/execute        -> execute_script
/// GET    /scripts/{id}/executions     -> list_executions
/// GET    /executions/{id}             -> get_execution
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/scripts/{id}/execute", post(scripts::execute_script))
        .route("/scripts/{id}/executions", get(scripts::list_executions))
        .route("/executions/{id}", get(scripts::get_execution))
}
