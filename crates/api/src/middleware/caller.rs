//! Caller identity extractor.
//!
//! Authentication happens upstream; the gateway forwards the authenticated
//! user's id in the `X-User-Id` header.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use scriptforge_core::types::DbId;

use crate::error::AppError;
use crate::state::AppState;

/// Header carrying the authenticated caller's id.
pub const CALLER_HEADER: &str = "x-user-id";

/// Authenticated caller extracted from the `X-User-Id` header.
///
/// ```ignore
/// async fn my_handler(caller: CallerId) -> AppResult<Json<()>> {
///     tracing::info!(user_id = caller.0, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerId(pub DbId);

impl FromRequestParts<AppState> for CallerId {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(CALLER_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing X-User-Id header".into()))?;

        raw.trim()
            .parse::<DbId>()
            .ok()
            .filter(|id| *id > 0)
            .map(CallerId)
            .ok_or_else(|| AppError::Unauthorized("Invalid X-User-Id header".into()))
    }
}
