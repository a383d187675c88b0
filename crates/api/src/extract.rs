//! Request body extractors that reject with [`AppError`].

use axum::extract::FromRequest;

use crate::error::AppError;

/// JSON body extractor whose rejections use the API's error envelope.
///
/// Malformed JSON, a missing content type and schema mismatches all become
/// `400 BAD_REQUEST` with the parser's message.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
