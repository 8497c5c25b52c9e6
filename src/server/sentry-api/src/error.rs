//! API error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::types::ErrorResponse;

/// Errors a handler can return to the client.
///
/// Internal faults carry no detail to the caller; specifics go to the
/// server log only, so key-store or clock problems never leak through the
/// API surface.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request was structurally valid but semantically unacceptable.
    #[error("{0}")]
    BadRequest(String),

    /// Authentication failed. Deliberately uniform so callers cannot probe
    /// which usernames exist.
    #[error("invalid credentials")]
    Unauthorized,

    /// The request conflicts with existing state.
    #[error("{0}")]
    Conflict(String),

    /// Something failed server-side.
    #[error("internal error")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
        });

        (status, body).into_response()
    }
}
