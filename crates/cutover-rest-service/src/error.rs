//! Core-error to HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cutover_rest_api_contract::ErrorResponse;

/// Wrapper giving core errors an HTTP shape.
pub struct ApiError(pub cutover_core::Error);

impl From<cutover_core::Error> for ApiError {
    fn from(err: cutover_core::Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use cutover_core::Error;
        let status = match &self.0 {
            Error::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Conflict { .. } | Error::Cancelled { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorResponse {
            message: self.0.message(),
        });
        (status, body).into_response()
    }
}
