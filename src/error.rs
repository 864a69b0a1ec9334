use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::store::StoreError;

/// Request-fatal errors surfaced to clients. The rate limiter denies the
/// request on any of these rather than failing open.
#[derive(Debug)]
pub enum AppError {
    StoreUnavailable,
    CounterCorrupted,
}

#[derive(Serialize)]
struct ErrorResponse {
    code: i32,
    error_message: String,
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Redis(_) => AppError::StoreUnavailable,
            StoreError::MissingExpiry(_) => AppError::CounterCorrupted,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::StoreUnavailable => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "visit counter store unavailable".to_string(),
            ),
            AppError::CounterCorrupted => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "visit counter has no expiry".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            code: status.as_u16() as i32,
            error_message,
        });

        (status, body).into_response()
    }
}
