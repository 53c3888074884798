use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use crate::error::AppError;

pub mod routes;

/// Maps a domain error onto a JSON error response.
///
/// `Storage` details are logged server-side only; clients get an opaque 500.
pub fn error_response(err: AppError) -> Response {
    match err {
        AppError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        AppError::InsufficientStock(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "insufficient_stock", msg)
        }
        AppError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        AppError::Timeout(ms) => json_error(
            StatusCode::GATEWAY_TIMEOUT,
            "deadline_exceeded",
            format!("operation exceeded deadline of {ms} ms"),
        ),
        AppError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        AppError::Storage(e) => {
            error!(error = ?e, "storage failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                "internal storage failure",
            )
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
