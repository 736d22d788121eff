//! Unified error handling for the server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The pass could not run at all (fetch or ledger failure)
    #[error("Engine error: {0}")]
    Engine(#[from] backfeed_engine::Error),

    /// The pass ran but at least one event failed
    #[error("{failed} event(s) failed in pass {pass_id}")]
    PassFailed { pass_id: String, failed: usize },

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::Engine(e) => {
                tracing::error!(kind = e.kind(), "sync pass aborted: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "sync pass failed".to_string())
            }
            AppError::PassFailed { pass_id, failed } => {
                tracing::warn!(pass_id, failed, "sync pass finished with failures");
                (StatusCode::INTERNAL_SERVER_ERROR, "sync pass failed".to_string())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;
