use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::generation::pipeline::StageFailure;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
/// Bodies are short plain text; upstream details stay in the logs.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Generation(#[from] StageFailure),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(msg) => {
                tracing::warn!("Rejected request: {msg}");
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            AppError::Generation(failure) if failure.is_client_error() => {
                tracing::warn!(stage = %failure.stage, "Rejected input: {}", failure.cause);
                (StatusCode::BAD_REQUEST, failure.cause.to_string())
            }
            AppError::Generation(failure) => {
                tracing::error!(stage = %failure.stage, "Generation failed: {:?}", failure.cause);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to generate documents".to_string(),
                )
            }
        };

        (status, message).into_response()
    }
}
