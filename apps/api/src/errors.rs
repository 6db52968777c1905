use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::files::FileReadError;
use crate::pipeline::session::PreconditionError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    Precondition(#[from] PreconditionError),

    #[error("Upload error: {0}")]
    Upload(#[from] MultipartError),

    #[error("File error: {0}")]
    File(#[from] FileReadError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Precondition(e) => {
                let status = match e {
                    PreconditionError::AlreadyProcessing => StatusCode::CONFLICT,
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, e.code(), e.to_string())
            }
            AppError::Upload(e) => (
                StatusCode::BAD_REQUEST,
                "UPLOAD_ERROR",
                format!("Could not read the upload: {e}"),
            ),
            AppError::File(e) => {
                tracing::error!("File error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "FILE_ERROR",
                    "The uploaded file could not be stored".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
