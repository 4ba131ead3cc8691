use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::llm_client::LlmError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Course catalog is empty")]
    CatalogEmpty,

    #[error("Model output contained no extractable records")]
    NoExtractableRecords,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl LlmError {
    /// Stable machine-readable code for the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            LlmError::BackendUnreachable(_) => "BACKEND_UNREACHABLE",
            LlmError::BackendError { .. } => "BACKEND_ERROR",
            LlmError::MalformedResponse(_) => "MALFORMED_RESPONSE",
            LlmError::ModelError { .. } => "MODEL_ERROR",
            LlmError::UpstreamStreamFailure(_) => "UPSTREAM_STREAM_FAILURE",
            LlmError::Misconfigured(_) => "BACKEND_MISCONFIGURED",
        }
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::CatalogEmpty => (
                StatusCode::SERVICE_UNAVAILABLE,
                "CATALOG_EMPTY",
                "No courses are available in the catalog".to_string(),
            ),
            AppError::NoExtractableRecords => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "NO_EXTRACTABLE_RECORDS",
                self.to_string(),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Llm(e) => {
                tracing::error!("LLM error: {e}");
                (StatusCode::BAD_GATEWAY, e.code(), e.to_string())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
