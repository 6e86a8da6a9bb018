use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::alignment::AlignError;
use crate::llm_client::GenerationError;
use crate::storage::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Align(#[from] AlignError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut retry_after = None;

        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Align(e) => match e {
                AlignError::UnsupportedFormat(_) => (
                    StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    "UNSUPPORTED_FORMAT",
                    e.to_string(),
                ),
                AlignError::CorruptDocument(_) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "CORRUPT_DOCUMENT",
                    e.to_string(),
                ),
                AlignError::EmptyDocument => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "EMPTY_DOCUMENT",
                    e.to_string(),
                ),
                AlignError::IncompleteResponse { .. } => {
                    tracing::error!("Suggestion merge failed: {e}");
                    (
                        StatusCode::BAD_GATEWAY,
                        "INCOMPLETE_RESPONSE",
                        e.to_string(),
                    )
                }
                AlignError::DimensionMismatch { .. } | AlignError::Embedding(_) => {
                    tracing::error!("Embedding error: {e}");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "EMBEDDING_ERROR",
                        "An embedding error occurred".to_string(),
                    )
                }
            },
            AppError::Generation(e) => {
                tracing::error!("Generation error: {e}");
                match e {
                    GenerationError::RateLimited { retry_after: hint } => {
                        retry_after = *hint;
                        (
                            StatusCode::TOO_MANY_REQUESTS,
                            "RATE_LIMITED",
                            "The text generation service is rate limited".to_string(),
                        )
                    }
                    GenerationError::ServiceUnavailable(_) => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "SERVICE_UNAVAILABLE",
                        "The text generation service is unavailable".to_string(),
                    ),
                    GenerationError::Rejected { .. } => (
                        StatusCode::BAD_GATEWAY,
                        "GENERATION_REJECTED",
                        "The text generation service rejected the request".to_string(),
                    ),
                }
            }
            AppError::Store(e) => match e {
                StoreError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string()),
                StoreError::InvalidHandle(_) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string())
                }
                StoreError::Backend(msg) => {
                    tracing::error!("Storage error: {msg}");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "STORAGE_ERROR",
                        "A storage error occurred".to_string(),
                    )
                }
            },
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

        let mut response = (status, body).into_response();
        if let Some(delay) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&delay.as_secs().to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
