use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::llm_client::LlmError;
use crate::persistence::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Upgrade required: {0}")]
    UpgradeRequired(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Insufficient storage: {0}")]
    InsufficientStorage(String),

    /// An AI-backed operation failed. `operation` is the user-facing summary.
    #[error("{operation}: {source}")]
    Ai {
        operation: &'static str,
        #[source]
        source: LlmError,
    },

    #[error("Text extraction failed: {0}")]
    Extraction(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn ai(operation: &'static str, source: LlmError) -> Self {
        AppError::Ai { operation, source }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::JobNotFound(id) => AppError::NotFound(format!("Job {id} not found")),
            StoreError::FileNotFound(id) => AppError::NotFound(format!("File {id} not found")),
            StoreError::InvalidFile(msg) => AppError::Validation(msg),
            StoreError::FileTooLarge(msg) => AppError::PayloadTooLarge(msg),
            e @ StoreError::QuotaExceeded { .. } => AppError::InsufficientStorage(e.to_string()),
            e @ (StoreError::Persistence(_) | StoreError::Serde(_)) => {
                AppError::Storage(e.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone(), None),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                None,
            ),
            AppError::UpgradeRequired(msg) => (
                StatusCode::UPGRADE_REQUIRED,
                "UPGRADE_REQUIRED",
                msg.clone(),
                None,
            ),
            AppError::PayloadTooLarge(msg) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                msg.clone(),
                None,
            ),
            AppError::InsufficientStorage(msg) => (
                StatusCode::INSUFFICIENT_STORAGE,
                "INSUFFICIENT_STORAGE",
                msg.clone(),
                None,
            ),
            AppError::Ai { operation, source } => {
                tracing::error!("{operation}: {source}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "AI_ERROR",
                    operation.to_string(),
                    Some(source.to_string()),
                )
            }
            AppError::Extraction(msg) => {
                tracing::error!("Text extraction failed: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "EXTRACTION_ERROR",
                    "Text extraction failed".to_string(),
                    Some(msg.clone()),
                )
            }
            AppError::NotConfigured(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "NOT_CONFIGURED",
                msg.clone(),
                None,
            ),
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "A storage error occurred".to_string(),
                    None,
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    None,
                )
            }
        };

        let body = match details {
            Some(details) => json!({ "error": message, "code": code, "details": details }),
            None => json!({ "error": message, "code": code }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_validation_maps_to_bad_request() {
        let response = AppError::Validation("missing".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_ai_error_maps_to_internal_server_error() {
        let response = AppError::ai("Analysis failed", LlmError::EmptyContent).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_store_not_found_maps_to_404() {
        let err: AppError = StoreError::JobNotFound(Uuid::new_v4()).into();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_quota_maps_to_insufficient_storage() {
        let err: AppError = StoreError::QuotaExceeded {
            requested: 10,
            available: 1,
        }
        .into();
        assert_eq!(
            err.into_response().status(),
            StatusCode::INSUFFICIENT_STORAGE
        );
    }
}
