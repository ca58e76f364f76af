//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chronicle_core::error::DomainError;
use serde::Serialize;
use thiserror::Error;

/// Startup and runtime errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Tracing exporter could not be set up.
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
    /// Version found in the store, present on concurrency conflicts so
    /// clients can re-read and retry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_version: Option<i64>,
}

/// HTTP-layer wrapper around `DomainError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, current_version) = match &self.0 {
            DomainError::ConcurrencyConflict { actual, .. } => {
                (StatusCode::CONFLICT, "concurrency_conflict", Some(*actual))
            }
            DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error", None),
            DomainError::InvalidPageToken(_) => {
                (StatusCode::BAD_REQUEST, "invalid_page_token", None)
            }
            DomainError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout", None),
            DomainError::UnknownEventType(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "unknown_event_type",
                None,
            ),
            DomainError::Infrastructure(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "infrastructure_error",
                None,
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }

        let body = ErrorBody {
            error: error_code,
            message: self.0.to_string(),
            current_version,
        };

        (status, Json(body)).into_response()
    }
}
