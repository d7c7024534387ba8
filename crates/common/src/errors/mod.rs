//! Error types for Lectern services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - A coarse [`ErrorKind`] for pattern matching without string inspection
//! - HTTP status code mapping
//! - Structured error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    InvalidArgument,
    PayloadTooLarge,

    // Resource errors (4xxx)
    DocumentNotFound,
    NoRelevantInformation,
    NoRelevantChunks,
    NoInformationAfterFiltering,

    // External service errors (8xxx)
    UpstreamError,
    EmbeddingError,
    ModelError,
    Timeout,

    // Internal errors (9xxx)
    IndexingError,
    InternalError,
    ConfigurationError,
    SerializationError,

    // Service unavailable
    ServiceUnavailable,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidArgument => 1002,
            ErrorCode::PayloadTooLarge => 1003,

            ErrorCode::DocumentNotFound => 4001,
            ErrorCode::NoRelevantInformation => 4002,
            ErrorCode::NoRelevantChunks => 4003,
            ErrorCode::NoInformationAfterFiltering => 4004,

            ErrorCode::UpstreamError => 8001,
            ErrorCode::EmbeddingError => 8002,
            ErrorCode::ModelError => 8003,
            ErrorCode::Timeout => 8004,

            ErrorCode::IndexingError => 9001,
            ErrorCode::InternalError => 9002,
            ErrorCode::ConfigurationError => 9003,
            ErrorCode::SerializationError => 9004,

            ErrorCode::ServiceUnavailable => 9999,
        }
    }
}

/// Coarse classification callers branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    InvalidArgument,
    NotFound,
    Timeout,
    Unavailable,
    Internal,
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("{message}")]
    Validation { message: String, field: Option<String> },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    // Resource errors
    #[error("Document not found")]
    DocumentNotFound { id: String },

    #[error("No relevant information found in the indexed documents")]
    NoRelevantInformation,

    #[error("No relevant chunks found after optimization")]
    NoChunksAfterOptimization,

    #[error("No relevant information found after filtering")]
    NoInformationAfterFiltering,

    // External service errors
    #[error("Embedding service error: {message}")]
    EmbeddingError { message: String },

    #[error("Model error: {message}")]
    ModelError { message: String },

    #[error("{stage} timed out after {timeout_ms}ms")]
    Timeout { stage: String, timeout_ms: u64 },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Failed to index document: {message}")]
    Indexing { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            AppError::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,
            AppError::DocumentNotFound { .. } => ErrorCode::DocumentNotFound,
            AppError::NoRelevantInformation => ErrorCode::NoRelevantInformation,
            AppError::NoChunksAfterOptimization => ErrorCode::NoRelevantChunks,
            AppError::NoInformationAfterFiltering => ErrorCode::NoInformationAfterFiltering,
            AppError::EmbeddingError { .. } => ErrorCode::EmbeddingError,
            AppError::ModelError { .. } => ErrorCode::ModelError,
            AppError::Timeout { .. } => ErrorCode::Timeout,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Indexing { .. } => ErrorCode::IndexingError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::ServiceUnavailable { .. } => ErrorCode::ServiceUnavailable,
        }
    }

    /// Coarse kind for control flow
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation { .. } | AppError::PayloadTooLarge { .. } => ErrorKind::Validation,
            AppError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            AppError::DocumentNotFound { .. }
            | AppError::NoRelevantInformation
            | AppError::NoChunksAfterOptimization
            | AppError::NoInformationAfterFiltering => ErrorKind::NotFound,
            AppError::Timeout { .. } => ErrorKind::Timeout,
            AppError::ServiceUnavailable { .. } => ErrorKind::Unavailable,
            _ => ErrorKind::Internal,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => match self.kind() {
                ErrorKind::Validation | ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
                ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal {
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        AppError::InvalidArgument {
            message: message.into(),
        }
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let details = match &self {
            AppError::Validation {
                field: Some(field), ..
            } => Some(serde_json::json!({ "field": field })),
            AppError::DocumentNotFound { id } => Some(serde_json::json!({ "document_id": id })),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_not_found_mapping() {
        let err = AppError::DocumentNotFound { id: "abc".into() };
        assert_eq!(err.code(), ErrorCode::DocumentNotFound);
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Document not found");
    }

    #[test]
    fn test_pipeline_not_found_exits() {
        for err in [
            AppError::NoRelevantInformation,
            AppError::NoChunksAfterOptimization,
            AppError::NoInformationAfterFiltering,
        ] {
            assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
            assert!(err.is_client_error());
        }
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::Validation {
            message: "Only PDF files are supported".into(),
            field: Some("file".into()),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Only PDF files are supported");
        assert!(!err.is_server_error());
    }

    #[test]
    fn test_timeout_and_internal() {
        let timeout = AppError::Timeout {
            stage: "generate_answer".into(),
            timeout_ms: 500,
        };
        assert_eq!(timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);

        let err = AppError::internal("Something went wrong");
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.is_server_error());
    }
}
