//! Ingestion error types

use lectern_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("PDF parse error for {path}: {message}")]
    PdfParseError { path: String, message: String },

    #[error("No text content extracted from {path}")]
    NoText { path: String },

    #[error("No chunks produced for {path}")]
    NoChunks { path: String },

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Extraction task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<IngestionError> for AppError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::Store(inner) => inner,
            other => AppError::Indexing {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_to_indexing_error() {
        let err: AppError = IngestionError::NoChunks {
            path: "a.pdf".to_string(),
        }
        .into();
        assert!(matches!(err, AppError::Indexing { .. }));
        assert_eq!(err.status_code().as_u16(), 500);
    }

    #[test]
    fn test_store_errors_pass_through() {
        let err: AppError = IngestionError::Store(AppError::EmbeddingError {
            message: "down".to_string(),
        })
        .into();
        assert!(matches!(err, AppError::EmbeddingError { .. }));
    }
}
