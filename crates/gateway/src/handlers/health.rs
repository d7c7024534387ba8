//! Health check handlers

use crate::AppState;
use axum::{extract::State, Json};
use lectern_common::errors::{AppError, Result};
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

/// Liveness plus vector store reachability
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    state
        .store
        .ping()
        .await
        .map_err(|e| AppError::ServiceUnavailable {
            message: format!("Service unhealthy: {}", e),
        })?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        message: "API is running and vector DB is accessible".to_string(),
    }))
}
