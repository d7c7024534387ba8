//! Question answering handler

use crate::AppState;
use axum::{extract::State, Json};
use lectern_common::{
    errors::{AppError, Result},
    models::QueryResult,
    pipeline::QueryParams,
};
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct QueryRequest {
    #[validate(length(min = 1, max = 4000))]
    pub query: String,

    /// Restrict the search to one document
    #[serde(default)]
    pub document_id: Option<String>,

    #[serde(default)]
    #[validate(range(min = 1, max = 20))]
    pub top_k: Option<usize>,
}

/// Answer a question against the indexed documents.
///
/// The orchestrator future is polled inline, so a client disconnect drops it
/// and abandons any in-flight model or store call.
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResult>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let params = QueryParams {
        query: request.query,
        document_id: request.document_id,
        top_k: request
            .top_k
            .unwrap_or(state.config.retrieval.default_top_k),
    };

    let result = state.orchestrator.run(&params).await?;
    Ok(Json(result))
}
