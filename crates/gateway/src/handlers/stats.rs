//! Index statistics

use crate::AppState;
use axum::{extract::State, Json};
use lectern_common::errors::Result;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_documents: usize,
    pub total_chunks: usize,
    pub vector_db_size_mb: f64,
}

fn bytes_to_mb(bytes: u64) -> f64 {
    let mb = bytes as f64 / (1024.0 * 1024.0);
    (mb * 100.0).round() / 100.0
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let (sources, size) =
        futures::try_join!(state.store.get_all_sources(), state.store.size_bytes())?;

    Ok(Json(StatsResponse {
        total_documents: sources.len(),
        total_chunks: sources.iter().map(|s| s.chunk_count).sum(),
        vector_db_size_mb: bytes_to_mb(size),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_rounding() {
        assert_eq!(bytes_to_mb(0), 0.0);
        assert_eq!(bytes_to_mb(1024 * 1024), 1.0);
        assert_eq!(bytes_to_mb(1_600_000), 1.53);
    }
}
