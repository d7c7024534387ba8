use serde::{Deserialize, Serialize};

use super::{Chunk, EntityMap};

/// Citation for one chunk that grounded an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCitation {
    pub page: u32,
    pub chunk_type: String,
    pub document: String,
    pub relevance_score: f64,
}

impl SourceCitation {
    pub fn from_chunk(chunk: &Chunk, document: impl Into<String>) -> Self {
        Self {
            page: chunk.page,
            chunk_type: chunk.chunk_type.clone(),
            document: document.into(),
            relevance_score: chunk.relevance_score(),
        }
    }
}

/// Final outcome of a successful query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub answer: String,
    pub reasoning: String,
    pub entities: EntityMap,
    pub sources: Vec<SourceCitation>,
    pub processing_time_ms: u64,
}
