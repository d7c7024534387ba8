use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-source summary kept by the vector store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub source_hash: String,
    pub chunk_count: usize,
    pub indexed_at: DateTime<Utc>,
}

/// An indexed document as presented to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "document_id")]
    pub id: String,
    pub filename: String,
    pub chunk_count: usize,
    pub indexed_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Placeholder name for a source whose mapping entry is missing
    pub fn unknown_filename(source_hash: &str) -> String {
        let prefix: String = source_hash.chars().take(8).collect();
        format!("Unknown_{}", prefix)
    }
}
