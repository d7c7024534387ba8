//! Vector store boundary
//!
//! Similarity is reported as cosine **distance**: `0.0` for identical
//! direction, growing as texts diverge. Lower distance means more similar.
//! Everything downstream (optimizer ranking, citation scores) assumes this.

mod embedder;
mod local;

pub use embedder::{create_embedder, Embedder, HashingEmbedder, OpenAIEmbedder};
pub use local::LocalVectorStore;

use crate::errors::Result;
use crate::models::{Chunk, NewChunk, SourceInfo};
use async_trait::async_trait;

/// Restricts a similarity query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhereFilter {
    pub source_hash: Option<String>,
}

impl WhereFilter {
    pub fn for_source(source_hash: impl Into<String>) -> Self {
        Self {
            source_hash: Some(source_hash.into()),
        }
    }

    pub fn matches(&self, source_hash: &str) -> bool {
        self.source_hash
            .as_deref()
            .map_or(true, |wanted| wanted == source_hash)
    }
}

/// Storage of embedded chunks keyed by document content hash
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Chunks most similar to `text`, most similar first
    async fn query(&self, text: &str, n_results: usize, filter: &WhereFilter) -> Result<Vec<Chunk>>;

    /// Whether any chunks exist for this content hash
    async fn check_processed(&self, source_hash: &str) -> Result<bool>;

    /// Remove every chunk of a source, returning how many were removed
    async fn delete_source(&self, source_hash: &str) -> Result<usize>;

    async fn get_all_sources(&self) -> Result<Vec<SourceInfo>>;

    /// Embed and store chunks for a source, replacing any previous ones
    async fn add_chunks(&self, source_hash: &str, chunks: Vec<NewChunk>) -> Result<usize>;

    /// Reachability check
    async fn ping(&self) -> Result<()>;

    /// Bytes the index occupies on disk
    async fn size_bytes(&self) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_filter() {
        assert!(WhereFilter::default().matches("abc"));
        assert!(WhereFilter::for_source("abc").matches("abc"));
        assert!(!WhereFilter::for_source("abc").matches("def"));
    }
}
