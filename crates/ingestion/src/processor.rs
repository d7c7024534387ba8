//! Ingestion processor
//!
//! Core logic for indexing documents: content hashing, PDF extraction,
//! chunking, and handing chunks to the vector store.

use crate::chunker::{chunk_pages, ChunkingConfig};
use crate::errors::IngestionError;
use crate::pdf::extract_pages;
use lectern_common::metrics;
use lectern_common::models::NewChunk;
use lectern_common::store::VectorStore;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncReadExt;
use tracing::{info, instrument};

/// Result of indexing one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    Indexed { source_hash: String, chunks: usize },
    AlreadyIndexed { source_hash: String },
}

impl IndexOutcome {
    pub fn source_hash(&self) -> &str {
        match self {
            IndexOutcome::Indexed { source_hash, .. } | IndexOutcome::AlreadyIndexed { source_hash } => {
                source_hash
            }
        }
    }

    pub fn chunks_created(&self) -> usize {
        match self {
            IndexOutcome::Indexed { chunks, .. } => *chunks,
            IndexOutcome::AlreadyIndexed { .. } => 0,
        }
    }
}

/// SHA-256 of a byte slice, hex encoded
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// SHA-256 of a file's contents, hex encoded, read in blocks
pub async fn hash_file(path: &Path) -> Result<String, IngestionError> {
    let mut file = tokio::fs::File::open(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            IngestionError::FileNotFound(path.display().to_string())
        } else {
            e.into()
        }
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Extract and chunk a PDF; blocking, run it off the async workers
pub fn extract_chunks(path: &Path, config: &ChunkingConfig) -> Result<Vec<NewChunk>, IngestionError> {
    let pages = extract_pages(path)?;
    let chunks = chunk_pages(&pages, config);
    if chunks.is_empty() {
        return Err(IngestionError::NoChunks {
            path: path.display().to_string(),
        });
    }
    Ok(chunks)
}

/// Indexes PDF files into a vector store
pub struct DocumentIndexer {
    store: Arc<dyn VectorStore>,
    chunking_config: ChunkingConfig,
}

impl DocumentIndexer {
    pub fn new(store: Arc<dyn VectorStore>, chunking_config: ChunkingConfig) -> Self {
        Self {
            store,
            chunking_config,
        }
    }

    /// Hash the file and index it unless its content is already indexed
    pub async fn index_file(&self, path: &Path) -> Result<IndexOutcome, IngestionError> {
        let source_hash = hash_file(path).await?;

        if self.store.check_processed(&source_hash).await? {
            info!(source_hash = %source_hash, "Document already indexed");
            return Ok(IndexOutcome::AlreadyIndexed { source_hash });
        }

        let chunks = self.index_new(path, &source_hash).await?;
        Ok(IndexOutcome::Indexed {
            source_hash,
            chunks,
        })
    }

    /// Index a file whose hash is known not to be indexed yet
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn index_new(&self, path: &Path, source_hash: &str) -> Result<usize, IngestionError> {
        let started = Instant::now();

        let owned: PathBuf = path.to_path_buf();
        let config = self.chunking_config.clone();
        let chunks = tokio::task::spawn_blocking(move || extract_chunks(&owned, &config))
            .await
            .map_err(|e| IngestionError::Task(e.to_string()))??;

        let created = self.store.add_chunks(source_hash, chunks).await?;
        if created == 0 {
            return Err(IngestionError::NoChunks {
                path: path.display().to_string(),
            });
        }

        metrics::record_ingestion(started.elapsed().as_secs_f64(), created);
        info!(
            source_hash,
            chunks = created,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Document indexed"
        );

        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lectern_common::store::{HashingEmbedder, LocalVectorStore};

    #[test]
    fn test_content_hash() {
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_hash_file_matches_content_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        let bytes: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        tokio::fs::write(&path, &bytes).await.unwrap();

        assert_eq!(hash_file(&path).await.unwrap(), content_hash(&bytes));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let result = hash_file(Path::new("/nonexistent/lectern.pdf")).await;
        assert!(matches!(result, Err(IngestionError::FileNotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_pdf_is_not_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        tokio::fs::write(&path, b"not a pdf").await.unwrap();

        let store = Arc::new(LocalVectorStore::in_memory(Arc::new(HashingEmbedder::new(64))));
        let indexer = DocumentIndexer::new(store.clone(), ChunkingConfig::default());

        let result = indexer.index_file(&path).await;
        assert!(matches!(result, Err(IngestionError::PdfParseError { .. })));
        assert!(store.get_all_sources().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_already_indexed_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known.pdf");
        tokio::fs::write(&path, b"%PDF-1.5 pretend").await.unwrap();
        let hash = content_hash(b"%PDF-1.5 pretend");

        let store = Arc::new(LocalVectorStore::in_memory(Arc::new(HashingEmbedder::new(64))));
        store
            .add_chunks(
                &hash,
                vec![NewChunk {
                    page: 1,
                    chunk_type: lectern_common::models::ChunkType::Text,
                    content: "already here".to_string(),
                }],
            )
            .await
            .unwrap();

        let indexer = DocumentIndexer::new(store.clone(), ChunkingConfig::default());
        let outcome = indexer.index_file(&path).await.unwrap();

        assert_eq!(outcome, IndexOutcome::AlreadyIndexed { source_hash: hash });
        assert_eq!(outcome.chunks_created(), 0);
        assert_eq!(store.get_all_sources().await.unwrap()[0].chunk_count, 1);
    }
}
