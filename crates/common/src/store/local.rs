//! In-process vector index persisted as a single JSON file

use super::{Embedder, VectorStore, WhereFilter};
use crate::errors::{AppError, Result};
use crate::fsutil::write_atomically;
use crate::models::{Chunk, NewChunk, SourceInfo};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexFile {
    model: String,
    dimension: usize,
    sources: BTreeMap<String, SourceRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SourceRecord {
    indexed_at: DateTime<Utc>,
    chunks: Vec<StoredChunk>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredChunk {
    page: u32,
    chunk_type: String,
    content: String,
    embedding: Vec<f32>,
}

/// Brute-force cosine search over every stored chunk.
///
/// Mutations hold the write lock across the file rewrite, so concurrent
/// uploads and deletes are applied one at a time.
pub struct LocalVectorStore {
    path: Option<PathBuf>,
    embedder: Arc<dyn Embedder>,
    index: RwLock<IndexFile>,
}

impl LocalVectorStore {
    /// Open (or create) an index file
    pub async fn open(path: impl Into<PathBuf>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let path = path.into();

        let index = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let index: IndexFile = serde_json::from_slice(&bytes)?;
                if !index.sources.is_empty() && index.model != embedder.model_name() {
                    return Err(AppError::Configuration {
                        message: format!(
                            "index at {} was built with embedding model {}, configured model is {}",
                            path.display(),
                            index.model,
                            embedder.model_name()
                        ),
                    });
                }
                index
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                IndexFile::default()
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            path = %path.display(),
            sources = index.sources.len(),
            model = embedder.model_name(),
            "Vector index loaded"
        );

        Ok(Self {
            path: Some(path),
            index: RwLock::new(IndexFile {
                model: embedder.model_name().to_string(),
                dimension: embedder.dimension(),
                sources: index.sources,
            }),
            embedder,
        })
    }

    /// Index that lives only in memory
    pub fn in_memory(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            path: None,
            index: RwLock::new(IndexFile {
                model: embedder.model_name().to_string(),
                dimension: embedder.dimension(),
                sources: BTreeMap::new(),
            }),
            embedder,
        }
    }

    async fn persist(&self, index: &IndexFile) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = serde_json::to_vec(index)?;
        write_atomically(path, &bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "Vector index persisted");
        Ok(())
    }
}

fn cosine_distance(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(AppError::EmbeddingError {
            message: format!("dimension mismatch: query {} vs stored {}", a.len(), b.len()),
        });
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(1.0);
    }

    Ok(1.0 - (dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

#[async_trait]
impl VectorStore for LocalVectorStore {
    async fn query(&self, text: &str, n_results: usize, filter: &WhereFilter) -> Result<Vec<Chunk>> {
        if n_results == 0 {
            return Ok(Vec::new());
        }

        let query = self.embedder.embed(text).await?;
        let index = self.index.read().await;

        let mut scored = Vec::new();
        for (hash, record) in index.sources.iter().filter(|(hash, _)| filter.matches(hash)) {
            for stored in &record.chunks {
                scored.push((cosine_distance(&query, &stored.embedding)?, hash, stored));
            }
        }

        // Stable sort keeps insertion order among equal distances
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.truncate(n_results);

        Ok(scored
            .into_iter()
            .map(|(distance, hash, stored)| {
                Chunk::new(
                    hash.clone(),
                    stored.page,
                    stored.chunk_type.clone(),
                    stored.content.clone(),
                    distance,
                )
            })
            .collect())
    }

    async fn check_processed(&self, source_hash: &str) -> Result<bool> {
        Ok(self.index.read().await.sources.contains_key(source_hash))
    }

    async fn delete_source(&self, source_hash: &str) -> Result<usize> {
        let mut index = self.index.write().await;
        let Some(removed) = index.sources.remove(source_hash) else {
            return Ok(0);
        };

        if let Err(e) = self.persist(&index).await {
            index.sources.insert(source_hash.to_string(), removed);
            return Err(e);
        }

        info!(source_hash, chunks = removed.chunks.len(), "Source deleted from index");
        Ok(removed.chunks.len())
    }

    async fn get_all_sources(&self) -> Result<Vec<SourceInfo>> {
        let index = self.index.read().await;
        Ok(index
            .sources
            .iter()
            .map(|(hash, record)| SourceInfo {
                source_hash: hash.clone(),
                chunk_count: record.chunks.len(),
                indexed_at: record.indexed_at,
            })
            .collect())
    }

    async fn add_chunks(&self, source_hash: &str, chunks: Vec<NewChunk>) -> Result<usize> {
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(AppError::EmbeddingError {
                message: format!(
                    "embedder returned {} vectors for {} chunks",
                    embeddings.len(),
                    chunks.len()
                ),
            });
        }

        let stored: Vec<StoredChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| StoredChunk {
                page: chunk.page,
                chunk_type: chunk.chunk_type.as_str().to_string(),
                content: chunk.content,
                embedding,
            })
            .collect();
        let count = stored.len();

        let mut index = self.index.write().await;
        let previous = index.sources.insert(
            source_hash.to_string(),
            SourceRecord {
                indexed_at: Utc::now(),
                chunks: stored,
            },
        );

        if let Err(e) = self.persist(&index).await {
            match previous {
                Some(previous) => index.sources.insert(source_hash.to_string(), previous),
                None => index.sources.remove(source_hash),
            };
            return Err(e);
        }

        info!(source_hash, chunks = count, "Source added to index");
        Ok(count)
    }

    async fn ping(&self) -> Result<()> {
        let _index = self.index.read().await;
        let Some(dir) = self.path.as_ref().and_then(|p| p.parent()) else {
            return Ok(());
        };
        if dir.as_os_str().is_empty() {
            return Ok(());
        }

        match tokio::fs::metadata(dir).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(AppError::ServiceUnavailable {
                message: format!("{} is not a directory", dir.display()),
            }),
            Err(e) => Err(AppError::ServiceUnavailable {
                message: format!("vector store directory {} unreachable: {}", dir.display(), e),
            }),
        }
    }

    async fn size_bytes(&self) -> Result<u64> {
        let Some(dir) = self.path.as_ref().and_then(|p| p.parent()) else {
            return Ok(0);
        };
        let dir = if dir.as_os_str().is_empty() {
            std::path::Path::new(".")
        } else {
            dir
        };

        let mut total = 0;
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if meta.is_file() {
                total += meta.len();
            }
        }
        Ok(total)
    }
}
