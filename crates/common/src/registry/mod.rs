//! Content hash → original filename mapping
//!
//! The mapping lives in one JSON object file that is always read and
//! written whole. Updates go through a single-writer lock and an atomic
//! file replace, so concurrent uploads and deletes cannot drop each other's
//! entries.

use crate::errors::Result;
use crate::fsutil::write_atomically;
use crate::store::VectorStore;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Mapping of content hash to uploaded filename
pub type Mapping = BTreeMap<String, String>;

pub struct DocumentRegistry {
    path: PathBuf,
    writer: Mutex<()>,
}

impl DocumentRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole mapping; a missing file is an empty mapping
    pub async fn load(&self) -> Result<Mapping> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Mapping::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn filename(&self, source_hash: &str) -> Result<Option<String>> {
        Ok(self.load().await?.remove(source_hash))
    }

    pub async fn insert(&self, source_hash: &str, filename: &str) -> Result<()> {
        let _guard = self.writer.lock().await;
        let mut mapping = self.load().await?;
        mapping.insert(source_hash.to_string(), filename.to_string());
        self.save(&mapping).await?;
        debug!(source_hash, filename, "Mapping entry recorded");
        Ok(())
    }

    /// Record `filename` only when the hash has no entry yet
    pub async fn insert_if_absent(&self, source_hash: &str, filename: &str) -> Result<bool> {
        let _guard = self.writer.lock().await;
        let mut mapping = self.load().await?;
        if mapping.contains_key(source_hash) {
            return Ok(false);
        }
        mapping.insert(source_hash.to_string(), filename.to_string());
        self.save(&mapping).await?;
        debug!(source_hash, filename, "Missing mapping entry restored");
        Ok(true)
    }

    /// Remove an entry, returning the filename it pointed at
    pub async fn remove(&self, source_hash: &str) -> Result<Option<String>> {
        let _guard = self.writer.lock().await;
        let mut mapping = self.load().await?;
        let removed = mapping.remove(source_hash);
        if removed.is_some() {
            self.save(&mapping).await?;
        }
        Ok(removed)
    }

    /// Drop entries whose hash has no chunks in `store`.
    ///
    /// The live set is read while holding the writer lock, so an upload
    /// that records its entry concurrently is never pruned.
    pub async fn prune(&self, store: &dyn VectorStore) -> Result<usize> {
        let _guard = self.writer.lock().await;
        let live: HashSet<String> = store
            .get_all_sources()
            .await?
            .into_iter()
            .map(|source| source.source_hash)
            .collect();
        let mut mapping = self.load().await?;
        let before = mapping.len();
        mapping.retain(|hash, _| live.contains(hash));
        let pruned = before - mapping.len();

        if pruned > 0 {
            self.save(&mapping).await?;
            info!(pruned, "Pruned mapping entries without indexed chunks");
        }
        Ok(pruned)
    }

    async fn save(&self, mapping: &Mapping) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(mapping)?;
        write_atomically(&self.path, &bytes).await?;
        Ok(())
    }
}
