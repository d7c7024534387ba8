//! Lectern Ingestion CLI
//!
//! Indexes PDFs without going through the HTTP API:
//! 1. Collects the PDF paths given as arguments (or every PDF in the data dir)
//! 2. Hashes and indexes each one into the vector store
//! 3. Records hash → filename in the document registry

use anyhow::{bail, Context};
use lectern_common::{
    config::AppConfig,
    store::{create_embedder, LocalVectorStore},
    DocumentRegistry, VERSION,
};
use lectern_ingestion::{ChunkingConfig, DocumentIndexer, IndexOutcome};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("pdf"))
}

async fn collect_paths(args: Vec<String>, data_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    if !args.is_empty() {
        return Ok(args.into_iter().map(PathBuf::from).collect());
    }

    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(data_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if is_pdf(&path) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("failed to load configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    if config.observability.json_logging {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Starting Lectern ingestion v{}", VERSION);

    let embedder = create_embedder(&config.embedding)?;
    let store = Arc::new(
        LocalVectorStore::open(config.index_path(), embedder)
            .await
            .with_context(|| format!("failed to open index at {}", config.index_path().display()))?,
    );
    let registry = DocumentRegistry::new(config.mapping_path());
    let indexer = DocumentIndexer::new(store, ChunkingConfig::from(&config.chunking));

    let paths = collect_paths(std::env::args().skip(1).collect(), &config.storage.data_dir)
        .await
        .with_context(|| format!("failed to read {}", config.storage.data_dir.display()))?;
    if paths.is_empty() {
        warn!(data_dir = %config.storage.data_dir.display(), "No PDF files to index");
        return Ok(());
    }

    let mut failures = 0usize;
    for path in &paths {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        match indexer.index_file(path).await {
            Ok(outcome) => {
                // Existing names win: files the gateway stored are named by hash
                registry
                    .insert_if_absent(outcome.source_hash(), &filename)
                    .await?;
                match outcome {
                    IndexOutcome::Indexed { chunks, .. } => {
                        info!(file = %filename, chunks, "Indexed")
                    }
                    IndexOutcome::AlreadyIndexed { .. } => {
                        info!(file = %filename, "Already indexed")
                    }
                }
            }
            Err(e) => {
                failures += 1;
                error!(file = %filename, error = %e, "Failed to index");
            }
        }
    }

    info!(total = paths.len(), failures, "Ingestion finished");
    if failures > 0 {
        bail!("{} of {} files failed to index", failures, paths.len());
    }
    Ok(())
}
