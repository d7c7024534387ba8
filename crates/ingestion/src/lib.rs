//! Lectern Ingestion
//!
//! Turns uploaded PDFs into stored chunks:
//! - Per-page text extraction
//! - Table-aware chunking
//! - Content hashing and indexing into the vector store

pub mod chunker;
pub mod errors;
pub mod pdf;
pub mod processor;

pub use chunker::ChunkingConfig;
pub use errors::IngestionError;
pub use processor::{content_hash, hash_file, DocumentIndexer, IndexOutcome};
