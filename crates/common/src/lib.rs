//! Lectern Common Library
//!
//! Shared code for the Lectern services including:
//! - Chunk, document and entity data model
//! - Vector store and embedder abstractions
//! - Retrieval optimization and grounding-context assembly
//! - Query orchestration
//! - Error types, configuration, metrics

pub mod config;
pub mod context;
pub mod errors;
mod fsutil;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod registry;
pub mod store;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, ErrorKind, Result};
pub use models::{Chunk, EntityMap};
pub use pipeline::QueryOrchestrator;
pub use registry::DocumentRegistry;
pub use store::VectorStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Token budget for the optimized chunk set of one query
pub const DEFAULT_MAX_TOKENS: i64 = 2500;

/// At most this many chunks from any single page reach the context
pub const DEFAULT_MAX_PER_PAGE: i64 = 3;

/// Candidates fetched per requested chunk. Over-fetching leaves the
/// optimizer room to drop chunks for the page and token budgets and still
/// return a full working set.
pub const OVERFETCH_FACTOR: usize = 4;

/// Upper bound on candidates requested from the vector store
pub const MAX_CANDIDATES: usize = 20;

/// Citations returned with an answer
pub const MAX_SOURCES: usize = 5;

/// Default number of chunks requested per query
pub const DEFAULT_TOP_K: usize = 5;

/// Largest `top_k` a caller may request
pub const MAX_TOP_K: usize = 20;

/// Number of candidates to request for a caller's `top_k`
pub fn initial_top_k(top_k: usize, overfetch_factor: usize, max_candidates: usize) -> usize {
    top_k.saturating_mul(overfetch_factor).min(max_candidates)
}
