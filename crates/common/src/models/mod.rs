//! Data model shared by the ingestion, retrieval and HTTP layers

mod chunk;
mod document;
mod entities;
mod query;

pub use chunk::{estimate_tokens, Chunk, ChunkType, NewChunk, WORDS_PER_TOKEN};
pub use document::{Document, SourceInfo};
pub use entities::{term_matches, EntityMap, EntityValue};
pub use query::{QueryResult, SourceCitation};
