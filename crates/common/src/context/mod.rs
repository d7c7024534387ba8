//! Context Engine Core Components
//!
//! The context engine turns a question and raw retrieval results into the
//! material an answer is generated from:
//! - Entity extraction
//! - Chunk optimization under token and per-page budgets
//! - Grounding context assembly
//! - Reasoning and answer generation

mod chunk_optimizer;
mod context_builder;
mod llm;
mod query_parser;
mod reasoner;
mod synthesizer;

pub use chunk_optimizer::{entity_match_count, ChunkBudget, ChunkOptimizer};
pub use context_builder::{section_header, ContextBuilder, SECTION_DELIMITER};
pub use llm::LlmClient;
pub use query_parser::{
    detect_intent, parse_entity_reply, EntityExtractor, KeywordExtractor, LlmEntityExtractor,
    QueryIntent,
};
pub use reasoner::{ExtractiveReasoner, LlmReasoner, ReasoningGenerator};
pub use synthesizer::{AnswerGenerator, ExtractiveSynthesizer, LlmSynthesizer};

use crate::config::LlmConfig;
use crate::errors::Result;
use std::sync::Arc;

/// The three model-facing collaborators of the query pipeline
#[derive(Clone)]
pub struct Generators {
    pub extractor: Arc<dyn EntityExtractor>,
    pub reasoner: Arc<dyn ReasoningGenerator>,
    pub synthesizer: Arc<dyn AnswerGenerator>,
}

impl Generators {
    /// Offline keyword/extractive implementations
    pub fn offline() -> Self {
        Self {
            extractor: Arc::new(KeywordExtractor::new()),
            reasoner: Arc::new(ExtractiveReasoner::new()),
            synthesizer: Arc::new(ExtractiveSynthesizer::default()),
        }
    }

    /// Model-backed implementations sharing one client
    pub fn llm(config: &LlmConfig) -> Result<Self> {
        let client = Arc::new(LlmClient::new(config)?);
        Ok(Self {
            extractor: Arc::new(LlmEntityExtractor::new(client.clone())),
            reasoner: Arc::new(LlmReasoner::new(client.clone())),
            synthesizer: Arc::new(LlmSynthesizer::new(client)),
        })
    }

    /// Model-backed when an api key is configured, offline otherwise
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let has_key = config
            .api_key
            .as_deref()
            .map_or(false, |key| !key.trim().is_empty());

        if has_key {
            tracing::info!(model = %config.model, "Using model-backed generators");
            Self::llm(config)
        } else {
            tracing::info!("No LLM api key configured, using offline generators");
            Ok(Self::offline())
        }
    }
}
