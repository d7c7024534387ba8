//! Reasoner - Produces the reasoning trace shown next to an answer
//!
//! Provides:
//! - `ReasoningGenerator` seam
//! - Model-backed reasoning over the selected chunks
//! - Offline extractive trace (selected pages, matched entities)

use super::chunk_optimizer::entity_match_count;
use super::llm::LlmClient;
use crate::errors::Result;
use crate::models::{term_matches, Chunk, EntityMap};
use async_trait::async_trait;
use std::sync::Arc;

/// Explains how the selected chunks relate to the question
#[async_trait]
pub trait ReasoningGenerator: Send + Sync {
    async fn generate(&self, query: &str, entities: &EntityMap, chunks: &[Chunk]) -> Result<String>;
}

const EXCERPT_CHARS: usize = 600;

const REASONING_PROMPT: &str = "You explain, step by step and briefly, how a set of document \
excerpts relates to a question. Mention page numbers, say which excerpts are relevant and why, \
and note any gaps. Do not answer beyond what the excerpts support.";

/// Model-backed reasoning
pub struct LlmReasoner {
    client: Arc<LlmClient>,
}

impl LlmReasoner {
    pub fn new(client: Arc<LlmClient>) -> Self {
        Self { client }
    }

    fn build_prompt(query: &str, entities: &EntityMap, chunks: &[Chunk]) -> String {
        let entities_json = serde_json::to_string(entities).unwrap_or_else(|_| "{}".to_string());
        let mut prompt = format!(
            "Question: {}\n\nExtracted entities: {}\n\nExcerpts:\n",
            query, entities_json
        );

        for (i, chunk) in chunks.iter().enumerate() {
            let excerpt: String = chunk.content.chars().take(EXCERPT_CHARS).collect();
            prompt.push_str(&format!(
                "\n[{}] Page {} ({}), relevance {:.3}\n{}\n",
                i + 1,
                chunk.page,
                chunk.chunk_type,
                chunk.relevance_score(),
                excerpt
            ));
        }

        prompt.push_str("\nReasoning:");
        prompt
    }
}

#[async_trait]
impl ReasoningGenerator for LlmReasoner {
    async fn generate(&self, query: &str, entities: &EntityMap, chunks: &[Chunk]) -> Result<String> {
        let prompt = Self::build_prompt(query, entities, chunks);
        self.client.complete(REASONING_PROMPT, &prompt).await
    }
}

/// Offline reasoning trace describing the selection
#[derive(Debug, Clone, Default)]
pub struct ExtractiveReasoner;

impl ExtractiveReasoner {
    pub fn new() -> Self {
        Self
    }

    pub fn explain(&self, entities: &EntityMap, chunks: &[Chunk]) -> String {
        let terms = entities.match_terms();
        let mut lines = Vec::new();

        if terms.is_empty() {
            lines.push("No entities were recognised; chunks are ranked by similarity alone.".to_string());
        } else {
            lines.push(format!("Identified entities: {}.", terms.join(", ")));
        }

        let mut pages: Vec<u32> = chunks.iter().map(|c| c.page).collect();
        pages.sort_unstable();
        pages.dedup();
        let pages: Vec<String> = pages.iter().map(u32::to_string).collect();
        lines.push(format!(
            "Selected {} chunk(s) from page(s) {}.",
            chunks.len(),
            pages.join(", ")
        ));

        for chunk in chunks {
            let content_lower = chunk.content.to_lowercase();
            let matched: Vec<&str> = terms
                .iter()
                .filter(|term| term_matches(term, &content_lower))
                .map(String::as_str)
                .collect();

            let why = if matched.is_empty() {
                format!("similarity {:.3}", chunk.relevance_score())
            } else {
                format!("matched {}", matched.join(", "))
            };
            lines.push(format!("- Page {} ({}): {}", chunk.page, chunk.chunk_type, why));
        }

        let best = chunks
            .iter()
            .map(|c| entity_match_count(&c.content, &terms))
            .max()
            .unwrap_or(0);
        if !terms.is_empty() && best == 0 {
            lines.push("None of the selected chunks mention the entities directly.".to_string());
        }

        lines.join("\n")
    }
}

#[async_trait]
impl ReasoningGenerator for ExtractiveReasoner {
    async fn generate(&self, _query: &str, entities: &EntityMap, chunks: &[Chunk]) -> Result<String> {
        Ok(self.explain(entities, chunks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityValue;

    #[tokio::test]
    async fn test_extractive_trace() {
        let mut entities = EntityMap::new();
        entities.insert("course", EntityValue::Text("Physics".to_string()));
        entities.insert("_intent", EntityValue::Text("factual".to_string()));

        let chunks = vec![
            Chunk::new("h", 2, "table", "Physics | 1200", 0.1),
            Chunk::new("h", 5, "text", "Fees are due in July.", 0.25),
        ];

        let trace = ExtractiveReasoner::new()
            .generate("physics fee", &entities, &chunks)
            .await
            .unwrap();

        assert!(trace.starts_with("Identified entities: physics."));
        assert!(trace.contains("Selected 2 chunk(s) from page(s) 2, 5."));
        assert!(trace.contains("- Page 2 (table): matched physics"));
        assert!(trace.contains("- Page 5 (text): similarity 0.750"));
        assert!(!trace.contains("factual"));
    }

    #[test]
    fn test_prompt_lists_excerpts() {
        let chunks = vec![Chunk::new("h", 7, "text", "Hostel curfew is 10 pm.", 0.2)];
        let prompt = LlmReasoner::build_prompt("curfew?", &EntityMap::new(), &chunks);
        assert!(prompt.contains("[1] Page 7 (text), relevance 0.800"));
        assert!(prompt.contains("Hostel curfew is 10 pm."));
    }
}
