//! Synthesizer - Generates the final answer from grounding context
//!
//! Provides:
//! - `AnswerGenerator` seam
//! - Context-grounded model answers
//! - Offline extractive answers (highest query-term overlap sentences)

use super::context_builder::SECTION_DELIMITER;
use super::llm::LlmClient;
use crate::errors::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

/// Produces answer text for a question from its grounding context
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, query: &str, context: &str) -> Result<String>;
}

const ANSWER_PROMPT: &str = "You are a document assistant. Answer the question based ONLY on \
the provided context. If the context doesn't contain enough information, say so. Do not make \
up information. Cite pages as (page N) where they support the answer.";

/// Model-backed answers
pub struct LlmSynthesizer {
    client: Arc<LlmClient>,
}

impl LlmSynthesizer {
    pub fn new(client: Arc<LlmClient>) -> Self {
        Self { client }
    }

    fn build_prompt(query: &str, context: &str) -> String {
        format!("Context:\n{}\n\nQuestion: {}\n\nAnswer:", context, query)
    }
}

#[async_trait]
impl AnswerGenerator for LlmSynthesizer {
    async fn generate(&self, query: &str, context: &str) -> Result<String> {
        let prompt = Self::build_prompt(query, context);
        self.client.complete(ANSWER_PROMPT, &prompt).await
    }
}

/// Offline answers assembled from context sentences
#[derive(Debug, Clone)]
pub struct ExtractiveSynthesizer {
    max_sentences: usize,
}

impl Default for ExtractiveSynthesizer {
    fn default() -> Self {
        Self { max_sentences: 3 }
    }
}

struct Candidate {
    text: String,
    page: Option<u32>,
    overlap: usize,
    position: usize,
}

impl ExtractiveSynthesizer {
    pub fn new(max_sentences: usize) -> Self {
        Self {
            max_sentences: max_sentences.max(1),
        }
    }

    pub fn answer(&self, query: &str, context: &str) -> String {
        let query_words: HashSet<String> = query
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 3 || (!w.is_empty() && w.chars().all(|c| c.is_ascii_digit())))
            .map(str::to_string)
            .collect();

        let mut candidates = Vec::new();
        for section in context.split(SECTION_DELIMITER) {
            let (page, body) = split_section(section);
            for sentence in split_sentences(body) {
                let sentence_lower = sentence.to_lowercase();
                let overlap = query_words
                    .iter()
                    .filter(|w| sentence_lower.contains(w.as_str()))
                    .count();
                let position = candidates.len();
                candidates.push(Candidate {
                    text: sentence,
                    page,
                    overlap,
                    position,
                });
            }
        }

        let Some(first) = candidates.first() else {
            return "The retrieved passages contain no usable text.".to_string();
        };

        if candidates.iter().all(|c| c.overlap == 0) {
            return format!(
                "The retrieved passages do not answer this directly. Closest passage: {}",
                cite(first)
            );
        }

        let mut best: Vec<&Candidate> = candidates.iter().filter(|c| c.overlap > 0).collect();
        best.sort_by(|a, b| b.overlap.cmp(&a.overlap).then(a.position.cmp(&b.position)));
        best.truncate(self.max_sentences);
        // read in document order
        best.sort_by_key(|c| c.position);

        best.into_iter().map(cite).collect::<Vec<_>>().join(" ")
    }
}

#[async_trait]
impl AnswerGenerator for ExtractiveSynthesizer {
    async fn generate(&self, query: &str, context: &str) -> Result<String> {
        Ok(self.answer(query, context))
    }
}

fn cite(candidate: &Candidate) -> String {
    match candidate.page {
        Some(page) => format!("{} (page {})", candidate.text, page),
        None => candidate.text.clone(),
    }
}

/// Separate a `[Page N] (type)` header from the section body
fn split_section(section: &str) -> (Option<u32>, &str) {
    let section = section.trim();
    let Some(rest) = section.strip_prefix("[Page ") else {
        return (None, section);
    };
    let (header, body) = rest.split_once('\n').unwrap_or((rest, ""));
    let page = header
        .split(']')
        .next()
        .and_then(|n| n.trim().parse().ok());
    (page, body)
}

/// Split text into sentences; line breaks also end a sentence so table
/// rows stand alone
fn split_sentences(text: &str) -> Vec<String> {
    let delimiters = ['.', '?', '!', '\n'];
    let mut sentences = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if ch != '\n' {
            current.push(ch);
        }
        if delimiters.contains(&ch) {
            let trimmed = current.trim().to_string();
            if !trimmed.is_empty() {
                sentences.push(trimmed);
            }
            current.clear();
        }
    }

    let trimmed = current.trim().to_string();
    if !trimmed.is_empty() {
        sentences.push(trimmed);
    }

    sentences
}
