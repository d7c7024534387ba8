//! Chunk Optimizer - Narrows over-fetched candidates to a bounded working set
//!
//! Provides:
//! - Entity-first relevance ranking with similarity and retrieval-order tie-breaks
//! - Per-page diversity cap
//! - Token budget using a words-per-token estimate

use crate::errors::{AppError, Result};
use crate::models::{term_matches, Chunk, EntityMap};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Validated budgets for one optimization pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkBudget {
    max_tokens: usize,
    max_per_page: usize,
}

impl ChunkBudget {
    /// Negative budgets are rejected; zero is valid and selects nothing
    pub fn new(max_tokens: i64, max_per_page: i64) -> Result<Self> {
        if max_tokens < 0 {
            return Err(AppError::invalid_argument(format!(
                "max_tokens must be non-negative, got {}",
                max_tokens
            )));
        }
        if max_per_page < 0 {
            return Err(AppError::invalid_argument(format!(
                "max_per_page must be non-negative, got {}",
                max_per_page
            )));
        }

        Ok(Self {
            max_tokens: usize::try_from(max_tokens).unwrap_or(usize::MAX),
            max_per_page: usize::try_from(max_per_page).unwrap_or(usize::MAX),
        })
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn max_per_page(&self) -> usize {
        self.max_per_page
    }

    fn is_degenerate(&self) -> bool {
        self.max_tokens == 0 || self.max_per_page == 0
    }
}

impl Default for ChunkBudget {
    fn default() -> Self {
        Self {
            max_tokens: crate::DEFAULT_MAX_TOKENS as usize,
            max_per_page: crate::DEFAULT_MAX_PER_PAGE as usize,
        }
    }
}

/// Number of entity terms found in a chunk's content
pub fn entity_match_count(content: &str, terms: &[String]) -> usize {
    let content_lower = content.to_lowercase();
    terms
        .iter()
        .filter(|term| term_matches(term, &content_lower))
        .count()
}

struct Ranked {
    index: usize,
    matches: usize,
    distance: f32,
}

/// Reduces a candidate set to a budget-respecting, relevance-ordered subset
#[derive(Debug, Clone, Default)]
pub struct ChunkOptimizer {
    budget: ChunkBudget,
}

impl ChunkOptimizer {
    pub fn new(budget: ChunkBudget) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> &ChunkBudget {
        &self.budget
    }

    /// Rank `chunks` and accept them greedily under both budgets.
    ///
    /// Chunks that would break a budget are skipped and the walk continues,
    /// so a later smaller chunk or one from another page can still fit. The
    /// result is in ranked order, and running it again on its own output
    /// returns the same chunks.
    pub fn optimize(&self, chunks: &[Chunk], entities: &EntityMap) -> Vec<Chunk> {
        if chunks.is_empty() || self.budget.is_degenerate() {
            return Vec::new();
        }

        let ranked = rank(chunks, &entities.match_terms());

        let mut per_page: HashMap<u32, usize> = HashMap::new();
        let mut used_tokens = 0usize;
        let mut selected = Vec::new();

        for entry in ranked {
            let chunk = &chunks[entry.index];
            let page_count = per_page.get(&chunk.page).copied().unwrap_or(0);
            if page_count >= self.budget.max_per_page {
                continue;
            }

            let tokens = chunk.estimated_tokens();
            if used_tokens.saturating_add(tokens) > self.budget.max_tokens {
                continue;
            }

            used_tokens += tokens;
            per_page.insert(chunk.page, page_count + 1);
            selected.push(chunk.clone());
        }

        selected
    }
}

fn rank(chunks: &[Chunk], terms: &[String]) -> Vec<Ranked> {
    let mut ranked: Vec<Ranked> = chunks
        .iter()
        .enumerate()
        .map(|(index, chunk)| Ranked {
            index,
            matches: if terms.is_empty() {
                0
            } else {
                entity_match_count(&chunk.content, terms)
            },
            distance: chunk.distance,
        })
        .collect();

    ranked.sort_by(|a, b| compare(a, b));
    ranked
}

// more entity matches first, then lower distance, then retrieval order
fn compare(a: &Ranked, b: &Ranked) -> Ordering {
    b.matches
        .cmp(&a.matches)
        .then_with(|| a.distance.total_cmp(&b.distance))
        .then_with(|| a.index.cmp(&b.index))
}
