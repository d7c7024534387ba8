//! Context Builder - Renders optimized chunks into grounding text
//!
//! Provides:
//! - Page/type annotated sections joined by a fixed delimiter
//! - Row-level entity filtering for tabular chunks

use crate::models::{term_matches, Chunk, EntityMap};

/// Separates chunk sections in the rendered context
pub const SECTION_DELIMITER: &str = "\n\n---\n\n";

/// Pure renderer from an optimized chunk set to grounding context
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextBuilder;

impl ContextBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Render `chunks` in order.
    ///
    /// Returns an empty string when no chunk keeps any text, which callers
    /// treat as "nothing left after filtering".
    pub fn build(&self, chunks: &[Chunk], entities: &EntityMap) -> String {
        let terms = entities.match_terms();

        let sections: Vec<String> = chunks
            .iter()
            .filter_map(|chunk| {
                let body = if chunk.is_tabular() && !terms.is_empty() {
                    filter_rows(&chunk.content, &terms)?
                } else {
                    chunk.content.trim().to_string()
                };

                if body.is_empty() {
                    return None;
                }
                Some(format!("{}\n{}", section_header(chunk), body))
            })
            .collect();

        sections.join(SECTION_DELIMITER)
    }
}

/// `[Page N] (type)` label that precedes each section
pub fn section_header(chunk: &Chunk) -> String {
    format!("[Page {}] ({})", chunk.page, chunk.chunk_type)
}

/// Keep the header row plus every data row that mentions an entity term.
/// `None` when no data row matches.
fn filter_rows(content: &str, terms: &[String]) -> Option<String> {
    let rows: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let (header, data) = match rows.as_slice() {
        [] => return None,
        [only] => (None, std::slice::from_ref(only)),
        [header, data @ ..] => (Some(*header), data),
    };

    let matched: Vec<&str> = data
        .iter()
        .copied()
        .filter(|row| {
            let row_lower = row.to_lowercase();
            terms.iter().any(|term| term_matches(term, &row_lower))
        })
        .collect();

    if matched.is_empty() {
        return None;
    }

    let mut kept = Vec::with_capacity(matched.len() + 1);
    kept.extend(header);
    kept.extend(matched);
    Some(kept.join("\n"))
}
