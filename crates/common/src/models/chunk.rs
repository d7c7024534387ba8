use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Words per model token used for budget estimates
pub const WORDS_PER_TOKEN: f64 = 0.75;

/// Approximate token cost of a piece of text
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    (words as f64 / WORDS_PER_TOKEN).ceil() as usize
}

/// Kind of content a chunk carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Text,
    Table,
}

impl ChunkType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChunkType::Text => "text",
            ChunkType::Table => "table",
        }
    }

    /// Whether a stored `chunk_type` label denotes row-structured content
    pub fn is_tabular_label(label: &str) -> bool {
        matches!(
            label.trim().to_ascii_lowercase().as_str(),
            "table" | "tabular" | "structured"
        )
    }
}

/// A retrieved chunk of a source document.
///
/// `distance` is cosine distance to the query: lower means more similar.
/// Every ranking in the pipeline relies on that convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub source_hash: String,
    pub page: u32,
    pub chunk_type: String,
    pub content: String,
    pub distance: f32,

    /// Forward-compatible metadata carried by the store
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Chunk {
    pub fn new(
        source_hash: impl Into<String>,
        page: u32,
        chunk_type: impl Into<String>,
        content: impl Into<String>,
        distance: f32,
    ) -> Self {
        Self {
            source_hash: source_hash.into(),
            page,
            chunk_type: chunk_type.into(),
            content: content.into(),
            distance,
            extra: BTreeMap::new(),
        }
    }

    pub fn is_tabular(&self) -> bool {
        ChunkType::is_tabular_label(&self.chunk_type)
    }

    pub fn estimated_tokens(&self) -> usize {
        estimate_tokens(&self.content)
    }

    /// Cosine similarity rounded to three decimals, higher is better
    pub fn relevance_score(&self) -> f64 {
        let similarity = 1.0 - f64::from(self.distance);
        (similarity * 1000.0).round() / 1000.0
    }
}

/// A chunk produced by ingestion, before it is embedded and stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewChunk {
    pub page: u32,
    pub chunk_type: ChunkType,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_estimate() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("one two three"), 4);
        assert_eq!(estimate_tokens("a b c d e f"), 8);
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let json = r#"{"source_hash":"abc","page":1,"chunk_type":"text","content":"x"}"#;
        assert!(serde_json::from_str::<Chunk>(json).is_err());
    }

    #[test]
    fn test_extra_metadata_round_trips() {
        let json = r#"{"source_hash":"abc","page":2,"chunk_type":"table","content":"a | b","distance":0.25,"section":"Fees"}"#;
        let chunk: Chunk = serde_json::from_str(json).unwrap();
        assert!(chunk.is_tabular());
        assert_eq!(chunk.extra.get("section"), Some(&serde_json::json!("Fees")));
        assert_eq!(chunk.relevance_score(), 0.75);
    }

    #[test]
    fn test_tabular_labels() {
        assert!(ChunkType::is_tabular_label("Table"));
        assert!(ChunkType::is_tabular_label("structured"));
        assert!(!ChunkType::is_tabular_label("text"));
    }
}
