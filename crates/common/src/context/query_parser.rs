//! Query Parser - Extracts entities from a user query
//!
//! Provides:
//! - `EntityExtractor` seam used by the query pipeline
//! - Offline keyword extraction (keywords, years, numbers, quoted phrases)
//! - Heuristic intent detection
//! - Model-backed extraction with lenient JSON parsing

use super::llm::LlmClient;
use crate::errors::Result;
use crate::models::{EntityMap, EntityValue};
use async_trait::async_trait;
use regex_lite::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Turns a query string into an entity map.
///
/// The result is advisory: it biases ranking and filters table rows but is
/// never validated.
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    async fn extract(&self, query: &str) -> Result<EntityMap>;
}

/// Query intent classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryIntent {
    /// Comparing two or more things
    Comparison,
    /// Looking for steps or a procedure
    Procedural,
    /// Asking for a list or overview
    Enumeration,
    /// Looking for specific information
    Factual,
    /// Seeking an explanation
    Explanatory,
    /// Unknown/general
    General,
}

impl QueryIntent {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryIntent::Comparison => "comparison",
            QueryIntent::Procedural => "procedural",
            QueryIntent::Enumeration => "enumeration",
            QueryIntent::Factual => "factual",
            QueryIntent::Explanatory => "explanatory",
            QueryIntent::General => "general",
        }
    }
}

/// Detect query intent using heuristics
pub fn detect_intent(query: &str) -> QueryIntent {
    let query_lower = query.trim().to_lowercase();

    if query_lower.contains(" vs ")
        || query_lower.contains(" versus ")
        || query_lower.contains("compare")
        || query_lower.contains("difference between")
    {
        return QueryIntent::Comparison;
    }

    if query_lower.starts_with("how to")
        || query_lower.starts_with("how do")
        || query_lower.starts_with("how can")
        || query_lower.contains("step by step")
        || query_lower.contains("procedure")
    {
        return QueryIntent::Procedural;
    }

    if query_lower.starts_with("list")
        || query_lower.starts_with("which")
        || query_lower.contains("all the")
        || query_lower.contains("overview")
    {
        return QueryIntent::Enumeration;
    }

    if query_lower.starts_with("what")
        || query_lower.starts_with("who")
        || query_lower.starts_with("when")
        || query_lower.starts_with("where")
        || query_lower.starts_with("how much")
        || query_lower.starts_with("how many")
        || query_lower.starts_with("define")
    {
        return QueryIntent::Factual;
    }

    if query_lower.starts_with("why")
        || query_lower.starts_with("explain")
        || query_lower.starts_with("describe")
    {
        return QueryIntent::Explanatory;
    }

    QueryIntent::General
}

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "in", "on", "at", "to", "for",
    "of", "with", "by", "from", "and", "or", "but", "not", "this", "that", "these", "those", "it",
    "its", "as", "do", "does", "did", "has", "have", "had", "can", "could", "will", "would",
    "should", "may", "might", "what", "which", "who", "whom", "when", "where", "why", "how",
    "about", "tell", "give", "show", "list", "there", "their", "them", "they", "any", "all",
    "much", "many", "please", "into", "than", "then", "also", "your", "you", "me", "my", "i",
    "we", "our", "explain", "describe", "define", "between", "compare",
];

fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(&word)
}

fn is_year(word: &str) -> bool {
    word.len() == 4
        && word
            .parse::<i32>()
            .map_or(false, |year| (1900..=2100).contains(&year))
}

fn is_number(word: &str) -> bool {
    word.chars().any(|c| c.is_ascii_digit())
        && word.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',')
}

fn push_unique(values: &mut Vec<String>, value: String) {
    if !values.contains(&value) {
        values.push(value);
    }
}

/// Offline extractor built on keyword heuristics
#[derive(Debug, Clone, Default)]
pub struct KeywordExtractor;

impl KeywordExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous core of [`EntityExtractor::extract`]
    pub fn parse(&self, query: &str) -> EntityMap {
        let mut map = EntityMap::new();

        let phrases = quoted_phrases(query);
        let mut keywords = Vec::new();
        let mut years = Vec::new();
        let mut numbers = Vec::new();

        for raw in query.split_whitespace() {
            let word: String = raw
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if word.is_empty() || is_stop_word(&word) {
                continue;
            }

            if is_year(&word) {
                push_unique(&mut years, word);
            } else if is_number(&word) {
                push_unique(&mut numbers, word);
            } else if word.chars().count() > 2 {
                push_unique(&mut keywords, word);
            }
        }

        if !keywords.is_empty() {
            map.insert("keywords", EntityValue::List(keywords));
        }
        if !years.is_empty() {
            map.insert("years", EntityValue::List(years));
        }
        if !numbers.is_empty() {
            map.insert("numbers", EntityValue::List(numbers));
        }
        if !phrases.is_empty() {
            map.insert("phrases", EntityValue::List(phrases));
        }
        map.insert(
            "_intent",
            EntityValue::Text(detect_intent(query).as_str().to_string()),
        );

        map
    }
}

#[async_trait]
impl EntityExtractor for KeywordExtractor {
    async fn extract(&self, query: &str) -> Result<EntityMap> {
        Ok(self.parse(query))
    }
}

fn quoted_regex() -> &'static Regex {
    static QUOTED: OnceLock<Regex> = OnceLock::new();
    QUOTED.get_or_init(|| Regex::new(r#""([^"]+)""#).expect("valid quoted-phrase regex"))
}

fn quoted_phrases(query: &str) -> Vec<String> {
    let mut phrases = Vec::new();
    for captures in quoted_regex().captures_iter(query) {
        let phrase = captures[1].trim().to_lowercase();
        if !phrase.is_empty() {
            push_unique(&mut phrases, phrase);
        }
    }
    phrases
}

const EXTRACTION_PROMPT: &str = "You extract search entities from questions about documents. \
Reply with a single JSON object and nothing else. Keys are short entity categories \
(for example: course, department, year, person, amount, keywords); values are strings or \
arrays of strings copied from the question. Add an \"_intent\" key with one of: factual, \
comparison, procedural, enumeration, explanatory, general.";

/// Model-backed extractor
pub struct LlmEntityExtractor {
    client: Arc<LlmClient>,
}

impl LlmEntityExtractor {
    pub fn new(client: Arc<LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EntityExtractor for LlmEntityExtractor {
    async fn extract(&self, query: &str) -> Result<EntityMap> {
        let reply = self.client.complete(EXTRACTION_PROMPT, query).await?;

        match parse_entity_reply(&reply) {
            Some(map) => {
                debug!(categories = map.len(), "Entities extracted");
                Ok(map)
            }
            None => {
                warn!(reply_len = reply.len(), "Entity reply was not a JSON object");
                Ok(EntityMap::new())
            }
        }
    }
}

/// Parse a model reply into an entity map, tolerating code fences and
/// surrounding prose
pub fn parse_entity_reply(reply: &str) -> Option<EntityMap> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end < start {
        return None;
    }

    let value: serde_json::Value = serde_json::from_str(&reply[start..=end]).ok()?;
    value
        .is_object()
        .then(|| EntityMap::from_json_value(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_intent() {
        assert_eq!(
            detect_intent("Compare the fees of CSE vs ECE"),
            QueryIntent::Comparison
        );
    }

    #[test]
    fn test_procedural_intent() {
        assert_eq!(
            detect_intent("How to apply for a hostel room"),
            QueryIntent::Procedural
        );
        assert_eq!(detect_intent("What is the tuition fee?"), QueryIntent::Factual);
        assert_eq!(detect_intent("hostel rules"), QueryIntent::General);
    }

    #[tokio::test]
    async fn test_keyword_extraction() {
        let map = KeywordExtractor::new()
            .extract("What is the tuition fee for \"Computer Science\" in 2024, semester 3?")
            .await
            .unwrap();

        assert_eq!(map.intent(), Some("factual"));
        assert_eq!(
            map.get("years"),
            Some(&EntityValue::List(vec!["2024".to_string()]))
        );
        assert_eq!(
            map.get("numbers"),
            Some(&EntityValue::List(vec!["3".to_string()]))
        );
        assert_eq!(
            map.get("phrases"),
            Some(&EntityValue::List(vec!["computer science".to_string()]))
        );

        let terms = map.match_terms();
        assert!(terms.contains(&"tuition".to_string()));
        assert!(terms.contains(&"semester".to_string()));
        assert!(!terms.contains(&"what".to_string()));
        assert!(!terms.contains(&"factual".to_string()));
    }

    #[test]
    fn test_parse_fenced_reply() {
        let reply = "```json\n{\"course\": \"Physics\", \"year\": 2023}\n```";
        let map = parse_entity_reply(reply).unwrap();
        assert_eq!(map.match_terms(), vec!["physics", "2023"]);
    }

    #[test]
    fn test_parse_garbage_reply() {
        assert!(parse_entity_reply("I could not find any entities.").is_none());
        assert!(parse_entity_reply("} nothing {").is_none());
        assert!(parse_entity_reply("[\"a\"]").is_none());
    }
}
