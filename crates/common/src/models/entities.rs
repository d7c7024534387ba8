use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value recognised for one entity category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityValue {
    Text(String),
    List(Vec<String>),
}

impl EntityValue {
    pub fn values(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            EntityValue::Text(value) => std::slice::from_ref(value),
            EntityValue::List(values) => values,
        };
        slice.iter().map(String::as_str)
    }
}

/// Entities extracted from one query, keyed by category.
///
/// Categories starting with `_` carry metadata such as `_intent` and are
/// never used for matching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityMap(BTreeMap<String, EntityValue>);

impl EntityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category: impl Into<String>, value: EntityValue) {
        self.0.insert(category.into(), value);
    }

    pub fn get(&self, category: &str) -> Option<&EntityValue> {
        self.0.get(category)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &EntityValue)> {
        self.0.iter()
    }

    /// The `_intent` hint, when the extractor produced one
    pub fn intent(&self) -> Option<&str> {
        match self.0.get("_intent") {
            Some(EntityValue::Text(intent)) => Some(intent.as_str()),
            _ => None,
        }
    }

    /// Lowercased, de-duplicated values usable for matching against content
    pub fn match_terms(&self) -> Vec<String> {
        let mut terms: Vec<String> = Vec::new();
        for (category, value) in &self.0 {
            if category.starts_with('_') {
                continue;
            }
            for raw in value.values() {
                let term = raw.trim().to_lowercase();
                if !term.is_empty() && !terms.contains(&term) {
                    terms.push(term);
                }
            }
        }
        terms
    }

    /// Build a map from loosely shaped JSON, keeping scalar and list values
    pub fn from_json_value(value: serde_json::Value) -> Self {
        let mut map = Self::new();
        let serde_json::Value::Object(object) = value else {
            return map;
        };

        for (category, value) in object {
            let parsed = match value {
                serde_json::Value::Array(items) => {
                    let items: Vec<String> = items.into_iter().filter_map(scalar_to_string).collect();
                    if items.is_empty() {
                        None
                    } else {
                        Some(EntityValue::List(items))
                    }
                }
                other => scalar_to_string(other).map(EntityValue::Text),
            };
            if let Some(parsed) = parsed {
                map.insert(category, parsed);
            }
        }
        map
    }
}

fn scalar_to_string(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Whether a lowercase entity term occurs in lowercase text, either as a
/// substring or with every one of its words present as a token
pub fn term_matches(term: &str, text_lower: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    if text_lower.contains(term) {
        return true;
    }

    let words: Vec<&str> = tokens(term).collect();
    words.len() > 1 && words.iter().all(|word| tokens(text_lower).any(|t| t == *word))
}

fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_terms_skip_metadata() {
        let map = EntityMap::from_json_value(serde_json::json!({
            "course": "Physics",
            "years": [2023, "2024"],
            "_intent": "fees",
            "empty": "",
            "nested": {"a": 1}
        }));

        assert_eq!(map.intent(), Some("fees"));
        assert_eq!(map.len(), 3);
        assert_eq!(map.match_terms(), vec!["physics", "2023", "2024"]);
    }

    #[test]
    fn test_term_matches_substring_and_tokens() {
        let text = "tuition fee for semester 2 of the physics programme";
        assert!(term_matches("physics", text));
        assert!(term_matches("physics fee", text));
        assert!(!term_matches("chemistry", text));
        assert!(!term_matches("", text));
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let mut map = EntityMap::new();
        map.insert("department", EntityValue::Text("CSE".into()));
        map.insert("semesters", EntityValue::List(vec!["3".into(), "4".into()]));

        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"department": "CSE", "semesters": ["3", "4"]})
        );
    }
}
