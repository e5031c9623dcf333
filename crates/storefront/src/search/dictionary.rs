//! Synonym, category and stop-word tables.
//!
//! Tables are data, not code: the built-in dictionary is a JSON document
//! embedded at compile time, and a replacement can be loaded from disk.
//! Every entry is normalized on load so lookups compare normalized text
//! against normalized text.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::error;

use super::normalize::normalize;

const BUILTIN_DICTIONARY: &str = include_str!("../../data/dictionary.json");

/// Errors loading a dictionary.
#[derive(Debug, Error)]
pub enum DictionaryError {
    #[error("Failed to read dictionary: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse dictionary: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid dictionary: {0}")]
    Invalid(String),
}

/// Raw dictionary document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DictionaryData {
    #[serde(default)]
    synonyms: HashMap<String, Vec<String>>,
    #[serde(default)]
    categories: Vec<CategoryData>,
    #[serde(default)]
    stop_words: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryData {
    name: String,
    #[serde(default)]
    catch_all: bool,
    keywords: Vec<String>,
}

/// A coarse product domain recognized from query keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRule {
    pub name: String,
    /// Catch-all categories never restrict which products match.
    pub catch_all: bool,
    /// Normalized keyword stems.
    pub keywords: Vec<String>,
}

impl CategoryRule {
    /// Whether any keyword of this category occurs in normalized `text`.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.keywords.iter().any(|kw| text.contains(kw.as_str()))
    }
}

/// Normalized lookup tables for the relevance engine.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    /// Canonical term -> alternates.
    synonyms: HashMap<String, Vec<String>>,
    /// Alternate -> canonical term.
    canonical: HashMap<String, String>,
    categories: Vec<CategoryRule>,
    stop_words: HashSet<String>,
}

impl Dictionary {
    /// The dictionary shipped with the crate.
    ///
    /// Falls back to an empty dictionary (and logs) if the embedded document
    /// is malformed.
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_json(BUILTIN_DICTIONARY).unwrap_or_else(|e| {
            error!(error = %e, "Built-in search dictionary is invalid");
            Self::default()
        })
    }

    /// Parse a dictionary from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid JSON, or if a category
    /// has no keywords left after normalization.
    pub fn from_json(json: &str) -> Result<Self, DictionaryError> {
        let data: DictionaryData = serde_json::from_str(json)?;
        Self::from_data(data)
    }

    /// Load a dictionary from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DictionaryError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Load the dictionary at `path`, or the built-in one without a path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, DictionaryError> {
        path.map_or_else(|| Ok(Self::builtin()), Self::from_path)
    }

    fn from_data(data: DictionaryData) -> Result<Self, DictionaryError> {
        let mut synonyms: HashMap<String, Vec<String>> = HashMap::new();
        let mut canonical = HashMap::new();

        // Sorted so that an alternate shared by two terms resolves the same
        // way on every load.
        let mut entries: Vec<_> = data.synonyms.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        for (term, alternates) in entries {
            let term = normalize(&term);
            if term.is_empty() {
                continue;
            }
            let alternates: Vec<String> = alternates
                .iter()
                .map(|alt| normalize(alt))
                .filter(|alt| !alt.is_empty() && *alt != term)
                .collect();
            for alt in &alternates {
                canonical.entry(alt.clone()).or_insert_with(|| term.clone());
            }
            synonyms.entry(term).or_default().extend(alternates);
        }

        let categories = data
            .categories
            .into_iter()
            .map(|category| {
                let keywords: Vec<String> = category
                    .keywords
                    .iter()
                    .map(|kw| normalize(kw))
                    .filter(|kw| !kw.is_empty())
                    .collect();
                if keywords.is_empty() {
                    return Err(DictionaryError::Invalid(format!(
                        "category '{}' has no keywords",
                        category.name
                    )));
                }
                Ok(CategoryRule {
                    name: category.name,
                    catch_all: category.catch_all,
                    keywords,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let stop_words = data
            .stop_words
            .iter()
            .map(|w| normalize(w))
            .filter(|w| !w.is_empty())
            .collect();

        Ok(Self {
            synonyms,
            canonical,
            categories,
            stop_words,
        })
    }

    /// Synonyms of a word.
    ///
    /// For a canonical term, its alternates. For an alternate, the canonical
    /// term followed by the other alternates. Empty if the word is unknown.
    #[must_use]
    pub fn synonyms_of(&self, word: &str) -> Vec<String> {
        let word = normalize(word);
        if word.is_empty() {
            return Vec::new();
        }

        if let Some(alternates) = self.synonyms.get(&word) {
            return alternates.clone();
        }

        let Some(term) = self.canonical.get(&word) else {
            return Vec::new();
        };

        let mut result = vec![term.clone()];
        if let Some(alternates) = self.synonyms.get(term) {
            result.extend(alternates.iter().filter(|alt| **alt != word).cloned());
        }
        result
    }

    #[must_use]
    pub fn is_stop_word(&self, word: &str) -> bool {
        self.stop_words.contains(word)
    }

    /// Category rules, in priority order.
    #[must_use]
    pub fn categories(&self) -> &[CategoryRule] {
        &self.categories
    }

    /// Categories whose keywords occur in the normalized query.
    #[must_use]
    pub fn categories_for(&self, normalized_query: &str) -> Vec<&CategoryRule> {
        self.categories
            .iter()
            .filter(|rule| rule.matches(normalized_query))
            .collect()
    }
}
