//! Client-side search relevance engine.
//!
//! Candidate products come from the catalog API; this module decides which
//! of them actually match a free-text query and in what order. Everything
//! here is pure and total: malformed or missing input degrades to "no match"
//! or "no bonus", never to an error.
//!
//! # Pipeline
//!
//! 1. [`normalize`] query and candidate text (lowercase, transliterate,
//!    strip diacritics and punctuation)
//! 2. Extract keywords and expand them through the [`Dictionary`] synonyms
//! 3. Gate each product with [`SearchEngine::is_relevant_match`]
//! 4. Score survivors with [`SearchEngine::score_product`]
//! 5. Rank, de-duplicate and optionally hide out-of-stock products with
//!    [`SearchEngine::rank_and_filter`]

mod dictionary;
mod fuzzy;
mod history;
mod normalize;

use std::collections::HashSet;
use std::sync::Arc;

use kron_core::{Product, StockStatus};
use regex::Regex;
use tracing::{debug, instrument};

pub use dictionary::{CategoryRule, Dictionary, DictionaryError};
pub use fuzzy::{DEFAULT_FUZZY_THRESHOLD, MIN_FUZZY_LEN, fuzzy_match};
pub use history::{MAX_HISTORY_ENTRIES, SearchHistory};
pub use normalize::{normalize, normalize_opt, transliterate};

/// Queries this short (normalized) only match by literal containment.
const SHORT_QUERY_LEN: usize = 3;

/// Shorter query words are not used as keywords.
const MIN_KEYWORD_LEN: usize = 3;

/// Fuzzy threshold used when scoring names.
const SCORING_FUZZY_THRESHOLD: f64 = 0.95;

// Name match tiers (mutually exclusive, highest wins)
const EXACT_NAME_BONUS: f64 = 100.0;
const NAME_PREFIX_BONUS: f64 = 80.0;
const NAME_WORD_BONUS: f64 = 60.0;
const NAME_CONTAINS_BONUS: f64 = 40.0;

const NAME_KEYWORD_BONUS: f64 = 15.0;
const NAME_SYNONYM_BONUS: f64 = 12.0;
const NAME_FUZZY_WEIGHT: f64 = 3.0;

const DESCRIPTION_QUERY_BONUS: f64 = 20.0;
const DESCRIPTION_KEYWORD_BONUS: f64 = 5.0;
const DESCRIPTION_SYNONYM_BONUS: f64 = 3.0;

const CATEGORY_QUERY_BONUS: f64 = 15.0;
const CATEGORY_KEYWORD_BONUS: f64 = 8.0;

const IN_STOCK_BONUS: f64 = 5.0;
const HAS_IMAGE_BONUS: f64 = 2.0;

/// A product with its relevance score.
#[derive(Debug, Clone)]
pub struct ScoredProduct {
    pub product: Product,
    pub score: f64,
}

/// A keyword with its synonym expansion.
#[derive(Debug)]
struct Keyword {
    text: String,
    synonyms: Vec<String>,
}

/// Per-query state, computed once and reused for every candidate.
#[derive(Debug)]
struct QueryTerms {
    normalized: String,
    keywords: Vec<Keyword>,
    word_pattern: Option<Regex>,
}

impl QueryTerms {
    fn is_short(&self) -> bool {
        self.normalized.chars().count() <= SHORT_QUERY_LEN
    }
}

/// The relevance engine. Cheap to clone; the dictionary is shared.
#[derive(Debug, Clone)]
pub struct SearchEngine {
    dictionary: Arc<Dictionary>,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new(Dictionary::builtin())
    }
}

impl SearchEngine {
    #[must_use]
    pub fn new(dictionary: Dictionary) -> Self {
        Self {
            dictionary: Arc::new(dictionary),
        }
    }

    #[must_use]
    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// Synonyms of a word, normalized. See [`Dictionary::synonyms_of`].
    #[must_use]
    pub fn synonyms_of(&self, word: &str) -> Vec<String> {
        self.dictionary.synonyms_of(word)
    }

    /// Normalized query words longer than two characters that are not stop
    /// words, in query order.
    #[must_use]
    pub fn extract_keywords(&self, query: &str) -> Vec<String> {
        normalize(query)
            .split_whitespace()
            .filter(|word| word.chars().count() >= MIN_KEYWORD_LEN)
            .filter(|word| !self.dictionary.is_stop_word(word))
            .map(str::to_owned)
            .collect()
    }

    fn analyze(&self, query: &str) -> QueryTerms {
        let normalized = normalize(query);
        let keywords = self
            .extract_keywords(&normalized)
            .into_iter()
            .map(|text| Keyword {
                synonyms: self.dictionary.synonyms_of(&text),
                text,
            })
            .collect();
        let word_pattern = if normalized.is_empty() {
            None
        } else {
            Regex::new(&format!(r"\b{}\b", regex::escape(&normalized))).ok()
        };

        QueryTerms {
            normalized,
            keywords,
            word_pattern,
        }
    }

    /// Whether the product name belongs to the domain the query points at.
    ///
    /// A query that resolves to no category, or to a catch-all category,
    /// places no constraint on the name.
    #[must_use]
    pub fn is_semantic_category_match(&self, product_name: &str, query: &str) -> bool {
        self.category_allows(&normalize(product_name), &normalize(query))
    }

    fn category_allows(&self, name: &str, normalized_query: &str) -> bool {
        let categories = self.dictionary.categories_for(normalized_query);
        if categories.is_empty() || categories.iter().any(|rule| rule.catch_all) {
            return true;
        }
        categories.iter().any(|rule| rule.matches(name))
    }

    /// Gate deciding whether a product name can match the query at all.
    #[must_use]
    pub fn is_relevant_match(&self, product_name: &str, query: &str) -> bool {
        let terms = self.analyze(query);
        self.is_relevant(&normalize(product_name), &terms)
    }

    fn is_relevant(&self, name: &str, terms: &QueryTerms) -> bool {
        if terms.normalized.is_empty() {
            return false;
        }

        if terms.is_short() {
            return name.contains(terms.normalized.as_str());
        }

        if !self.category_allows(name, &terms.normalized) {
            return false;
        }

        name.contains(terms.normalized.as_str())
            || terms.keywords.iter().any(|kw| {
                name.contains(kw.text.as_str())
                    || kw.synonyms.iter().any(|syn| name.contains(syn.as_str()))
            })
    }

    /// Relevance score of a product for a query. Zero means "not a match".
    #[must_use]
    pub fn score_product(&self, product: &Product, query: &str) -> f64 {
        let terms = self.analyze(query);
        self.score(product, &terms)
    }

    fn score(&self, product: &Product, terms: &QueryTerms) -> f64 {
        let name = normalize(&product.name);
        if !self.is_relevant(&name, terms) {
            return 0.0;
        }

        let query = terms.normalized.as_str();
        let mut score = name_tier_bonus(&name, query, terms.word_pattern.as_ref());

        for kw in &terms.keywords {
            if name.contains(kw.text.as_str()) {
                score += NAME_KEYWORD_BONUS;
            }
            if kw.text.chars().count() > SHORT_QUERY_LEN {
                let hits = kw
                    .synonyms
                    .iter()
                    .filter(|syn| name.contains(syn.as_str()))
                    .count();
                score += NAME_SYNONYM_BONUS * count_as_f64(hits);
            }
            if kw.text.chars().count() >= MIN_FUZZY_LEN {
                let best = name
                    .split_whitespace()
                    .map(|word| fuzzy_match(&kw.text, word, SCORING_FUZZY_THRESHOLD))
                    .fold(0.0_f64, f64::max);
                score += best * NAME_FUZZY_WEIGHT;
            }
        }

        let description = normalize_opt(product.description.as_deref());
        if !description.is_empty() {
            if description.contains(query) {
                score += DESCRIPTION_QUERY_BONUS;
            }
            for kw in &terms.keywords {
                if description.contains(kw.text.as_str()) {
                    score += DESCRIPTION_KEYWORD_BONUS;
                }
                let hits = kw
                    .synonyms
                    .iter()
                    .filter(|syn| description.contains(syn.as_str()))
                    .count();
                score += DESCRIPTION_SYNONYM_BONUS * count_as_f64(hits);
            }
        }

        let category = normalize_opt(product.category.as_ref().map(|c| c.title.as_str()));
        if !category.is_empty() {
            if category.contains(query) {
                score += CATEGORY_QUERY_BONUS;
            }
            let hits = terms
                .keywords
                .iter()
                .filter(|kw| category.contains(kw.text.as_str()))
                .count();
            score += CATEGORY_KEYWORD_BONUS * count_as_f64(hits);
        }

        if product.stock == StockStatus::InStock {
            score += IN_STOCK_BONUS;
        }
        if product.has_images() {
            score += HAS_IMAGE_BONUS;
        }

        (score * 100.0).round() / 100.0
    }

    /// Rank products for a query, keeping scores.
    ///
    /// Same ordering and filtering as [`Self::rank_and_filter`]. For an empty
    /// query the input order is kept and every score is zero.
    #[instrument(skip(self, products), fields(candidates = products.len()))]
    pub fn rank(
        &self,
        products: Vec<Product>,
        query: &str,
        hide_out_of_stock: bool,
    ) -> Vec<ScoredProduct> {
        let keep_stock =
            |product: &Product| !hide_out_of_stock || product.stock != StockStatus::OutOfStock;

        let terms = self.analyze(query);
        if terms.normalized.is_empty() {
            return products
                .into_iter()
                .filter(|p| keep_stock(p))
                .map(|product| ScoredProduct {
                    product,
                    score: 0.0,
                })
                .collect();
        }

        let mut seen = HashSet::new();
        let mut scored: Vec<ScoredProduct> = products
            .into_iter()
            .filter(|p| seen.insert(p.id.clone()))
            .filter_map(|product| {
                let score = self.score(&product, &terms);
                (score > 0.0).then_some(ScoredProduct { product, score })
            })
            .collect();

        // Stable: equal scores keep their catalog order
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));

        if hide_out_of_stock {
            scored.retain(|s| keep_stock(&s.product));
        }

        debug!(matches = scored.len(), "Ranked search results");
        scored
    }

    /// Relevance-ranked, de-duplicated, optionally in-stock-only products.
    #[must_use]
    pub fn rank_and_filter(
        &self,
        products: Vec<Product>,
        query: &str,
        hide_out_of_stock: bool,
    ) -> Vec<Product> {
        self.rank(products, query, hide_out_of_stock)
            .into_iter()
            .map(|scored| scored.product)
            .collect()
    }
}

/// Highest applicable name tier bonus.
fn name_tier_bonus(name: &str, query: &str, word_pattern: Option<&Regex>) -> f64 {
    if name == query {
        EXACT_NAME_BONUS
    } else if name.starts_with(query) {
        NAME_PREFIX_BONUS
    } else if word_pattern.is_some_and(|re| re.is_match(name)) {
        NAME_WORD_BONUS
    } else if name.contains(query) {
        NAME_CONTAINS_BONUS
    } else {
        0.0
    }
}

#[allow(clippy::cast_precision_loss)] // Match counts are tiny
fn count_as_f64(count: usize) -> f64 {
    count as f64
}
