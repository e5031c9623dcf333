//! Recent search queries, persisted in the key-value store.

use std::sync::Arc;

use tracing::error;

use crate::storage::{KeyValueStore, keys, load_json_or_default, save_json};

/// Maximum number of remembered queries.
pub const MAX_HISTORY_ENTRIES: usize = 10;

/// Most-recent-first list of queries the visitor ran.
#[derive(Debug, Clone)]
pub struct SearchHistory<S> {
    store: Arc<S>,
}

impl<S: KeyValueStore> SearchHistory<S> {
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Stored queries, most recent first.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        load_json_or_default(&self.store, keys::SEARCH_HISTORY)
    }

    /// Remember a query. Blank queries are ignored; a repeated query moves
    /// to the front instead of being duplicated.
    pub fn record(&self, query: &str) {
        let query = query.trim();
        if query.is_empty() {
            return;
        }

        let mut entries = self.entries();
        entries.retain(|existing| existing != query);
        entries.insert(0, query.to_owned());
        entries.truncate(MAX_HISTORY_ENTRIES);
        self.persist(&entries);
    }

    /// Forget one query.
    pub fn remove(&self, query: &str) {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|existing| existing != query);
        if entries.len() != before {
            self.persist(&entries);
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.store.remove(keys::SEARCH_HISTORY) {
            error!(error = %e, "Failed to clear search history");
        }
    }

    fn persist(&self, entries: &[String]) {
        if let Err(e) = save_json(&self.store, keys::SEARCH_HISTORY, entries) {
            error!(error = %e, "Failed to save search history");
        }
    }
}
