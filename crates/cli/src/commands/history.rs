//! Recent search queries.

use std::path::Path;
use std::sync::Arc;

use kron_storefront::search::SearchHistory;
use kron_storefront::storage::FileStore;

/// List the history, most recent first, or clear it.
///
/// # Errors
///
/// Returns an error if the storage directory cannot be opened.
#[allow(clippy::print_stdout)]
pub fn run(storage_dir: &Path, clear: bool) -> kron_storefront::Result<()> {
    let history = SearchHistory::new(Arc::new(FileStore::open(storage_dir)?));

    if clear {
        history.clear();
        tracing::info!("Search history cleared");
        return Ok(());
    }

    for (i, query) in history.entries().iter().enumerate() {
        println!("{:>2}. {query}", i + 1);
    }
    Ok(())
}
