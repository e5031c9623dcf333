//! Rank products for a query.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use kron_core::Product;
use kron_storefront::config::StorefrontConfig;
use kron_storefront::search::{Dictionary, ScoredProduct, SearchEngine, SearchHistory};
use kron_storefront::state::AppState;
use kron_storefront::storage::FileStore;
use kron_storefront::{AppError, Result};

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Search query
    pub query: String,

    /// JSON file with an array of products; the storefront API is used if absent
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Keep out-of-stock products in the results
    #[arg(long)]
    pub include_out_of_stock: bool,

    /// Maximum number of results
    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    /// JSON dictionary replacing the built-in one
    #[arg(long, env = "KRON_SEARCH_DICTIONARY")]
    pub dictionary: Option<PathBuf>,
}

/// Rank, print and remember a search.
///
/// Without a catalog file, candidates come from the storefront API and the
/// client is built from [`StorefrontConfig`], with the command line taking
/// precedence for the storage directory and dictionary.
///
/// # Errors
///
/// Returns an error if the dictionary or catalog cannot be loaded, or the
/// storefront API request fails.
pub async fn run(args: &SearchArgs, storage_dir: &Path) -> Result<()> {
    let hide_out_of_stock = !args.include_out_of_stock;

    if let Some(path) = &args.catalog {
        let engine = SearchEngine::new(Dictionary::load(args.dictionary.as_deref())?);
        let products = read_catalog(path)?;
        tracing::info!(products = products.len(), "Loaded catalog");

        let mut ranked = engine.rank(products, &args.query, hide_out_of_stock);
        ranked.truncate(args.limit);

        SearchHistory::new(Arc::new(FileStore::open(storage_dir)?)).record(&args.query);
        print_results(&ranked);
        return Ok(());
    }

    let mut config = StorefrontConfig::from_env()?;
    config.storage_dir = storage_dir.to_path_buf();
    if args.dictionary.is_some() {
        config.search_dictionary.clone_from(&args.dictionary);
    }
    let state = AppState::new(config)?;

    let results = state
        .catalog()
        .search(&args.query, args.limit, hide_out_of_stock)
        .await?;
    state.history().record(&args.query);
    print_results(&results);
    Ok(())
}

fn read_catalog(path: &Path) -> Result<Vec<Product>> {
    let json = std::fs::read_to_string(path).map_err(|e| {
        AppError::BadRequest(format!("cannot read catalog {}: {e}", path.display()))
    })?;
    serde_json::from_str(&json).map_err(|e| {
        AppError::BadRequest(format!("invalid catalog {}: {e}", path.display()))
    })
}

#[allow(clippy::print_stdout)]
fn print_results(results: &[ScoredProduct]) {
    if results.is_empty() {
        println!("No matching products");
        return;
    }
    for scored in results {
        println!(
            "{:>7.1}  {:<13}  {}",
            scored.score, scored.product.stock, scored.product.name
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn scratch_dir() -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("kron-cli-{}-{nanos}", std::process::id()))
    }

    #[tokio::test]
    async fn test_catalog_search_records_history() {
        let dir = scratch_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let catalog = dir.join("products.json");
        std::fs::write(
            &catalog,
            r#"[{"id": "1", "name": "Лопата штыковая", "price": "1500"}]"#,
        )
        .unwrap();
        let storage_dir = dir.join("state");

        let args = SearchArgs {
            query: "лопата".to_string(),
            catalog: Some(catalog),
            include_out_of_stock: false,
            limit: 5,
            dictionary: None,
        };
        run(&args, &storage_dir).await.unwrap();

        let history = SearchHistory::new(Arc::new(FileStore::open(&storage_dir).unwrap()));
        assert_eq!(history.entries(), ["лопата"]);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn test_invalid_catalog_is_bad_request() {
        let dir = scratch_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let catalog = dir.join("products.json");
        std::fs::write(&catalog, "not json").unwrap();

        let args = SearchArgs {
            query: "лопата".to_string(),
            catalog: Some(catalog),
            include_out_of_stock: false,
            limit: 5,
            dictionary: None,
        };
        let err = run(&args, &dir.join("state")).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        std::fs::remove_dir_all(dir).unwrap();
    }
}
