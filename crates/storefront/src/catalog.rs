//! Product search over the remote catalog.
//!
//! The backend's own search is only used to pick candidates; ordering and
//! filtering are done client-side by the [`SearchEngine`].

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::api::{ApiClient, ApiError, ProductPage, ProductsQuery};
use crate::search::{ScoredProduct, SearchEngine};
use crate::storage::KeyValueStore;

/// Default number of candidates fetched per search.
pub const DEFAULT_CANDIDATES: i64 = 100;

/// Anything that can list products.
pub trait ProductSource: Send + Sync {
    fn fetch_products(
        &self,
        query: &ProductsQuery,
    ) -> impl Future<Output = Result<ProductPage, ApiError>> + Send;
}

impl<S: KeyValueStore> ProductSource for ApiClient<S> {
    async fn fetch_products(&self, query: &ProductsQuery) -> Result<ProductPage, ApiError> {
        self.products(query).await
    }
}

/// Ranked product search.
#[derive(Debug, Clone)]
pub struct CatalogService<P> {
    source: P,
    engine: Arc<SearchEngine>,
    candidates: i64,
}

impl<P: ProductSource> CatalogService<P> {
    #[must_use]
    pub const fn new(source: P, engine: Arc<SearchEngine>) -> Self {
        Self {
            source,
            engine,
            candidates: DEFAULT_CANDIDATES,
        }
    }

    /// Change how many candidates are fetched per search.
    #[must_use]
    pub const fn with_candidates(mut self, candidates: i64) -> Self {
        self.candidates = candidates;
        self
    }

    /// Search the catalog and rank the results.
    ///
    /// Returns at most `limit` products, best first.
    ///
    /// # Errors
    ///
    /// Returns an error if the candidates cannot be fetched.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        hide_out_of_stock: bool,
    ) -> Result<Vec<ScoredProduct>, ApiError> {
        let query = query.trim();
        let page = self
            .source
            .fetch_products(&ProductsQuery::search(query, self.candidates))
            .await?;
        debug!(candidates = page.products.len(), "Fetched search candidates");

        let mut ranked = self.engine.rank(page.products, query, hide_out_of_stock);
        ranked.truncate(limit);
        Ok(ranked)
    }
}
