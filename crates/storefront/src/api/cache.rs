//! In-memory cache for API responses.

use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

use super::types::{ProductPage, ProductsQuery};

/// Cache key for cached queries.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Products(ProductsQuery),
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Products(ProductPage),
}

/// Query cache owned by one API client.
///
/// Entries expire after the configured TTL and are dropped on any session
/// change (login, logout, region switch).
#[derive(Clone)]
pub struct QueryCache {
    inner: Cache<CacheKey, CacheValue>,
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

impl QueryCache {
    #[must_use]
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn products(&self, query: &ProductsQuery) -> Option<ProductPage> {
        let key = CacheKey::Products(query.clone());
        match self.inner.get(&key).await {
            Some(CacheValue::Products(page)) => {
                debug!("Cache hit for products");
                Some(page)
            }
            None => None,
        }
    }

    pub async fn insert_products(&self, query: &ProductsQuery, page: ProductPage) {
        self.inner
            .insert(CacheKey::Products(query.clone()), CacheValue::Products(page))
            .await;
    }

    /// Drop every entry.
    pub fn invalidate_all(&self) {
        debug!("Invalidating query cache");
        self.inner.invalidate_all();
    }
}
