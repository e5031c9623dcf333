//! Integration tests for the Kron storefront.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p kron-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `search_scenarios` - Ranking a realistic catalog end to end
//! - `cart_migration` - Guest to server cart hand-over through [`CartReconciler`]
//!
//! This library holds the shared fixtures: a product builder and an in-memory
//! remote cart.
//!
//! [`CartReconciler`]: kron_storefront::cart::CartReconciler

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use kron_core::{Price, Product, ProductId, StockStatus};
use kron_storefront::api::ApiError;
use kron_storefront::cart::{CartApi, CartItemUnified, CartUnified};

/// An in-stock product priced in whole units.
#[must_use]
pub fn product(id: &str, name: &str, price: u32) -> Product {
    Product {
        id: ProductId::new(id),
        name: name.to_string(),
        description: None,
        price: Price::from_units(price),
        old_price: None,
        stock: StockStatus::InStock,
        category: None,
        multiplicity: None,
        images: Vec::new(),
    }
}

/// Remote cart kept in memory.
///
/// Clones share the same cart. Products set through
/// [`CartApi::set_quantity`] must be registered with
/// [`InMemoryCart::register`] first so the cart can price them.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCart {
    state: Arc<CartState>,
}

#[derive(Debug, Default)]
struct CartState {
    catalog: Mutex<Vec<Product>>,
    lines: Mutex<Vec<CartItemUnified>>,
    failing: Mutex<HashSet<ProductId>>,
    mutations: Mutex<Vec<(ProductId, u32)>>,
}

impl InMemoryCart {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, product: &Product) {
        lock(&self.state.catalog).push(product.clone());
    }

    /// Put a line in the cart directly, as if added from another device.
    pub fn seed(&self, product: &Product, quantity: u32) {
        self.register(product);
        lock(&self.state.lines).push(CartItemUnified::new(product.clone(), quantity));
    }

    /// Make mutations of `id` fail until [`Self::recover`] is called.
    pub fn fail(&self, id: &str) {
        lock(&self.state.failing).insert(ProductId::new(id));
    }

    pub fn recover(&self) {
        lock(&self.state.failing).clear();
    }

    /// Every `set_quantity` call received, in order.
    #[must_use]
    pub fn mutations(&self) -> Vec<(ProductId, u32)> {
        lock(&self.state.mutations).clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> CartUnified {
        CartUnified::from_items(lock(&self.state.lines).clone())
    }
}

impl CartApi for InMemoryCart {
    async fn fetch_cart(&self) -> Result<CartUnified, ApiError> {
        Ok(self.snapshot())
    }

    async fn set_quantity(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Option<CartUnified>, ApiError> {
        lock(&self.state.mutations).push((product_id.clone(), quantity));
        if lock(&self.state.failing).contains(product_id) {
            return Err(ApiError::Status {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }

        let product = lock(&self.state.catalog)
            .iter()
            .find(|p| p.id == *product_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(product_id.to_string()))?;

        let mut lines = lock(&self.state.lines);
        lines.retain(|line| line.product.id != *product_id);
        if quantity > 0 {
            lines.push(CartItemUnified::new(product, quantity));
        }
        Ok(Some(CartUnified::from_items(lines.clone())))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
