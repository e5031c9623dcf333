//! Locally persisted cart for anonymous visitors.

use std::sync::{Arc, Mutex, PoisonError};

use kron_core::Product;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::quantity::adjust_quantity_by_multiplicity;
use super::unified::{CartItemUnified, CartUnified};
use crate::storage::{KeyValueStore, keys, load_json_or_default, save_json};

/// A guest cart line as persisted under [`keys::GUEST_CART`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestCartItem {
    pub product: Product,
    pub quantity: u32,
}

/// Guest cart backed by the key-value store.
///
/// The in-memory list is authoritative. Every change is written through to
/// the store; a failed write is logged and the in-memory list is kept.
#[derive(Debug)]
pub struct GuestCart<S> {
    store: Arc<S>,
    items: Mutex<Vec<GuestCartItem>>,
}

impl<S: KeyValueStore> GuestCart<S> {
    /// Load the persisted guest cart. An unreadable value starts an empty cart.
    pub fn load(store: Arc<S>) -> Self {
        let items: Vec<GuestCartItem> = load_json_or_default(&store, keys::GUEST_CART);
        debug!(items = items.len(), "Loaded guest cart");
        Self {
            store,
            items: Mutex::new(items),
        }
    }

    /// Snapshot of the current lines, in insertion order.
    #[must_use]
    pub fn items(&self) -> Vec<GuestCartItem> {
        self.lock().clone()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// The guest cart as a [`CartUnified`].
    #[must_use]
    pub fn unified(&self) -> CartUnified {
        CartUnified::from_items(
            self.lock()
                .iter()
                .map(|item| CartItemUnified::new(item.product.clone(), item.quantity))
                .collect(),
        )
    }

    /// Add `quantity` of `product`, snapped to its step.
    ///
    /// An existing line is increased and re-snapped; otherwise a new line of at
    /// least one step is appended. Returns the resulting quantity.
    pub fn add(&self, product: &Product, quantity: u32) -> u32 {
        let step = product.quantity_step();
        let added = adjust_quantity_by_multiplicity(quantity, step);
        self.modify(|items| {
            if let Some(item) = items.iter_mut().find(|item| item.product.id == product.id) {
                item.quantity =
                    adjust_quantity_by_multiplicity(item.quantity.saturating_add(added), step);
                item.quantity
            } else {
                items.push(GuestCartItem {
                    product: product.clone(),
                    quantity: added,
                });
                added
            }
        })
    }

    /// Set the quantity of an existing line, snapped to its step.
    ///
    /// Zero removes the line. Returns `false` when nothing changed: the product
    /// is not in the cart, or the snapped quantity equals the current one.
    pub fn set_quantity(&self, product_id: &str, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(product_id);
        }

        let mut items = self.lock();
        let Some(item) = items
            .iter_mut()
            .find(|item| item.product.id.as_str() == product_id)
        else {
            return false;
        };

        let snapped = adjust_quantity_by_multiplicity(quantity, item.product.quantity_step());
        if snapped == item.quantity {
            return false;
        }
        item.quantity = snapped;
        self.persist(&items);
        true
    }

    /// Remove a line. Returns `false` if the product was not in the cart.
    pub fn remove(&self, product_id: &str) -> bool {
        self.modify(|items| {
            let before = items.len();
            items.retain(|item| item.product.id.as_str() != product_id);
            items.len() != before
        })
    }

    /// Keep only lines for which `keep` returns true.
    pub fn retain(&self, keep: impl FnMut(&GuestCartItem) -> bool) {
        self.modify(|items| items.retain(keep));
    }

    pub fn clear(&self) {
        self.modify(Vec::clear);
    }

    fn modify<R>(&self, f: impl FnOnce(&mut Vec<GuestCartItem>) -> R) -> R {
        let mut items = self.lock();
        let result = f(&mut items);
        self.persist(&items);
        result
    }

    fn persist(&self, items: &[GuestCartItem]) {
        let result = if items.is_empty() {
            self.store.remove(keys::GUEST_CART)
        } else {
            save_json(&self.store, keys::GUEST_CART, items)
        };
        if let Err(e) = result {
            error!(error = %e, "Failed to persist guest cart");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<GuestCartItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::super::unified::tests::product;
    use super::*;
    use crate::storage::{MemoryStore, StorageError, load_json};

    fn cart() -> (Arc<MemoryStore>, GuestCart<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (Arc::clone(&store), GuestCart::load(store))
    }

    /// Store that accepts reads and rejects every write.
    struct FullStore;

    impl KeyValueStore for FullStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::QuotaExceeded)
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::QuotaExceeded)
        }
    }

    #[test]
    fn test_persistence_round_trip() {
        let (store, cart) = cart();
        cart.add(&product("a", 100), 2);

        let persisted: Vec<GuestCartItem> = load_json(&store, keys::GUEST_CART).unwrap().unwrap();
        assert_eq!(persisted, cart.items());

        let reloaded = GuestCart::load(store);
        assert_eq!(reloaded.items(), cart.items());
    }

    #[test]
    fn test_add_merges_and_snaps() {
        let (_, cart) = cart();
        let mut bolts = product("bolts", 5);
        bolts.multiplicity = Some(3);

        assert_eq!(cart.add(&bolts, 1), 3);
        assert_eq!(cart.add(&bolts, 5), 9);
        assert_eq!(cart.items().len(), 1);
    }

    #[test]
    fn test_set_quantity_noop_when_unchanged() {
        let (_, cart) = cart();
        let mut bolts = product("bolts", 5);
        bolts.multiplicity = Some(3);
        cart.add(&bolts, 6);

        assert!(!cart.set_quantity("bolts", 7));
        assert!(cart.set_quantity("bolts", 8));
        assert_eq!(cart.items().first().unwrap().quantity, 9);
        assert!(!cart.set_quantity("missing", 3));
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let (store, cart) = cart();
        cart.add(&product("a", 100), 1);
        assert!(cart.set_quantity("a", 0));
        assert!(cart.is_empty());
        assert!(store.get(keys::GUEST_CART).unwrap().is_none());
    }

    #[test]
    fn test_unified_view() {
        let (_, cart) = cart();
        cart.add(&product("a", 100), 2);
        cart.add(&product("b", 50), 1);
        let unified = cart.unified();
        assert_eq!(unified.total_items, 3);
        assert_eq!(unified.total_price, kron_core::Price::from_units(250));
    }

    #[test]
    fn test_write_failure_keeps_memory_state() {
        let cart = GuestCart::load(Arc::new(FullStore));
        cart.add(&product("a", 100), 1);
        assert_eq!(cart.items().len(), 1);
        cart.clear();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_corrupt_persisted_cart_starts_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(keys::GUEST_CART, "not json").unwrap();
        let cart = GuestCart::load(store);
        assert!(cart.is_empty());
    }
}
