//! The cart view shared by guest and server-backed carts.

use kron_core::{Price, Product};
use serde::{Deserialize, Serialize};

/// One cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemUnified {
    /// Line identifier, derived from the product id.
    pub id: String,
    pub product: Product,
    pub quantity: u32,
}

impl CartItemUnified {
    #[must_use]
    pub fn new(product: Product, quantity: u32) -> Self {
        Self {
            id: product.id.to_string(),
            product,
            quantity,
        }
    }

    /// Price of the line: unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product.price.times(self.quantity)
    }
}

/// A cart as seen by callers, whichever store backs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartUnified {
    pub items: Vec<CartItemUnified>,
    pub total_price: Price,
    pub total_items: u32,
    pub is_empty: bool,
}

impl Default for CartUnified {
    fn default() -> Self {
        Self::empty()
    }
}

impl CartUnified {
    /// Build a cart from its lines, computing the totals.
    ///
    /// Lines with quantity zero are dropped.
    #[must_use]
    pub fn from_items(items: Vec<CartItemUnified>) -> Self {
        let items: Vec<_> = items.into_iter().filter(|item| item.quantity > 0).collect();
        let total_price = items.iter().map(CartItemUnified::line_total).sum();
        let total_items = items
            .iter()
            .fold(0_u32, |acc, item| acc.saturating_add(item.quantity));
        Self {
            is_empty: items.is_empty(),
            items,
            total_price,
            total_items,
        }
    }

    /// An empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_items(Vec::new())
    }

    /// The line for `product_id`, if present.
    #[must_use]
    pub fn item(&self, product_id: &str) -> Option<&CartItemUnified> {
        self.items.iter().find(|item| item.id == product_id)
    }

    /// Quantity of `product_id` in the cart, zero if absent.
    #[must_use]
    pub fn quantity_of(&self, product_id: &str) -> u32 {
        self.item(product_id).map_or(0, |item| item.quantity)
    }
}
