//! Catalog entities as served by the storefront API.
//!
//! These are read-only snapshots: the storefront never mutates a product,
//! it only ranks them and places them in carts. Field names follow the
//! API's camelCase JSON so a snapshot can be persisted and read back as-is.

use serde::{Deserialize, Serialize};

use super::id::{CategoryId, ProductId};
use super::price::Price;

/// Stock availability of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockStatus {
    #[default]
    InStock,
    InStockSoon,
    OutOfStock,
}

impl StockStatus {
    /// Wire value of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InStock => "IN_STOCK",
            Self::InStockSoon => "IN_STOCK_SOON",
            Self::OutOfStock => "OUT_OF_STOCK",
        }
    }
}

impl std::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Product image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
    /// Image URL.
    pub url: String,
    /// Alt text for accessibility.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
}

/// A catalog category.
///
/// Leaf categories carry their ancestor chain, closest parent first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub title: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ancestors: Vec<Self>,
}

/// A purchasable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    /// Display name.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: Price,
    /// Previous price, shown struck through when the product is on sale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_price: Option<Price>,
    #[serde(default)]
    pub stock: StockStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// Minimum purchasable increment. Absent means 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplicity: Option<u32>,
    #[serde(default)]
    pub images: Vec<ProductImage>,
}

impl Product {
    /// Quantity step for this product, never zero.
    #[must_use]
    pub fn quantity_step(&self) -> u32 {
        self.multiplicity.filter(|step| *step > 0).unwrap_or(1)
    }

    /// Whether the product can currently be bought.
    #[must_use]
    pub fn is_in_stock(&self) -> bool {
        self.stock == StockStatus::InStock
    }

    #[must_use]
    pub fn has_images(&self) -> bool {
        !self.images.is_empty()
    }

    /// Whether the product is sold below its previous price.
    #[must_use]
    pub fn is_on_sale(&self) -> bool {
        self.old_price.is_some_and(|old| old > self.price)
    }
}
