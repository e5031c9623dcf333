//! Core types for Kron.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod price;
pub mod product;
pub mod region;

pub use id::*;
pub use price::{Price, PriceError};
pub use product::{Category, Product, ProductImage, StockStatus};
pub use region::Region;
