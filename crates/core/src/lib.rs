//! Kron Core - Shared types library.
//!
//! This crate provides the domain types used across all Kron components:
//! - `storefront` - Search relevance engine, cart reconciliation, API client
//! - `cli` - Developer tooling for ranking catalogs and inspecting local state
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no storage.
//! Products and categories are read-only snapshots of what the remote
//! GraphQL API returns.
//!
//! # Modules
//!
//! - [`types`] - Typed identifiers, prices, products, categories and regions

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
