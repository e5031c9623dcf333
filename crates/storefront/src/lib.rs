//! Kron storefront client core.
//!
//! Search relevance ranking and a unified guest/server cart, plus the
//! collaborators they need: the storefront GraphQL API client, session and
//! local persistence, notifications and configuration.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod error;
pub mod notify;
pub mod search;
pub mod state;
pub mod storage;

pub use error::{AppError, Result};
