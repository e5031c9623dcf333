//! Unified error handling.
//!
//! Module errors convert into [`AppError`] with `?`, so callers composing
//! several subsystems (the CLI, integration code) can return one error type.

use thiserror::Error;

use crate::api::ApiError;
use crate::cart::CartError;
use crate::config::ConfigError;
use crate::search::DictionaryError;
use crate::storage::StorageError;

/// Application-level error type for the storefront client.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Storefront API operation failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Local persistence failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Search dictionary could not be loaded.
    #[error("Dictionary error: {0}")]
    Dictionary(#[from] DictionaryError),

    /// Bad input from the caller.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    /// Whether the caller should be asked to sign in again.
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        match self {
            Self::Api(e) | Self::Cart(CartError::Api(e)) => e.is_unauthenticated(),
            Self::Cart(CartError::NotAuthenticated) => true,
            _ => false,
        }
    }
}

/// Result type alias for storefront operations.
pub type Result<T> = std::result::Result<T, AppError>;
