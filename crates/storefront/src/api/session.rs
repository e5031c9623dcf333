//! Session tokens and region selection, persisted in the key-value store.

use std::sync::Arc;

use kron_core::{Region, RegionId};
use secrecy::{ExposeSecret, SecretString};
use tracing::{error, warn};

use super::types::TokenPair;
use crate::storage::{KeyValueStore, StorageError, keys, load_json, save_json};

/// Token storage for the current visitor.
///
/// A visitor is authenticated when a user access token is stored. Anonymous
/// visitors carry a guest token scoped to a region.
pub struct SessionStore<S> {
    store: Arc<S>,
}

impl<S> Clone for SessionStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: KeyValueStore> std::fmt::Debug for SessionStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("authenticated", &self.is_authenticated())
            .field("has_guest_token", &self.guest_token().is_some())
            .finish_non_exhaustive()
    }
}

impl<S: KeyValueStore> SessionStore<S> {
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key, error = %e, "Failed to read session value");
                None
            }
        }
    }

    fn write(&self, key: &str, result: Result<(), StorageError>) {
        if let Err(e) = result {
            error!(key, error = %e, "Failed to persist session value");
        }
    }

    fn remove(&self, key: &str) {
        self.write(key, self.store.remove(key));
    }

    #[must_use]
    pub fn access_token(&self) -> Option<SecretString> {
        self.read(keys::ACCESS_TOKEN).map(SecretString::from)
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<SecretString> {
        self.read(keys::REFRESH_TOKEN).map(SecretString::from)
    }

    #[must_use]
    pub fn guest_token(&self) -> Option<SecretString> {
        self.read(keys::GUEST_TOKEN).map(SecretString::from)
    }

    /// Region the guest token was issued for.
    #[must_use]
    pub fn token_region_id(&self) -> Option<RegionId> {
        self.read(keys::TOKEN_REGION_ID).map(RegionId::from)
    }

    #[must_use]
    pub fn selected_region(&self) -> Option<Region> {
        load_json(&self.store, keys::SELECTED_REGION).unwrap_or_else(|e| {
            warn!(error = %e, "Discarding unreadable selected region");
            None
        })
    }

    pub fn set_selected_region(&self, region: &Region) {
        self.write(
            keys::SELECTED_REGION,
            save_json(&self.store, keys::SELECTED_REGION, region),
        );
    }

    /// Whether a user access token is stored.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    /// Token to send as `Authorization: Bearer`: the user's access token,
    /// else the guest token.
    #[must_use]
    pub fn bearer_token(&self) -> Option<SecretString> {
        self.access_token().or_else(|| self.guest_token())
    }

    pub fn store_user_tokens(&self, tokens: &TokenPair) {
        self.write(
            keys::ACCESS_TOKEN,
            self.store
                .set(keys::ACCESS_TOKEN, tokens.access_token.expose_secret()),
        );
        self.write(
            keys::REFRESH_TOKEN,
            self.store
                .set(keys::REFRESH_TOKEN, tokens.refresh_token.expose_secret()),
        );
    }

    pub fn store_guest_token(&self, token: &SecretString, region_id: &RegionId) {
        self.write(
            keys::GUEST_TOKEN,
            self.store.set(keys::GUEST_TOKEN, token.expose_secret()),
        );
        self.write(
            keys::TOKEN_REGION_ID,
            self.store.set(keys::TOKEN_REGION_ID, region_id.as_str()),
        );
    }

    /// Forget the user's tokens, keeping the guest session.
    pub fn clear_user_tokens(&self) {
        self.remove(keys::ACCESS_TOKEN);
        self.remove(keys::REFRESH_TOKEN);
    }

    /// Forget the guest token and the region it was issued for.
    pub fn clear_guest_token(&self) {
        self.remove(keys::GUEST_TOKEN);
        self.remove(keys::TOKEN_REGION_ID);
    }

    /// Forget every token and the token region.
    pub fn clear_all(&self) {
        self.clear_user_tokens();
        self.clear_guest_token();
    }
}
