//! Client state assembled from configuration.

use std::sync::Arc;

use crate::api::ApiClient;
use crate::cart::CartReconciler;
use crate::catalog::CatalogService;
use crate::config::StorefrontConfig;
use crate::error::Result;
use crate::notify::Notifier;
use crate::search::{Dictionary, SearchEngine, SearchHistory};
use crate::storage::FileStore;

/// API client persisting its session on disk.
pub type Client = ApiClient<FileStore>;

/// Everything a storefront client needs, wired together.
///
/// Cheaply cloneable via `Arc`. All parts share one file-backed store, one
/// notifier and one API client.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    api: Client,
    catalog: CatalogService<Client>,
    cart: CartReconciler<Client, FileStore>,
    history: SearchHistory<FileStore>,
    notifier: Arc<Notifier>,
}

impl AppState {
    /// Create the client state.
    ///
    /// Opens the storage directory, loads the search dictionary and builds
    /// the API client from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage directory cannot be opened, the
    /// dictionary cannot be loaded or the HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self> {
        let store = Arc::new(FileStore::open(&config.storage_dir)?);
        let dictionary = Dictionary::load(config.search_dictionary.as_deref())?;
        let engine = Arc::new(SearchEngine::new(dictionary));
        let notifier = Arc::new(Notifier::new(config.notification_window));
        let api = ApiClient::new(&config.api, Arc::clone(&store))?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                catalog: CatalogService::new(api.clone(), engine),
                cart: CartReconciler::new(api.clone(), Arc::clone(&store), Arc::clone(&notifier)),
                history: SearchHistory::new(store),
                api,
                notifier,
                config,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn api(&self) -> &Client {
        &self.inner.api
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogService<Client> {
        &self.inner.catalog
    }

    #[must_use]
    pub fn cart(&self) -> &CartReconciler<Client, FileStore> {
        &self.inner.cart
    }

    #[must_use]
    pub fn history(&self) -> &SearchHistory<FileStore> {
        &self.inner.history
    }

    #[must_use]
    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.inner.notifier
    }
}
