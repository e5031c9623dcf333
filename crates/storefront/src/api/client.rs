//! Storefront API client.

use std::sync::Arc;

use graphql_client::{GraphQLQuery, Response};
use kron_core::{ProductId, Region, RegionId};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use super::cache::QueryCache;
use super::conversions::{
    convert_auth_result, convert_cart, convert_product_connection, convert_viewer,
};
use super::queries::{
    Cart, GuestLogin, GuestLoginVariables, Login, LoginVariables, NoVariables, Products,
    RefreshToken, RefreshTokenVariables, UpdateCartItemQuantity, UpdateCartItemQuantityVariables,
    Viewer as ViewerQuery,
};
use super::retry::{RetryPolicy, retry_with_backoff, with_session_recovery};
use super::session::SessionStore;
use super::types::{ProductPage, ProductsQuery, TokenPair, Viewer};
use super::{ApiError, GraphQLError, GraphQLErrorLocation};
use crate::cart::{CartApi, CartUnified};
use crate::config::ApiConfig;
use crate::storage::KeyValueStore;

/// How much of a response body to keep in logs and errors.
const BODY_EXCERPT_CHARS: usize = 500;

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}

/// Client for the storefront GraphQL API.
///
/// Cheap to clone; clones share the HTTP connection pool, session and cache.
pub struct ApiClient<S> {
    inner: Arc<ApiClientInner<S>>,
}

struct ApiClientInner<S> {
    client: reqwest::Client,
    endpoint: url::Url,
    session: SessionStore<S>,
    cache: QueryCache,
    retry: RetryPolicy,
    default_region_id: Option<RegionId>,
}

impl<S> Clone for ApiClient<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> std::fmt::Debug for ApiClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("endpoint", &self.inner.endpoint.as_str())
            .field("cache", &self.inner.cache)
            .finish_non_exhaustive()
    }
}

impl<S: KeyValueStore> ApiClient<S> {
    /// Create a client persisting its session in `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig, store: Arc<S>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                endpoint: config.url.clone(),
                session: SessionStore::new(store),
                cache: QueryCache::new(config.cache_ttl, config.cache_capacity),
                retry: config.retry,
                default_region_id: config.default_region_id.clone(),
            }),
        })
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore<S> {
        &self.inner.session
    }

    #[must_use]
    pub fn cache(&self) -> &QueryCache {
        &self.inner.cache
    }

    /// Send one GraphQL request.
    ///
    /// With `authorized`, the session's bearer token is attached.
    async fn send<Q: GraphQLQuery>(
        &self,
        variables: Q::Variables,
        authorized: bool,
    ) -> Result<Q::ResponseData, ApiError>
    where
        Q::Variables: Serialize,
    {
        let request_body = Q::build_query(variables);

        let mut request = self
            .inner
            .client
            .post(self.inner.endpoint.clone())
            .header("Content-Type", "application/json")
            .json(&request_body);

        if authorized && let Some(token) = self.inner.session.bearer_token() {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized(excerpt(&response_text)));
        }

        if !status.is_success() {
            error!(
                status = %status,
                body = %excerpt(&response_text),
                "Storefront API returned non-success status"
            );
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: excerpt(&response_text),
            });
        }

        let response: Response<Q::ResponseData> = match serde_json::from_str(&response_text) {
            Ok(r) => r,
            Err(e) => {
                error!(
                    error = %e,
                    body = %excerpt(&response_text),
                    "Failed to parse GraphQL response"
                );
                return Err(ApiError::Parse(e));
            }
        };

        if let Some(errors) = response.errors
            && !errors.is_empty()
        {
            debug!(errors = ?errors, "GraphQL errors in response");
            return Err(ApiError::GraphQL(
                errors.into_iter().map(convert_graphql_error).collect(),
            ));
        }

        response.data.ok_or_else(|| {
            error!(
                body = %excerpt(&response_text),
                "GraphQL response has no data and no errors"
            );
            ApiError::GraphQL(vec![GraphQLError::message("No data in response")])
        })
    }

    /// Send an authorized request with backoff and one session recovery.
    async fn execute<Q: GraphQLQuery>(
        &self,
        variables: Q::Variables,
    ) -> Result<Q::ResponseData, ApiError>
    where
        Q::Variables: Serialize + Clone,
    {
        let variables = &variables;
        let policy = &self.inner.retry;

        with_session_recovery(
            move || retry_with_backoff(policy, move || self.send::<Q>(variables.clone(), true)),
            || self.recover_session(),
        )
        .await
    }

    /// Re-establish a session after the backend rejected the current token.
    ///
    /// Refreshes the user's tokens when a refresh token is stored; otherwise,
    /// or if the refresh fails, starts a new guest session for the stored
    /// region, falling back to the configured default region.
    #[instrument(skip(self))]
    async fn recover_session(&self) -> Result<(), ApiError> {
        let session = &self.inner.session;

        if let Some(refresh) = session.refresh_token() {
            match self.refresh_token(&refresh).await {
                Ok(tokens) => {
                    session.store_user_tokens(&tokens);
                    info!("Refreshed user session");
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, "Token refresh failed, falling back to guest session");
                    session.clear_user_tokens();
                    self.inner.cache.invalidate_all();
                }
            }
        }

        let region_id = session
            .token_region_id()
            .or_else(|| session.selected_region().map(|region| region.id))
            .or_else(|| self.inner.default_region_id.clone())
            .ok_or_else(|| ApiError::Session("no region for a guest session".to_string()))?;

        self.guest_login(&region_id).await?;
        Ok(())
    }

    // =========================================================================
    // Product Methods
    // =========================================================================

    /// Get a page of products.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn products(&self, query: &ProductsQuery) -> Result<ProductPage, ApiError> {
        if let Some(page) = self.inner.cache.products(query).await {
            return Ok(page);
        }

        let data = self.execute::<Products>(query.clone()).await?;
        let page = convert_product_connection(data.products)?;

        self.inner.cache.insert_products(query, page.clone()).await;

        Ok(page)
    }

    // =========================================================================
    // Cart Methods
    // =========================================================================

    /// Get the session's cart. A session without a cart has an empty one.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn cart(&self) -> Result<CartUnified, ApiError> {
        let data = self.execute::<Cart>(NoVariables).await?;
        data.cart.map_or_else(|| Ok(CartUnified::empty()), convert_cart)
    }

    /// Set the absolute quantity of a product in the cart. Zero removes it.
    ///
    /// Returns the updated cart, or `None` if the server did not send it.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn update_cart_item_quantity(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Option<CartUnified>, ApiError> {
        let variables = UpdateCartItemQuantityVariables {
            product_id: product_id.clone(),
            quantity: i64::from(quantity),
        };

        let data = self.execute::<UpdateCartItemQuantity>(variables).await?;

        data.update_cart_item_quantity
            .and_then(|payload| payload.cart)
            .map(convert_cart)
            .transpose()
    }

    // =========================================================================
    // Session Methods
    // =========================================================================

    /// Who the current token belongs to.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn viewer(&self) -> Result<Viewer, ApiError> {
        let data = self.execute::<ViewerQuery>(NoVariables).await?;
        Ok(convert_viewer(data.viewer))
    }

    /// Log in and store the user's tokens.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Auth`] if the credentials are rejected, or another
    /// error if the API request fails.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<TokenPair, ApiError> {
        let variables = LoginVariables {
            email: email.to_string(),
            password: password.expose_secret().to_string(),
        };

        let data = retry_with_backoff(&self.inner.retry, || {
            self.send::<Login>(variables.clone(), false)
        })
        .await?;
        let tokens = convert_auth_result(data.login)?;

        self.inner.session.store_user_tokens(&tokens);
        self.inner.cache.invalidate_all();
        info!("Logged in");

        Ok(tokens)
    }

    /// Start a guest session for a region and store its token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Auth`] if the backend refuses, or another error if
    /// the API request fails.
    #[instrument(skip(self), fields(region_id = %region_id))]
    pub async fn guest_login(&self, region_id: &RegionId) -> Result<TokenPair, ApiError> {
        let variables = GuestLoginVariables {
            region_id: region_id.to_string(),
        };

        let data = retry_with_backoff(&self.inner.retry, || {
            self.send::<GuestLogin>(variables.clone(), false)
        })
        .await?;
        let tokens = convert_auth_result(data.guest_login)?;

        self.inner
            .session
            .store_guest_token(&tokens.access_token, region_id);
        info!("Started guest session");

        Ok(tokens)
    }

    /// Exchange a refresh token for new tokens. Does not store them.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Auth`] if the refresh token is rejected, or another
    /// error if the API request fails.
    #[instrument(skip_all)]
    pub async fn refresh_token(&self, refresh_token: &SecretString) -> Result<TokenPair, ApiError> {
        let variables = RefreshTokenVariables {
            refresh_token: refresh_token.expose_secret().to_string(),
        };

        let data = retry_with_backoff(&self.inner.retry, || {
            self.send::<RefreshToken>(variables.clone(), false)
        })
        .await?;
        convert_auth_result(data.refresh_token)
    }

    /// Forget the user's tokens and cached data. The guest session is kept.
    pub fn logout(&self) {
        self.inner.session.clear_user_tokens();
        self.inner.cache.invalidate_all();
        info!("Logged out");
    }

    /// Switch the visitor's region.
    ///
    /// The guest token is bound to a region, so it is dropped together with
    /// cached data; the next request starts a guest session for the new region.
    pub fn select_region(&self, region: &Region) {
        let session = &self.inner.session;
        session.set_selected_region(region);
        if session.token_region_id().as_ref() != Some(&region.id) {
            session.clear_guest_token();
        }
        self.inner.cache.invalidate_all();
        info!(region_id = %region.id, "Selected region");
    }
}

impl<S: KeyValueStore> CartApi for ApiClient<S> {
    async fn fetch_cart(&self) -> Result<CartUnified, ApiError> {
        self.cart().await
    }

    async fn set_quantity(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Option<CartUnified>, ApiError> {
        self.update_cart_item_quantity(product_id, quantity).await
    }
}

fn convert_graphql_error(e: graphql_client::Error) -> GraphQLError {
    let code = e
        .extensions
        .as_ref()
        .and_then(|ext| ext.get("code"))
        .and_then(|code| code.as_str())
        .map(str::to_string);

    GraphQLError {
        message: e.message,
        locations: e.locations.map_or_else(Vec::new, |locs| {
            locs.into_iter()
                .map(|l| GraphQLErrorLocation {
                    line: i64::from(l.line),
                    column: i64::from(l.column),
                })
                .collect()
        }),
        path: e.path.map_or_else(Vec::new, |p| {
            p.into_iter()
                .map(|fragment| match fragment {
                    graphql_client::PathFragment::Key(s) => serde_json::Value::String(s),
                    graphql_client::PathFragment::Index(i) => serde_json::Value::Number(i.into()),
                })
                .collect()
        }),
        code,
    }
}
