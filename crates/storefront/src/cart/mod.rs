//! One cart for guests and signed-in users.
//!
//! [`CartReconciler`] exposes a single [`CartUnified`] view over two backing
//! stores:
//!
//! - **Guest**: a locally persisted list of lines ([`GuestCart`])
//! - **Server**: the remote cart, reached through [`CartApi`], with the last
//!   fetched cart kept for synchronous reads
//!
//! When a visitor signs in, guest lines are migrated into the server cart.
//! Lines that fail to move stay in the guest cart and are retried on the next
//! sign-in or refresh. Every mutating call raises exactly one notification:
//! success or error. Remote mutations of the same product run one at a time,
//! in the order they were issued.

mod guest;
mod quantity;
mod unified;

pub use guest::{GuestCart, GuestCartItem};
pub use quantity::adjust_quantity_by_multiplicity;
pub use unified::{CartItemUnified, CartUnified};

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::join_all;
use kron_core::{Product, ProductId};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::api::ApiError;
use crate::notify::{NotificationKind, Notifier};
use crate::storage::KeyValueStore;

/// Remote cart primitives.
pub trait CartApi: Send + Sync {
    /// Fetch the current server cart.
    fn fetch_cart(&self) -> impl Future<Output = Result<CartUnified, ApiError>> + Send;

    /// Set the absolute quantity of a product. Zero removes the line.
    ///
    /// Returns the updated cart, or `None` if the caller must refetch it.
    fn set_quantity(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> impl Future<Output = Result<Option<CartUnified>, ApiError>> + Send;
}

/// Cart operation errors.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("Cart API error: {0}")]
    Api(#[from] ApiError),
    #[error("Guest cart migration requires a signed-in user")]
    NotAuthenticated,
}

/// Which store currently backs the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartBacking {
    Guest,
    Server {
        /// Last cart the server confirmed, if any was fetched yet.
        cached: Option<CartUnified>,
    },
}

/// Outcome of a guest-to-server cart migration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Products now in the server cart and removed from the guest cart.
    pub migrated: Vec<ProductId>,
    /// Products that stay in the guest cart for a later attempt.
    pub failed: Vec<ProductId>,
}

impl MigrationReport {
    /// Whether nothing was left behind.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Resets the migration flag when a migration ends, however it ends.
struct MigrationGuard<'a>(&'a AtomicBool);

impl Drop for MigrationGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Unified cart over guest and server storage.
pub struct CartReconciler<A, S> {
    api: A,
    guest: GuestCart<S>,
    backing: Mutex<CartBacking>,
    notifier: Arc<Notifier>,
    product_locks: Mutex<HashMap<ProductId, Arc<tokio::sync::Mutex<()>>>>,
    migrating: AtomicBool,
}

impl<A, S> std::fmt::Debug for CartReconciler<A, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartReconciler")
            .field("backing", &*self.backing.lock().unwrap_or_else(PoisonError::into_inner))
            .field("migrating", &self.migrating.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl<A: CartApi, S: KeyValueStore> CartReconciler<A, S> {
    /// Create a reconciler in the guest state, loading the persisted guest cart.
    pub fn new(api: A, store: Arc<S>, notifier: Arc<Notifier>) -> Self {
        Self {
            api,
            guest: GuestCart::load(store),
            backing: Mutex::new(CartBacking::Guest),
            notifier,
            product_locks: Mutex::new(HashMap::new()),
            migrating: AtomicBool::new(false),
        }
    }

    /// The guest cart, whatever the current backing.
    #[must_use]
    pub const fn guest_cart(&self) -> &GuestCart<S> {
        &self.guest
    }

    #[must_use]
    pub fn backing(&self) -> CartBacking {
        self.lock_backing().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(*self.lock_backing(), CartBacking::Server { .. })
    }

    /// Current cart, without network access.
    ///
    /// Server-backed carts return the last confirmed cart, or an empty cart
    /// before the first fetch.
    #[must_use]
    pub fn cart(&self) -> CartUnified {
        match &*self.lock_backing() {
            CartBacking::Guest => self.guest.unified(),
            CartBacking::Server { cached } => cached.clone().unwrap_or_default(),
        }
    }

    /// Re-read the cart from its backing store.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cart cannot be fetched.
    ///
    /// Guest lines left over from an earlier, incomplete migration are
    /// migrated first.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<CartUnified, CartError> {
        if self.has_pending_migration() {
            self.migrate_guest_cart().await?;
        }
        self.reload().await
    }

    /// Follow a change of authentication state.
    ///
    /// Signing in switches to the server cart and migrates any guest lines;
    /// signing out switches back to the guest cart. Repeating the signed-in
    /// state retries the migration of guest lines still waiting, and otherwise
    /// does nothing. Returns the migration report when a migration ran.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cart cannot be fetched after sign-in.
    #[instrument(skip(self))]
    pub async fn set_authenticated(
        &self,
        authenticated: bool,
    ) -> Result<Option<MigrationReport>, CartError> {
        let signed_in = {
            let mut backing = self.lock_backing();
            let was_authenticated = matches!(*backing, CartBacking::Server { .. });
            match (was_authenticated, authenticated) {
                (false, true) => {
                    info!("Cart switching from guest to server");
                    *backing = CartBacking::Server { cached: None };
                    true
                }
                (true, false) => {
                    info!("Cart switching from server to guest");
                    *backing = CartBacking::Guest;
                    return Ok(None);
                }
                (false, false) => return Ok(None),
                (true, true) => false,
            }
        };

        if self.guest.is_empty() {
            if signed_in {
                self.reload().await?;
            }
            return Ok(None);
        }
        self.migrate_guest_cart().await.map(Some)
    }

    /// Move guest lines into the server cart.
    ///
    /// Each line is added on top of the quantity already in the server cart,
    /// in guest cart order. Lines that fail stay in the guest cart; the rest
    /// are removed from it. Concurrent calls and calls with an empty guest cart
    /// return an empty report without touching the server.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotAuthenticated`] in the guest state, or an API
    /// error if the server cart cannot be read before migrating.
    #[instrument(skip(self))]
    pub async fn migrate_guest_cart(&self) -> Result<MigrationReport, CartError> {
        if !self.is_authenticated() {
            return Err(CartError::NotAuthenticated);
        }
        if self.migrating.swap(true, Ordering::SeqCst) {
            debug!("Guest cart migration already running");
            return Ok(MigrationReport::default());
        }
        let _guard = MigrationGuard(&self.migrating);

        let items = self.guest.items();
        if items.is_empty() {
            return Ok(MigrationReport::default());
        }

        let mut server = match self.api.fetch_cart().await {
            Ok(cart) => cart,
            Err(e) => {
                error!(error = %e, "Failed to read server cart before migration");
                self.notifier.error("Could not move your cart to your account");
                return Err(e.into());
            }
        };

        let mut report = MigrationReport::default();
        for item in &items {
            let product = &item.product;
            let target = adjust_quantity_by_multiplicity(
                server
                    .quantity_of(product.id.as_str())
                    .saturating_add(item.quantity),
                product.quantity_step(),
            );

            let lock = self.product_lock(&product.id);
            let _held = lock.lock().await;
            match self.api.set_quantity(&product.id, target).await {
                Ok(updated) => {
                    debug!(product_id = %product.id, quantity = target, "Migrated cart line");
                    if let Some(cart) = updated {
                        server = cart;
                    }
                    report.migrated.push(product.id.clone());
                }
                Err(e) => {
                    warn!(product_id = %product.id, error = %e, "Failed to migrate cart line");
                    report.failed.push(product.id.clone());
                }
            }
        }

        self.guest
            .retain(|item| !report.migrated.contains(&item.product.id));

        if let Err(e) = self.reload().await {
            warn!(error = %e, "Failed to refetch cart after migration");
            self.store_server_cart(server);
        }

        info!(
            migrated = report.migrated.len(),
            failed = report.failed.len(),
            "Guest cart migration finished"
        );
        if report.failed.is_empty() {
            self.notifier.success("Your cart was moved to your account");
        } else if report.migrated.is_empty() {
            self.notifier.error("Could not move your cart to your account");
        } else {
            self.notifier.notify(
                NotificationKind::Warning,
                format!(
                    "{} of {} cart items could not be moved to your account",
                    report.failed.len(),
                    items.len()
                ),
            );
        }

        Ok(report)
    }

    /// Add `quantity` of `product`, snapped to its quantity step.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cart update fails.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add_to_cart(
        &self,
        product: &Product,
        quantity: u32,
    ) -> Result<CartUnified, CartError> {
        if !self.is_authenticated() {
            self.guest.add(product, quantity);
            self.notifier.success(format!("{} added to cart", product.name));
            return Ok(self.guest.unified());
        }

        let step = product.quantity_step();
        let added = adjust_quantity_by_multiplicity(quantity, step);

        let lock = self.product_lock(&product.id);
        let _held = lock.lock().await;

        let result = async {
            let current = self.server_cart().await?.quantity_of(product.id.as_str());
            let target = adjust_quantity_by_multiplicity(current.saturating_add(added), step);
            self.set_remote_quantity(&product.id, target).await
        }
        .await;

        self.finish(result, format!("{} added to cart", product.name))
    }

    /// Set the quantity of a line, snapped to its product's step.
    ///
    /// Zero removes the line. Products not in the cart and quantities that
    /// snap to the current one are left alone, without a notification.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cart update fails.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartUnified, CartError> {
        if quantity == 0 {
            return self.remove_from_cart(product_id).await;
        }

        if !self.is_authenticated() {
            if self.guest.set_quantity(product_id.as_str(), quantity) {
                self.notifier.success("Cart updated");
            } else {
                debug!("Quantity unchanged");
            }
            return Ok(self.guest.unified());
        }

        let lock = self.product_lock(product_id);
        let _held = lock.lock().await;

        let cart = match self.server_cart().await {
            Ok(cart) => cart,
            Err(e) => return self.finish(Err(e), "Cart updated"),
        };
        let Some(item) = cart.item(product_id.as_str()) else {
            debug!("Product not in cart");
            return Ok(cart);
        };
        let target = adjust_quantity_by_multiplicity(quantity, item.product.quantity_step());
        if target == item.quantity {
            debug!("Quantity unchanged");
            return Ok(cart);
        }

        let result = self.set_remote_quantity(product_id, target).await;
        self.finish(result, "Cart updated")
    }

    /// Remove a line. Removing a product that is not in the cart does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cart update fails.
    #[instrument(skip(self))]
    pub async fn remove_from_cart(&self, product_id: &ProductId) -> Result<CartUnified, CartError> {
        if !self.is_authenticated() {
            if self.guest.remove(product_id.as_str()) {
                self.notifier.success("Removed from cart");
            }
            return Ok(self.guest.unified());
        }

        let lock = self.product_lock(product_id);
        let _held = lock.lock().await;

        let cart = match self.server_cart().await {
            Ok(cart) => cart,
            Err(e) => return self.finish(Err(e), "Removed from cart"),
        };
        if cart.item(product_id.as_str()).is_none() {
            debug!("Product not in cart");
            return Ok(cart);
        }

        let result = self.set_remote_quantity(product_id, 0).await;
        self.finish(result, "Removed from cart")
    }

    /// Remove every line.
    ///
    /// Server lines are removed concurrently, then the cart is refetched.
    ///
    /// # Errors
    ///
    /// Returns the first error if any line cannot be removed.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<CartUnified, CartError> {
        if !self.is_authenticated() {
            self.guest.clear();
            self.notifier.success("Cart cleared");
            return Ok(self.guest.unified());
        }

        let cart = match self.server_cart().await {
            Ok(cart) => cart,
            Err(e) => return self.finish(Err(e), "Cart cleared"),
        };

        let removals = cart.items.iter().map(|item| async move {
            let product_id = &item.product.id;
            let lock = self.product_lock(product_id);
            let _held = lock.lock().await;
            self.api.set_quantity(product_id, 0).await
        });
        let first_error = join_all(removals)
            .await
            .into_iter()
            .find_map(Result::err);

        let refreshed = self.reload().await;
        let result = match (first_error, refreshed) {
            (Some(e), _) => Err(CartError::from(e)),
            (None, refreshed) => refreshed,
        };
        self.finish(result, "Cart cleared")
    }

    /// Raise the notification for a finished mutation and pass its result on.
    fn finish(
        &self,
        result: Result<CartUnified, CartError>,
        success: impl Into<String>,
    ) -> Result<CartUnified, CartError> {
        match &result {
            Ok(_) => {
                self.notifier.success(success);
            }
            Err(e) => {
                error!(error = %e, "Cart update failed");
                self.notifier.error("Could not update your cart");
            }
        }
        result
    }

    /// Fetch the server cart without touching the guest cart.
    async fn reload(&self) -> Result<CartUnified, CartError> {
        if !self.is_authenticated() {
            return Ok(self.guest.unified());
        }
        let cart = self.api.fetch_cart().await?;
        self.store_server_cart(cart.clone());
        Ok(cart)
    }

    /// Signed in with guest lines still waiting to be migrated.
    fn has_pending_migration(&self) -> bool {
        self.is_authenticated() && !self.guest.is_empty()
    }

    /// Cached server cart, fetched if none was confirmed yet.
    async fn server_cart(&self) -> Result<CartUnified, CartError> {
        let cached = match &*self.lock_backing() {
            CartBacking::Server { cached } => cached.clone(),
            CartBacking::Guest => None,
        };
        match cached {
            Some(cart) => Ok(cart),
            None => self.reload().await,
        }
    }

    /// Set a remote quantity and record the confirmed cart.
    async fn set_remote_quantity(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartUnified, CartError> {
        match self.api.set_quantity(product_id, quantity).await? {
            Some(cart) => {
                self.store_server_cart(cart.clone());
                Ok(cart)
            }
            None => self.reload().await,
        }
    }

    /// Record a server-confirmed cart, unless the visitor signed out meanwhile.
    fn store_server_cart(&self, cart: CartUnified) {
        if let CartBacking::Server { cached } = &mut *self.lock_backing() {
            *cached = Some(cart);
        }
    }

    fn product_lock(&self, product_id: &ProductId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .product_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(product_id.clone()).or_default())
    }

    fn lock_backing(&self) -> std::sync::MutexGuard<'_, CartBacking> {
        self.backing.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use kron_core::Price;

    use super::unified::tests::product;
    use super::*;
    use crate::notify::Notification;
    use crate::storage::MemoryStore;

    /// Scripted remote cart recording every mutation.
    #[derive(Default)]
    struct MockCartApi {
        lines: Mutex<Vec<CartItemUnified>>,
        calls: Mutex<Vec<(ProductId, u32)>>,
        fetches: Mutex<u32>,
        fetch_unavailable: Mutex<bool>,
        failing: Mutex<HashSet<ProductId>>,
        returns_cart: bool,
        delay: Option<Duration>,
    }

    impl MockCartApi {
        fn returning_cart() -> Self {
            Self {
                returns_cart: true,
                ..Self::default()
            }
        }

        fn fail_for(&self, id: &str) {
            self.failing.lock().unwrap().insert(ProductId::new(id));
        }

        fn seed(&self, product: Product, quantity: u32) {
            self.lines
                .lock()
                .unwrap()
                .push(CartItemUnified::new(product, quantity));
        }

        fn calls(&self) -> Vec<(ProductId, u32)> {
            self.calls.lock().unwrap().clone()
        }

        fn snapshot(&self) -> CartUnified {
            CartUnified::from_items(self.lines.lock().unwrap().clone())
        }
    }

    impl CartApi for Arc<MockCartApi> {
        async fn fetch_cart(&self) -> Result<CartUnified, ApiError> {
            *self.fetches.lock().unwrap() += 1;
            if *self.fetch_unavailable.lock().unwrap() {
                return Err(ApiError::Status {
                    status: 503,
                    body: "unavailable".into(),
                });
            }
            Ok(self.snapshot())
        }

        async fn set_quantity(
            &self,
            product_id: &ProductId,
            quantity: u32,
        ) -> Result<Option<CartUnified>, ApiError> {
            self.calls
                .lock()
                .unwrap()
                .push((product_id.clone(), quantity));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing.lock().unwrap().contains(product_id) {
                return Err(ApiError::Status {
                    status: 503,
                    body: "unavailable".into(),
                });
            }

            {
                let mut lines = self.lines.lock().unwrap();
                if let Some(line) = lines.iter_mut().find(|l| l.product.id == *product_id) {
                    line.quantity = quantity;
                } else {
                    lines.push(CartItemUnified::new(product(product_id.as_str(), 100), quantity));
                }
                lines.retain(|l| l.quantity > 0);
            }
            Ok(self.returns_cart.then(|| self.snapshot()))
        }
    }

    fn reconciler(
        api: &Arc<MockCartApi>,
    ) -> (
        CartReconciler<Arc<MockCartApi>, MemoryStore>,
        tokio::sync::broadcast::Receiver<Notification>,
    ) {
        let notifier = Arc::new(Notifier::new(Duration::ZERO));
        let rx = notifier.subscribe();
        let reconciler =
            CartReconciler::new(Arc::clone(api), Arc::new(MemoryStore::new()), notifier);
        (reconciler, rx)
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<Notification>) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = rx.try_recv() {
            out.push(n);
        }
        out
    }

    #[tokio::test]
    async fn test_guest_add_snaps_and_notifies_once() {
        let api = Arc::new(MockCartApi::default());
        let (cart, mut rx) = reconciler(&api);
        let mut bolts = product("bolts", 10);
        bolts.multiplicity = Some(3);

        let view = cart.add_to_cart(&bolts, 5).await.unwrap();
        assert_eq!(view.quantity_of("bolts"), 6);
        assert_eq!(drain(&mut rx).len(), 1);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_guest_update_noop_sends_no_notification() {
        let api = Arc::new(MockCartApi::default());
        let (cart, mut rx) = reconciler(&api);
        cart.add_to_cart(&product("a", 100), 2).await.unwrap();
        drain(&mut rx);

        cart.update_quantity(&ProductId::new("a"), 2).await.unwrap();
        cart.update_quantity(&ProductId::new("missing"), 4)
            .await
            .unwrap();
        assert!(drain(&mut rx).is_empty());

        let view = cart.update_quantity(&ProductId::new("a"), 0).await.unwrap();
        assert!(view.is_empty);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn test_migration_moves_guest_lines_once() {
        let api = Arc::new(MockCartApi::returning_cart());
        api.seed(product("a", 100), 1);
        let (cart, mut rx) = reconciler(&api);
        cart.add_to_cart(&product("a", 100), 2).await.unwrap();
        cart.add_to_cart(&product("b", 50), 1).await.unwrap();
        drain(&mut rx);

        let report = cart.set_authenticated(true).await.unwrap().unwrap();
        assert_eq!(report.migrated, [ProductId::new("a"), ProductId::new("b")]);
        assert!(report.is_complete());
        // Added on top of the server's existing quantity, in guest order
        assert_eq!(
            api.calls(),
            [(ProductId::new("a"), 3), (ProductId::new("b"), 1)]
        );
        assert!(cart.guest_cart().is_empty());
        assert_eq!(cart.cart().total_items, 4);
        assert_eq!(drain(&mut rx).len(), 1);

        // Second run is a no-op
        let again = cart.migrate_guest_cart().await.unwrap();
        assert_eq!(again, MigrationReport::default());
        assert_eq!(api.calls().len(), 2);

        // Repeating the sign-in does not migrate again
        assert!(cart.set_authenticated(true).await.unwrap().is_none());
        assert_eq!(api.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_partial_migration_keeps_failed_lines() {
        let api = Arc::new(MockCartApi::returning_cart());
        api.fail_for("b");
        let (cart, mut rx) = reconciler(&api);
        cart.add_to_cart(&product("a", 100), 1).await.unwrap();
        cart.add_to_cart(&product("b", 50), 1).await.unwrap();
        cart.add_to_cart(&product("c", 20), 1).await.unwrap();
        drain(&mut rx);

        let report = cart.set_authenticated(true).await.unwrap().unwrap();
        assert_eq!(report.migrated, [ProductId::new("a"), ProductId::new("c")]);
        assert_eq!(report.failed, [ProductId::new("b")]);

        let left: Vec<_> = cart
            .guest_cart()
            .items()
            .into_iter()
            .map(|item| item.product.id)
            .collect();
        assert_eq!(left, [ProductId::new("b")]);

        let notifications = drain(&mut rx);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications.first().unwrap().kind, NotificationKind::Warning);

        // The failed line goes through on the next attempt
        api.failing.lock().unwrap().clear();
        let retry = cart.migrate_guest_cart().await.unwrap();
        assert_eq!(retry.migrated, [ProductId::new("b")]);
        assert!(cart.guest_cart().is_empty());
    }

    #[tokio::test]
    async fn test_migration_requires_server_backing() {
        let api = Arc::new(MockCartApi::default());
        let (cart, _rx) = reconciler(&api);
        assert!(matches!(
            cart.migrate_guest_cart().await,
            Err(CartError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_server_add_reads_current_quantity() {
        let api = Arc::new(MockCartApi::default());
        api.seed(product("a", 100), 2);
        let (cart, _rx) = reconciler(&api);
        cart.set_authenticated(true).await.unwrap();

        // Mutation does not return the cart, so it is refetched
        let view = cart.add_to_cart(&product("a", 100), 1).await.unwrap();
        assert_eq!(api.calls(), [(ProductId::new("a"), 3)]);
        assert_eq!(view.quantity_of("a"), 3);
        assert_eq!(cart.cart(), view);
    }

    #[tokio::test]
    async fn test_server_update_noop_skips_network() {
        let api = Arc::new(MockCartApi::returning_cart());
        let mut bolts = product("bolts", 10);
        bolts.multiplicity = Some(5);
        api.seed(bolts, 10);
        let (cart, mut rx) = reconciler(&api);
        cart.set_authenticated(true).await.unwrap();

        cart.update_quantity(&ProductId::new("bolts"), 12)
            .await
            .unwrap();
        assert!(api.calls().is_empty());
        assert!(drain(&mut rx).is_empty());

        cart.update_quantity(&ProductId::new("bolts"), 13)
            .await
            .unwrap();
        assert_eq!(api.calls(), [(ProductId::new("bolts"), 15)]);
    }

    #[tokio::test]
    async fn test_server_failure_notifies_and_keeps_cache() {
        let api = Arc::new(MockCartApi::returning_cart());
        api.seed(product("a", 100), 1);
        api.fail_for("a");
        let (cart, mut rx) = reconciler(&api);
        cart.set_authenticated(true).await.unwrap();
        let before = cart.cart();

        let result = cart.update_quantity(&ProductId::new("a"), 4).await;
        assert!(matches!(result, Err(CartError::Api(_))));
        assert_eq!(cart.cart(), before);

        let notifications = drain(&mut rx);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications.first().unwrap().kind, NotificationKind::Error);
    }

    #[tokio::test]
    async fn test_clear_server_cart() {
        let api = Arc::new(MockCartApi::returning_cart());
        api.seed(product("a", 100), 1);
        api.seed(product("b", 50), 2);
        let (cart, mut rx) = reconciler(&api);
        cart.set_authenticated(true).await.unwrap();

        let view = cart.clear_cart().await.unwrap();
        assert!(view.is_empty);
        assert_eq!(view.total_price, Price::ZERO);
        assert_eq!(api.calls().len(), 2);
        assert!(api.calls().iter().all(|(_, q)| *q == 0));
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_product_updates_run_in_issue_order() {
        let api = Arc::new(MockCartApi {
            returns_cart: true,
            delay: Some(Duration::from_millis(50)),
            ..MockCartApi::default()
        });
        api.seed(product("a", 100), 1);
        let (cart, _rx) = reconciler(&api);
        cart.set_authenticated(true).await.unwrap();

        let id = ProductId::new("a");
        let (first, second) = tokio::join!(
            cart.update_quantity(&id, 2),
            cart.update_quantity(&id, 5)
        );
        first.unwrap();
        second.unwrap();

        assert_eq!(api.calls(), [(id.clone(), 2), (id, 5)]);
        assert_eq!(cart.cart().quantity_of("a"), 5);
    }

    #[tokio::test]
    async fn test_sign_out_returns_to_guest_cart() {
        let api = Arc::new(MockCartApi::returning_cart());
        api.seed(product("server", 100), 1);
        let (cart, _rx) = reconciler(&api);
        cart.set_authenticated(true).await.unwrap();
        assert_eq!(cart.cart().quantity_of("server"), 1);

        cart.set_authenticated(false).await.unwrap();
        assert_eq!(cart.backing(), CartBacking::Guest);
        assert!(cart.cart().is_empty);
    }

    #[tokio::test]
    async fn test_leftover_guest_lines_retried_on_repeated_sign_in() {
        let api = Arc::new(MockCartApi::returning_cart());
        api.fail_for("b");
        let (cart, _rx) = reconciler(&api);
        cart.add_to_cart(&product("a", 100), 1).await.unwrap();
        cart.add_to_cart(&product("b", 50), 1).await.unwrap();

        let first = cart.set_authenticated(true).await.unwrap().unwrap();
        assert_eq!(first.failed, [ProductId::new("b")]);
        assert_eq!(cart.cart().quantity_of("b"), 0);

        api.failing.lock().unwrap().clear();
        let second = cart.set_authenticated(true).await.unwrap().unwrap();
        assert_eq!(second.migrated, [ProductId::new("b")]);
        assert!(cart.guest_cart().is_empty());
        assert_eq!(cart.cart().quantity_of("b"), 1);

        // Nothing left to move
        assert!(cart.set_authenticated(true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refresh_retries_leftover_guest_lines() {
        let api = Arc::new(MockCartApi::returning_cart());
        api.fail_for("b");
        let (cart, _rx) = reconciler(&api);
        cart.add_to_cart(&product("b", 50), 2).await.unwrap();
        cart.set_authenticated(true).await.unwrap();
        assert!(!cart.guest_cart().is_empty());

        api.failing.lock().unwrap().clear();
        let view = cart.refresh().await.unwrap();
        assert_eq!(view.quantity_of("b"), 2);
        assert!(cart.guest_cart().is_empty());
        assert_eq!(
            api.calls(),
            [(ProductId::new("b"), 2), (ProductId::new("b"), 2)]
        );
    }

    #[tokio::test]
    async fn test_migration_runs_after_failed_server_read() {
        let api = Arc::new(MockCartApi::returning_cart());
        *api.fetch_unavailable.lock().unwrap() = true;
        let (cart, _rx) = reconciler(&api);
        cart.add_to_cart(&product("a", 100), 1).await.unwrap();

        assert!(matches!(
            cart.set_authenticated(true).await,
            Err(CartError::Api(_))
        ));
        assert!(cart.is_authenticated());
        assert!(api.calls().is_empty());

        *api.fetch_unavailable.lock().unwrap() = false;
        let report = cart.set_authenticated(true).await.unwrap().unwrap();
        assert_eq!(report.migrated, [ProductId::new("a")]);
        assert_eq!(cart.cart().quantity_of("a"), 1);
    }

    #[tokio::test]
    async fn test_server_remove_of_absent_product_is_noop() {
        let api = Arc::new(MockCartApi::returning_cart());
        api.seed(product("a", 100), 1);
        let (cart, mut rx) = reconciler(&api);
        cart.set_authenticated(true).await.unwrap();

        let view = cart
            .remove_from_cart(&ProductId::new("not-in-cart"))
            .await
            .unwrap();
        assert_eq!(view.quantity_of("a"), 1);
        assert!(api.calls().is_empty());
        assert!(drain(&mut rx).is_empty());

        let view = cart.remove_from_cart(&ProductId::new("a")).await.unwrap();
        assert!(view.is_empty);
        assert_eq!(api.calls(), [(ProductId::new("a"), 0)]);
        assert_eq!(drain(&mut rx).len(), 1);
    }
}
