//! Synchronization controller: the cart container's only writer.
//!
//! Bridges the pure [`reduce`] function to the remote Cart Service and to
//! the authentication lifecycle.
//!
//! # Write-through
//!
//! Every mutation calls the Cart Service first and dispatches its transition
//! only after the service confirms. A failed or timed-out call leaves the
//! lines exactly as they were; only `last_error` records the failure.
//!
//! # Concurrency
//!
//! Overlapping calls are allowed and never queued. Each completion applies
//! the single transition for its own action against the latest snapshot, so
//! two updates to the same product resolve by completion order.
//!
//! Signing out starts a new session. A call that completes after that is
//! reported but never applied, so a signed-out cart stays empty.
//!
//! # Example
//!
//! ```rust,ignore
//! let controller = Arc::new(CartController::from_config(service, identity.clone(), &config));
//! tokio::spawn({
//!     let controller = Arc::clone(&controller);
//!     async move { controller.run_auth_lifecycle().await }
//! });
//!
//! match controller.add_item(&product).await {
//!     Err(CartError::Unauthenticated) => redirect_to_login(),
//!     Err(other) => show_error(&other),
//!     Ok(_) => render(&controller.snapshot()),
//! }
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use cartwright_core::{ProductKey, ProductRef};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::config::CartConfig;
use crate::error::{CartError, Result, SyncOutcome, add_breadcrumb, report_service_error};
use crate::identity::IdentityProvider;
use crate::notify::{CartNotifier, Notice, TracingNotifier};
use crate::reducer::{CartAction, CartSnapshot, reduce};
use crate::service::{Ack, CartService, ServiceError};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// What an authentication change did to the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthTransition {
    /// Signed in: the cart was reloaded from the service.
    SignedIn(SyncOutcome),
    /// Signed out: the local cart was forgotten.
    SignedOut,
    /// No edge; nothing happened.
    Unchanged,
}

/// Client-side cart state container.
///
/// Construct one per session. The snapshot is published through a `watch`
/// channel so any number of views can observe it; only this controller
/// writes to it.
pub struct CartController<S, I>
where
    S: CartService,
    I: IdentityProvider,
{
    service: S,
    identity: I,
    notifier: Arc<dyn CartNotifier>,
    state: watch::Sender<CartSnapshot>,
    in_flight: AtomicUsize,
    /// Bumped by every logout; calls from an older session are not applied.
    session: AtomicU64,
    request_timeout: Duration,
}

impl<S, I> CartController<S, I>
where
    S: CartService,
    I: IdentityProvider,
{
    /// Create a controller with an empty cart.
    #[must_use]
    pub fn new(service: S, identity: I) -> Self {
        let (state, _receiver) = watch::channel(CartSnapshot::default());
        Self {
            service,
            identity,
            notifier: Arc::new(TracingNotifier),
            state,
            in_flight: AtomicUsize::new(0),
            session: AtomicU64::new(0),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Create a controller using the configured request timeout.
    #[must_use]
    pub fn from_config(service: S, identity: I, config: &CartConfig) -> Self {
        Self::new(service, identity).with_request_timeout(config.request_timeout)
    }

    /// Replace the notice sink.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn CartNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Bound every Cart Service call by `timeout`.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    // =========================================================================
    // Read access
    // =========================================================================

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver notified after every transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.state.subscribe()
    }

    /// Whether the product identified by `key` is in the cart.
    #[must_use]
    pub fn is_in_cart(&self, key: &ProductKey) -> bool {
        self.state.borrow().contains(key)
    }

    /// Quantity of the product identified by `key`, zero when absent.
    #[must_use]
    pub fn item_quantity(&self, key: &ProductKey) -> u32 {
        self.state.borrow().quantity_of(key)
    }

    // =========================================================================
    // Cart Service operations
    // =========================================================================

    /// Replace the local cart with the service's view.
    ///
    /// Does nothing while signed out. On failure the previous lines are kept
    /// and `last_error` is set. A load that completes after a logout is
    /// discarded and reported as `Skipped`.
    #[instrument(skip(self))]
    pub async fn load_cart(&self) -> SyncOutcome {
        if !self.identity.is_authenticated() {
            debug!("Not authenticated, skipping cart load");
            return SyncOutcome::Skipped;
        }

        let session = self.session.load(Ordering::SeqCst);
        let _sync = self.begin_sync();
        match self.call(self.service.get_cart()).await {
            Ok(payload) => {
                let received = payload.len();
                if !self.dispatch_in_session(session, CartAction::LoadCart(payload)) {
                    debug!("Signed out while loading, discarding cart");
                    return SyncOutcome::Skipped;
                }
                let kept = self.state.borrow().lines.len();
                if kept < received {
                    warn!(
                        received,
                        kept, "Dropped or merged malformed cart lines from the service"
                    );
                }
                info!(lines = kept, "Cart loaded");
                SyncOutcome::Applied
            }
            Err(error) => self.fail(session, "load_cart", &error, false),
        }
    }

    /// Same as [`load_cart`](Self::load_cart).
    pub async fn refresh_cart(&self) -> SyncOutcome {
        self.load_cart().await
    }

    /// Add one unit of `product`.
    ///
    /// # Errors
    ///
    /// - `CartError::Unauthenticated` when signed out (no call is made)
    /// - `CartError::InvalidProduct` when the product has no identifier (no
    ///   call is made)
    #[instrument(skip(self, product), fields(product_key = tracing::field::Empty))]
    pub async fn add_item(&self, product: &ProductRef) -> Result<SyncOutcome> {
        self.require_auth()?;
        let Some(key) = product.canonical_key() else {
            let error = CartError::InvalidProduct("product has no identifier".to_string());
            warn!(error = %error, "Refusing to add product");
            self.notifier
                .notify(Notice::error("This product can't be added to the cart"));
            return Err(error);
        };
        tracing::Span::current().record("product_key", key.as_str());

        let label = product.name.as_deref().unwrap_or("Item");
        Ok(self
            .write_through(
                "add_item",
                Some(&key),
                self.service.add_to_cart(&key, 1),
                CartAction::AddItem(product.clone()),
                Some(format!("{label} added to cart")),
            )
            .await)
    }

    /// Remove the line for `key`.
    ///
    /// # Errors
    ///
    /// - `CartError::Unauthenticated` when signed out
    /// - `CartError::InvalidProduct` when `key` is empty
    #[instrument(skip(self), fields(product_key = %key))]
    pub async fn remove_item(&self, key: &ProductKey) -> Result<SyncOutcome> {
        self.require_auth()?;
        self.require_key(key)?;

        Ok(self
            .write_through(
                "remove_item",
                Some(key),
                self.service.remove_item(key),
                CartAction::RemoveItem(key.clone()),
                Some("Item removed from cart".to_string()),
            )
            .await)
    }

    /// Set the quantity for `key`.
    ///
    /// Zero and negative quantities are rejected: removals go through
    /// [`remove_item`](Self::remove_item).
    ///
    /// # Errors
    ///
    /// - `CartError::Unauthenticated` when signed out
    /// - `CartError::InvalidProduct` when `key` is empty
    /// - `CartError::InvalidQuantity` when `quantity` is not a positive
    ///   integer that fits the service's range
    #[instrument(skip(self), fields(product_key = %key))]
    pub async fn update_quantity(&self, key: &ProductKey, quantity: i64) -> Result<SyncOutcome> {
        self.require_auth()?;
        self.require_key(key)?;
        let wire_quantity = u32::try_from(quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or(CartError::InvalidQuantity(quantity))?;

        Ok(self
            .write_through(
                "update_quantity",
                Some(key),
                self.service.update_quantity(key, wire_quantity),
                CartAction::UpdateQuantity(key.clone(), quantity),
                None,
            )
            .await)
    }

    /// Empty the cart on the service, then locally.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Unauthenticated` when signed out.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<SyncOutcome> {
        self.require_auth()?;

        Ok(self
            .write_through(
                "clear_cart",
                None,
                self.service.clear_cart(),
                CartAction::ClearCart,
                Some("Cart cleared".to_string()),
            )
            .await)
    }

    /// Forget the local cart without calling the service.
    ///
    /// The server-side cart persists with the account. Calls still in
    /// flight complete against the service but are not applied locally.
    pub fn logout_cleanup(&self) {
        self.state.send_modify(|snapshot| {
            self.session.fetch_add(1, Ordering::SeqCst);
            *snapshot = reduce(snapshot, CartAction::ClearCart);
        });
        info!("Cart cleared after sign-out");
    }

    // =========================================================================
    // Authentication lifecycle
    // =========================================================================

    /// React to one observed change of the authentication flag.
    ///
    /// Signing in reloads the cart once; signing out forgets it once. Equal
    /// values are not an edge.
    pub async fn apply_auth_transition(&self, was: bool, now: bool) -> AuthTransition {
        match (was, now) {
            (false, true) => AuthTransition::SignedIn(self.load_cart().await),
            (true, false) => {
                self.logout_cleanup();
                AuthTransition::SignedOut
            }
            _ => AuthTransition::Unchanged,
        }
    }

    /// Follow the Identity Provider until it goes away.
    ///
    /// Loads the cart immediately when already signed in, then applies
    /// [`apply_auth_transition`](Self::apply_auth_transition) to every
    /// change. Run it on its own task.
    pub async fn run_auth_lifecycle(&self) {
        let mut receiver = self.identity.subscribe();
        let mut current = *receiver.borrow_and_update();
        if current {
            self.load_cart().await;
        }

        while receiver.changed().await.is_ok() {
            let next = *receiver.borrow_and_update();
            let transition = self.apply_auth_transition(current, next).await;
            debug!(?transition, "Authentication changed");
            current = next;
        }

        debug!("Identity provider closed, auth lifecycle finished");
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn require_key(&self, key: &ProductKey) -> Result<()> {
        if key.is_empty() {
            let error = CartError::InvalidProduct("empty product key".to_string());
            warn!(error = %error, "Refusing cart mutation");
            self.notifier
                .notify(Notice::error("This product can't be found in the cart"));
            Err(error)
        } else {
            Ok(())
        }
    }

    fn require_auth(&self) -> Result<()> {
        if self.identity.is_authenticated() {
            Ok(())
        } else {
            debug!("Cart mutation attempted without a session");
            Err(CartError::Unauthenticated)
        }
    }

    /// Apply `action` unless a logout happened since `session` was read.
    ///
    /// The session check and the write share the lock `logout_cleanup`
    /// takes when it starts a new session.
    fn dispatch_in_session(&self, session: u64, action: CartAction) -> bool {
        debug!(action = action.name(), "Dispatching cart action");
        let mut applied = false;
        self.state.send_if_modified(|snapshot| {
            if self.session.load(Ordering::SeqCst) != session {
                return false;
            }
            *snapshot = reduce(snapshot, action);
            applied = true;
            true
        });
        applied
    }

    /// Run a service call under the request timeout.
    async fn call<T>(
        &self,
        request: impl Future<Output = std::result::Result<T, ServiceError>>,
    ) -> std::result::Result<T, ServiceError> {
        tokio::time::timeout(self.request_timeout, request)
            .await
            .map_err(|_| ServiceError::Timeout(self.request_timeout))?
    }

    /// Call the service, then apply `on_success` only if it confirmed.
    async fn write_through(
        &self,
        operation: &'static str,
        key: Option<&ProductKey>,
        request: impl Future<Output = std::result::Result<Ack, ServiceError>>,
        on_success: CartAction,
        success_notice: Option<String>,
    ) -> SyncOutcome {
        let session = self.session.load(Ordering::SeqCst);
        let _sync = self.begin_sync();
        let result = self
            .call(request)
            .await
            .and_then(Ack::into_result);

        match result {
            Ok(()) => {
                if !self.dispatch_in_session(session, on_success) {
                    info!(operation, "Signed out before the Cart Service answered");
                    return SyncOutcome::Skipped;
                }
                match key {
                    Some(key) => add_breadcrumb(operation, Some(&[("product_key", key.as_str())])),
                    None => add_breadcrumb(operation, None),
                }
                if let Some(message) = success_notice {
                    self.notifier.notify(Notice::success(message));
                }
                SyncOutcome::Applied
            }
            Err(error) => self.fail(session, operation, &error, true),
        }
    }

    /// Record a service failure without touching the lines.
    ///
    /// Failures from a session that has since ended are only reported.
    fn fail(
        &self,
        session: u64,
        operation: &'static str,
        error: &ServiceError,
        toast: bool,
    ) -> SyncOutcome {
        report_service_error(operation, error);
        let message = error.user_message();
        let current =
            self.dispatch_in_session(session, CartAction::SetError(Some(message.clone())));
        if toast && current {
            self.notifier.notify(Notice::error(message.clone()));
        }
        SyncOutcome::Failed(message)
    }

    /// Count one more call in flight and raise `is_syncing`.
    ///
    /// The counter only changes under the snapshot's write lock, so the flag
    /// always agrees with it.
    fn begin_sync(&self) -> SyncGuard<'_, S, I> {
        self.state.send_modify(|snapshot| {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            *snapshot = reduce(snapshot, CartAction::SetLoading(true));
        });
        SyncGuard { controller: self }
    }

    fn end_sync(&self) {
        self.state.send_modify(|snapshot| {
            let remaining = self.in_flight.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
            *snapshot = reduce(snapshot, CartAction::SetLoading(remaining > 0));
        });
    }
}

/// Lowers `is_syncing` when the call finishes, including when the caller
/// drops the future mid-flight.
struct SyncGuard<'a, S, I>
where
    S: CartService,
    I: IdentityProvider,
{
    controller: &'a CartController<S, I>,
}

impl<S, I> Drop for SyncGuard<'_, S, I>
where
    S: CartService,
    I: IdentityProvider,
{
    fn drop(&mut self) {
        self.controller.end_sync();
    }
}

