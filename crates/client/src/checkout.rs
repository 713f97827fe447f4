//! Checkout orchestration.
//!
//! Drives a cart through order creation and payment confirmation. The
//! orchestrator owns two pieces of state: an in-memory phase for display,
//! and the pending-order reference in the persistent cache, which is the
//! source of truth for "an order exists and is unpaid". The cache is
//! written atomically at each step, so a crash between order creation and
//! payment confirmation leaves a reference that the next session can
//! resume from.
//!
//! At most one submit or confirm runs at a time; a second caller gets a
//! consistency error instead of a second backend call.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rust_decimal::Decimal;
use tracing::{debug, instrument};

use pomelo_core::{OrderId, UserId};

use crate::cache::{CacheHandle, keys};
use crate::cart::CartStore;
use crate::error::{Result, StoreError};
use crate::gateway::OrderGateway;
use crate::profile::ProfileDirectory;
use crate::types::{CachedOrderReference, Order, OrderRequest};

/// Where a checkout currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutPhase {
    /// No checkout in progress.
    Idle,
    /// Gathering the snapshot and shipping address.
    Building,
    /// Order-creation call in flight.
    Submitting,
    /// Order created, payment not yet confirmed.
    AwaitingPayment,
    /// Payment confirmed; the flow is complete.
    Confirmed,
    /// The last step failed; the cart and any pending reference are
    /// preserved for retry or abandonment.
    Failed,
}

/// Orchestrates order creation and payment confirmation.
pub struct CheckoutOrchestrator {
    gateway: Arc<dyn OrderGateway>,
    profiles: Arc<dyn ProfileDirectory>,
    cart: Arc<CartStore>,
    cache: CacheHandle,
    in_flight: AtomicBool,
    phase: std::sync::Mutex<CheckoutPhase>,
}

/// Releases the in-flight slot when the operation finishes, however it
/// finishes.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl CheckoutOrchestrator {
    /// Create an orchestrator over the given collaborators.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn OrderGateway>,
        profiles: Arc<dyn ProfileDirectory>,
        cart: Arc<CartStore>,
        cache: CacheHandle,
    ) -> Self {
        Self {
            gateway,
            profiles,
            cart,
            cache,
            in_flight: AtomicBool::new(false),
            phase: std::sync::Mutex::new(CheckoutPhase::Idle),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> CheckoutPhase {
        *lock(&self.phase)
    }

    /// The created-but-unpaid order this session (or a previous one) left
    /// behind, if any.
    ///
    /// # Errors
    ///
    /// Returns a consistency error if the cached reference no longer
    /// deserializes.
    pub fn pending_order(&self) -> Result<Option<CachedOrderReference>> {
        let Some(order) = self.cache.get::<Order>(keys::ORDER_DETAILS)? else {
            return Ok(None);
        };
        let cached_total: Decimal = self
            .cache
            .get(keys::CACHED_TOTAL)?
            .ok_or_else(|| {
                StoreError::Consistency("order reference present without a cached total".to_string())
            })?;
        Ok(Some(CachedOrderReference {
            order_id: order.id,
            cached_total,
        }))
    }

    /// Create an order from the current cart.
    ///
    /// Takes a snapshot of the cart, resolves the shipping address from the
    /// user's profile, and submits the order. On success the order
    /// reference and its total are cached, and the cart is cleared, all in
    /// one cache transaction. On failure the cart and cache are untouched.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Validation`] if the cart is empty or the profile has
    ///   no shipping address.
    /// - [`StoreError::Consistency`] if a submit or confirm is already in
    ///   flight, or an order is already awaiting payment.
    /// - [`StoreError::Transient`] if a backend call fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn submit_order(&self, user_id: UserId) -> Result<Order> {
        let _guard = self.try_begin()?;

        if self.pending_order()?.is_some() {
            return Err(StoreError::Consistency(
                "an order is already awaiting payment".to_string(),
            ));
        }

        self.set_phase(CheckoutPhase::Building);
        let snapshot = self.cart.snapshot().await;
        if snapshot.is_empty() {
            self.set_phase(CheckoutPhase::Failed);
            return Err(StoreError::Validation(
                "cannot create an order from an empty cart".to_string(),
            ));
        }
        let profile = self
            .profiles
            .profile_by_id(user_id)
            .await
            .map_err(StoreError::from_gateway)
            .inspect_err(|_| self.set_phase(CheckoutPhase::Failed))?;
        let shipping_address = profile.shipping_address();
        if shipping_address.is_empty() {
            self.set_phase(CheckoutPhase::Failed);
            return Err(StoreError::Validation(
                "profile has no shipping address".to_string(),
            ));
        }

        let request = OrderRequest::from_snapshot(user_id, shipping_address, &snapshot);

        self.set_phase(CheckoutPhase::Submitting);
        let order = self
            .gateway
            .create_order(user_id, &request)
            .await
            .map_err(StoreError::from_gateway)
            .inspect_err(|_| self.set_phase(CheckoutPhase::Failed))?;

        // Record the reference and drop the cart together, or not at all.
        // The total cached for confirmation is the one the request agreed
        // to, not whatever figure the backend echoes back.
        self.cache.transaction(|txn| {
            txn.put(keys::ORDER_DETAILS, &order)?;
            txn.put(keys::CACHED_TOTAL, &request.total_amount)?;
            txn.remove(keys::CART);
            Ok(())
        })?;
        self.cart.reload_from_cache().await?;

        self.set_phase(CheckoutPhase::AwaitingPayment);
        debug!(order_id = %order.id, total = %order.total_amount, "order awaiting payment");
        Ok(order)
    }

    /// Confirm payment for the pending order.
    ///
    /// The amount charged is the total cached at order-creation time, never
    /// a recomputed one; the two cannot drift apart. On success the pending
    /// reference is removed in one cache transaction.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Consistency`] if no order is awaiting payment or a
    ///   submit or confirm is already in flight.
    /// - [`StoreError::Transient`] if the backend call fails; the reference
    ///   stays cached so the confirmation can be retried.
    #[instrument(skip(self))]
    pub async fn confirm_payment(&self) -> Result<OrderId> {
        let _guard = self.try_begin()?;

        let Some(reference) = self.pending_order()? else {
            return Err(StoreError::Consistency(
                "no order awaiting payment".to_string(),
            ));
        };

        // A failed confirmation keeps the reference and the phase; the
        // caller retries against the same cached total.
        self.gateway
            .confirm_payment(reference.order_id, reference.cached_total)
            .await
            .map_err(StoreError::from_gateway)?;

        self.cache.transaction(|txn| {
            txn.remove(keys::ORDER_DETAILS);
            txn.remove(keys::CACHED_TOTAL);
            Ok(())
        })?;

        self.set_phase(CheckoutPhase::Confirmed);
        debug!(order_id = %reference.order_id, "payment confirmed");
        Ok(reference.order_id)
    }

    /// Abandon the current checkout.
    ///
    /// Drops any pending order reference from the cache and returns to
    /// [`CheckoutPhase::Idle`]. The remote order, if one was created, is
    /// left for the backend's own expiry handling.
    ///
    /// # Errors
    ///
    /// Returns a consistency error if the cache write-through fails.
    #[instrument(skip(self))]
    pub fn abandon(&self) -> Result<()> {
        self.cache.transaction(|txn| {
            txn.remove(keys::ORDER_DETAILS);
            txn.remove(keys::CACHED_TOTAL);
            Ok(())
        })?;
        self.set_phase(CheckoutPhase::Idle);
        Ok(())
    }

    fn try_begin(&self) -> Result<FlightGuard<'_>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Acquire)
            .is_ok()
        {
            Ok(FlightGuard(&self.in_flight))
        } else {
            Err(StoreError::Consistency(
                "a checkout operation is already in flight".to_string(),
            ))
        }
    }

    fn set_phase(&self, phase: CheckoutPhase) {
        *lock(&self.phase) = phase;
    }
}

fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use pomelo_core::{CartItemId, OrderStatus, ProductId};

    use crate::cache::CacheStore;
    use crate::gateway::GatewayError;
    use crate::types::{CartLine, Product, UserProfile};

    struct FakeGateway {
        create_calls: AtomicUsize,
        fail_create: bool,
        markup: Decimal,
        confirmed: Mutex<Vec<(OrderId, Decimal)>>,
    }

    impl FakeGateway {
        fn new() -> Self {
            Self {
                create_calls: AtomicUsize::new(0),
                fail_create: false,
                markup: Decimal::ZERO,
                confirmed: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                fail_create: true,
                ..Self::new()
            }
        }

        /// Returns orders whose total differs from the requested one, the
        /// way a backend applying tax or repricing would.
        fn repricing(markup: Decimal) -> Self {
            Self {
                markup,
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl OrderGateway for FakeGateway {
        async fn cart_for_user(
            &self,
            _user_id: UserId,
        ) -> std::result::Result<Vec<CartLine>, GatewayError> {
            Ok(Vec::new())
        }

        async fn remove_cart_item(
            &self,
            _item_id: CartItemId,
        ) -> std::result::Result<(), GatewayError> {
            Ok(())
        }

        async fn create_order(
            &self,
            user_id: UserId,
            request: &OrderRequest,
        ) -> std::result::Result<Order, GatewayError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_create {
                return Err(GatewayError::Api {
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            Ok(Order {
                id: OrderId::new(77),
                user_id,
                shipping_address: request.shipping_address.clone(),
                status: OrderStatus::Pending,
                total_amount: request.total_amount + self.markup,
                payment_id: None,
            })
        }

        async fn order_by_id(
            &self,
            _order_id: OrderId,
        ) -> std::result::Result<Order, GatewayError> {
            Err(GatewayError::Parse("not under test".to_string()))
        }

        async fn order_ids_by_user(
            &self,
            _user_id: UserId,
        ) -> std::result::Result<Vec<OrderId>, GatewayError> {
            Ok(Vec::new())
        }

        async fn ongoing_order_ids_by_user(
            &self,
            _user_id: UserId,
        ) -> std::result::Result<Vec<OrderId>, GatewayError> {
            Ok(Vec::new())
        }

        async fn confirm_payment(
            &self,
            order_id: OrderId,
            amount: Decimal,
        ) -> std::result::Result<(), GatewayError> {
            lock(&self.confirmed).push((order_id, amount));
            Ok(())
        }
    }

    struct FakeProfiles;

    #[async_trait]
    impl ProfileDirectory for FakeProfiles {
        async fn profile_by_id(
            &self,
            _user_id: UserId,
        ) -> std::result::Result<UserProfile, GatewayError> {
            Ok(UserProfile {
                first_name: "Ada".to_string(),
                last_name: "Byron".to_string(),
                email: "ada@example.com".to_string(),
                address_line1: "12 Main St".to_string(),
                address_line2: None,
                city: None,
                state: None,
                postal_code: None,
            })
        }
    }

    fn dec(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    fn rig(gateway: Arc<FakeGateway>) -> (CheckoutOrchestrator, Arc<CartStore>, CacheStore) {
        let cache_store = CacheStore::in_memory();
        let cart = Arc::new(
            CartStore::new(
                Arc::clone(&gateway) as Arc<dyn OrderGateway>,
                cache_store.handle(),
            )
            .unwrap(),
        );
        let orchestrator = CheckoutOrchestrator::new(
            gateway,
            Arc::new(FakeProfiles),
            Arc::clone(&cart),
            cache_store.handle(),
        );
        (orchestrator, cart, cache_store)
    }

    async fn fill_cart(cart: &CartStore) {
        cart.add_line(
            &Product {
                id: ProductId::new(1),
                name: "Shirt".to_string(),
                unit_price: dec(2000),
                image_url: None,
            },
            2,
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_submit_empty_cart_is_validation_error() {
        let (orchestrator, _cart, _store) = rig(Arc::new(FakeGateway::new()));
        let err = orchestrator.submit_order(UserId::new(9)).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(orchestrator.phase(), CheckoutPhase::Failed);
    }

    #[tokio::test]
    async fn test_submit_caches_reference_and_clears_cart() {
        let gateway = Arc::new(FakeGateway::new());
        let (orchestrator, cart, cache_store) = rig(Arc::clone(&gateway));
        fill_cart(&cart).await;

        let order = orchestrator.submit_order(UserId::new(9)).await.unwrap();

        assert_eq!(order.total_amount, dec(4000));
        assert_eq!(orchestrator.phase(), CheckoutPhase::AwaitingPayment);
        assert!(cart.cart().await.is_empty());

        let handle = cache_store.handle();
        let cached: Option<crate::types::Cart> = handle.get(keys::CART).unwrap();
        assert_eq!(cached, None);
        let reference = orchestrator.pending_order().unwrap().unwrap();
        assert_eq!(reference.order_id, OrderId::new(77));
        assert_eq!(reference.cached_total, dec(4000));
    }

    #[tokio::test]
    async fn test_failed_create_preserves_cart_and_leaves_no_reference() {
        let gateway = Arc::new(FakeGateway::failing());
        let (orchestrator, cart, _store) = rig(Arc::clone(&gateway));
        fill_cart(&cart).await;

        let err = orchestrator.submit_order(UserId::new(9)).await.unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(orchestrator.phase(), CheckoutPhase::Failed);
        assert!(!cart.cart().await.is_empty());
        assert!(orchestrator.pending_order().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_submit_with_pending_order_is_consistency_error() {
        let gateway = Arc::new(FakeGateway::new());
        let (orchestrator, cart, _store) = rig(Arc::clone(&gateway));
        fill_cart(&cart).await;

        orchestrator.submit_order(UserId::new(9)).await.unwrap();
        fill_cart(&cart).await;
        let err = orchestrator.submit_order(UserId::new(9)).await.unwrap_err();

        assert!(matches!(err, StoreError::Consistency(_)));
        assert_eq!(gateway.create_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_confirm_charges_cached_total() {
        let gateway = Arc::new(FakeGateway::new());
        let (orchestrator, cart, _store) = rig(Arc::clone(&gateway));
        fill_cart(&cart).await;

        orchestrator.submit_order(UserId::new(9)).await.unwrap();
        let order_id = orchestrator.confirm_payment().await.unwrap();

        assert_eq!(order_id, OrderId::new(77));
        assert_eq!(orchestrator.phase(), CheckoutPhase::Confirmed);
        let confirmed = lock(&gateway.confirmed);
        assert_eq!(confirmed.as_slice(), &[(OrderId::new(77), dec(4000))]);
    }

    #[tokio::test]
    async fn test_cached_total_is_the_requested_one_not_the_backends() {
        let gateway = Arc::new(FakeGateway::repricing(dec(999)));
        let (orchestrator, cart, _store) = rig(Arc::clone(&gateway));
        fill_cart(&cart).await;

        let order = orchestrator.submit_order(UserId::new(9)).await.unwrap();
        assert_eq!(order.total_amount, dec(4999), "backend repriced");

        let reference = orchestrator.pending_order().unwrap().unwrap();
        assert_eq!(reference.cached_total, dec(4000));

        orchestrator.confirm_payment().await.unwrap();
        let confirmed = lock(&gateway.confirmed);
        assert_eq!(confirmed.as_slice(), &[(OrderId::new(77), dec(4000))]);
    }

    #[tokio::test]
    async fn test_double_confirm_is_consistency_error() {
        let gateway = Arc::new(FakeGateway::new());
        let (orchestrator, cart, _store) = rig(Arc::clone(&gateway));
        fill_cart(&cart).await;

        orchestrator.submit_order(UserId::new(9)).await.unwrap();
        orchestrator.confirm_payment().await.unwrap();
        let err = orchestrator.confirm_payment().await.unwrap_err();

        assert!(matches!(err, StoreError::Consistency(_)));
        assert_eq!(lock(&gateway.confirmed).len(), 1);
    }

    #[tokio::test]
    async fn test_confirm_without_order_is_consistency_error() {
        let (orchestrator, _cart, _store) = rig(Arc::new(FakeGateway::new()));
        let err = orchestrator.confirm_payment().await.unwrap_err();
        assert!(matches!(err, StoreError::Consistency(_)));
    }

    #[tokio::test]
    async fn test_abandon_drops_reference_and_resets_phase() {
        let gateway = Arc::new(FakeGateway::new());
        let (orchestrator, cart, _store) = rig(Arc::clone(&gateway));
        fill_cart(&cart).await;

        orchestrator.submit_order(UserId::new(9)).await.unwrap();
        orchestrator.abandon().unwrap();

        assert_eq!(orchestrator.phase(), CheckoutPhase::Idle);
        assert!(orchestrator.pending_order().unwrap().is_none());
    }
}
