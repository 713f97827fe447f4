//! Test support for the Pomelo storefront client.
//!
//! Provides an in-process fake of the order-management backend and a
//! [`TestRig`] that wires the cart store, checkout orchestrator, and order
//! classifier against it, so the tests in `tests/` exercise the real
//! lifecycle logic without a network.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use pomelo_client::cache::CacheStore;
use pomelo_client::cart::CartStore;
use pomelo_client::checkout::CheckoutOrchestrator;
use pomelo_client::gateway::{GatewayError, OrderGateway};
use pomelo_client::orders::OrderClassifier;
use pomelo_client::profile::ProfileDirectory;
use pomelo_client::types::{CartLine, Order, OrderRequest, Product, UserProfile};
use pomelo_core::{CartItemId, OrderId, OrderStatus, ProductId, UserId};

/// Money helper: an amount in cents.
#[must_use]
pub fn dec(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Catalog product helper.
#[must_use]
pub fn product(id: i32, price_cents: i64) -> Product {
    Product {
        id: ProductId::new(id),
        name: format!("product-{id}"),
        unit_price: dec(price_cents),
        image_url: None,
    }
}

// =============================================================================
// FakeGateway
// =============================================================================

/// In-process stand-in for the order-management backend.
///
/// Orders created through it land in an internal map so later lookups see
/// them; knobs control failure injection and call latency.
#[derive(Default)]
pub struct FakeGateway {
    remote_cart: Mutex<Vec<CartLine>>,
    orders: Mutex<HashMap<OrderId, Order>>,
    all_ids: Mutex<Vec<OrderId>>,
    ongoing_ids: Mutex<Vec<OrderId>>,
    next_order_id: AtomicI32,
    fail_create: AtomicBool,
    fail_confirm: AtomicBool,
    create_delay: Mutex<Option<Duration>>,
    create_calls: AtomicUsize,
    confirmed: Mutex<Vec<(OrderId, Decimal)>>,
}

impl FakeGateway {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_order_id: AtomicI32::new(100),
            ..Self::default()
        }
    }

    /// Seed the remote cart returned by hydration.
    pub fn seed_remote_cart(&self, lines: Vec<CartLine>) {
        *lock(&self.remote_cart) = lines;
    }

    /// Seed an order and its membership in the user's ID lists.
    pub fn seed_order(&self, order: Order, ongoing: bool) {
        lock(&self.all_ids).push(order.id);
        if ongoing {
            lock(&self.ongoing_ids).push(order.id);
        }
        lock(&self.orders).insert(order.id, order);
    }

    /// Register an already-created order as ongoing for the user, without
    /// touching the order map.
    pub fn seed_ongoing_id(&self, order_id: OrderId) {
        lock(&self.all_ids).push(order_id);
        lock(&self.ongoing_ids).push(order_id);
    }

    /// Register an ID in the user's history with no backing order, so its
    /// resolution fails.
    pub fn seed_ghost_id(&self, order_id: OrderId) {
        lock(&self.all_ids).push(order_id);
    }

    /// Make subsequent order creations fail with a 503.
    pub fn fail_next_creates(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    /// Make subsequent payment confirmations fail with a 503.
    pub fn fail_next_confirms(&self) {
        self.fail_confirm.store(true, Ordering::SeqCst);
    }

    /// Let order creation succeed again.
    pub fn allow_creates(&self) {
        self.fail_create.store(false, Ordering::SeqCst);
    }

    /// Let payment confirmation succeed again.
    pub fn allow_confirms(&self) {
        self.fail_confirm.store(false, Ordering::SeqCst);
    }

    /// Delay order creation, to widen race windows under test.
    pub fn delay_creates(&self, delay: Duration) {
        *lock(&self.create_delay) = Some(delay);
    }

    /// How many order creations were attempted.
    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Every confirmed payment, in order.
    #[must_use]
    pub fn confirmed_payments(&self) -> Vec<(OrderId, Decimal)> {
        lock(&self.confirmed).clone()
    }
}

#[async_trait]
impl OrderGateway for FakeGateway {
    async fn cart_for_user(&self, _user_id: UserId) -> Result<Vec<CartLine>, GatewayError> {
        Ok(lock(&self.remote_cart).clone())
    }

    async fn remove_cart_item(&self, item_id: CartItemId) -> Result<(), GatewayError> {
        lock(&self.remote_cart).retain(|l| l.remote_id != Some(item_id));
        Ok(())
    }

    async fn create_order(
        &self,
        user_id: UserId,
        request: &OrderRequest,
    ) -> Result<Order, GatewayError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *lock(&self.create_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_create.load(Ordering::SeqCst) {
            return Err(GatewayError::Api {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }

        let order = Order {
            id: OrderId::new(self.next_order_id.fetch_add(1, Ordering::SeqCst)),
            user_id,
            shipping_address: request.shipping_address.clone(),
            status: OrderStatus::Pending,
            total_amount: request.total_amount,
            payment_id: None,
        };
        lock(&self.orders).insert(order.id, order.clone());
        Ok(order)
    }

    async fn order_by_id(&self, order_id: OrderId) -> Result<Order, GatewayError> {
        lock(&self.orders)
            .get(&order_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(order_id.to_string()))
    }

    async fn order_ids_by_user(&self, _user_id: UserId) -> Result<Vec<OrderId>, GatewayError> {
        Ok(lock(&self.all_ids).clone())
    }

    async fn ongoing_order_ids_by_user(
        &self,
        _user_id: UserId,
    ) -> Result<Vec<OrderId>, GatewayError> {
        Ok(lock(&self.ongoing_ids).clone())
    }

    async fn confirm_payment(
        &self,
        order_id: OrderId,
        amount: Decimal,
    ) -> Result<(), GatewayError> {
        if self.fail_confirm.load(Ordering::SeqCst) {
            return Err(GatewayError::Api {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }
        lock(&self.confirmed).push((order_id, amount));
        if let Some(order) = lock(&self.orders).get_mut(&order_id) {
            order.status = OrderStatus::Paid;
        }
        Ok(())
    }
}

// =============================================================================
// FakeProfiles
// =============================================================================

/// Canned profile source.
pub struct FakeProfiles {
    address_line1: String,
}

impl FakeProfiles {
    #[must_use]
    pub fn new() -> Self {
        Self {
            address_line1: "12 Main St".to_string(),
        }
    }

    /// A profile with no shipping address, for validation tests.
    #[must_use]
    pub fn without_address() -> Self {
        Self {
            address_line1: String::new(),
        }
    }
}

impl Default for FakeProfiles {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileDirectory for FakeProfiles {
    async fn profile_by_id(&self, _user_id: UserId) -> Result<UserProfile, GatewayError> {
        Ok(UserProfile {
            first_name: "Ada".to_string(),
            last_name: "Byron".to_string(),
            email: "ada@example.com".to_string(),
            address_line1: self.address_line1.clone(),
            address_line2: None,
            city: None,
            state: None,
            postal_code: None,
        })
    }
}

// =============================================================================
// TestRig
// =============================================================================

/// A fully wired client stack over the fake backend.
pub struct TestRig {
    pub gateway: Arc<FakeGateway>,
    pub cache: CacheStore,
    pub cart: Arc<CartStore>,
    pub orchestrator: CheckoutOrchestrator,
    pub classifier: OrderClassifier,
}

impl TestRig {
    /// Rig with an in-memory cache.
    #[must_use]
    pub fn new() -> Self {
        Self::over(CacheStore::in_memory(), Arc::new(FakeGateway::new()))
    }

    /// Rig over an existing cache store and gateway; used to model a
    /// second context sharing the same state.
    #[must_use]
    pub fn over(cache: CacheStore, gateway: Arc<FakeGateway>) -> Self {
        Self::build(cache, gateway, Arc::new(FakeProfiles::new()))
    }

    /// Rig with a profile source of the test's choosing.
    #[must_use]
    pub fn with_profiles(profiles: Arc<dyn ProfileDirectory>) -> Self {
        Self::build(CacheStore::in_memory(), Arc::new(FakeGateway::new()), profiles)
    }

    fn build(
        cache: CacheStore,
        gateway: Arc<FakeGateway>,
        profiles: Arc<dyn ProfileDirectory>,
    ) -> Self {
        let dyn_gateway: Arc<dyn OrderGateway> = Arc::clone(&gateway) as Arc<dyn OrderGateway>;
        let cart = Arc::new(
            CartStore::new(Arc::clone(&dyn_gateway), cache.handle())
                .unwrap_or_else(|e| panic!("cache seeded with unreadable cart: {e}")),
        );
        let orchestrator = CheckoutOrchestrator::new(
            Arc::clone(&dyn_gateway),
            profiles,
            Arc::clone(&cart),
            cache.handle(),
        );
        let classifier = OrderClassifier::new(dyn_gateway);
        Self {
            gateway,
            cache,
            cart,
            orchestrator,
            classifier,
        }
    }

    /// Put `quantity` of a product in the cart.
    pub async fn fill_cart(&self, id: i32, price_cents: i64, quantity: u32) {
        self.cart
            .add_line(&product(id, price_cents), quantity)
            .await
            .unwrap_or_else(|e| panic!("cart add failed: {e}"));
    }
}

impl Default for TestRig {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
