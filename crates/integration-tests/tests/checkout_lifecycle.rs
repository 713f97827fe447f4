//! End-to-end checkout lifecycle tests over the fake backend.
//!
//! Exercise the full path from cart to confirmed payment, including the
//! failure modes: backend outages, duplicate submissions, and resumed
//! sessions.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use pomelo_client::StoreError;
use pomelo_client::cache::CacheStore;
use pomelo_client::checkout::CheckoutPhase;
use pomelo_core::UserId;
use pomelo_integration_tests::{FakeGateway, FakeProfiles, TestRig, dec};

fn user() -> UserId {
    UserId::new(9)
}

// =============================================================================
// Happy Path
// =============================================================================

#[tokio::test]
async fn test_checkout_happy_path() {
    let rig = TestRig::new();
    rig.fill_cart(1, 2000, 2).await;

    let order = rig.orchestrator.submit_order(user()).await.unwrap();
    assert_eq!(order.total_amount, dec(4000));
    assert_eq!(rig.orchestrator.phase(), CheckoutPhase::AwaitingPayment);
    assert!(rig.cart.cart().await.is_empty(), "cart clears on submit");

    let order_id = rig.orchestrator.confirm_payment().await.unwrap();
    assert_eq!(order_id, order.id);
    assert_eq!(rig.orchestrator.phase(), CheckoutPhase::Confirmed);
    assert_eq!(rig.gateway.confirmed_payments(), vec![(order.id, dec(4000))]);
    assert!(rig.orchestrator.pending_order().unwrap().is_none());
}

#[tokio::test]
async fn test_confirm_charges_total_cached_at_creation() {
    let rig = TestRig::new();
    rig.fill_cart(1, 2000, 2).await;

    let order = rig.orchestrator.submit_order(user()).await.unwrap();

    // Anything added after submission must not change the charge.
    rig.fill_cart(2, 99_999, 5).await;
    rig.orchestrator.confirm_payment().await.unwrap();

    assert_eq!(rig.gateway.confirmed_payments(), vec![(order.id, dec(4000))]);
}

// =============================================================================
// Failure Modes
// =============================================================================

#[tokio::test]
async fn test_failed_create_preserves_cart_and_caches_nothing() {
    let rig = TestRig::new();
    rig.fill_cart(1, 2000, 2).await;
    rig.gateway.fail_next_creates();

    let err = rig.orchestrator.submit_order(user()).await.unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(rig.cart.cart().await.lines.len(), 1);
    assert!(rig.orchestrator.pending_order().unwrap().is_none());

    // Retry once the backend recovers.
    rig.gateway.allow_creates();
    let order = rig.orchestrator.submit_order(user()).await.unwrap();
    assert_eq!(order.total_amount, dec(4000));
}

#[tokio::test]
async fn test_failed_confirm_keeps_reference_for_retry() {
    let rig = TestRig::new();
    rig.fill_cart(1, 2000, 2).await;
    let order = rig.orchestrator.submit_order(user()).await.unwrap();

    rig.gateway.fail_next_confirms();
    let err = rig.orchestrator.confirm_payment().await.unwrap_err();
    assert!(err.is_retryable());
    assert!(rig.orchestrator.pending_order().unwrap().is_some());

    rig.gateway.allow_confirms();
    let order_id = rig.orchestrator.confirm_payment().await.unwrap();
    assert_eq!(order_id, order.id);
}

#[tokio::test]
async fn test_concurrent_submits_create_exactly_one_order() {
    let rig = TestRig::new();
    rig.fill_cart(1, 2000, 2).await;
    rig.gateway.delay_creates(Duration::from_millis(50));

    let (first, second) = tokio::join!(
        rig.orchestrator.submit_order(user()),
        rig.orchestrator.submit_order(user()),
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    let loser = outcomes.iter().find(|r| r.is_err()).unwrap();
    assert!(matches!(
        loser.as_ref().unwrap_err(),
        StoreError::Consistency(_)
    ));
    assert_eq!(rig.gateway.create_calls(), 1);
}

#[tokio::test]
async fn test_double_confirm_charges_once() {
    let rig = TestRig::new();
    rig.fill_cart(1, 2000, 2).await;
    rig.orchestrator.submit_order(user()).await.unwrap();

    rig.orchestrator.confirm_payment().await.unwrap();
    let err = rig.orchestrator.confirm_payment().await.unwrap_err();

    assert!(matches!(err, StoreError::Consistency(_)));
    assert_eq!(rig.gateway.confirmed_payments().len(), 1);
}

#[tokio::test]
async fn test_submit_without_shipping_address_is_rejected() {
    let rig = TestRig::with_profiles(Arc::new(FakeProfiles::without_address()));
    rig.fill_cart(1, 2000, 1).await;

    let err = rig.orchestrator.submit_order(user()).await.unwrap_err();

    assert!(matches!(err, StoreError::Validation(_)));
    assert_eq!(rig.gateway.create_calls(), 0);
    assert_eq!(rig.cart.cart().await.lines.len(), 1);
}

// =============================================================================
// Session Resumption
// =============================================================================

#[tokio::test]
async fn test_pending_order_survives_restart() {
    let path =
        std::env::temp_dir().join(format!("pomelo-lifecycle-{}.json", uuid::Uuid::new_v4()));
    let gateway = Arc::new(FakeGateway::new());

    let order = {
        let rig = TestRig::over(CacheStore::open(&path).unwrap(), Arc::clone(&gateway));
        rig.fill_cart(1, 2000, 2).await;
        rig.orchestrator.submit_order(user()).await.unwrap()
    };

    // A fresh stack over the same cache file resumes the checkout.
    let rig = TestRig::over(CacheStore::open(&path).unwrap(), gateway);
    let reference = rig.orchestrator.pending_order().unwrap().unwrap();
    assert_eq!(reference.order_id, order.id);
    assert_eq!(reference.cached_total, dec(4000));

    let order_id = rig.orchestrator.confirm_payment().await.unwrap();
    assert_eq!(order_id, order.id);

    std::fs::remove_file(&path).ok();
}
