//! Order history classification tests over the fake backend.

#![allow(clippy::unwrap_used)]

use std::collections::HashSet;

use pomelo_client::types::Order;
use pomelo_core::{OrderId, OrderStatus, UserId};
use pomelo_integration_tests::{TestRig, dec};

fn order(id: i32, status: OrderStatus) -> Order {
    Order {
        id: OrderId::new(id),
        user_id: UserId::new(9),
        shipping_address: "12 Main St".to_string(),
        status,
        total_amount: dec(1000),
        payment_id: None,
    }
}

#[tokio::test]
async fn test_ongoing_and_completed_partition_the_history() {
    let rig = TestRig::new();
    rig.gateway.seed_order(order(1, OrderStatus::Completed), false);
    rig.gateway.seed_order(order(2, OrderStatus::OnDelivery), true);
    rig.gateway.seed_order(order(3, OrderStatus::Paid), true);
    rig.gateway.seed_order(order(4, OrderStatus::Completed), false);

    let classified = rig.classifier.classify(UserId::new(9)).await.unwrap();

    assert!(classified.is_complete());
    let ongoing: HashSet<OrderId> = classified.ongoing.iter().map(|o| o.id).collect();
    let completed: HashSet<OrderId> = classified.completed.iter().map(|o| o.id).collect();

    assert!(ongoing.is_disjoint(&completed));
    let mut union: Vec<OrderId> = ongoing.union(&completed).copied().collect();
    union.sort();
    assert_eq!(
        union,
        vec![OrderId::new(1), OrderId::new(2), OrderId::new(3), OrderId::new(4)]
    );
    assert_eq!(ongoing, HashSet::from([OrderId::new(2), OrderId::new(3)]));
}

#[tokio::test]
async fn test_confirmed_checkout_shows_up_as_paid() {
    let rig = TestRig::new();
    rig.fill_cart(1, 2000, 2).await;

    let created = rig.orchestrator.submit_order(UserId::new(9)).await.unwrap();
    rig.orchestrator.confirm_payment().await.unwrap();
    // The fake backend holds the created order; list it as ongoing.
    rig.gateway.seed_ongoing_id(created.id);

    let classified = rig.classifier.classify(UserId::new(9)).await.unwrap();
    assert_eq!(classified.ongoing.len(), 1);
    assert_eq!(classified.ongoing[0].id, created.id);
    assert_eq!(classified.ongoing[0].status, OrderStatus::Paid);
}

#[tokio::test]
async fn test_unresolvable_order_reported_next_to_partial_results() {
    let rig = TestRig::new();
    rig.gateway.seed_order(order(1, OrderStatus::Completed), false);
    rig.gateway.seed_ghost_id(OrderId::new(2));

    let classified = rig.classifier.classify(UserId::new(9)).await.unwrap();

    assert_eq!(classified.completed.len(), 1);
    assert!(!classified.is_complete());
    assert_eq!(classified.failed.len(), 1);
    assert_eq!(classified.failed[0].0, OrderId::new(2));
}
