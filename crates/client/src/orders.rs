//! Order history classification.
//!
//! The backend exposes two ID lists per user: every order with a recorded
//! payment, and the subset still being fulfilled. Completed orders are the
//! set difference. The IDs are resolved to full orders concurrently; a
//! single failed resolution does not sink the batch, it is reported next
//! to the orders that did resolve.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, instrument};

use pomelo_core::{OrderId, UserId};

use crate::error::{Result, StoreError};
use crate::gateway::OrderGateway;
use crate::types::Order;

/// One resolved bucket of the history, with the IDs that failed to
/// resolve.
#[derive(Debug, Default)]
pub struct ResolvedOrders {
    /// Resolved orders, in backend list order.
    pub orders: Vec<Order>,
    /// Orders whose resolution failed, with the reason.
    pub failed: Vec<(OrderId, StoreError)>,
}

/// A user's order history, split by fulfillment state.
#[derive(Debug, Default)]
pub struct ClassifiedOrders {
    /// Orders still being fulfilled, in backend list order.
    pub ongoing: Vec<Order>,
    /// Delivered orders, in backend list order.
    pub completed: Vec<Order>,
    /// Orders whose resolution failed, with the reason.
    pub failed: Vec<(OrderId, StoreError)>,
}

impl ClassifiedOrders {
    /// Whether every order resolved.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Splits a user's paid orders into ongoing and completed.
pub struct OrderClassifier {
    gateway: Arc<dyn OrderGateway>,
}

impl OrderClassifier {
    /// Create a classifier over the given gateway.
    #[must_use]
    pub fn new(gateway: Arc<dyn OrderGateway>) -> Self {
        Self { gateway }
    }

    /// Orders still being fulfilled for the user.
    ///
    /// # Errors
    ///
    /// Returns a transient error if the ongoing ID list cannot be fetched.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn ongoing_orders(&self, user_id: UserId) -> Result<ResolvedOrders> {
        let ids = self.ongoing_ids(user_id).await?;
        let (orders, failed) = self.resolve(ids).await;
        Ok(ResolvedOrders { orders, failed })
    }

    /// Delivered orders: everything with a payment minus the ongoing set.
    ///
    /// # Errors
    ///
    /// Returns a transient error if either ID list cannot be fetched.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn completed_orders(&self, user_id: UserId) -> Result<ResolvedOrders> {
        let ids = self.completed_ids(user_id).await?;
        let (orders, failed) = self.resolve(ids).await;
        Ok(ResolvedOrders { orders, failed })
    }

    /// Fetch and classify the user's whole order history.
    ///
    /// The two ID lists are fetched first; either failing aborts the whole
    /// call. Individual order resolutions then run concurrently and fail
    /// independently.
    ///
    /// # Errors
    ///
    /// Returns a transient error if either ID list cannot be fetched.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn classify(&self, user_id: UserId) -> Result<ClassifiedOrders> {
        let ongoing_ids = self.ongoing_ids(user_id).await?;
        let all = self
            .gateway
            .order_ids_by_user(user_id)
            .await
            .map_err(StoreError::from_gateway)?;
        let completed_ids = subtract(all, &ongoing_ids);

        let (ongoing, mut failed) = self.resolve(ongoing_ids).await;
        let (completed, completed_failed) = self.resolve(completed_ids).await;
        failed.extend(completed_failed);

        debug!(
            ongoing = ongoing.len(),
            completed = completed.len(),
            failed = failed.len(),
            "order history classified"
        );
        Ok(ClassifiedOrders {
            ongoing,
            completed,
            failed,
        })
    }

    async fn ongoing_ids(&self, user_id: UserId) -> Result<Vec<OrderId>> {
        let ids = self
            .gateway
            .ongoing_order_ids_by_user(user_id)
            .await
            .map_err(StoreError::from_gateway)?;
        Ok(dedupe(ids))
    }

    async fn completed_ids(&self, user_id: UserId) -> Result<Vec<OrderId>> {
        let ongoing = self.ongoing_ids(user_id).await?;
        let all = self
            .gateway
            .order_ids_by_user(user_id)
            .await
            .map_err(StoreError::from_gateway)?;
        Ok(subtract(all, &ongoing))
    }

    /// Resolve IDs to orders concurrently, keeping partial results.
    async fn resolve(&self, ids: Vec<OrderId>) -> (Vec<Order>, Vec<(OrderId, StoreError)>) {
        let lookups = ids.into_iter().map(|id| {
            let gateway = Arc::clone(&self.gateway);
            async move { (id, gateway.order_by_id(id).await) }
        });

        let mut orders = Vec::new();
        let mut failed = Vec::new();
        for (id, result) in join_all(lookups).await {
            match result {
                Ok(order) => orders.push(order),
                Err(e) => failed.push((id, StoreError::from_gateway(e))),
            }
        }
        (orders, failed)
    }
}

/// Remove duplicate IDs, keeping first occurrences in order.
fn dedupe(ids: Vec<OrderId>) -> Vec<OrderId> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

/// Everything in `all` that is not in `ongoing`, deduped, order kept.
fn subtract(all: Vec<OrderId>, ongoing: &[OrderId]) -> Vec<OrderId> {
    let ongoing: HashSet<OrderId> = ongoing.iter().copied().collect();
    dedupe(
        all.into_iter()
            .filter(|id| !ongoing.contains(id))
            .collect(),
    )
}
