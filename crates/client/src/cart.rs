//! Local-first cart store.
//!
//! The cart of record lives in memory and is written through to the
//! persistent cache under [`keys::CART`] on every successful mutation. The
//! write-through happens before the in-memory commit, so a failed persist
//! leaves the cart exactly as it was. The remote cart is consulted only at
//! hydration and when removing a line that the backend also holds.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{instrument, warn};

use pomelo_core::{ProductId, UserId};

use crate::cache::{CacheHandle, keys};
use crate::error::{Result, StoreError};
use crate::gateway::OrderGateway;
use crate::types::{Cart, CartLine, CartSnapshot, Product};

/// Cart store with cache write-through.
pub struct CartStore {
    gateway: Arc<dyn OrderGateway>,
    cache: CacheHandle,
    state: Mutex<Cart>,
}

impl CartStore {
    /// Create a cart store, restoring any cart the cache holds.
    ///
    /// # Errors
    ///
    /// Returns a consistency error if the cached cart no longer
    /// deserializes.
    pub fn new(gateway: Arc<dyn OrderGateway>, cache: CacheHandle) -> Result<Self> {
        let cart: Cart = cache.get(keys::CART)?.unwrap_or_default();
        Ok(Self {
            gateway,
            cache,
            state: Mutex::new(cart),
        })
    }

    /// Current cart contents.
    pub async fn cart(&self) -> Cart {
        self.state.lock().await.clone()
    }

    /// Immutable copy of the cart for order creation.
    pub async fn snapshot(&self) -> CartSnapshot {
        CartSnapshot::from(&*self.state.lock().await)
    }

    /// Load the user's cart, cache first.
    ///
    /// A non-empty local cart wins without a remote call; otherwise the
    /// remote cart is fetched and adopted. A user with no cart anywhere
    /// simply gets an empty one.
    ///
    /// # Errors
    ///
    /// Returns a transient error if the remote fetch is needed and fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn load(&self, user_id: UserId) -> Result<Cart> {
        {
            let state = self.state.lock().await;
            if !state.is_empty() {
                return Ok(state.clone());
            }
        }
        self.hydrate(user_id).await?;
        Ok(self.cart().await)
    }

    /// Replace the local cart with the user's remote cart.
    ///
    /// Called on sign-in: whatever the backend holds for the user becomes
    /// the cart of record.
    ///
    /// # Errors
    ///
    /// Returns a transient error if the backend call fails; the local cart
    /// is untouched on failure.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn hydrate(&self, user_id: UserId) -> Result<()> {
        let lines = self
            .gateway
            .cart_for_user(user_id)
            .await
            .map_err(StoreError::from_gateway)?;

        let mut state = self.state.lock().await;
        let next = Cart {
            owner: Some(user_id),
            lines,
        };
        self.cache.put(keys::CART, &next)?;
        *state = next;
        Ok(())
    }

    /// Add a product to the cart.
    ///
    /// A quantity below 1 is clamped to 1. Adding a product already in the
    /// cart increases that line's quantity instead of creating a second
    /// line.
    ///
    /// # Errors
    ///
    /// Returns a consistency error if the cache write-through fails.
    #[instrument(skip(self, product), fields(product_id = %product.id, quantity))]
    pub async fn add_line(&self, product: &Product, quantity: u32) -> Result<()> {
        let quantity = quantity.max(1);

        let mut state = self.state.lock().await;
        let mut next = state.clone();
        if let Some(line) = next.line_mut(product.id) {
            line.quantity = line.quantity.saturating_add(quantity);
        } else {
            next.lines.push(CartLine {
                product_id: product.id,
                name: product.name.clone(),
                unit_price: product.unit_price,
                quantity,
                image_url: product.image_url.clone(),
                remote_id: None,
            });
        }

        self.cache.put(keys::CART, &next)?;
        *state = next;
        Ok(())
    }

    /// Set the quantity of an existing line.
    ///
    /// A quantity below 1 is clamped to 1; removal is a separate,
    /// deliberate operation.
    ///
    /// # Errors
    ///
    /// Returns a validation error if no line exists for the product.
    #[instrument(skip(self), fields(product_id = %product_id, quantity))]
    pub async fn set_quantity(&self, product_id: ProductId, quantity: u32) -> Result<()> {
        let quantity = quantity.max(1);

        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let Some(line) = next.line_mut(product_id) else {
            return Err(StoreError::Validation(format!(
                "no cart line for product {product_id}"
            )));
        };
        line.quantity = quantity;

        self.cache.put(keys::CART, &next)?;
        *state = next;
        Ok(())
    }

    /// Remove a line from the cart.
    ///
    /// If the line was hydrated from the remote cart, the backend copy is
    /// deleted too. A failed remote delete is reported as a transient error
    /// but the local removal stands; the remote cart is reconciled at the
    /// next hydration.
    ///
    /// # Errors
    ///
    /// Returns a validation error if no line exists for the product, or a
    /// transient error if the remote delete fails after the local removal
    /// has committed.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_line(&self, product_id: ProductId) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(position) = state.lines.iter().position(|l| l.product_id == product_id) else {
            return Err(StoreError::Validation(format!(
                "no cart line for product {product_id}"
            )));
        };

        let mut next = state.clone();
        let removed = next.lines.remove(position);

        self.cache.put(keys::CART, &next)?;
        *state = next;
        drop(state);

        if let Some(remote_id) = removed.remote_id {
            self.gateway
                .remove_cart_item(remote_id)
                .await
                .inspect_err(|e| {
                    warn!(item_id = %remote_id, error = %e, "remote cart item delete failed");
                })
                .map_err(StoreError::from_gateway)?;
        }
        Ok(())
    }

    /// Empty the cart and drop its cache entry.
    ///
    /// # Errors
    ///
    /// Returns a consistency error if the cache write-through fails.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        self.cache.remove(keys::CART)?;
        *state = Cart::empty(state.owner);
        Ok(())
    }

    /// The cache handle this store writes through. Clones share the
    /// store's context ID, so events it emits are recognizable as its own.
    pub(crate) fn cache_handle(&self) -> CacheHandle {
        self.cache.clone()
    }

    /// Replace the in-memory cart with whatever the cache holds.
    ///
    /// Used by the synchronizer when another context committed a cart
    /// change.
    ///
    /// # Errors
    ///
    /// Returns a consistency error if the cached cart no longer
    /// deserializes.
    pub async fn reload_from_cache(&self) -> Result<()> {
        let cached: Cart = self.cache.get(keys::CART)?.unwrap_or_default();
        let mut state = self.state.lock().await;
        *state = cached;
        Ok(())
    }
}
