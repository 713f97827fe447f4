//! HTTP client for the order-management backend.
//!
//! Uses `reqwest` with a shared connection pool. The cart/checkout
//! components depend on the [`OrderGateway`] trait rather than the concrete
//! client, so tests can substitute a fake backend.

pub mod wire;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use pomelo_core::{CartItemId, OrderId, OrderStatus, UserId};

use crate::config::ApiConfig;
use crate::types::{CartLine, Order, OrderRequest, PaymentMethod};
use wire::{
    CartItemDto, NewCartItemDto, OrderDto, OrderRequestDto, PaymentMethodDto, StatusUpdateDto,
    UpdateCartItemDto, convert_cart_item, convert_order,
};

// =============================================================================
// Errors
// =============================================================================

/// Errors that can occur when talking to the order-management backend.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Backend asked us to back off. The value is the `Retry-After`
    /// duration in seconds.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Failed to parse a response or build a request.
    #[error("parse error: {0}")]
    Parse(String),

    /// Backend returned an order status this client does not recognize.
    #[error("unrecognized order status: {0}")]
    UnknownStatus(String),
}

// =============================================================================
// OrderGateway
// =============================================================================

/// The backend surface the cart store, checkout orchestrator, and order
/// classifier consume.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Fetch the remote cart for a user.
    async fn cart_for_user(&self, user_id: UserId) -> Result<Vec<CartLine>, GatewayError>;

    /// Delete a cart item from the remote cart.
    async fn remove_cart_item(&self, item_id: CartItemId) -> Result<(), GatewayError>;

    /// Create an order from the given request.
    async fn create_order(
        &self,
        user_id: UserId,
        request: &OrderRequest,
    ) -> Result<Order, GatewayError>;

    /// Fetch a single order by ID.
    async fn order_by_id(&self, order_id: OrderId) -> Result<Order, GatewayError>;

    /// All order IDs that have a payment recorded for the user.
    async fn order_ids_by_user(&self, user_id: UserId) -> Result<Vec<OrderId>, GatewayError>;

    /// Order IDs for the user that are still in an ongoing state.
    async fn ongoing_order_ids_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<OrderId>, GatewayError>;

    /// Confirm payment for an order at the given amount.
    async fn confirm_payment(&self, order_id: OrderId, amount: Decimal)
    -> Result<(), GatewayError>;
}

// =============================================================================
// HttpOrderGateway
// =============================================================================

/// `reqwest`-backed implementation of [`OrderGateway`].
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct HttpOrderGateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpOrderGateway {
    /// Create a new gateway client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build or the API token is
    /// not a valid header value.
    pub fn new(config: &ApiConfig) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));

        if let Some(token) = &config.token {
            let auth_value = format!("Bearer {}", token.expose_secret());
            let mut value = HeaderValue::from_str(&auth_value)
                .map_err(|e| GatewayError::Parse(format!("invalid API token: {e}")))?;
            value.set_sensitive(true);
            headers.insert("Authorization", value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            inner: Arc::new(GatewayInner {
                client,
                base_url: config.base_url.clone(),
            }),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.inner
            .base_url
            .join(path)
            .map_err(|e| GatewayError::Parse(format!("invalid endpoint {path}: {e}")))
    }

    /// Map non-success statuses into errors, passing successes through.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(response.url().path().to_string()));
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(GatewayError::RateLimited(retry_after));
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Fetch the remote cart for a user.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response cannot be parsed.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn fetch_cart(&self, user_id: UserId) -> Result<Vec<CartLine>, GatewayError> {
        let url = self.endpoint(&format!("api/shoppingCart/{user_id}"))?;
        let response = self.inner.client.get(url).send().await?;
        let items: Vec<CartItemDto> = Self::check(response).await?.json().await?;

        debug!(count = items.len(), "fetched remote cart");
        Ok(items.into_iter().map(convert_cart_item).collect())
    }

    /// Add an item to the remote cart, returning the stored line with its
    /// backend-assigned ID.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self, line), fields(user_id = %user_id, product_id = %line.product_id))]
    pub async fn add_cart_item(
        &self,
        user_id: UserId,
        line: &CartLine,
    ) -> Result<CartLine, GatewayError> {
        let url = self.endpoint("api/shoppingCart/addItem")?;
        let body = NewCartItemDto {
            user_id,
            product_id: line.product_id,
            item_name: line.name.clone(),
            item_price: line.unit_price,
            item_quantity: line.quantity,
            image_url: line.image_url.clone(),
        };

        let response = self.inner.client.post(url).json(&body).send().await?;
        let stored: CartItemDto = Self::check(response).await?.json().await?;
        Ok(convert_cart_item(stored))
    }

    /// Update the quantity of a remote cart item.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn update_cart_item(
        &self,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<(), GatewayError> {
        let url = self.endpoint(&format!("api/shoppingCart/{item_id}"))?;
        let body = UpdateCartItemDto {
            updated_quantity: quantity,
        };

        let response = self.inner.client.put(url).json(&body).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Delete a cart item from the remote cart.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn delete_cart_item(&self, item_id: CartItemId) -> Result<(), GatewayError> {
        let url = self.endpoint(&format!("api/shoppingCart/{item_id}"))?;
        let response = self.inner.client.delete(url).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Create an order for a user.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the returned order carries an
    /// unrecognized status.
    #[instrument(skip(self, request), fields(user_id = %user_id, total = %request.total_amount))]
    pub async fn submit_order(
        &self,
        user_id: UserId,
        request: &OrderRequest,
    ) -> Result<Order, GatewayError> {
        let url = self.endpoint(&format!("api/order/createOrder/{user_id}"))?;
        let body = OrderRequestDto::from(request);

        let response = self.inner.client.post(url).json(&body).send().await?;
        let dto: OrderDto = Self::check(response).await?.json().await?;
        let order = convert_order(dto)?;

        debug!(order_id = %order.id, "order created");
        Ok(order)
    }

    /// Fetch a single order by ID.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the order carries an
    /// unrecognized status.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn fetch_order(&self, order_id: OrderId) -> Result<Order, GatewayError> {
        let url = self.endpoint(&format!("api/order/{order_id}"))?;
        let response = self.inner.client.get(url).send().await?;
        let dto: OrderDto = Self::check(response).await?.json().await?;
        convert_order(dto)
    }

    /// Fetch every order in the system. Administrative.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or any order carries an
    /// unrecognized status.
    #[instrument(skip(self))]
    pub async fn fetch_all_orders(&self) -> Result<Vec<Order>, GatewayError> {
        let url = self.endpoint("api/order/")?;
        let response = self.inner.client.get(url).send().await?;
        let dtos: Vec<OrderDto> = Self::check(response).await?.json().await?;
        dtos.into_iter().map(convert_order).collect()
    }

    /// Delete an order. Administrative.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn delete_order(&self, order_id: OrderId) -> Result<(), GatewayError> {
        let mut url = self.endpoint("api/order/deleteOrder")?;
        url.query_pairs_mut()
            .append_pair("orderId", &order_id.to_string());

        let response = self.inner.client.delete(url).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Advance an order to a new status. Administrative.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self), fields(order_id = %order_id, status = %status))]
    pub async fn update_order_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<(), GatewayError> {
        let url = self.endpoint(&format!("api/order/{order_id}"))?;
        let body = StatusUpdateDto {
            order_id,
            order_status: status.to_string(),
        };

        let response = self.inner.client.put(url).json(&body).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// Confirm payment for an order at the given amount.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self), fields(order_id = %order_id, amount = %amount))]
    pub async fn confirm_order_payment(
        &self,
        order_id: OrderId,
        amount: Decimal,
    ) -> Result<(), GatewayError> {
        let mut url = self.endpoint("payments/confirm")?;
        url.query_pairs_mut()
            .append_pair("orderId", &order_id.to_string())
            .append_pair("amount", &amount.to_string());

        let response = self.inner.client.post(url).send().await?;
        Self::check(response).await?;

        debug!(order_id = %order_id, "payment confirmed");
        Ok(())
    }

    /// Save a payment method for later use.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self, method))]
    pub async fn save_payment_method(&self, method: &PaymentMethod) -> Result<(), GatewayError> {
        let url = self.endpoint("payments/methods")?;
        let body = PaymentMethodDto::from(method);

        let response = self.inner.client.post(url).json(&body).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    /// All order IDs with a recorded payment for the user.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn fetch_paid_order_ids(&self, user_id: UserId) -> Result<Vec<OrderId>, GatewayError> {
        let url = self.endpoint(&format!("payments/orders/{user_id}"))?;
        let response = self.inner.client.get(url).send().await?;
        let ids: Vec<OrderId> = Self::check(response).await?.json().await?;
        Ok(ids)
    }

    /// Order IDs for the user that are still being fulfilled.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn fetch_ongoing_order_ids(
        &self,
        user_id: UserId,
    ) -> Result<Vec<OrderId>, GatewayError> {
        let url = self.endpoint(&format!("payments/delivery-orders/{user_id}"))?;
        let response = self.inner.client.get(url).send().await?;
        let ids: Vec<OrderId> = Self::check(response).await?.json().await?;
        Ok(ids)
    }
}

#[async_trait]
impl OrderGateway for HttpOrderGateway {
    async fn cart_for_user(&self, user_id: UserId) -> Result<Vec<CartLine>, GatewayError> {
        self.fetch_cart(user_id).await
    }

    async fn remove_cart_item(&self, item_id: CartItemId) -> Result<(), GatewayError> {
        self.delete_cart_item(item_id).await
    }

    async fn create_order(
        &self,
        user_id: UserId,
        request: &OrderRequest,
    ) -> Result<Order, GatewayError> {
        self.submit_order(user_id, request).await
    }

    async fn order_by_id(&self, order_id: OrderId) -> Result<Order, GatewayError> {
        self.fetch_order(order_id).await
    }

    async fn order_ids_by_user(&self, user_id: UserId) -> Result<Vec<OrderId>, GatewayError> {
        self.fetch_paid_order_ids(user_id).await
    }

    async fn ongoing_order_ids_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<OrderId>, GatewayError> {
        self.fetch_ongoing_order_ids(user_id).await
    }

    async fn confirm_payment(
        &self,
        order_id: OrderId,
        amount: Decimal,
    ) -> Result<(), GatewayError> {
        self.confirm_order_payment(order_id, amount).await
    }
}
