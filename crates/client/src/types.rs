//! Domain types for the cart/order/payment lifecycle.
//!
//! These types provide a clean, ergonomic API separate from the raw wire
//! shapes in [`crate::gateway::wire`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pomelo_core::{CartItemId, OrderId, OrderStatus, PaymentId, ProductId, UserId};

// =============================================================================
// Catalog Types
// =============================================================================

/// The slice of a catalog product the cart needs.
///
/// The full catalog model (descriptions, categories, galleries) lives in the
/// presentational layer; the cart only carries what a line needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Catalog product ID.
    pub id: ProductId,
    /// Display name.
    pub name: String,
    /// Unit price.
    pub unit_price: Decimal,
    /// Primary image URL, if any.
    pub image_url: Option<String>,
}

// =============================================================================
// Cart Types
// =============================================================================

/// A single cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Catalog product this line refers to.
    pub product_id: ProductId,
    /// Display name, denormalized at add time.
    pub name: String,
    /// Unit price, denormalized at add time.
    pub unit_price: Decimal,
    /// Quantity, always at least 1.
    pub quantity: u32,
    /// Primary image URL, if any.
    pub image_url: Option<String>,
    /// Backend cart-item ID, present only for lines hydrated from the
    /// remote cart. Needed for remote removal.
    pub remote_id: Option<CartItemId>,
}

impl CartLine {
    /// Line total: unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// The shopping cart: a mapping from product ID to line, plus an owner.
///
/// Insertion order is kept for stable display but carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    /// Owning user, `None` for an unauthenticated session.
    pub owner: Option<UserId>,
    /// Cart lines, at most one per product.
    pub lines: Vec<CartLine>,
}

impl Cart {
    /// Create an empty cart for the given owner.
    #[must_use]
    pub const fn empty(owner: Option<UserId>) -> Self {
        Self {
            owner,
            lines: Vec::new(),
        }
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Look up the line for a product.
    #[must_use]
    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }

    /// Mutable lookup of the line for a product.
    pub fn line_mut(&mut self, product_id: ProductId) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|l| l.product_id == product_id)
    }

    /// Subtotal: the sum of line totals.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }
}

/// Immutable copy of the cart taken at the start of order creation.
///
/// Insulates the order request from cart mutations that happen after the
/// checkout began.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    /// Owning user at snapshot time.
    pub owner: Option<UserId>,
    /// Lines at snapshot time.
    pub lines: Vec<CartLine>,
    /// Subtotal at snapshot time.
    pub subtotal: Decimal,
}

impl CartSnapshot {
    /// Whether the snapshot has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl From<&Cart> for CartSnapshot {
    fn from(cart: &Cart) -> Self {
        Self {
            owner: cart.owner,
            lines: cart.lines.clone(),
            subtotal: cart.subtotal(),
        }
    }
}

// =============================================================================
// Order Types
// =============================================================================

/// A line inside an order request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    /// Catalog product.
    pub product_id: ProductId,
    /// Display name at order time.
    pub name: String,
    /// Quantity ordered.
    pub quantity: u32,
    /// Unit price agreed at order time.
    pub unit_price: Decimal,
}

/// Order-creation request, built once from a cart snapshot and never
/// mutated after submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    /// Ordering user.
    pub user_id: UserId,
    /// Always `None` at creation; the backend assigns a payment later.
    pub payment_id: Option<PaymentId>,
    /// Shipping address resolved from the user profile at checkout time.
    pub shipping_address: String,
    /// Always [`OrderStatus::Pending`] at creation.
    pub status: OrderStatus,
    /// Total agreed at order time; equals the snapshot subtotal.
    pub total_amount: Decimal,
    /// Lines copied from the snapshot.
    pub lines: Vec<OrderLine>,
}

impl OrderRequest {
    /// Build an order request from a cart snapshot and shipping address.
    #[must_use]
    pub fn from_snapshot(user_id: UserId, shipping_address: String, snapshot: &CartSnapshot) -> Self {
        Self {
            user_id,
            payment_id: None,
            shipping_address,
            status: OrderStatus::Pending,
            total_amount: snapshot.subtotal,
            lines: snapshot
                .lines
                .iter()
                .map(|line| OrderLine {
                    product_id: line.product_id,
                    name: line.name.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                })
                .collect(),
        }
    }
}

/// A server-assigned order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Server-assigned order ID.
    pub id: OrderId,
    /// Ordering user.
    pub user_id: UserId,
    /// Shipping address captured at order time.
    pub shipping_address: String,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// Total agreed at order time.
    pub total_amount: Decimal,
    /// Payment assigned after confirmation, if any.
    pub payment_id: Option<PaymentId>,
}

/// Reference to a created-but-unpaid order, held in the local cache between
/// order creation and payment confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedOrderReference {
    /// The order awaiting payment.
    pub order_id: OrderId,
    /// Total agreed at order-creation time. Payment is confirmed against
    /// this amount, never a recomputed one.
    pub cached_total: Decimal,
}

// =============================================================================
// Profile Types
// =============================================================================

/// User profile fields consumed at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
}

impl UserProfile {
    /// Shipping address as the backend expects it: both address lines
    /// joined with a space, trimmed.
    #[must_use]
    pub fn shipping_address(&self) -> String {
        let line2 = self.address_line2.as_deref().unwrap_or("");
        format!("{} {}", self.address_line1, line2)
            .trim()
            .to_string()
    }
}

/// Saved payment method details, forwarded verbatim to the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub name_on_card: String,
    pub card_number: String,
    pub exp_date: String,
    pub cvv: String,
    pub nickname: Option<String>,
}
