//! Wire shapes for the order-management backend.
//!
//! The backend speaks camelCase JSON with a handful of legacy field names
//! (`itemName`, `imageURL`). Conversions into domain types live here so the
//! rest of the crate never sees a raw DTO; order statuses are parsed
//! strictly on the way in.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use pomelo_core::{CartItemId, OrderId, PaymentId, ProductId, UserId};

use super::GatewayError;
use crate::types::{CartLine, Order, OrderRequest, PaymentMethod};

// =============================================================================
// Cart Items
// =============================================================================

/// A cart item as the backend stores it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemDto {
    /// Backend cart-item ID (not the product ID).
    pub id: CartItemId,
    pub product_id: ProductId,
    pub item_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub item_price: Decimal,
    pub item_quantity: u32,
    #[serde(rename = "imageURL")]
    pub image_url: Option<String>,
}

/// Payload for creating a cart item on the remote cart.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCartItemDto {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub item_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub item_price: Decimal,
    pub item_quantity: u32,
    #[serde(rename = "imageURL")]
    pub image_url: Option<String>,
}

/// Payload for updating a cart item's quantity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartItemDto {
    pub updated_quantity: u32,
}

pub(crate) fn convert_cart_item(dto: CartItemDto) -> CartLine {
    CartLine {
        product_id: dto.product_id,
        name: dto.item_name,
        unit_price: dto.item_price,
        quantity: dto.item_quantity.max(1),
        image_url: dto.image_url,
        remote_id: Some(dto.id),
    }
}

// =============================================================================
// Orders
// =============================================================================

/// A line inside an order-creation payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineDto {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

/// Order-creation payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequestDto {
    pub user_id: UserId,
    pub payment_id: Option<PaymentId>,
    pub shipping_address: String,
    pub status: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub items: Vec<OrderLineDto>,
}

impl From<&OrderRequest> for OrderRequestDto {
    fn from(request: &OrderRequest) -> Self {
        Self {
            user_id: request.user_id,
            payment_id: request.payment_id,
            shipping_address: request.shipping_address.clone(),
            status: request.status.to_string(),
            total_amount: request.total_amount,
            items: request
                .lines
                .iter()
                .map(|line| OrderLineDto {
                    product_id: line.product_id,
                    name: line.name.clone(),
                    quantity: line.quantity,
                    price: line.unit_price,
                })
                .collect(),
        }
    }
}

/// An order as the backend returns it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDto {
    pub id: OrderId,
    pub user_id: UserId,
    pub shipping_address: String,
    pub status: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub payment_id: Option<PaymentId>,
}

/// Convert a wire order, rejecting unrecognized statuses.
pub(crate) fn convert_order(dto: OrderDto) -> Result<Order, GatewayError> {
    let status = dto
        .status
        .parse()
        .map_err(|_| GatewayError::UnknownStatus(dto.status.clone()))?;
    Ok(Order {
        id: dto.id,
        user_id: dto.user_id,
        shipping_address: dto.shipping_address,
        status,
        total_amount: dto.total_amount,
        payment_id: dto.payment_id,
    })
}

/// Payload for the administrative status update.
///
/// The backend DTO wants the order ID repeated in the body next to the new
/// status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateDto {
    pub order_id: OrderId,
    pub order_status: String,
}

// =============================================================================
// Payments
// =============================================================================

/// Payload for saving a payment method.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodDto {
    pub name_on_card: String,
    pub card_number: String,
    pub exp_date: String,
    pub cvv: String,
    pub nickname: Option<String>,
}

impl From<&PaymentMethod> for PaymentMethodDto {
    fn from(method: &PaymentMethod) -> Self {
        Self {
            name_on_card: method.name_on_card.clone(),
            card_number: method.card_number.clone(),
            exp_date: method.exp_date.clone(),
            cvv: method.cvv.clone(),
            nickname: method.nickname.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pomelo_core::OrderStatus;
    use serde_json::json;

    #[test]
    fn test_cart_item_parses_legacy_field_names() {
        let dto: CartItemDto = serde_json::from_value(json!({
            "id": 11,
            "productId": 1,
            "itemName": "Shirt",
            "itemPrice": 20.0,
            "itemQuantity": 2,
            "imageURL": "https://cdn.example.com/shirt.png"
        }))
        .unwrap();

        let line = convert_cart_item(dto);
        assert_eq!(line.product_id, ProductId::new(1));
        assert_eq!(line.remote_id, Some(CartItemId::new(11)));
        assert_eq!(line.unit_price, Decimal::new(20, 0));
        assert_eq!(line.quantity, 2);
    }

    #[test]
    fn test_order_request_wire_shape() {
        let request = OrderRequest {
            user_id: UserId::new(9),
            payment_id: None,
            shipping_address: "12 Main St".to_string(),
            status: OrderStatus::Pending,
            total_amount: Decimal::new(40, 0),
            lines: vec![crate::types::OrderLine {
                product_id: ProductId::new(1),
                name: "Shirt".to_string(),
                quantity: 2,
                unit_price: Decimal::new(20, 0),
            }],
        };

        let value = serde_json::to_value(OrderRequestDto::from(&request)).unwrap();
        assert_eq!(
            value,
            json!({
                "userId": 9,
                "paymentId": null,
                "shippingAddress": "12 Main St",
                "status": "PENDING",
                "totalAmount": 40.0,
                "items": [{
                    "productId": 1,
                    "name": "Shirt",
                    "quantity": 2,
                    "price": 20.0
                }]
            })
        );
    }

    #[test]
    fn test_status_update_wire_shape() {
        let value = serde_json::to_value(StatusUpdateDto {
            order_id: OrderId::new(5),
            order_status: OrderStatus::Paid.to_string(),
        })
        .unwrap();
        assert_eq!(value, json!({"orderId": 5, "orderStatus": "PAID"}));
    }

    #[test]
    fn test_unknown_order_status_is_rejected() {
        let dto: OrderDto = serde_json::from_value(json!({
            "id": 5,
            "userId": 9,
            "shippingAddress": "12 Main St",
            "status": "SHIPPED",
            "totalAmount": 40.0,
            "paymentId": null
        }))
        .unwrap();

        let err = convert_order(dto).unwrap_err();
        assert!(matches!(err, GatewayError::UnknownStatus(ref s) if s == "SHIPPED"));
    }
}
