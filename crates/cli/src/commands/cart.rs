//! Cart inspection and editing commands.

use rust_decimal::Decimal;

use pomelo_client::types::Product;
use pomelo_core::{ProductId, UserId};

use super::Session;

/// Print the cart contents and subtotal.
///
/// # Errors
///
/// Never fails today; returns `Result` for uniformity with its siblings.
pub async fn show(session: &Session) -> Result<(), super::SessionError> {
    let cart = session.cart.cart().await;

    if cart.is_empty() {
        println!("cart is empty");
        return Ok(());
    }

    for line in &cart.lines {
        println!(
            "{:>6}  {:<30} {:>3} x {:>10}  = {:>10}",
            line.product_id,
            line.name,
            line.quantity,
            line.unit_price,
            line.line_total()
        );
    }
    println!("subtotal: {}", cart.subtotal());
    Ok(())
}

/// Add a product to the cart.
///
/// # Errors
///
/// Returns an error if the cache write-through fails.
pub async fn add(
    session: &Session,
    product_id: ProductId,
    name: String,
    price: Decimal,
    quantity: u32,
    image_url: Option<String>,
) -> Result<(), super::SessionError> {
    let product = Product {
        id: product_id,
        name,
        unit_price: price,
        image_url,
    };
    session.cart.add_line(&product, quantity).await?;
    println!("added {quantity} x {} to cart", product.name);
    Ok(())
}

/// Set the quantity of a line.
///
/// # Errors
///
/// Returns an error if the line does not exist.
pub async fn set_quantity(
    session: &Session,
    product_id: ProductId,
    quantity: u32,
) -> Result<(), super::SessionError> {
    session.cart.set_quantity(product_id, quantity).await?;
    println!("product {product_id} set to quantity {quantity}");
    Ok(())
}

/// Remove a line from the cart.
///
/// # Errors
///
/// Returns an error if the line does not exist.
pub async fn remove(session: &Session, product_id: ProductId) -> Result<(), super::SessionError> {
    session.cart.remove_line(product_id).await?;
    println!("product {product_id} removed from cart");
    Ok(())
}

/// Empty the cart.
///
/// # Errors
///
/// Returns an error if the cache write-through fails.
pub async fn clear(session: &Session) -> Result<(), super::SessionError> {
    session.cart.clear().await?;
    println!("cart cleared");
    Ok(())
}

/// Replace the local cart with the user's remote cart.
///
/// # Errors
///
/// Returns an error if the backend call fails.
pub async fn hydrate(session: &Session, user_id: UserId) -> Result<(), super::SessionError> {
    session.cart.hydrate(user_id).await?;
    let cart = session.cart.cart().await;
    println!("cart hydrated for user {user_id}: {} lines", cart.lines.len());
    Ok(())
}
