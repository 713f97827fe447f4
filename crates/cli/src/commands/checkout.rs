//! Checkout commands.

use pomelo_core::UserId;

use super::Session;

/// Create an order from the current cart.
///
/// # Errors
///
/// Returns an error if the cart is empty, an order is already pending, or
/// the backend call fails.
pub async fn submit(session: &Session, user_id: UserId) -> Result<(), super::SessionError> {
    let order = session.orchestrator.submit_order(user_id).await?;
    println!(
        "order {} created for {} (status {})",
        order.id, order.total_amount, order.status
    );
    println!("run `pomelo checkout confirm` to confirm payment");
    Ok(())
}

/// Confirm payment for the pending order.
///
/// # Errors
///
/// Returns an error if no order is pending or the backend call fails.
pub async fn confirm(session: &Session) -> Result<(), super::SessionError> {
    let order_id = session.orchestrator.confirm_payment().await?;
    println!("payment confirmed for order {order_id}");
    Ok(())
}

/// Show the pending order, if any.
///
/// # Errors
///
/// Returns an error if the cached reference is unreadable.
pub fn status(session: &Session) -> Result<(), super::SessionError> {
    match session.orchestrator.pending_order()? {
        Some(reference) => println!(
            "order {} awaiting payment of {}",
            reference.order_id, reference.cached_total
        ),
        None => println!("no order awaiting payment"),
    }
    Ok(())
}

/// Drop the pending order reference.
///
/// # Errors
///
/// Returns an error if the cache write-through fails.
pub fn abandon(session: &Session) -> Result<(), super::SessionError> {
    session.orchestrator.abandon()?;
    println!("checkout abandoned");
    Ok(())
}
