//! Order history commands.

use pomelo_client::types::Order;
use pomelo_core::UserId;

use super::Session;

/// List ongoing and completed orders for a user.
///
/// # Errors
///
/// Returns an error if the ID lists cannot be fetched.
pub async fn list(session: &Session, user_id: UserId) -> Result<(), super::SessionError> {
    let classified = session.classifier.classify(user_id).await?;

    println!("ongoing ({}):", classified.ongoing.len());
    for order in &classified.ongoing {
        print_order(order);
    }

    println!("completed ({}):", classified.completed.len());
    for order in &classified.completed {
        print_order(order);
    }

    if !classified.is_complete() {
        println!("failed to resolve {} order(s):", classified.failed.len());
        for (order_id, error) in &classified.failed {
            println!("  {order_id}: {error}");
        }
    }
    Ok(())
}

fn print_order(order: &Order) {
    println!(
        "  {:>6}  {:<12} {:>10}  {}",
        order.id, order.status, order.total_amount, order.shipping_address
    );
}
