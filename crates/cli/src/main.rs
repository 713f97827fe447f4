//! Pomelo CLI - cart, checkout, and order-history tools.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart
//! pomelo cart show
//!
//! # Add two of product 12 to the cart
//! pomelo cart add -p 12 -n "Linen Shirt" --price 39.90 -q 2
//!
//! # Create an order for user 7, then confirm payment
//! pomelo checkout submit -u 7
//! pomelo checkout confirm
//!
//! # Show order history for user 7
//! pomelo orders list -u 7
//! ```
//!
//! # Commands
//!
//! - `cart` - Inspect and edit the local cart
//! - `checkout` - Create an order and confirm its payment
//! - `orders` - Show order history

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use pomelo_core::{ProductId, UserId};

mod commands;

#[derive(Parser)]
#[command(name = "pomelo")]
#[command(author, version, about = "Pomelo storefront CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and edit the local cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Create an order and confirm its payment
    Checkout {
        #[command(subcommand)]
        action: CheckoutAction,
    },
    /// Show order history
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Print the cart contents and subtotal
    Show,
    /// Add a product to the cart
    Add {
        /// Catalog product ID
        #[arg(short, long)]
        product_id: i32,

        /// Product display name
        #[arg(short, long)]
        name: String,

        /// Unit price, e.g. 39.90
        #[arg(long)]
        price: Decimal,

        /// Quantity to add
        #[arg(short, long, default_value = "1")]
        quantity: u32,

        /// Product image URL
        #[arg(long)]
        image_url: Option<String>,
    },
    /// Set the quantity of a line
    SetQuantity {
        /// Catalog product ID
        #[arg(short, long)]
        product_id: i32,

        /// New quantity
        #[arg(short, long)]
        quantity: u32,
    },
    /// Remove a line from the cart
    Remove {
        /// Catalog product ID
        #[arg(short, long)]
        product_id: i32,
    },
    /// Empty the cart
    Clear,
    /// Replace the local cart with the user's remote cart
    Hydrate {
        /// User ID
        #[arg(short, long)]
        user_id: i32,
    },
}

#[derive(Subcommand)]
enum CheckoutAction {
    /// Create an order from the current cart
    Submit {
        /// Ordering user ID
        #[arg(short, long)]
        user_id: i32,
    },
    /// Confirm payment for the pending order
    Confirm,
    /// Show the pending order, if any
    Status,
    /// Drop the pending order reference
    Abandon,
}

#[derive(Subcommand)]
enum OrdersAction {
    /// List ongoing and completed orders for a user
    List {
        /// User ID
        #[arg(short, long)]
        user_id: i32,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Cart { action } => {
            let session = commands::Session::from_env()?;
            match action {
                CartAction::Show => commands::cart::show(&session).await?,
                CartAction::Add {
                    product_id,
                    name,
                    price,
                    quantity,
                    image_url,
                } => {
                    commands::cart::add(
                        &session,
                        ProductId::new(product_id),
                        name,
                        price,
                        quantity,
                        image_url,
                    )
                    .await?;
                }
                CartAction::SetQuantity {
                    product_id,
                    quantity,
                } => {
                    commands::cart::set_quantity(&session, ProductId::new(product_id), quantity)
                        .await?;
                }
                CartAction::Remove { product_id } => {
                    commands::cart::remove(&session, ProductId::new(product_id)).await?;
                }
                CartAction::Clear => commands::cart::clear(&session).await?,
                CartAction::Hydrate { user_id } => {
                    commands::cart::hydrate(&session, UserId::new(user_id)).await?;
                }
            }
        }
        Commands::Checkout { action } => {
            let session = commands::Session::from_env()?;
            match action {
                CheckoutAction::Submit { user_id } => {
                    commands::checkout::submit(&session, UserId::new(user_id)).await?;
                }
                CheckoutAction::Confirm => commands::checkout::confirm(&session).await?,
                CheckoutAction::Status => commands::checkout::status(&session)?,
                CheckoutAction::Abandon => commands::checkout::abandon(&session)?,
            }
        }
        Commands::Orders { action } => {
            let session = commands::Session::from_env()?;
            match action {
                OrdersAction::List { user_id } => {
                    commands::orders::list(&session, UserId::new(user_id)).await?;
                }
            }
        }
    }
    Ok(())
}
