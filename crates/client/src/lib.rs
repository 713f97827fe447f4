//! Pomelo storefront client library.
//!
//! Orchestrates the cart, checkout, and order-history lifecycle against
//! the order-management backend, with a persistent local cache shared
//! across execution contexts.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod gateway;
pub mod orders;
pub mod profile;
pub mod sync;
pub mod types;

pub use cart::CartStore;
pub use checkout::{CheckoutOrchestrator, CheckoutPhase};
pub use error::{Result, StoreError};
pub use orders::{ClassifiedOrders, OrderClassifier, ResolvedOrders};
