//! Type definitions for the Pomelo workspace.
//!
//! - [`id`] - Newtype IDs (`UserId`, `OrderId`, etc.)
//! - [`status`] - Order status lifecycle enum

pub mod id;
pub mod status;

pub use id::*;
pub use status::*;
