//! Order status lifecycle.
//!
//! The backend advances an order through a fixed sequence of states; the
//! client never moves a status backward and never defaults an unknown value.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Order lifecycle status.
///
/// Statuses advance monotonically: `PENDING → PAID → ON_DELIVERY →
/// COMPLETED`. The administrative surface owns most transitions; the client
/// only drives `PENDING → PAID` via payment confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Paid,
    OnDelivery,
    Completed,
}

/// Error returned when parsing an unrecognized status value.
///
/// An unknown status is a hard error, never a silent default: it means the
/// client and backend disagree about the order lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized order status: {0}")]
pub struct UnknownStatus(pub String);

impl OrderStatus {
    /// Position in the lifecycle, used for monotonicity checks.
    const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Paid => 1,
            Self::OnDelivery => 2,
            Self::Completed => 3,
        }
    }

    /// Whether a transition to `next` moves the lifecycle forward.
    ///
    /// Statuses never move backward; a repeated status is not an advance.
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        self.rank() < next.rank()
    }

    /// Whether an order in this status is still in flight.
    ///
    /// Matches the backend's definition of the ongoing set: pending payment
    /// or paid and awaiting delivery.
    #[must_use]
    pub const fn is_ongoing(self) -> bool {
        matches!(self, Self::Pending | Self::Paid)
    }

    /// Wire representation (`SCREAMING_SNAKE_CASE`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::OnDelivery => "ON_DELIVERY",
            Self::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PAID" => Ok(Self::Paid),
            "ON_DELIVERY" => Ok(Self::OnDelivery),
            "COMPLETED" => Ok(Self::Completed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}
