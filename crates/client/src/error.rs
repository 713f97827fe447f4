//! Component-level error taxonomy.
//!
//! Remote-call failures are caught at each component boundary and converted
//! into one of three kinds; no raw transport error leaves the cart store or
//! checkout orchestrator. Validation and transient errors leave state
//! untouched and are retryable from the caller's point of view; consistency
//! errors abort the current flow.

use thiserror::Error;

use crate::cache::CacheError;
use crate::gateway::GatewayError;

/// Errors surfaced by the cart store, checkout orchestrator, and order
/// classifier.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Caller input or local state rejected before any side effect
    /// (empty cart at checkout, missing address, unknown cart line).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A remote call failed. Retryable; no automatic retry is performed.
    #[error("backend call failed: {0}")]
    Transient(#[source] GatewayError),

    /// The client and its persisted state disagree (duplicate submission,
    /// unrecognized order status, confirm without a cached reference).
    /// Fatal to the current operation.
    #[error("consistency violation: {0}")]
    Consistency(String),
}

impl StoreError {
    /// Classify a gateway failure.
    ///
    /// An unrecognized order status means the client and backend disagree
    /// about the lifecycle and is not retryable; everything else is a
    /// transient network condition.
    #[must_use]
    pub fn from_gateway(err: GatewayError) -> Self {
        match err {
            GatewayError::UnknownStatus(status) => {
                Self::Consistency(format!("unrecognized order status: {status}"))
            }
            other => Self::Transient(other),
        }
    }

    /// Whether the caller may retry the operation as-is.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<CacheError> for StoreError {
    fn from(err: CacheError) -> Self {
        // A failed cache commit rolls back, so memory and cache stay in
        // agreement; the operation itself cannot proceed.
        Self::Consistency(err.to_string())
    }
}

/// Result type alias for [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_status_maps_to_consistency() {
        let err = StoreError::from_gateway(GatewayError::UnknownStatus("SHIPPED".to_string()));
        assert!(matches!(err, StoreError::Consistency(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_api_failure_is_retryable() {
        let err = StoreError::from_gateway(GatewayError::Api {
            status: 503,
            message: "unavailable".to_string(),
        });
        assert!(matches!(err, StoreError::Transient(_)));
        assert!(err.is_retryable());
    }
}
