//! Domain error types.

use common::Version;
use thiserror::Error;

use crate::order::OrderError;
use crate::payment::PaymentError;
use crate::shipment::ShipmentError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The stored version moved on since the aggregate was loaded.
    #[error(
        "Concurrency conflict for {aggregate_type} {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_type: &'static str,
        aggregate_id: String,
        expected: Version,
        actual: Version,
    },

    /// Aggregate not found.
    #[error("Aggregate not found: {aggregate_type} with id {aggregate_id}")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: String,
    },

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    #[error("Shipment error: {0}")]
    Shipment(#[from] ShipmentError),
}

impl DomainError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DomainError::AggregateNotFound { .. })
    }

    /// Returns true if the error is a rejected state machine transition.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(
            self,
            DomainError::Order(OrderError::InvalidStateTransition { .. })
                | DomainError::Payment(PaymentError::InvalidStateTransition { .. })
                | DomainError::Shipment(ShipmentError::InvalidStateTransition { .. })
        )
    }
}
