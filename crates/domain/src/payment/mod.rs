//! Payment aggregate and related types.

mod aggregate;
mod events;
mod state;

pub use aggregate::{NewPayment, Payment};
pub use events::{
    PaymentCancelledData, PaymentCompletedData, PaymentEvent, PaymentFailedData,
    PaymentInitiatedData, PaymentRefundedData, ProcessingStartedData,
};
pub use state::{PaymentMethod, PaymentStatus};

use common::Money;
use thiserror::Error;

/// Errors that can occur during payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Invalid state transition: cannot {action} payment from {current_state} state")]
    InvalidStateTransition {
        current_state: PaymentStatus,
        action: &'static str,
    },

    #[error("Invalid payment amount: {amount}")]
    InvalidAmount { amount: Money },

    #[error("Invalid refund amount: {requested} (refundable: {refundable})")]
    InvalidRefundAmount { requested: Money, refundable: Money },

    #[error("Payment already created")]
    AlreadyCreated,

    #[error("Payment has not been initiated")]
    NotInitiated,
}

impl PaymentError {
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PaymentError::InvalidAmount { .. } | PaymentError::InvalidRefundAmount { .. }
        )
    }
}
