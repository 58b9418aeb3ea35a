//! Fulfillment error types.

use domain::DomainError;
use domain::order::OrderError;
use domain::payment::PaymentError;
use domain::shipment::ShipmentError;
use inventory::InventoryError;
use thiserror::Error;

use crate::collaborators::GatewayError;

/// Coarse classification used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Validation,
    InvalidStateTransition,
    TransientGatewayFailure,
    /// A concurrent writer won, or the operation already happened.
    Conflict,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Validation => "validation",
            ErrorKind::InvalidStateTransition => "invalid_state_transition",
            ErrorKind::TransientGatewayFailure => "transient_gateway_failure",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Errors returned by the lifecycle, payment and shipment services.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

impl FulfillmentError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unauthorized(entity: &'static str) -> Self {
        Self::Validation(format!("Unauthorized access to {entity}"))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FulfillmentError::NotFound { .. } => ErrorKind::NotFound,
            FulfillmentError::Validation(_) => ErrorKind::Validation,
            FulfillmentError::Inventory(e) => match e {
                _ if e.is_not_found() => ErrorKind::NotFound,
                InventoryError::InsufficientStock { .. }
                | InventoryError::InvalidQuantity(_)
                | InventoryError::Validation(_) => ErrorKind::Validation,
                _ => ErrorKind::Internal,
            },
            FulfillmentError::Domain(e) => domain_kind(e),
            FulfillmentError::Gateway(_) => ErrorKind::TransientGatewayFailure,
        }
    }
}

fn domain_kind(error: &DomainError) -> ErrorKind {
    match error {
        DomainError::AggregateNotFound { .. } => ErrorKind::NotFound,
        DomainError::ConcurrencyConflict { .. } => ErrorKind::Conflict,
        _ if error.is_invalid_transition() => ErrorKind::InvalidStateTransition,
        DomainError::Order(OrderError::InventoryAlreadyCommitted) => ErrorKind::Conflict,
        DomainError::Order(e) if e.is_validation() => ErrorKind::Validation,
        DomainError::Payment(e) if e.is_validation() => ErrorKind::Validation,
        DomainError::Shipment(e) if e.is_validation() => ErrorKind::Validation,
        _ => ErrorKind::Internal,
    }
}

impl From<OrderError> for FulfillmentError {
    fn from(e: OrderError) -> Self {
        Self::Domain(e.into())
    }
}

impl From<PaymentError> for FulfillmentError {
    fn from(e: PaymentError) -> Self {
        Self::Domain(e.into())
    }
}

impl From<ShipmentError> for FulfillmentError {
    fn from(e: ShipmentError) -> Self {
        Self::Domain(e.into())
    }
}

/// Convenience type alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;
