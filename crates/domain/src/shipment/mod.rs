//! Shipment aggregate and related types.

mod aggregate;
mod events;
mod state;

pub use aggregate::{NewShipment, Shipment, ShipmentItem};
pub use events::{
    ShipmentCreatedData, ShipmentEvent, ShipmentNoteAddedData, ShipmentStatusChangedData,
};
pub use state::{ShipmentStatus, delivery_days};

use thiserror::Error;

/// Errors that can occur during shipment operations.
#[derive(Debug, Error)]
pub enum ShipmentError {
    #[error("Invalid state transition: cannot {action} shipment from {current_state} state")]
    InvalidStateTransition {
        current_state: ShipmentStatus,
        action: &'static str,
    },

    #[error("Shipment has no items")]
    NoItems,

    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    #[error("Carrier is required")]
    CarrierRequired,

    #[error("Note text is empty")]
    EmptyNote,

    #[error("Shipment already created")]
    AlreadyCreated,

    #[error("Shipment has not been created")]
    NotCreated,
}

impl ShipmentError {
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ShipmentError::NoItems
                | ShipmentError::InvalidQuantity { .. }
                | ShipmentError::CarrierRequired
                | ShipmentError::EmptyNote
        )
    }
}
