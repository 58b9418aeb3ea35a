//! Order aggregate and related types.

mod aggregate;
mod events;
mod state;
mod value_objects;

pub use aggregate::{DEFAULT_DELIVERY_DAYS, Order};
pub use events::{
    InventoryCommittedData, NoteAddedData, OrderCancelledData, OrderDeliveredData, OrderEvent,
    OrderPlacedData, StatusChangedData,
};
pub use state::OrderStatus;
pub use value_objects::{NewOrder, NewOrderItem, OrderItem, OrderTotals, Pricing, ShippingAddress};

use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Order is not in the expected state.
    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: OrderStatus,
        action: &'static str,
    },

    /// Invalid quantity.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Invalid price.
    #[error("Invalid price: {price} (must not be negative)")]
    InvalidPrice { price: i64 },

    #[error("Invalid {field}: {amount} (must not be negative)")]
    InvalidAmount { field: &'static str, amount: i64 },

    #[error("Order {field} is too large")]
    AmountOverflow { field: &'static str },

    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    #[error("Note text is empty")]
    EmptyNote,

    #[error("Inventory already committed for this order")]
    InventoryAlreadyCommitted,

    /// Order is already created.
    #[error("Order already created")]
    AlreadyCreated,

    #[error("Order has not been placed")]
    NotPlaced,
}

impl OrderError {
    /// Returns true for errors caused by bad input rather than order state.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            OrderError::InvalidQuantity { .. }
                | OrderError::InvalidPrice { .. }
                | OrderError::InvalidAmount { .. }
                | OrderError::AmountOverflow { .. }
                | OrderError::NoItems
                | OrderError::EmptyNote
        )
    }
}
