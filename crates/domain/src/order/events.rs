//! Order domain events.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::note::Note;

use super::{OrderItem, OrderStatus, OrderTotals, ShippingAddress};

/// Events that can occur on an order aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Order was placed with its inventory already reserved.
    OrderPlaced(OrderPlacedData),

    /// Order moved along the fulfillment chain, or was refunded.
    StatusChanged(StatusChangedData),

    /// Order was cancelled.
    OrderCancelled(OrderCancelledData),

    /// Order reached the customer.
    OrderDelivered(OrderDeliveredData),

    /// Reserved stock for the order was permanently deducted.
    InventoryCommitted(InventoryCommittedData),

    /// A note was appended to the order log.
    NoteAdded(NoteAddedData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::StatusChanged(_) => "OrderStatusChanged",
            OrderEvent::OrderCancelled(_) => "OrderCancelled",
            OrderEvent::OrderDelivered(_) => "OrderDelivered",
            OrderEvent::InventoryCommitted(_) => "OrderInventoryCommitted",
            OrderEvent::NoteAdded(_) => "OrderNoteAdded",
        }
    }
}

/// Data for OrderPlaced event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub totals: OrderTotals,
    pub shipping_address: Option<ShippingAddress>,
    pub estimated_delivery: DateTime<Utc>,
    pub placed_at: DateTime<Utc>,
}

/// Data for StatusChanged event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangedData {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub actor: Option<String>,
    pub changed_at: DateTime<Utc>,
}

/// Data for OrderCancelled event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledData {
    pub from: OrderStatus,

    /// Reason for cancellation.
    pub reason: String,

    /// Who cancelled the order.
    pub cancelled_by: Option<String>,

    /// When the order was cancelled.
    pub cancelled_at: DateTime<Utc>,
}

/// Data for OrderDelivered event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDeliveredData {
    pub from: OrderStatus,
    pub actor: Option<String>,
    pub delivered_at: DateTime<Utc>,
}

/// Data for InventoryCommitted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryCommittedData {
    pub committed_at: DateTime<Utc>,
}

/// Data for NoteAdded event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteAddedData {
    pub note: Note,
}

// Event constructors
impl OrderEvent {
    pub fn order_placed(data: OrderPlacedData) -> Self {
        OrderEvent::OrderPlaced(data)
    }

    pub fn status_changed(from: OrderStatus, to: OrderStatus, actor: Option<&str>) -> Self {
        OrderEvent::StatusChanged(StatusChangedData {
            from,
            to,
            actor: actor.map(str::to_string),
            changed_at: Utc::now(),
        })
    }

    pub fn order_cancelled(
        from: OrderStatus,
        reason: impl Into<String>,
        cancelled_by: Option<&str>,
    ) -> Self {
        OrderEvent::OrderCancelled(OrderCancelledData {
            from,
            reason: reason.into(),
            cancelled_by: cancelled_by.map(str::to_string),
            cancelled_at: Utc::now(),
        })
    }

    pub fn order_delivered(from: OrderStatus, actor: Option<&str>) -> Self {
        OrderEvent::OrderDelivered(OrderDeliveredData {
            from,
            actor: actor.map(str::to_string),
            delivered_at: Utc::now(),
        })
    }

    pub fn inventory_committed() -> Self {
        OrderEvent::InventoryCommitted(InventoryCommittedData {
            committed_at: Utc::now(),
        })
    }

    pub fn note_added(text: impl Into<String>, author: Option<&str>) -> Self {
        OrderEvent::NoteAdded(NoteAddedData {
            note: Note::new(text, author.map(str::to_string)),
        })
    }
}
