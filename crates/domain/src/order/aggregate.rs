//! Order aggregate implementation.

use chrono::{DateTime, Duration, Utc};
use common::{Money, OrderId, OrderItemId, UserId, Version};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::note::Note;

use super::{
    NewOrder, OrderError, OrderEvent, OrderItem, OrderStatus, OrderTotals, ShippingAddress,
    events::OrderPlacedData,
};

/// Days between placement and the estimated delivery when none is given.
pub const DEFAULT_DELIVERY_DAYS: i64 = 7;

/// Order aggregate root.
///
/// Represents an order from placement to delivery, cancellation or refund.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    id: Option<OrderId>,

    /// Current version for optimistic concurrency.
    #[serde(default)]
    version: Version,

    order_number: String,
    user_id: Option<UserId>,
    status: OrderStatus,
    items: Vec<OrderItem>,
    totals: OrderTotals,
    shipping_address: Option<ShippingAddress>,
    estimated_delivery: Option<DateTime<Utc>>,
    actual_delivery: Option<DateTime<Utc>>,
    notes: Vec<Note>,
    cancellation_reason: Option<String>,

    /// Set once the order's stock has been deducted for good.
    inventory_committed: bool,

    placed_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl Aggregate for Order {
    type Id = OrderId;
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> Option<OrderId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::OrderPlaced(data) => self.apply_order_placed(data),
            OrderEvent::StatusChanged(data) => {
                self.status = data.to;
                self.updated_at = Some(data.changed_at);
            }
            OrderEvent::OrderCancelled(data) => {
                self.status = OrderStatus::Cancelled;
                self.cancellation_reason = Some(data.reason);
                self.updated_at = Some(data.cancelled_at);
            }
            OrderEvent::OrderDelivered(data) => {
                self.status = OrderStatus::Delivered;
                self.actual_delivery = Some(data.delivered_at);
                self.updated_at = Some(data.delivered_at);
            }
            OrderEvent::InventoryCommitted(data) => {
                self.inventory_committed = true;
                self.updated_at = Some(data.committed_at);
            }
            OrderEvent::NoteAdded(data) => {
                self.updated_at = Some(data.note.timestamp);
                self.notes.push(data.note);
            }
        }
    }
}

// Query methods
impl Order {
    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// Returns true if the order belongs to `user_id`.
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == Some(user_id)
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn item(&self, id: OrderItemId) -> Option<&OrderItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Returns the total quantity of all items.
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    pub fn totals(&self) -> OrderTotals {
        self.totals
    }

    pub fn total(&self) -> Money {
        self.totals.total
    }

    pub fn shipping_address(&self) -> Option<&ShippingAddress> {
        self.shipping_address.as_ref()
    }

    pub fn estimated_delivery(&self) -> Option<DateTime<Utc>> {
        self.estimated_delivery
    }

    pub fn actual_delivery(&self) -> Option<DateTime<Utc>> {
        self.actual_delivery
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn inventory_committed(&self) -> bool {
        self.inventory_committed
    }

    pub fn placed_at(&self) -> Option<DateTime<Utc>> {
        self.placed_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// Command methods (return events)
impl Order {
    /// Places a new order. Items are snapshotted and totals computed here.
    pub fn place(&self, order_id: OrderId, order: NewOrder) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyCreated);
        }

        if order.items.is_empty() {
            return Err(OrderError::NoItems);
        }

        if let Some(item) = order.items.iter().find(|item| item.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                quantity: item.quantity,
            });
        }
        let totals = order.totals()?;

        let mut items = Vec::with_capacity(order.items.len());
        for (position, item) in order.items.into_iter().enumerate() {
            let line_total = item.line_total()?;
            items.push(OrderItem {
                id: OrderItemId::new(position as u64 + 1),
                sku: item.sku,
                product_name: item.product_name,
                variant_name: item.variant_name,
                unit_price: item.unit_price,
                quantity: item.quantity,
                line_total,
            });
        }

        let placed_at = Utc::now();
        let estimated_delivery = order
            .estimated_delivery
            .unwrap_or_else(|| placed_at + Duration::days(DEFAULT_DELIVERY_DAYS));

        Ok(vec![OrderEvent::order_placed(OrderPlacedData {
            order_id,
            order_number: order.order_number,
            user_id: order.user_id,
            items,
            totals,
            shipping_address: order.shipping_address,
            estimated_delivery,
            placed_at,
        })])
    }

    /// Moves the order to `to`, optionally appending a note.
    ///
    /// Cancellation uses the note as its reason.
    pub fn transition(
        &self,
        to: OrderStatus,
        actor: Option<&str>,
        note: Option<&str>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;

        if !self.status.can_transition_to(to) {
            return Err(OrderError::InvalidStateTransition {
                current_state: self.status,
                action: to.action(),
            });
        }

        let mut events = match to {
            OrderStatus::Cancelled => vec![OrderEvent::order_cancelled(
                self.status,
                note.unwrap_or("Cancelled"),
                actor,
            )],
            OrderStatus::Delivered => vec![OrderEvent::order_delivered(self.status, actor)],
            _ => vec![OrderEvent::status_changed(self.status, to, actor)],
        };

        if let Some(text) = note.filter(|text| !text.trim().is_empty()) {
            let text = match to {
                OrderStatus::Cancelled => format!("Order cancelled: {text}"),
                _ => text.to_string(),
            };
            events.push(OrderEvent::note_added(text, actor));
        }

        Ok(events)
    }

    pub fn confirm(&self, actor: Option<&str>) -> Result<Vec<OrderEvent>, OrderError> {
        self.transition(OrderStatus::Confirmed, actor, None)
    }

    pub fn start_processing(&self, actor: Option<&str>) -> Result<Vec<OrderEvent>, OrderError> {
        self.transition(OrderStatus::Processing, actor, None)
    }

    pub fn ship(&self, actor: Option<&str>) -> Result<Vec<OrderEvent>, OrderError> {
        self.transition(OrderStatus::Shipped, actor, None)
    }

    pub fn deliver(&self, actor: Option<&str>) -> Result<Vec<OrderEvent>, OrderError> {
        self.transition(OrderStatus::Delivered, actor, None)
    }

    /// Cancels the order. Only possible while Placed or Confirmed.
    pub fn cancel(&self, reason: &str, actor: Option<&str>) -> Result<Vec<OrderEvent>, OrderError> {
        self.transition(OrderStatus::Cancelled, actor, Some(reason))
    }

    pub fn refund(&self, actor: Option<&str>, note: Option<&str>) -> Result<Vec<OrderEvent>, OrderError> {
        self.transition(OrderStatus::Refunded, actor, note)
    }

    /// Records that the order's stock was deducted. Allowed once per order.
    pub fn mark_inventory_committed(&self) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;

        if self.inventory_committed {
            return Err(OrderError::InventoryAlreadyCommitted);
        }
        if matches!(self.status, OrderStatus::Cancelled | OrderStatus::Refunded) {
            return Err(OrderError::InvalidStateTransition {
                current_state: self.status,
                action: "commit inventory",
            });
        }

        Ok(vec![OrderEvent::inventory_committed()])
    }

    /// Appends a note. Notes are allowed in every state.
    pub fn add_note(&self, text: &str, author: Option<&str>) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;

        if text.trim().is_empty() {
            return Err(OrderError::EmptyNote);
        }

        Ok(vec![OrderEvent::note_added(text, author)])
    }

    fn ensure_placed(&self) -> Result<(), OrderError> {
        if self.id.is_none() {
            return Err(OrderError::NotPlaced);
        }
        Ok(())
    }

    fn apply_order_placed(&mut self, data: OrderPlacedData) {
        self.id = Some(data.order_id);
        self.order_number = data.order_number;
        self.user_id = Some(data.user_id);
        self.status = OrderStatus::Placed;
        self.items = data.items;
        self.totals = data.totals;
        self.shipping_address = data.shipping_address;
        self.estimated_delivery = Some(data.estimated_delivery);
        self.placed_at = Some(data.placed_at);
        self.updated_at = Some(data.placed_at);
    }
}
