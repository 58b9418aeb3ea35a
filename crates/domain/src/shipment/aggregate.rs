//! Shipment aggregate implementation.

use chrono::{DateTime, Duration, Utc};
use common::{OrderId, OrderItemId, ShipmentId, Sku, Version};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::note::Note;

use super::{
    ShipmentError, ShipmentEvent, ShipmentStatus, delivery_days,
    events::{ShipmentCreatedData, ShipmentNoteAddedData, ShipmentStatusChangedData},
};

/// One order line inside a shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentItem {
    pub order_item_id: OrderItemId,
    pub sku: Sku,
    pub quantity: u32,
}

/// Everything needed to open a shipment.
#[derive(Debug, Clone)]
pub struct NewShipment {
    pub tracking_number: String,
    pub order_id: OrderId,
    pub carrier: String,
    pub method: Option<String>,
    pub items: Vec<ShipmentItem>,
}

/// Shipment aggregate root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Shipment {
    id: Option<ShipmentId>,
    #[serde(default)]
    version: Version,
    tracking_number: String,
    order_id: Option<OrderId>,
    carrier: String,
    method: Option<String>,
    status: ShipmentStatus,
    items: Vec<ShipmentItem>,
    notes: Vec<Note>,
    shipped_at: Option<DateTime<Utc>>,
    estimated_delivery: Option<DateTime<Utc>>,
    actual_delivery: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl Aggregate for Shipment {
    type Id = ShipmentId;
    type Event = ShipmentEvent;
    type Error = ShipmentError;

    fn aggregate_type() -> &'static str {
        "Shipment"
    }

    fn id(&self) -> Option<ShipmentId> {
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
            ShipmentEvent::ShipmentCreated(data) => {
                self.id = Some(data.shipment_id);
                self.tracking_number = data.tracking_number;
                self.order_id = Some(data.order_id);
                self.carrier = data.carrier;
                self.method = data.method;
                self.items = data.items;
                self.status = ShipmentStatus::Preparing;
                self.estimated_delivery = Some(data.estimated_delivery);
                self.created_at = Some(data.created_at);
                self.updated_at = Some(data.created_at);
            }
            ShipmentEvent::StatusChanged(data) => {
                match data.to {
                    ShipmentStatus::Shipped => self.shipped_at = Some(data.changed_at),
                    ShipmentStatus::Delivered => self.actual_delivery = Some(data.changed_at),
                    _ => {}
                }
                self.status = data.to;
                self.updated_at = Some(data.changed_at);
            }
            ShipmentEvent::NoteAdded(data) => {
                self.updated_at = Some(data.note.timestamp);
                self.notes.push(data.note);
            }
        }
    }
}

// Query methods
impl Shipment {
    pub fn tracking_number(&self) -> &str {
        &self.tracking_number
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    pub fn carrier(&self) -> &str {
        &self.carrier
    }

    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    pub fn status(&self) -> ShipmentStatus {
        self.status
    }

    pub fn items(&self) -> &[ShipmentItem] {
        &self.items
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn shipped_at(&self) -> Option<DateTime<Utc>> {
        self.shipped_at
    }

    pub fn estimated_delivery(&self) -> Option<DateTime<Utc>> {
        self.estimated_delivery
    }

    pub fn actual_delivery(&self) -> Option<DateTime<Utc>> {
        self.actual_delivery
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Returns true while the shipment may still reach the customer or already has.
    pub fn is_live(&self) -> bool {
        !self.status.is_undelivered_end()
    }
}

// Command methods (return events)
impl Shipment {
    /// Opens a shipment in PREPARING with an estimate from the method's window.
    pub fn create(
        &self,
        shipment_id: ShipmentId,
        shipment: NewShipment,
    ) -> Result<Vec<ShipmentEvent>, ShipmentError> {
        if self.id.is_some() {
            return Err(ShipmentError::AlreadyCreated);
        }
        if shipment.items.is_empty() {
            return Err(ShipmentError::NoItems);
        }
        if let Some(item) = shipment.items.iter().find(|item| item.quantity == 0) {
            return Err(ShipmentError::InvalidQuantity {
                quantity: item.quantity,
            });
        }
        if shipment.carrier.trim().is_empty() {
            return Err(ShipmentError::CarrierRequired);
        }

        let created_at = Utc::now();
        let estimated_delivery =
            created_at + Duration::days(delivery_days(shipment.method.as_deref()));

        Ok(vec![ShipmentEvent::ShipmentCreated(ShipmentCreatedData {
            shipment_id,
            tracking_number: shipment.tracking_number,
            order_id: shipment.order_id,
            carrier: shipment.carrier,
            method: shipment.method,
            items: shipment.items,
            estimated_delivery,
            created_at,
        })])
    }

    /// Moves the shipment to `to`, optionally appending a note.
    pub fn update_status(
        &self,
        to: ShipmentStatus,
        actor: Option<&str>,
        note: Option<&str>,
    ) -> Result<Vec<ShipmentEvent>, ShipmentError> {
        if self.id.is_none() {
            return Err(ShipmentError::NotCreated);
        }
        if !self.status.can_transition_to(to) {
            return Err(ShipmentError::InvalidStateTransition {
                current_state: self.status,
                action: to.action(),
            });
        }

        let mut events = vec![ShipmentEvent::StatusChanged(ShipmentStatusChangedData {
            from: self.status,
            to,
            actor: actor.map(str::to_string),
            changed_at: Utc::now(),
        })];
        if let Some(text) = note.filter(|text| !text.trim().is_empty()) {
            events.push(note_added(text, actor));
        }
        Ok(events)
    }

    pub fn add_note(
        &self,
        text: &str,
        author: Option<&str>,
    ) -> Result<Vec<ShipmentEvent>, ShipmentError> {
        if self.id.is_none() {
            return Err(ShipmentError::NotCreated);
        }
        if text.trim().is_empty() {
            return Err(ShipmentError::EmptyNote);
        }
        Ok(vec![note_added(text, author)])
    }
}

fn note_added(text: &str, author: Option<&str>) -> ShipmentEvent {
    ShipmentEvent::NoteAdded(ShipmentNoteAddedData {
        note: Note::new(text, author.map(str::to_string)),
    })
}

#[cfg(test)]
mod tests {
    use common::ProductId;

    use super::*;

    fn new_shipment(method: Option<&str>) -> NewShipment {
        NewShipment {
            tracking_number: "TRK-1".to_string(),
            order_id: OrderId::new(3),
            carrier: "UPS".to_string(),
            method: method.map(str::to_string),
            items: vec![ShipmentItem {
                order_item_id: OrderItemId::new(1),
                sku: Sku::product(ProductId::new(1)),
                quantity: 2,
            }],
        }
    }

    fn created(method: Option<&str>) -> Shipment {
        let mut shipment = Shipment::default();
        let events = shipment
            .create(ShipmentId::new(1), new_shipment(method))
            .unwrap();
        shipment.apply_events(events);
        shipment
    }

    #[test]
    fn test_create_estimates_from_method() {
        let shipment = created(Some("express"));
        assert_eq!(shipment.status(), ShipmentStatus::Preparing);
        assert_eq!(
            shipment.estimated_delivery().unwrap() - shipment.created_at().unwrap(),
            Duration::days(1)
        );
    }

    #[test]
    fn test_create_requires_items() {
        let mut new = new_shipment(None);
        new.items.clear();
        assert!(matches!(
            Shipment::default().create(ShipmentId::new(1), new),
            Err(ShipmentError::NoItems)
        ));
    }

    #[test]
    fn test_status_updates_stamp_dates() {
        let mut shipment = created(None);

        let events = shipment
            .update_status(ShipmentStatus::Shipped, Some("warehouse"), Some("Picked up"))
            .unwrap();
        shipment.apply_events(events);
        assert!(shipment.shipped_at().is_some());
        assert_eq!(shipment.notes().len(), 1);

        let events = shipment
            .update_status(ShipmentStatus::Delivered, None, None)
            .unwrap();
        shipment.apply_events(events);
        assert_eq!(shipment.status(), ShipmentStatus::Delivered);
        assert!(shipment.actual_delivery().is_some());
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let shipment = created(None);
        let result = shipment.update_status(ShipmentStatus::Delivered, None, None);
        assert!(matches!(
            result,
            Err(ShipmentError::InvalidStateTransition {
                current_state: ShipmentStatus::Preparing,
                action: "deliver"
            })
        ));
    }

    #[test]
    fn test_lost_shipment_is_not_live() {
        let mut shipment = created(None);
        let events = shipment
            .update_status(ShipmentStatus::Lost, None, None)
            .unwrap();
        shipment.apply_events(events);
        assert!(!shipment.is_live());
    }
}
