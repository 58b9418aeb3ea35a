//! Shipment domain events.

use chrono::{DateTime, Utc};
use common::{OrderId, ShipmentId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::note::Note;

use super::{ShipmentItem, ShipmentStatus};

/// Events that can occur on a shipment aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ShipmentEvent {
    ShipmentCreated(ShipmentCreatedData),
    StatusChanged(ShipmentStatusChangedData),
    NoteAdded(ShipmentNoteAddedData),
}

impl DomainEvent for ShipmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ShipmentEvent::ShipmentCreated(_) => "ShipmentCreated",
            ShipmentEvent::StatusChanged(_) => "ShipmentStatusChanged",
            ShipmentEvent::NoteAdded(_) => "ShipmentNoteAdded",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentCreatedData {
    pub shipment_id: ShipmentId,
    pub tracking_number: String,
    pub order_id: OrderId,
    pub carrier: String,
    pub method: Option<String>,
    pub items: Vec<ShipmentItem>,
    pub estimated_delivery: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentStatusChangedData {
    pub from: ShipmentStatus,
    pub to: ShipmentStatus,
    pub actor: Option<String>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentNoteAddedData {
    pub note: Note,
}
