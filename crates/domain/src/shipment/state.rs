//! Shipment state machine and delivery windows.

use serde::{Deserialize, Serialize};

/// The status of a shipment.
///
/// ```text
/// Preparing ──► Shipped ──┬──► InTransit ──┬──► OutForDelivery ──► Delivered
///                         │                └────────────────────────► Delivered
///                         ├──► OutForDelivery
///                         └──► Delivered
/// any non-terminal ──► Returned | Lost | Damaged
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentStatus {
    #[default]
    Preparing,
    Shipped,
    InTransit,
    OutForDelivery,
    Delivered,
    Returned,
    Lost,
    Damaged,
}

impl ShipmentStatus {
    pub const ALL: [ShipmentStatus; 8] = [
        ShipmentStatus::Preparing,
        ShipmentStatus::Shipped,
        ShipmentStatus::InTransit,
        ShipmentStatus::OutForDelivery,
        ShipmentStatus::Delivered,
        ShipmentStatus::Returned,
        ShipmentStatus::Lost,
        ShipmentStatus::Damaged,
    ];

    pub fn can_transition_to(&self, next: ShipmentStatus) -> bool {
        use ShipmentStatus::*;

        if self.is_terminal() {
            return false;
        }
        match next {
            Returned | Lost | Damaged => true,
            Shipped => *self == Preparing,
            InTransit => *self == Shipped,
            OutForDelivery => matches!(self, Shipped | InTransit),
            Delivered => matches!(self, Shipped | InTransit | OutForDelivery),
            Preparing => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ShipmentStatus::Delivered
                | ShipmentStatus::Returned
                | ShipmentStatus::Lost
                | ShipmentStatus::Damaged
        )
    }

    /// Returns true if the shipment ended without reaching the customer.
    pub fn is_undelivered_end(&self) -> bool {
        matches!(
            self,
            ShipmentStatus::Returned | ShipmentStatus::Lost | ShipmentStatus::Damaged
        )
    }

    /// Verb used in transition errors.
    pub fn action(&self) -> &'static str {
        match self {
            ShipmentStatus::Preparing => "prepare",
            ShipmentStatus::Shipped => "ship",
            ShipmentStatus::InTransit => "mark in transit",
            ShipmentStatus::OutForDelivery => "mark out for delivery",
            ShipmentStatus::Delivered => "deliver",
            ShipmentStatus::Returned => "return",
            ShipmentStatus::Lost => "mark lost",
            ShipmentStatus::Damaged => "mark damaged",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Preparing => "PREPARING",
            ShipmentStatus::Shipped => "SHIPPED",
            ShipmentStatus::InTransit => "IN_TRANSIT",
            ShipmentStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            ShipmentStatus::Delivered => "DELIVERED",
            ShipmentStatus::Returned => "RETURNED",
            ShipmentStatus::Lost => "LOST",
            ShipmentStatus::Damaged => "DAMAGED",
        }
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ShipmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShipmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown shipment status: {s}"))
    }
}

/// Days from shipment creation to the estimated delivery for a shipping method.
pub fn delivery_days(method: Option<&str>) -> i64 {
    let Some(method) = method else {
        return 7;
    };
    match method.trim().to_ascii_lowercase().as_str() {
        "express" | "overnight" => 1,
        "priority" | "2-day" => 2,
        "expedited" => 3,
        _ => 7,
    }
}
