//! Append-only stock movement records.

use chrono::{DateTime, Utc};
use common::{InventoryRecordId, Sku, WarehouseId, reference};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::{Balance, InventoryRecord};

/// Unique identifier for a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    StockIn,
    StockOut,
    Reservation,
    ReservationRelease,
    Sale,
    Return,
    Damage,
    Adjustment,
    Transfer,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::StockIn => "STOCK_IN",
            TransactionType::StockOut => "STOCK_OUT",
            TransactionType::Reservation => "RESERVATION",
            TransactionType::ReservationRelease => "RESERVATION_RELEASE",
            TransactionType::Sale => "SALE",
            TransactionType::Return => "RETURN",
            TransactionType::Damage => "DAMAGE",
            TransactionType::Adjustment => "ADJUSTMENT",
            TransactionType::Transfer => "TRANSFER",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STOCK_IN" => Ok(TransactionType::StockIn),
            "STOCK_OUT" => Ok(TransactionType::StockOut),
            "RESERVATION" => Ok(TransactionType::Reservation),
            "RESERVATION_RELEASE" => Ok(TransactionType::ReservationRelease),
            "SALE" => Ok(TransactionType::Sale),
            "RETURN" => Ok(TransactionType::Return),
            "DAMAGE" => Ok(TransactionType::Damage),
            "ADJUSTMENT" => Ok(TransactionType::Adjustment),
            "TRANSFER" => Ok(TransactionType::Transfer),
            other => Err(format!("unknown transaction type: {other}")),
        }
    }
}

/// Who moved stock and why. Copied onto every ledger row an operation writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditContext {
    pub reason: Option<String>,
    pub actor: Option<String>,
    pub order_reference: Option<String>,
}

impl AuditContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn order(mut self, order_reference: impl Into<String>) -> Self {
        self.order_reference = Some(order_reference.into());
        self
    }

    /// The reason, or `fallback` when none was given.
    pub fn reason_or(&self, fallback: &str) -> String {
        self.reason.clone().unwrap_or_else(|| fallback.to_string())
    }
}

/// One immutable row of the inventory ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryTransaction {
    pub id: TransactionId,
    pub reference: String,
    pub record_id: InventoryRecordId,
    pub warehouse_id: WarehouseId,
    pub sku: Sku,
    pub transaction_type: TransactionType,
    pub quantity: u32,
    pub previous: Balance,
    pub resulting: Balance,
    pub reason: Option<String>,
    pub actor: Option<String>,
    pub order_reference: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl InventoryTransaction {
    /// Starts a row describing a movement that left `record` in its current state.
    pub fn builder(
        record: &InventoryRecord,
        transaction_type: TransactionType,
        quantity: u32,
    ) -> InventoryTransactionBuilder {
        InventoryTransactionBuilder {
            record_id: record.id,
            warehouse_id: record.warehouse_id,
            sku: record.sku,
            transaction_type,
            quantity,
            previous: Balance::default(),
            resulting: record.balance(),
            reason: None,
            actor: None,
            order_reference: None,
            timestamp: None,
        }
    }

    /// Signed change of on-hand stock recorded by this row.
    pub fn on_hand_delta(&self) -> i64 {
        i64::from(self.resulting.on_hand) - i64::from(self.previous.on_hand)
    }
}

#[derive(Debug, Clone)]
pub struct InventoryTransactionBuilder {
    record_id: InventoryRecordId,
    warehouse_id: WarehouseId,
    sku: Sku,
    transaction_type: TransactionType,
    quantity: u32,
    previous: Balance,
    resulting: Balance,
    reason: Option<String>,
    actor: Option<String>,
    order_reference: Option<String>,
    timestamp: Option<DateTime<Utc>>,
}

impl InventoryTransactionBuilder {
    /// Sets the balance before the movement.
    pub fn previous(mut self, previous: Balance) -> Self {
        self.previous = previous;
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Copies actor and order reference from the audit context; the reason is
    /// taken from the context or `fallback_reason`.
    pub fn audit(mut self, audit: &AuditContext, fallback_reason: &str) -> Self {
        self.reason = Some(audit.reason_or(fallback_reason));
        self.actor = audit.actor.clone();
        self.order_reference = audit.order_reference.clone();
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn build(self) -> InventoryTransaction {
        InventoryTransaction {
            id: TransactionId::new(),
            reference: reference::transaction_reference(),
            record_id: self.record_id,
            warehouse_id: self.warehouse_id,
            sku: self.sku,
            transaction_type: self.transaction_type,
            quantity: self.quantity,
            previous: self.previous,
            resulting: self.resulting,
            reason: self.reason,
            actor: self.actor,
            order_reference: self.order_reference,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        }
    }
}
