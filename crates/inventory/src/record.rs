//! Per-warehouse stock records.

use chrono::{DateTime, Utc};
use common::{InventoryRecordId, Sku, WarehouseId};
use serde::{Deserialize, Serialize};

use crate::{InventoryError, Result};

pub const DEFAULT_REORDER_LEVEL: u32 = 10;
pub const DEFAULT_MAX_STOCK_LEVEL: u32 = 1000;

/// Administrative and derived status of a record.
///
/// `Inactive` and `Discontinued` are set by administrators and stick. The
/// other three are derived from the on-hand level after every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InventoryStatus {
    #[default]
    Active,
    Inactive,
    Discontinued,
    OutOfStock,
    LowStock,
}

impl InventoryStatus {
    /// Returns true if the status is recomputed from stock levels.
    pub fn is_derived(&self) -> bool {
        matches!(
            self,
            InventoryStatus::Active | InventoryStatus::OutOfStock | InventoryStatus::LowStock
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryStatus::Active => "ACTIVE",
            InventoryStatus::Inactive => "INACTIVE",
            InventoryStatus::Discontinued => "DISCONTINUED",
            InventoryStatus::OutOfStock => "OUT_OF_STOCK",
            InventoryStatus::LowStock => "LOW_STOCK",
        }
    }
}

impl std::fmt::Display for InventoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// On-hand and reserved counts of one record at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Balance {
    pub on_hand: u32,
    pub reserved: u32,
}

impl Balance {
    pub fn new(on_hand: u32, reserved: u32) -> Self {
        Self { on_hand, reserved }
    }

    pub fn available(&self) -> u32 {
        self.on_hand.saturating_sub(self.reserved)
    }

    pub fn is_valid(&self) -> bool {
        self.reserved <= self.on_hand
    }
}

/// Stock of one SKU in one warehouse.
///
/// Counts are private so every change goes through [`InventoryRecord::set_balance`],
/// which enforces `reserved <= on_hand`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub id: InventoryRecordId,
    pub warehouse_id: WarehouseId,
    pub sku: Sku,
    quantity_on_hand: u32,
    quantity_reserved: u32,
    pub reorder_level: u32,
    pub max_stock_level: u32,
    pub location: Option<String>,
    status: InventoryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryRecord {
    /// Creates an empty record with default reorder and max levels.
    pub fn new(id: InventoryRecordId, warehouse_id: WarehouseId, sku: Sku) -> Self {
        let now = Utc::now();
        let mut record = Self {
            id,
            warehouse_id,
            sku,
            quantity_on_hand: 0,
            quantity_reserved: 0,
            reorder_level: DEFAULT_REORDER_LEVEL,
            max_stock_level: DEFAULT_MAX_STOCK_LEVEL,
            location: None,
            status: InventoryStatus::Active,
            created_at: now,
            updated_at: now,
        };
        record.refresh_status();
        record
    }

    pub fn quantity_on_hand(&self) -> u32 {
        self.quantity_on_hand
    }

    pub fn quantity_reserved(&self) -> u32 {
        self.quantity_reserved
    }

    pub fn quantity_available(&self) -> u32 {
        self.balance().available()
    }

    pub fn status(&self) -> InventoryStatus {
        self.status
    }

    pub fn balance(&self) -> Balance {
        Balance::new(self.quantity_on_hand, self.quantity_reserved)
    }

    /// Returns true if the record may be physically removed.
    pub fn is_empty(&self) -> bool {
        self.quantity_on_hand == 0 && self.quantity_reserved == 0
    }

    /// Active record at or below its reorder level.
    pub fn is_low_stock(&self) -> bool {
        matches!(
            self.status,
            InventoryStatus::Active | InventoryStatus::LowStock
        ) && self.quantity_on_hand <= self.reorder_level
    }

    /// Replaces both counts, rejecting any balance with `reserved > on_hand`.
    pub(crate) fn set_balance(&mut self, balance: Balance) -> Result<()> {
        if !balance.is_valid() {
            return Err(InventoryError::validation(format!(
                "reserved quantity {} would exceed on-hand quantity {} for SKU {} in warehouse {}",
                balance.reserved, balance.on_hand, self.sku, self.warehouse_id
            )));
        }
        self.quantity_on_hand = balance.on_hand;
        self.quantity_reserved = balance.reserved;
        self.updated_at = Utc::now();
        self.refresh_status();
        Ok(())
    }

    /// Sets an administrative status. Derived statuses are recomputed immediately.
    pub(crate) fn set_status(&mut self, status: InventoryStatus) {
        self.status = status;
        self.updated_at = Utc::now();
        self.refresh_status();
    }

    pub(crate) fn refresh_status(&mut self) {
        if !self.status.is_derived() {
            return;
        }
        self.status = if self.quantity_on_hand == 0 {
            InventoryStatus::OutOfStock
        } else if self.quantity_on_hand <= self.reorder_level {
            InventoryStatus::LowStock
        } else {
            InventoryStatus::Active
        };
    }
}

#[cfg(test)]
mod tests {
    use common::ProductId;

    use super::*;

    fn record() -> InventoryRecord {
        InventoryRecord::new(
            InventoryRecordId::new(1),
            WarehouseId::new(1),
            Sku::product(ProductId::new(7)),
        )
    }

    #[test]
    fn new_record_is_out_of_stock() {
        let record = record();
        assert_eq!(record.status(), InventoryStatus::OutOfStock);
        assert_eq!(record.reorder_level, DEFAULT_REORDER_LEVEL);
        assert_eq!(record.max_stock_level, DEFAULT_MAX_STOCK_LEVEL);
        assert!(record.is_empty());
    }

    #[test]
    fn status_follows_on_hand() {
        let mut record = record();
        record.set_balance(Balance::new(5, 0)).unwrap();
        assert_eq!(record.status(), InventoryStatus::LowStock);

        record.set_balance(Balance::new(50, 0)).unwrap();
        assert_eq!(record.status(), InventoryStatus::Active);

        record.set_balance(Balance::new(0, 0)).unwrap();
        assert_eq!(record.status(), InventoryStatus::OutOfStock);
    }

    #[test]
    fn reserved_above_on_hand_is_rejected() {
        let mut record = record();
        record.set_balance(Balance::new(3, 2)).unwrap();

        let result = record.set_balance(Balance::new(3, 4));
        assert!(matches!(result, Err(InventoryError::Validation(_))));
        assert_eq!(record.balance(), Balance::new(3, 2));
        assert_eq!(record.quantity_available(), 1);
    }

    #[test]
    fn administrative_status_is_sticky() {
        let mut record = record();
        record.set_status(InventoryStatus::Discontinued);
        record.set_balance(Balance::new(100, 0)).unwrap();
        assert_eq!(record.status(), InventoryStatus::Discontinued);

        record.set_status(InventoryStatus::Active);
        assert_eq!(record.status(), InventoryStatus::Active);
    }

    #[test]
    fn low_stock_excludes_inactive_records() {
        let mut record = record();
        record.set_balance(Balance::new(4, 0)).unwrap();
        assert!(record.is_low_stock());

        record.set_status(InventoryStatus::Inactive);
        assert!(!record.is_low_stock());
    }
}
