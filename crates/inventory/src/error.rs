use common::{InventoryRecordId, Sku, WarehouseId};
use thiserror::Error;

/// Errors returned by the inventory ledger and the reservation coordinator.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Warehouse not found: {0}")]
    WarehouseNotFound(WarehouseId),

    #[error("Inventory record not found: {0}")]
    RecordNotFound(InventoryRecordId),

    /// No record exists for the SKU in the given warehouse.
    #[error("No inventory for SKU {sku} in warehouse {warehouse_id}")]
    StockNotFound { warehouse_id: WarehouseId, sku: Sku },

    /// No record exists for the SKU in any warehouse.
    #[error("No inventory found for SKU {0}")]
    NoInventory(Sku),

    #[error("Insufficient stock for SKU {sku}: requested {requested}, available {available}")]
    InsufficientStock {
        sku: Sku,
        requested: u32,
        available: u32,
    },

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(u32),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Reading the ledger failed. Writes never surface here.
    #[error("Transaction log error: {0}")]
    Log(#[from] TransactionLogError),
}

impl InventoryError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::WarehouseNotFound(_)
                | Self::RecordNotFound(_)
                | Self::StockNotFound { .. }
                | Self::NoInventory(_)
        )
    }
}

/// Errors raised by a [`TransactionLog`](crate::TransactionLog) backend.
///
/// These never reach callers of stock operations; the ledger logs and counts them.
#[derive(Debug, Error)]
pub enum TransactionLogError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt transaction row: {0}")]
    Corrupt(String),

    #[error("Transaction log unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, InventoryError>;

pub type LogResult<T> = std::result::Result<T, TransactionLogError>;
