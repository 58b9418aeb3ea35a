//! Multi-warehouse inventory: stock records, the transaction ledger and the
//! reservation coordinator that allocates stock to orders.

pub mod allocation;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod log;
pub mod query;
pub mod record;
pub mod transaction;
pub mod warehouse;

pub use allocation::{Allocation, plan_fifo};
pub use coordinator::{CommitOutcome, ReservationCoordinator, StockAdjustment, Transfer};
pub use error::{InventoryError, LogResult, Result, TransactionLogError};
pub use ledger::{InventoryLedger, Reconciliation, StockUpdate};
pub use log::{InMemoryTransactionLog, PostgresTransactionLog, TransactionLog};
pub use query::TransactionQuery;
pub use record::{Balance, InventoryRecord, InventoryStatus};
pub use transaction::{
    AuditContext, InventoryTransaction, InventoryTransactionBuilder, TransactionId,
    TransactionType,
};
pub use warehouse::{NewWarehouse, Warehouse, WarehouseStatus};
