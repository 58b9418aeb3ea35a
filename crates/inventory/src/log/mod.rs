//! Storage backends for the inventory ledger.

mod memory;
mod postgres;

use async_trait::async_trait;
use common::InventoryRecordId;

pub use memory::InMemoryTransactionLog;
pub use postgres::PostgresTransactionLog;

use crate::{InventoryTransaction, LogResult, TransactionQuery};

/// Append-only store of [`InventoryTransaction`] rows.
///
/// Implementations must be thread-safe and must return rows in append order.
#[async_trait]
pub trait TransactionLog: Send + Sync {
    /// Appends one row.
    async fn append(&self, transaction: InventoryTransaction) -> LogResult<()>;

    /// Retrieves rows matching a query, oldest first.
    async fn query(&self, query: TransactionQuery) -> LogResult<Vec<InventoryTransaction>>;

    /// Retrieves every row written for one record, oldest first.
    async fn for_record(&self, record_id: InventoryRecordId) -> LogResult<Vec<InventoryTransaction>> {
        self.query(TransactionQuery::for_record(record_id)).await
    }
}
