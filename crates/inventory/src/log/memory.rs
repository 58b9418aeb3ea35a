use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::TransactionLog;
use crate::{InventoryTransaction, LogResult, TransactionLogError, TransactionQuery};

/// In-memory ledger used by tests and by the server when no database is configured.
#[derive(Clone, Default)]
pub struct InMemoryTransactionLog {
    rows: Arc<RwLock<Vec<InventoryTransaction>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryTransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Makes every subsequent append fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn clear(&self) {
        self.rows.write().await.clear();
    }
}

#[async_trait]
impl TransactionLog for InMemoryTransactionLog {
    async fn append(&self, transaction: InventoryTransaction) -> LogResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TransactionLogError::Unavailable(
                "in-memory log switched off".to_string(),
            ));
        }
        self.rows.write().await.push(transaction);
        Ok(())
    }

    async fn query(&self, query: TransactionQuery) -> LogResult<Vec<InventoryTransaction>> {
        let rows = self.rows.read().await;
        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(rows
            .iter()
            .filter(|tx| query.matches(tx))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use common::{InventoryRecordId, ProductId, Sku, WarehouseId};

    use super::*;
    use crate::{Balance, InventoryRecord, TransactionType};

    fn row(record_id: u64, tt: TransactionType) -> InventoryTransaction {
        let mut record = InventoryRecord::new(
            InventoryRecordId::new(record_id),
            WarehouseId::new(1),
            Sku::product(ProductId::new(1)),
        );
        record.set_balance(Balance::new(5, 0)).unwrap();
        InventoryTransaction::builder(&record, tt, 5).build()
    }

    #[tokio::test]
    async fn append_and_query_in_order() {
        let log = InMemoryTransactionLog::new();
        log.append(row(1, TransactionType::StockIn)).await.unwrap();
        log.append(row(2, TransactionType::StockIn)).await.unwrap();
        log.append(row(1, TransactionType::Sale)).await.unwrap();

        let rows = log.for_record(InventoryRecordId::new(1)).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].transaction_type, TransactionType::StockIn);
        assert_eq!(rows[1].transaction_type, TransactionType::Sale);
    }

    #[tokio::test]
    async fn paging_applies_after_filtering() {
        let log = InMemoryTransactionLog::new();
        for _ in 0..5 {
            log.append(row(1, TransactionType::StockIn)).await.unwrap();
        }

        let rows = log
            .query(TransactionQuery::new().offset(1).limit(2))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn unavailable_log_rejects_appends() {
        let log = InMemoryTransactionLog::new();
        log.set_unavailable(true);
        let result = log.append(row(1, TransactionType::StockIn)).await;
        assert!(matches!(result, Err(TransactionLogError::Unavailable(_))));
        assert!(log.is_empty().await);
    }
}
