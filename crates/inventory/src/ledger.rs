//! Per-warehouse stock records and the append-only transaction ledger.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use common::{InventoryRecordId, ProductId, Sku, WarehouseId};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    AuditContext, Balance, InMemoryTransactionLog, InventoryError, InventoryRecord,
    InventoryStatus, InventoryTransaction, NewWarehouse, Result, TransactionLog, TransactionQuery,
    TransactionType, Warehouse, WarehouseStatus,
};

/// All records of one SKU, keyed by warehouse so iteration is the FIFO walk order.
#[derive(Debug, Default)]
pub(crate) struct SkuStock {
    pub(crate) records: BTreeMap<WarehouseId, InventoryRecord>,
}

impl SkuStock {
    pub(crate) fn total_available(&self) -> u32 {
        self.records
            .values()
            .fold(0u32, |acc, r| acc.saturating_add(r.quantity_available()))
    }

    pub(crate) fn total_on_hand(&self) -> u32 {
        self.records
            .values()
            .fold(0u32, |acc, r| acc.saturating_add(r.quantity_on_hand()))
    }
}

/// Absolute stock level for [`InventoryLedger::upsert_record`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockUpdate {
    pub quantity: u32,
    #[serde(default)]
    pub reorder_level: Option<u32>,
    #[serde(default)]
    pub max_stock_level: Option<u32>,
    #[serde(default)]
    pub location: Option<String>,
}

impl StockUpdate {
    pub fn quantity(quantity: u32) -> Self {
        Self {
            quantity,
            ..Default::default()
        }
    }
}

/// Outcome of replaying a record's ledger rows against its live balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub record_id: InventoryRecordId,
    pub transactions: usize,
    pub replayed: Balance,
    pub live: Balance,
    /// Rows whose `previous` balance did not continue from the row before.
    pub gaps: usize,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.gaps == 0 && self.replayed == self.live
    }
}

/// Stock records for every (warehouse, SKU) pair plus the ledger they write to.
///
/// Every mutation of a SKU's records happens while holding that SKU's mutex,
/// and every mutation appends one ledger row per record it touched.
#[derive(Clone)]
pub struct InventoryLedger {
    warehouses: Arc<RwLock<BTreeMap<WarehouseId, Warehouse>>>,
    stock: Arc<RwLock<HashMap<Sku, Arc<Mutex<SkuStock>>>>>,
    index: Arc<RwLock<HashMap<InventoryRecordId, (WarehouseId, Sku)>>>,
    next_warehouse_id: Arc<AtomicU64>,
    next_record_id: Arc<AtomicU64>,
    log: Arc<dyn TransactionLog>,
}

impl Default for InventoryLedger {
    fn default() -> Self {
        Self::new(Arc::new(InMemoryTransactionLog::new()))
    }
}

impl InventoryLedger {
    pub fn new(log: Arc<dyn TransactionLog>) -> Self {
        Self {
            warehouses: Arc::new(RwLock::new(BTreeMap::new())),
            stock: Arc::new(RwLock::new(HashMap::new())),
            index: Arc::new(RwLock::new(HashMap::new())),
            next_warehouse_id: Arc::new(AtomicU64::new(1)),
            next_record_id: Arc::new(AtomicU64::new(1)),
            log,
        }
    }

    pub fn log(&self) -> &Arc<dyn TransactionLog> {
        &self.log
    }

    // Warehouses

    #[tracing::instrument(skip(self))]
    pub async fn register_warehouse(&self, new: NewWarehouse) -> Result<Warehouse> {
        let code = new.code.trim();
        if code.is_empty() {
            return Err(InventoryError::validation("Warehouse code must not be empty"));
        }

        let mut warehouses = self.warehouses.write().await;
        if warehouses.values().any(|w| w.code == code) {
            return Err(InventoryError::validation(format!(
                "Warehouse code already exists: {code}"
            )));
        }

        let warehouse = Warehouse {
            id: WarehouseId::new(self.next_warehouse_id.fetch_add(1, Ordering::SeqCst)),
            code: code.to_string(),
            name: new.name,
            location: new.location,
            status: WarehouseStatus::Active,
            created_at: Utc::now(),
        };
        warehouses.insert(warehouse.id, warehouse.clone());

        tracing::info!(warehouse_id = %warehouse.id, code = %warehouse.code, "Warehouse registered");
        Ok(warehouse)
    }

    pub async fn warehouse(&self, id: WarehouseId) -> Result<Warehouse> {
        self.warehouses
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(InventoryError::WarehouseNotFound(id))
    }

    pub async fn warehouses(&self) -> Vec<Warehouse> {
        self.warehouses.read().await.values().cloned().collect()
    }

    pub(crate) async fn ensure_warehouse(&self, id: WarehouseId) -> Result<()> {
        if self.warehouses.read().await.contains_key(&id) {
            Ok(())
        } else {
            Err(InventoryError::WarehouseNotFound(id))
        }
    }

    // SKU locking

    async fn slot(&self, sku: Sku) -> Option<Arc<Mutex<SkuStock>>> {
        self.stock.read().await.get(&sku).cloned()
    }

    async fn slots(&self) -> Vec<Arc<Mutex<SkuStock>>> {
        self.stock.read().await.values().cloned().collect()
    }

    /// Locks the records of `sku`, or returns `None` if it was never stocked.
    pub(crate) async fn lock_sku(&self, sku: Sku) -> Option<OwnedMutexGuard<SkuStock>> {
        let slot = self.slot(sku).await?;
        Some(slot.lock_owned().await)
    }

    pub(crate) async fn lock_sku_or_create(&self, sku: Sku) -> OwnedMutexGuard<SkuStock> {
        let slot = match self.slot(sku).await {
            Some(slot) => slot,
            None => self.stock.write().await.entry(sku).or_default().clone(),
        };
        slot.lock_owned().await
    }

    /// Builds an empty record with a fresh id and indexes it.
    ///
    /// The caller must hold the SKU lock and insert the record into the SKU's map.
    pub(crate) async fn new_record(&self, warehouse_id: WarehouseId, sku: Sku) -> InventoryRecord {
        let id = InventoryRecordId::new(self.next_record_id.fetch_add(1, Ordering::SeqCst));
        self.index.write().await.insert(id, (warehouse_id, sku));
        InventoryRecord::new(id, warehouse_id, sku)
    }

    async fn locate(&self, id: InventoryRecordId) -> Result<(WarehouseId, Sku)> {
        self.index
            .read()
            .await
            .get(&id)
            .copied()
            .ok_or(InventoryError::RecordNotFound(id))
    }

    // Audit

    /// Appends a ledger row. A failed write is logged and counted, never returned.
    pub async fn append_transaction(&self, transaction: InventoryTransaction) {
        let reference = transaction.reference.clone();
        let record_id = transaction.record_id;
        if let Err(e) = self.log.append(transaction).await {
            metrics::counter!("inventory_audit_write_failures_total").increment(1);
            tracing::error!(
                error = %e,
                %reference,
                %record_id,
                "Failed to write inventory transaction"
            );
        }
    }

    // Record mutations

    /// Creates a record for a SKU in a warehouse, optionally with initial stock.
    #[tracing::instrument(skip(self, audit))]
    pub async fn create_record(
        &self,
        warehouse_id: WarehouseId,
        sku: Sku,
        initial_quantity: u32,
        audit: &AuditContext,
    ) -> Result<InventoryRecord> {
        self.ensure_warehouse(warehouse_id).await?;

        let mut stock = self.lock_sku_or_create(sku).await;
        if stock.records.contains_key(&warehouse_id) {
            return Err(InventoryError::validation(format!(
                "Inventory record already exists for SKU {sku} in warehouse {warehouse_id}"
            )));
        }

        let mut record = self.new_record(warehouse_id, sku).await;
        let previous = record.balance();
        record.set_balance(Balance::new(initial_quantity, 0))?;
        stock.records.insert(warehouse_id, record.clone());

        if initial_quantity > 0 {
            let tx = InventoryTransaction::builder(&record, TransactionType::StockIn, initial_quantity)
                .previous(previous)
                .audit(audit, "Initial stock")
                .build();
            self.append_transaction(tx).await;
        }

        tracing::info!(record_id = %record.id, initial_quantity, "Inventory record created");
        Ok(record)
    }

    /// Finds or creates the record and sets its absolute on-hand level.
    ///
    /// Writes a STOCK_IN or STOCK_OUT row for the difference. Setting on-hand
    /// below the reserved quantity is rejected.
    #[tracing::instrument(skip(self, update, audit), fields(quantity = update.quantity))]
    pub async fn upsert_record(
        &self,
        warehouse_id: WarehouseId,
        sku: Sku,
        update: StockUpdate,
        audit: &AuditContext,
    ) -> Result<InventoryRecord> {
        self.ensure_warehouse(warehouse_id).await?;

        let mut stock = self.lock_sku_or_create(sku).await;
        let mut record = match stock.records.get(&warehouse_id) {
            Some(existing) => existing.clone(),
            None => self.new_record(warehouse_id, sku).await,
        };

        let previous = record.balance();
        if let Some(reorder_level) = update.reorder_level {
            record.reorder_level = reorder_level;
        }
        if let Some(max_stock_level) = update.max_stock_level {
            record.max_stock_level = max_stock_level;
        }
        if let Some(location) = update.location {
            record.location = Some(location);
        }
        record.set_balance(Balance::new(update.quantity, previous.reserved))?;
        stock.records.insert(warehouse_id, record.clone());

        let delta = i64::from(update.quantity) - i64::from(previous.on_hand);
        if delta != 0 {
            let transaction_type = if delta > 0 {
                TransactionType::StockIn
            } else {
                TransactionType::StockOut
            };
            let tx = InventoryTransaction::builder(&record, transaction_type, delta.unsigned_abs() as u32)
                .previous(previous)
                .audit(audit, "Manual stock adjustment")
                .build();
            self.append_transaction(tx).await;
        }

        tracing::info!(
            record_id = %record.id,
            previous = previous.on_hand,
            current = update.quantity,
            delta,
            "Stock updated"
        );
        Ok(record)
    }

    /// Removes a record that holds no stock and no reservations.
    #[tracing::instrument(skip(self))]
    pub async fn delete_record(&self, record_id: InventoryRecordId) -> Result<()> {
        let (warehouse_id, sku) = self.locate(record_id).await?;
        let mut stock = self
            .lock_sku(sku)
            .await
            .ok_or(InventoryError::RecordNotFound(record_id))?;

        let record = stock
            .records
            .get(&warehouse_id)
            .ok_or(InventoryError::RecordNotFound(record_id))?;
        if !record.is_empty() {
            return Err(InventoryError::validation(format!(
                "Cannot delete inventory record {record_id} with on-hand {} and reserved {}",
                record.quantity_on_hand(),
                record.quantity_reserved()
            )));
        }

        stock.records.remove(&warehouse_id);
        self.index.write().await.remove(&record_id);
        tracing::info!(%record_id, "Inventory record deleted");
        Ok(())
    }

    /// Sets an administrative status such as INACTIVE or DISCONTINUED.
    #[tracing::instrument(skip(self))]
    pub async fn set_status(
        &self,
        record_id: InventoryRecordId,
        status: InventoryStatus,
    ) -> Result<InventoryRecord> {
        let (warehouse_id, sku) = self.locate(record_id).await?;
        let mut stock = self
            .lock_sku(sku)
            .await
            .ok_or(InventoryError::RecordNotFound(record_id))?;
        let record = stock
            .records
            .get_mut(&warehouse_id)
            .ok_or(InventoryError::RecordNotFound(record_id))?;
        record.set_status(status);
        Ok(record.clone())
    }

    // Reads

    pub async fn get_record(&self, warehouse_id: WarehouseId, sku: Sku) -> Option<InventoryRecord> {
        let stock = self.lock_sku(sku).await?;
        stock.records.get(&warehouse_id).cloned()
    }

    pub async fn record(&self, record_id: InventoryRecordId) -> Result<InventoryRecord> {
        let (warehouse_id, sku) = self.locate(record_id).await?;
        self.get_record(warehouse_id, sku)
            .await
            .ok_or(InventoryError::RecordNotFound(record_id))
    }

    /// Records of one SKU in ascending warehouse order.
    pub async fn records_for_sku(&self, sku: Sku) -> Vec<InventoryRecord> {
        match self.lock_sku(sku).await {
            Some(stock) => stock.records.values().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Records of a product and all of its variants.
    pub async fn records_for_product(&self, product_id: ProductId) -> Vec<InventoryRecord> {
        let mut records = self
            .all_records()
            .await
            .into_iter()
            .filter(|r| r.sku.product_id == product_id)
            .collect::<Vec<_>>();
        records.sort_by_key(|r| (r.sku, r.warehouse_id));
        records
    }

    pub async fn records_in_warehouse(&self, warehouse_id: WarehouseId) -> Vec<InventoryRecord> {
        self.filter_records(|r| r.warehouse_id == warehouse_id).await
    }

    pub async fn records_by_status(&self, status: InventoryStatus) -> Vec<InventoryRecord> {
        self.filter_records(|r| r.status() == status).await
    }

    /// Sellable records at or below their reorder level.
    pub async fn low_stock(&self) -> Vec<InventoryRecord> {
        self.filter_records(InventoryRecord::is_low_stock).await
    }

    pub async fn out_of_stock(&self) -> Vec<InventoryRecord> {
        self.records_by_status(InventoryStatus::OutOfStock).await
    }

    pub async fn count_in_warehouse(
        &self,
        warehouse_id: WarehouseId,
        status: InventoryStatus,
    ) -> usize {
        self.filter_records(|r| r.warehouse_id == warehouse_id && r.status() == status)
            .await
            .len()
    }

    async fn all_records(&self) -> Vec<InventoryRecord> {
        let mut records = Vec::new();
        for slot in self.slots().await {
            let stock = slot.lock().await;
            records.extend(stock.records.values().cloned());
        }
        records
    }

    async fn filter_records<F>(&self, predicate: F) -> Vec<InventoryRecord>
    where
        F: Fn(&InventoryRecord) -> bool,
    {
        let mut records: Vec<_> = self
            .all_records()
            .await
            .into_iter()
            .filter(|r| predicate(r))
            .collect();
        records.sort_by_key(|r| r.id);
        records
    }

    /// Sum of available units over every warehouse record of the SKU.
    pub async fn total_available(&self, sku: Sku) -> u32 {
        match self.lock_sku(sku).await {
            Some(stock) => stock.total_available(),
            None => 0,
        }
    }

    pub async fn total_on_hand(&self, sku: Sku) -> u32 {
        match self.lock_sku(sku).await {
            Some(stock) => stock.total_on_hand(),
            None => 0,
        }
    }

    // Ledger reads

    pub async fn transactions(&self, query: TransactionQuery) -> Result<Vec<InventoryTransaction>> {
        Ok(self.log.query(query).await?)
    }

    /// Replays a record's ledger rows and compares the result with its live balance.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile(&self, record_id: InventoryRecordId) -> Result<Reconciliation> {
        let live = self.record(record_id).await?.balance();
        let rows = self.log.for_record(record_id).await?;

        let mut replayed = Balance::default();
        let mut gaps = 0;
        for row in &rows {
            if row.previous != replayed {
                gaps += 1;
            }
            replayed = row.resulting;
        }

        let report = Reconciliation {
            record_id,
            transactions: rows.len(),
            replayed,
            live,
            gaps,
        };
        if !report.is_consistent() {
            tracing::warn!(
                %record_id,
                gaps,
                ?replayed,
                ?live,
                "Inventory ledger does not match live record"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use common::VariantId;

    use super::*;

    async fn ledger_with_warehouse() -> (InventoryLedger, WarehouseId) {
        let ledger = InventoryLedger::default();
        let warehouse = ledger
            .register_warehouse(NewWarehouse::new("WH-1", "Main"))
            .await
            .unwrap();
        (ledger, warehouse.id)
    }

    fn sku() -> Sku {
        Sku::product(ProductId::new(100))
    }

    #[tokio::test]
    async fn duplicate_warehouse_code_is_rejected() {
        let (ledger, _) = ledger_with_warehouse().await;
        let result = ledger
            .register_warehouse(NewWarehouse::new("WH-1", "Other"))
            .await;
        assert!(matches!(result, Err(InventoryError::Validation(_))));
    }

    #[tokio::test]
    async fn create_record_writes_stock_in() {
        let (ledger, wh) = ledger_with_warehouse().await;
        let record = ledger
            .create_record(wh, sku(), 25, &AuditContext::new().actor("admin"))
            .await
            .unwrap();

        assert_eq!(record.quantity_on_hand(), 25);
        assert_eq!(record.status(), InventoryStatus::Active);

        let rows = ledger
            .transactions(TransactionQuery::for_record(record.id))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].transaction_type, TransactionType::StockIn);
        assert_eq!(rows[0].previous, Balance::new(0, 0));
        assert_eq!(rows[0].resulting, Balance::new(25, 0));
        assert_eq!(rows[0].actor.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn create_record_twice_is_rejected() {
        let (ledger, wh) = ledger_with_warehouse().await;
        ledger
            .create_record(wh, sku(), 0, &AuditContext::new())
            .await
            .unwrap();
        let result = ledger.create_record(wh, sku(), 5, &AuditContext::new()).await;
        assert!(matches!(result, Err(InventoryError::Validation(_))));
    }

    #[tokio::test]
    async fn create_record_requires_known_warehouse() {
        let ledger = InventoryLedger::default();
        let result = ledger
            .create_record(WarehouseId::new(9), sku(), 1, &AuditContext::new())
            .await;
        assert!(matches!(result, Err(InventoryError::WarehouseNotFound(_))));
    }

    #[tokio::test]
    async fn upsert_creates_then_adjusts() {
        let (ledger, wh) = ledger_with_warehouse().await;
        let audit = AuditContext::new();

        let created = ledger
            .upsert_record(wh, sku(), StockUpdate::quantity(40), &audit)
            .await
            .unwrap();
        let updated = ledger
            .upsert_record(
                wh,
                sku(),
                StockUpdate {
                    quantity: 15,
                    reorder_level: Some(20),
                    ..Default::default()
                },
                &audit,
            )
            .await
            .unwrap();

        assert_eq!(created.id, updated.id);
        assert_eq!(updated.quantity_on_hand(), 15);
        assert_eq!(updated.status(), InventoryStatus::LowStock);

        let rows = ledger
            .transactions(TransactionQuery::for_record(updated.id))
            .await
            .unwrap();
        let types: Vec<_> = rows.iter().map(|r| (r.transaction_type, r.quantity)).collect();
        assert_eq!(
            types,
            vec![(TransactionType::StockIn, 40), (TransactionType::StockOut, 25)]
        );
    }

    #[tokio::test]
    async fn unchanged_quantity_writes_no_row() {
        let (ledger, wh) = ledger_with_warehouse().await;
        let audit = AuditContext::new();
        ledger
            .upsert_record(wh, sku(), StockUpdate::quantity(5), &audit)
            .await
            .unwrap();
        let record = ledger
            .upsert_record(wh, sku(), StockUpdate::quantity(5), &audit)
            .await
            .unwrap();

        let rows = ledger
            .transactions(TransactionQuery::for_record(record.id))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn delete_requires_empty_record() {
        let (ledger, wh) = ledger_with_warehouse().await;
        let record = ledger
            .create_record(wh, sku(), 3, &AuditContext::new())
            .await
            .unwrap();

        let result = ledger.delete_record(record.id).await;
        assert!(matches!(result, Err(InventoryError::Validation(_))));

        ledger
            .upsert_record(wh, sku(), StockUpdate::quantity(0), &AuditContext::new())
            .await
            .unwrap();
        ledger.delete_record(record.id).await.unwrap();

        assert!(ledger.get_record(wh, sku()).await.is_none());
        assert!(matches!(
            ledger.record(record.id).await,
            Err(InventoryError::RecordNotFound(_))
        ));
    }

    #[tokio::test]
    async fn totals_sum_over_warehouses() {
        let ledger = InventoryLedger::default();
        let a = ledger
            .register_warehouse(NewWarehouse::new("A", "A"))
            .await
            .unwrap();
        let b = ledger
            .register_warehouse(NewWarehouse::new("B", "B"))
            .await
            .unwrap();
        let audit = AuditContext::new();
        ledger.create_record(a.id, sku(), 3, &audit).await.unwrap();
        ledger.create_record(b.id, sku(), 5, &audit).await.unwrap();

        assert_eq!(ledger.total_on_hand(sku()).await, 8);
        assert_eq!(ledger.total_available(sku()).await, 8);
        assert_eq!(ledger.total_available(Sku::product(ProductId::new(1))).await, 0);
    }

    #[tokio::test]
    async fn variant_records_are_separate_skus() {
        let (ledger, wh) = ledger_with_warehouse().await;
        let audit = AuditContext::new();
        let variant = Sku::variant(ProductId::new(100), VariantId::new(1));
        ledger.create_record(wh, sku(), 2, &audit).await.unwrap();
        ledger.create_record(wh, variant, 7, &audit).await.unwrap();

        assert_eq!(ledger.total_on_hand(sku()).await, 2);
        assert_eq!(ledger.total_on_hand(variant).await, 7);
        assert_eq!(ledger.records_for_product(ProductId::new(100)).await.len(), 2);
    }

    #[tokio::test]
    async fn status_queries() {
        let (ledger, wh) = ledger_with_warehouse().await;
        let audit = AuditContext::new();
        let low = ledger
            .create_record(wh, Sku::product(ProductId::new(1)), 4, &audit)
            .await
            .unwrap();
        let empty = ledger
            .create_record(wh, Sku::product(ProductId::new(2)), 0, &audit)
            .await
            .unwrap();
        ledger
            .create_record(wh, Sku::product(ProductId::new(3)), 500, &audit)
            .await
            .unwrap();

        let low_ids: Vec<_> = ledger.low_stock().await.iter().map(|r| r.id).collect();
        assert!(low_ids.contains(&low.id));
        assert!(!low_ids.contains(&empty.id));

        let out: Vec<_> = ledger.out_of_stock().await.iter().map(|r| r.id).collect();
        assert_eq!(out, vec![empty.id]);

        assert_eq!(ledger.count_in_warehouse(wh, InventoryStatus::Active).await, 1);
        assert_eq!(ledger.records_in_warehouse(wh).await.len(), 3);

        ledger
            .set_status(low.id, InventoryStatus::Discontinued)
            .await
            .unwrap();
        assert_eq!(
            ledger.records_by_status(InventoryStatus::Discontinued).await.len(),
            1
        );
    }

    #[tokio::test]
    async fn reconcile_detects_missing_rows() {
        let log = Arc::new(InMemoryTransactionLog::new());
        let ledger = InventoryLedger::new(log.clone());
        let wh = ledger
            .register_warehouse(NewWarehouse::new("WH", "WH"))
            .await
            .unwrap()
            .id;
        let audit = AuditContext::new();
        let record = ledger.create_record(wh, sku(), 10, &audit).await.unwrap();
        assert!(ledger.reconcile(record.id).await.unwrap().is_consistent());

        log.set_unavailable(true);
        ledger
            .upsert_record(wh, sku(), StockUpdate::quantity(12), &audit)
            .await
            .unwrap();
        log.set_unavailable(false);

        let report = ledger.reconcile(record.id).await.unwrap();
        assert!(!report.is_consistent());
        assert_eq!(report.replayed, Balance::new(10, 0));
        assert_eq!(report.live, Balance::new(12, 0));
    }
}
