//! Reservation, release, commit and transfer across warehouses.

use common::{Sku, WarehouseId};
use serde::{Deserialize, Serialize};

use crate::{
    Allocation, AuditContext, Balance, InventoryError, InventoryLedger, InventoryRecord,
    InventoryTransaction, Result, TransactionType, plan_fifo,
};

/// Result of [`ReservationCoordinator::commit_reduction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitOutcome {
    pub allocations: Vec<Allocation>,
    pub committed: u32,
    /// Units that could not be taken because on-hand stock ran out.
    pub shortfall: u32,
}

/// Result of [`ReservationCoordinator::transfer_stock`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub source: InventoryRecord,
    pub destination: InventoryRecord,
}

/// A single-record stock movement for [`ReservationCoordinator::adjust_stock`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub warehouse_id: WarehouseId,
    pub sku: Sku,
    pub transaction_type: TransactionType,
    /// Units to add or remove; the new absolute level for `ADJUSTMENT`.
    pub quantity: u32,
}

/// Allocates stock of a SKU across its warehouse records.
///
/// Records are walked in ascending warehouse id. Every operation holds the
/// SKU's lock for its whole duration, plans against the locked records and
/// only writes back once the plan is known to be valid.
#[derive(Clone, Default)]
pub struct ReservationCoordinator {
    ledger: InventoryLedger,
}

impl ReservationCoordinator {
    pub fn new(ledger: InventoryLedger) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &InventoryLedger {
        &self.ledger
    }

    /// Returns true if at least `quantity` units are available across all warehouses.
    pub async fn check_availability(&self, sku: Sku, quantity: u32) -> bool {
        if quantity == 0 {
            return false;
        }
        let available = self.ledger.total_available(sku).await;
        tracing::debug!(%sku, quantity, available, "Availability checked");
        available >= quantity
    }

    /// Reserves `quantity` units, all or nothing.
    #[tracing::instrument(skip(self, audit))]
    pub async fn reserve(
        &self,
        sku: Sku,
        quantity: u32,
        audit: &AuditContext,
    ) -> Result<Vec<Allocation>> {
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity(quantity));
        }

        let Some(mut stock) = self.ledger.lock_sku(sku).await else {
            metrics::counter!("inventory_reservation_failures_total").increment(1);
            return Err(InventoryError::InsufficientStock {
                sku,
                requested: quantity,
                available: 0,
            });
        };

        let available = stock.total_available();
        if available < quantity {
            metrics::counter!("inventory_reservation_failures_total").increment(1);
            tracing::warn!(%sku, quantity, available, "Insufficient stock for reservation");
            return Err(InventoryError::InsufficientStock {
                sku,
                requested: quantity,
                available,
            });
        }

        let (plan, _) = plan_fifo(
            stock
                .records
                .values()
                .map(|r| (r.warehouse_id, r.id, r.quantity_available())),
            quantity,
        );

        let mut staged = Vec::with_capacity(plan.len());
        for allocation in &plan {
            let mut record = staged_record(&stock.records, allocation.warehouse_id)?;
            let previous = record.balance();
            record.set_balance(Balance::new(
                previous.on_hand,
                previous.reserved + allocation.quantity,
            ))?;
            staged.push((record, previous, allocation.quantity));
        }

        for (record, previous, taken) in staged {
            let tx = InventoryTransaction::builder(&record, TransactionType::Reservation, taken)
                .previous(previous)
                .audit(audit, "Stock reserved for order")
                .build();
            tracing::debug!(warehouse_id = %record.warehouse_id, taken, "Reserved from warehouse");
            stock.records.insert(record.warehouse_id, record);
            self.ledger.append_transaction(tx).await;
        }

        metrics::counter!("inventory_reservations_total").increment(1);
        tracing::info!(%sku, quantity, warehouses = plan.len(), "Inventory reserved");
        Ok(plan)
    }

    /// Releases up to `quantity` reserved units. Over-release is clamped.
    ///
    /// Returns the number of units actually released.
    #[tracing::instrument(skip(self, audit))]
    pub async fn release(&self, sku: Sku, quantity: u32, audit: &AuditContext) -> Result<u32> {
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity(quantity));
        }

        let Some(mut stock) = self.ledger.lock_sku(sku).await else {
            tracing::warn!(%sku, "No inventory found to release");
            return Ok(0);
        };

        let (plan, unreleased) = plan_fifo(
            stock
                .records
                .values()
                .map(|r| (r.warehouse_id, r.id, r.quantity_reserved())),
            quantity,
        );

        let mut staged = Vec::with_capacity(plan.len());
        for allocation in &plan {
            let mut record = staged_record(&stock.records, allocation.warehouse_id)?;
            let previous = record.balance();
            record.set_balance(Balance::new(
                previous.on_hand,
                previous.reserved - allocation.quantity,
            ))?;
            staged.push((record, previous, allocation.quantity));
        }

        for (record, previous, released) in staged {
            let tx =
                InventoryTransaction::builder(&record, TransactionType::ReservationRelease, released)
                    .previous(previous)
                    .audit(audit, "Stock reservation released")
                    .build();
            stock.records.insert(record.warehouse_id, record);
            self.ledger.append_transaction(tx).await;
        }

        let released = quantity - unreleased;
        if unreleased > 0 {
            tracing::warn!(%sku, requested = quantity, released, "Release exceeded reserved stock");
        }
        tracing::info!(%sku, released, "Inventory released");
        Ok(released)
    }

    /// Permanently removes sold units from on-hand stock.
    ///
    /// Reserved units are consumed first, then unreserved available units, both
    /// in warehouse order. If on-hand stock runs out the remainder is reported
    /// as a shortfall; no count ever goes negative.
    #[tracing::instrument(skip(self, audit))]
    pub async fn commit_reduction(
        &self,
        sku: Sku,
        quantity: u32,
        audit: &AuditContext,
    ) -> Result<CommitOutcome> {
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity(quantity));
        }

        let mut stock = match self.ledger.lock_sku(sku).await {
            Some(stock) if !stock.records.is_empty() => stock,
            _ => return Err(InventoryError::NoInventory(sku)),
        };

        let (from_reserved, remaining) = plan_fifo(
            stock
                .records
                .values()
                .map(|r| (r.warehouse_id, r.id, r.quantity_reserved())),
            quantity,
        );
        let (from_available, shortfall) = plan_fifo(
            stock
                .records
                .values()
                .map(|r| (r.warehouse_id, r.id, r.quantity_available())),
            remaining,
        );

        let mut allocations: Vec<Allocation> = Vec::new();
        let mut staged = Vec::new();
        for record in stock.records.values() {
            let reserved_take = taken_from(&from_reserved, record.warehouse_id);
            let available_take = taken_from(&from_available, record.warehouse_id);
            let total = reserved_take + available_take;
            if total == 0 {
                continue;
            }
            let mut updated = record.clone();
            let previous = updated.balance();
            updated.set_balance(Balance::new(
                previous.on_hand - total,
                previous.reserved - reserved_take,
            ))?;
            allocations.push(Allocation {
                warehouse_id: record.warehouse_id,
                record_id: record.id,
                quantity: total,
            });
            staged.push((updated, previous, total));
        }

        for (record, previous, total) in staged {
            let tx = InventoryTransaction::builder(&record, TransactionType::Sale, total)
                .previous(previous)
                .audit(audit, "Stock sold")
                .build();
            stock.records.insert(record.warehouse_id, record);
            self.ledger.append_transaction(tx).await;
        }

        let committed = quantity - shortfall;
        if shortfall > 0 {
            tracing::warn!(%sku, requested = quantity, committed, shortfall, "Could not reduce full quantity");
        }
        metrics::counter!("inventory_commits_total").increment(1);
        tracing::info!(%sku, committed, "Inventory reduction committed");

        Ok(CommitOutcome {
            allocations,
            committed,
            shortfall,
        })
    }

    /// Moves available units between two warehouses.
    ///
    /// A missing destination record is created with the source's reorder and
    /// max levels. Writes a TRANSFER row for each side.
    #[tracing::instrument(skip(self, audit))]
    pub async fn transfer_stock(
        &self,
        from: WarehouseId,
        to: WarehouseId,
        sku: Sku,
        quantity: u32,
        audit: &AuditContext,
    ) -> Result<Transfer> {
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity(quantity));
        }
        if from == to {
            return Err(InventoryError::validation(
                "Source and destination warehouse must differ",
            ));
        }
        self.ledger.ensure_warehouse(to).await?;

        let mut stock = self
            .ledger
            .lock_sku(sku)
            .await
            .ok_or(InventoryError::StockNotFound {
                warehouse_id: from,
                sku,
            })?;

        let mut source = staged_record(&stock.records, from).map_err(|_| {
            InventoryError::StockNotFound {
                warehouse_id: from,
                sku,
            }
        })?;
        let source_previous = source.balance();
        if source_previous.available() < quantity {
            return Err(InventoryError::InsufficientStock {
                sku,
                requested: quantity,
                available: source_previous.available(),
            });
        }
        source.set_balance(Balance::new(
            source_previous.on_hand - quantity,
            source_previous.reserved,
        ))?;

        let existing = stock.records.get(&to).cloned();
        if let Some(ref dest) = existing
            && dest.quantity_on_hand().checked_add(quantity).is_none()
        {
            return Err(InventoryError::validation("Destination on-hand would overflow"));
        }
        let mut destination = match existing {
            Some(dest) => dest,
            None => {
                let mut created = self.ledger.new_record(to, sku).await;
                created.reorder_level = source.reorder_level;
                created.max_stock_level = source.max_stock_level;
                created
            }
        };
        let destination_previous = destination.balance();
        destination.set_balance(Balance::new(
            destination_previous.on_hand + quantity,
            destination_previous.reserved,
        ))?;

        let base_reason = audit.reason_or("Stock transfer between warehouses");
        let out_tx = InventoryTransaction::builder(&source, TransactionType::Transfer, quantity)
            .previous(source_previous)
            .audit(audit, &base_reason)
            .reason(format!("{base_reason} (OUT to warehouse {to})"))
            .build();
        let in_tx = InventoryTransaction::builder(&destination, TransactionType::Transfer, quantity)
            .previous(destination_previous)
            .audit(audit, &base_reason)
            .reason(format!("{base_reason} (IN from warehouse {from})"))
            .build();

        stock.records.insert(from, source.clone());
        stock.records.insert(to, destination.clone());
        self.ledger.append_transaction(out_tx).await;
        self.ledger.append_transaction(in_tx).await;

        tracing::info!(%sku, %from, %to, quantity, "Stock transferred");
        Ok(Transfer {
            source,
            destination,
        })
    }

    /// Applies a typed movement to one existing record.
    ///
    /// STOCK_IN and RETURN add; STOCK_OUT, DAMAGE and SALE subtract and fail
    /// when on-hand is short; ADJUSTMENT sets the absolute on-hand level.
    #[tracing::instrument(skip(self, audit))]
    pub async fn adjust_stock(
        &self,
        adjustment: StockAdjustment,
        audit: &AuditContext,
    ) -> Result<InventoryRecord> {
        let StockAdjustment {
            warehouse_id,
            sku,
            transaction_type,
            quantity,
        } = adjustment;
        let not_found = || InventoryError::StockNotFound { warehouse_id, sku };

        let mut stock = self.ledger.lock_sku(sku).await.ok_or_else(not_found)?;
        let mut record = staged_record(&stock.records, warehouse_id).map_err(|_| not_found())?;
        let previous = record.balance();

        let on_hand = match transaction_type {
            TransactionType::StockIn | TransactionType::Return => {
                if quantity == 0 {
                    return Err(InventoryError::InvalidQuantity(quantity));
                }
                previous
                    .on_hand
                    .checked_add(quantity)
                    .ok_or_else(|| InventoryError::validation("On-hand quantity would overflow"))?
            }
            TransactionType::StockOut | TransactionType::Damage | TransactionType::Sale => {
                if quantity == 0 {
                    return Err(InventoryError::InvalidQuantity(quantity));
                }
                if previous.on_hand < quantity {
                    return Err(InventoryError::InsufficientStock {
                        sku,
                        requested: quantity,
                        available: previous.on_hand,
                    });
                }
                previous.on_hand - quantity
            }
            TransactionType::Adjustment => quantity,
            other => {
                return Err(InventoryError::validation(format!(
                    "Unsupported transaction type for stock adjustment: {other}"
                )));
            }
        };
        record.set_balance(Balance::new(on_hand, previous.reserved))?;

        let tx = InventoryTransaction::builder(&record, transaction_type, quantity)
            .previous(previous)
            .audit(audit, "Stock adjustment")
            .build();
        stock.records.insert(warehouse_id, record.clone());
        self.ledger.append_transaction(tx).await;

        tracing::info!(
            %sku,
            %warehouse_id,
            %transaction_type,
            previous = previous.on_hand,
            current = on_hand,
            "Stock adjusted"
        );
        Ok(record)
    }
}

fn staged_record(
    records: &std::collections::BTreeMap<WarehouseId, InventoryRecord>,
    warehouse_id: WarehouseId,
) -> Result<InventoryRecord> {
    records
        .get(&warehouse_id)
        .cloned()
        .ok_or_else(|| InventoryError::validation(format!("No record in warehouse {warehouse_id}")))
}

fn taken_from(plan: &[Allocation], warehouse_id: WarehouseId) -> u32 {
    plan.iter()
        .filter(|a| a.warehouse_id == warehouse_id)
        .map(|a| a.quantity)
        .sum()
}
