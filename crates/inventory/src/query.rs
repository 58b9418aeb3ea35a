use chrono::{DateTime, Utc};
use common::{InventoryRecordId, Sku, WarehouseId};

use crate::{InventoryTransaction, TransactionType};

/// Filter over the inventory ledger.
///
/// All set criteria must match. Results are ordered oldest first.
#[derive(Debug, Clone, Default)]
pub struct TransactionQuery {
    pub record_id: Option<InventoryRecordId>,
    pub warehouse_id: Option<WarehouseId>,
    pub sku: Option<Sku>,
    pub transaction_types: Option<Vec<TransactionType>>,
    pub order_reference: Option<String>,
    /// Inclusive lower bound.
    pub from_timestamp: Option<DateTime<Utc>>,
    /// Inclusive upper bound.
    pub to_timestamp: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl TransactionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_record(record_id: InventoryRecordId) -> Self {
        Self {
            record_id: Some(record_id),
            ..Default::default()
        }
    }

    pub fn for_sku(sku: Sku) -> Self {
        Self {
            sku: Some(sku),
            ..Default::default()
        }
    }

    pub fn warehouse(mut self, warehouse_id: WarehouseId) -> Self {
        self.warehouse_id = Some(warehouse_id);
        self
    }

    pub fn transaction_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_types = Some(vec![transaction_type]);
        self
    }

    pub fn transaction_types(mut self, transaction_types: Vec<TransactionType>) -> Self {
        self.transaction_types = Some(transaction_types);
        self
    }

    pub fn order_reference(mut self, order_reference: impl Into<String>) -> Self {
        self.order_reference = Some(order_reference.into());
        self
    }

    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from_timestamp = Some(from);
        self.to_timestamp = Some(to);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if `tx` satisfies every criterion except paging.
    pub fn matches(&self, tx: &InventoryTransaction) -> bool {
        if let Some(id) = self.record_id
            && tx.record_id != id
        {
            return false;
        }
        if let Some(id) = self.warehouse_id
            && tx.warehouse_id != id
        {
            return false;
        }
        if let Some(sku) = self.sku
            && tx.sku != sku
        {
            return false;
        }
        if let Some(ref types) = self.transaction_types
            && !types.contains(&tx.transaction_type)
        {
            return false;
        }
        if let Some(ref order) = self.order_reference
            && tx.order_reference.as_ref() != Some(order)
        {
            return false;
        }
        if let Some(from) = self.from_timestamp
            && tx.timestamp < from
        {
            return false;
        }
        if let Some(to) = self.to_timestamp
            && tx.timestamp > to
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use common::ProductId;

    use super::*;

    #[test]
    fn query_builder_chain() {
        let sku = Sku::product(ProductId::new(1));
        let query = TransactionQuery::for_sku(sku)
            .warehouse(WarehouseId::new(2))
            .transaction_type(TransactionType::Sale)
            .limit(10)
            .offset(5);

        assert_eq!(query.sku, Some(sku));
        assert_eq!(query.warehouse_id, Some(WarehouseId::new(2)));
        assert_eq!(query.transaction_types, Some(vec![TransactionType::Sale]));
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.offset, Some(5));
        assert!(query.record_id.is_none());
    }
}
