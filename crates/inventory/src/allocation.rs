//! FIFO-by-warehouse allocation planning.

use common::{InventoryRecordId, WarehouseId};
use serde::{Deserialize, Serialize};

/// Quantity taken from (or returned to) one warehouse record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub warehouse_id: WarehouseId,
    pub record_id: InventoryRecordId,
    pub quantity: u32,
}

/// Splits `quantity` over `capacities` in iteration order, taking
/// `min(remaining, capacity)` from each.
///
/// Returns the per-warehouse plan and the part of `quantity` that could not be
/// covered. Warehouses with zero capacity never appear in the plan.
pub fn plan_fifo<I>(capacities: I, quantity: u32) -> (Vec<Allocation>, u32)
where
    I: IntoIterator<Item = (WarehouseId, InventoryRecordId, u32)>,
{
    let mut remaining = quantity;
    let mut plan = Vec::new();
    for (warehouse_id, record_id, capacity) in capacities {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(capacity);
        if take == 0 {
            continue;
        }
        plan.push(Allocation {
            warehouse_id,
            record_id,
            quantity: take,
        });
        remaining -= take;
    }
    (plan, remaining)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cap(warehouse: u64, capacity: u32) -> (WarehouseId, InventoryRecordId, u32) {
        (
            WarehouseId::new(warehouse),
            InventoryRecordId::new(warehouse * 10),
            capacity,
        )
    }

    #[test]
    fn walks_warehouses_in_order() {
        let (plan, short) = plan_fifo([cap(1, 3), cap(2, 5)], 4);
        assert_eq!(short, 0);
        assert_eq!(plan.len(), 2);
        assert_eq!((plan[0].warehouse_id.get(), plan[0].quantity), (1, 3));
        assert_eq!((plan[1].warehouse_id.get(), plan[1].quantity), (2, 1));
    }

    #[test]
    fn skips_empty_warehouses() {
        let (plan, short) = plan_fifo([cap(1, 0), cap(2, 2), cap(3, 9)], 2);
        assert_eq!(short, 0);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].warehouse_id, WarehouseId::new(2));
    }

    #[test]
    fn reports_shortfall() {
        let (plan, short) = plan_fifo([cap(1, 1), cap(2, 1)], 5);
        assert_eq!(plan.iter().map(|a| a.quantity).sum::<u32>(), 2);
        assert_eq!(short, 3);
    }
}
