//! Shared types for the order-fulfillment core.

pub mod lock;
pub mod money;
pub mod reference;
pub mod types;

pub use lock::{KeyedGuard, KeyedMutex};
pub use money::Money;
pub use types::{
    CartId, InventoryRecordId, OrderId, OrderItemId, PaymentId, ProductId, ShipmentId, Sku,
    UserId, VariantId, Version, WarehouseId,
};
