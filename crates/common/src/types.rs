use serde::{Deserialize, Serialize};

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Creates an identifier from its raw value.
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// Returns the raw value.
            pub const fn get(&self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

numeric_id!(
    /// Identifier of a warehouse.
    ///
    /// Ordering matters: the reservation walk visits warehouses in ascending id order.
    WarehouseId
);
numeric_id!(
    /// Identifier of a catalog product.
    ProductId
);
numeric_id!(
    /// Identifier of a product variant.
    VariantId
);
numeric_id!(
    /// Identifier of a per-warehouse inventory record.
    InventoryRecordId
);
numeric_id!(
    /// Identifier of a user.
    UserId
);
numeric_id!(
    /// Identifier of a shopping cart.
    CartId
);
numeric_id!(
    /// Identifier of an order.
    OrderId
);
numeric_id!(
    /// Identifier of an order line.
    OrderItemId
);
numeric_id!(
    /// Identifier of a payment.
    PaymentId
);
numeric_id!(
    /// Identifier of a shipment.
    ShipmentId
);

/// Stock-keeping unit: a product, optionally narrowed to one variant.
///
/// A SKU without a variant only matches records stocked for the base product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Sku {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
}

impl Sku {
    /// SKU for a base product.
    pub fn product(product_id: ProductId) -> Self {
        Self {
            product_id,
            variant_id: None,
        }
    }

    /// SKU for a specific variant of a product.
    pub fn variant(product_id: ProductId, variant_id: VariantId) -> Self {
        Self {
            product_id,
            variant_id: Some(variant_id),
        }
    }

    pub fn new(product_id: ProductId, variant_id: Option<VariantId>) -> Self {
        Self {
            product_id,
            variant_id,
        }
    }
}

impl std::fmt::Display for Sku {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.variant_id {
            Some(variant) => write!(f, "{}/{}", self.product_id, variant),
            None => write!(f, "{}", self.product_id),
        }
    }
}

/// Optimistic concurrency version of a stored entity.
///
/// Starts at 0 before the first write and increments with every save.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Version of an entity that has never been saved.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Version after the first save.
    pub fn first() -> Self {
        Self(1)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warehouse_ids_order_numerically() {
        let mut ids = vec![WarehouseId::new(10), WarehouseId::new(2), WarehouseId::new(7)];
        ids.sort();
        assert_eq!(
            ids,
            vec![WarehouseId::new(2), WarehouseId::new(7), WarehouseId::new(10)]
        );
    }

    #[test]
    fn ids_serialize_transparently() {
        let json = serde_json::to_string(&OrderId::new(42)).unwrap();
        assert_eq!(json, "42");
        let back: OrderId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, OrderId::new(42));
    }

    #[test]
    fn sku_display_includes_variant() {
        assert_eq!(Sku::product(ProductId::new(5)).to_string(), "5");
        assert_eq!(
            Sku::variant(ProductId::new(5), VariantId::new(9)).to_string(),
            "5/9"
        );
    }

    #[test]
    fn base_sku_differs_from_variant_sku() {
        let base = Sku::product(ProductId::new(1));
        let variant = Sku::variant(ProductId::new(1), VariantId::new(1));
        assert_ne!(base, variant);
    }

    #[test]
    fn version_sequence() {
        assert_eq!(Version::default(), Version::initial());
        assert_eq!(Version::initial().next(), Version::first());
        assert_eq!(Version::first().as_i64(), 1);
    }
}
