//! Value objects for the order domain.

use chrono::{DateTime, Utc};
use common::{Money, OrderItemId, Sku, UserId};
use serde::{Deserialize, Serialize};

use super::OrderError;

/// A line of an order, snapshotted from the catalog at placement time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Position of the line within its order, starting at 1.
    pub id: OrderItemId,
    pub sku: Sku,
    pub product_name: String,
    pub variant_name: Option<String>,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
}

/// Order amounts. `total = subtotal + tax + shipping - discount`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub discount: Money,
    pub total: Money,
}

impl OrderTotals {
    pub fn compute(subtotal: Money, pricing: &Pricing) -> Result<Self, OrderError> {
        let total = subtotal
            .checked_add(pricing.tax)
            .and_then(|t| t.checked_add(pricing.shipping))
            .and_then(|t| t.checked_sub(pricing.discount))
            .ok_or(OrderError::AmountOverflow { field: "total" })?;
        Ok(Self {
            subtotal,
            tax: pricing.tax,
            shipping: pricing.shipping,
            discount: pricing.discount,
            total,
        })
    }
}

/// Caller-supplied charges applied on top of the item subtotal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    #[serde(default)]
    pub tax: Money,
    #[serde(default)]
    pub shipping: Money,
    #[serde(default)]
    pub discount: Money,
}

/// Shipping address snapshot. Later edits to the user's address book do not
/// reach placed orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub recipient: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
}

/// An order line before placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub sku: Sku,
    pub product_name: String,
    pub variant_name: Option<String>,
    pub unit_price: Money,
    pub quantity: u32,
}

impl NewOrderItem {
    pub fn line_total(&self) -> Result<Money, OrderError> {
        self.unit_price
            .checked_multiply(self.quantity)
            .ok_or(OrderError::AmountOverflow { field: "line_total" })
    }
}

/// Everything needed to place an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_number: String,
    pub user_id: UserId,
    pub items: Vec<NewOrderItem>,
    pub pricing: Pricing,
    pub shipping_address: Option<ShippingAddress>,
    /// Defaults to placement plus the standard delivery window.
    pub estimated_delivery: Option<DateTime<Utc>>,
}

impl NewOrder {
    pub fn new(order_number: impl Into<String>, user_id: UserId) -> Self {
        Self {
            order_number: order_number.into(),
            user_id,
            items: Vec::new(),
            pricing: Pricing::default(),
            shipping_address: None,
            estimated_delivery: None,
        }
    }

    pub fn item(mut self, item: NewOrderItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn shipping_address(mut self, address: ShippingAddress) -> Self {
        self.shipping_address = Some(address);
        self
    }

    pub fn estimated_delivery(mut self, at: DateTime<Utc>) -> Self {
        self.estimated_delivery = Some(at);
        self
    }

    /// Validates every amount and computes the totals the order would carry.
    pub fn totals(&self) -> Result<OrderTotals, OrderError> {
        for (field, amount) in [
            ("tax", self.pricing.tax),
            ("shipping", self.pricing.shipping),
            ("discount", self.pricing.discount),
        ] {
            if amount.is_negative() {
                return Err(OrderError::InvalidAmount {
                    field,
                    amount: amount.cents(),
                });
            }
        }

        let mut line_totals = Vec::with_capacity(self.items.len());
        for item in &self.items {
            if item.unit_price.is_negative() {
                return Err(OrderError::InvalidPrice {
                    price: item.unit_price.cents(),
                });
            }
            line_totals.push(item.line_total()?);
        }

        let subtotal = Money::checked_sum(line_totals)
            .ok_or(OrderError::AmountOverflow { field: "subtotal" })?;
        let totals = OrderTotals::compute(subtotal, &self.pricing)?;
        if totals.total.is_negative() {
            return Err(OrderError::InvalidAmount {
                field: "total",
                amount: totals.total.cents(),
            });
        }
        Ok(totals)
    }
}
