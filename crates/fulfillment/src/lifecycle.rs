//! Order placement, cancellation and status administration.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use common::{CartId, KeyedGuard, KeyedMutex, Money, OrderId, Sku, UserId};
use domain::order::{
    NewOrder, NewOrderItem, Order, OrderStatus, Pricing, ShippingAddress,
};
use domain::payment::{Payment, PaymentStatus};
use domain::{Aggregate, CommandHandler};
use inventory::{AuditContext, InventoryError, ReservationCoordinator};
use tokio::task::JoinHandle;

use crate::collaborators::{Cart, Collaborators, Notification, NotificationKind, Notifier};
use crate::config::FulfillmentConfig;
use crate::error::{FulfillmentError, Result};

/// Drives orders through their lifecycle and keeps inventory in step.
///
/// Every mutation of an order runs under that order's lock, shared with
/// [`PaymentProcessor`](crate::PaymentProcessor) and
/// [`ShipmentTracker`](crate::ShipmentTracker).
#[derive(Clone)]
pub struct OrderLifecycle {
    orders: CommandHandler<Order>,
    payments: CommandHandler<Payment>,
    coordinator: ReservationCoordinator,
    collaborators: Collaborators,
    locks: KeyedMutex<OrderId>,
    notifications: Arc<Mutex<Vec<JoinHandle<()>>>>,
    config: Arc<FulfillmentConfig>,
}

impl OrderLifecycle {
    pub fn new(
        orders: CommandHandler<Order>,
        payments: CommandHandler<Payment>,
        coordinator: ReservationCoordinator,
        collaborators: Collaborators,
        config: Arc<FulfillmentConfig>,
    ) -> Self {
        Self {
            orders,
            payments,
            coordinator,
            collaborators,
            locks: KeyedMutex::new(),
            notifications: Arc::default(),
            config,
        }
    }

    pub fn coordinator(&self) -> &ReservationCoordinator {
        &self.coordinator
    }

    pub(crate) fn orders(&self) -> &CommandHandler<Order> {
        &self.orders
    }

    pub(crate) fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub(crate) fn config(&self) -> &FulfillmentConfig {
        &self.config
    }

    pub(crate) async fn lock(&self, order_id: OrderId) -> KeyedGuard<OrderId> {
        self.locks.lock(&order_id).await
    }

    /// Converts a user's cart into a PLACED order with its stock reserved.
    ///
    /// Either every line is reserved and the order exists, or nothing is
    /// reserved and no order is stored.
    #[tracing::instrument(skip(self, pricing, shipping_address))]
    pub async fn create_order(
        &self,
        cart_id: CartId,
        user_id: UserId,
        pricing: Pricing,
        shipping_address: Option<ShippingAddress>,
    ) -> Result<Order> {
        let cart = self
            .collaborators
            .carts
            .get_cart(cart_id)
            .await
            .ok_or_else(|| FulfillmentError::not_found("Cart", cart_id))?;
        if cart.user_id != user_id {
            return Err(FulfillmentError::unauthorized("cart"));
        }
        if cart.is_empty() {
            return Err(FulfillmentError::validation("Cart is empty"));
        }

        let items = self.snapshot_items(&cart).await?;
        for item in &items {
            if !self.coordinator.check_availability(item.sku, item.quantity).await {
                let available = self.coordinator.ledger().total_available(item.sku).await;
                return Err(InventoryError::InsufficientStock {
                    sku: item.sku,
                    requested: item.quantity,
                    available,
                }
                .into());
            }
        }

        let order_number = common::reference::order_number();
        let mut new_order = NewOrder::new(order_number.clone(), user_id).pricing(pricing);
        new_order.items = items;
        new_order.shipping_address = shipping_address;
        new_order.estimated_delivery =
            Some(Utc::now() + Duration::days(self.config.default_delivery_days));
        // Amounts are settled before any stock is held.
        new_order.totals()?;

        let audit = AuditContext::new()
            .reason(format!("Reserved for order {order_number}"))
            .actor(user_id.to_string())
            .order(order_number.clone());

        let mut reserved: Vec<(Sku, u32)> = Vec::with_capacity(new_order.items.len());
        for item in &new_order.items {
            if let Err(e) = self.coordinator.reserve(item.sku, item.quantity, &audit).await {
                tracing::warn!(%order_number, sku = %item.sku, error = %e, "Reservation failed, rolling back");
                self.rollback(&reserved, &order_number).await;
                return Err(e.into());
            }
            reserved.push((item.sku, item.quantity));
        }

        let order = match self
            .orders
            .create(|id, order| order.place(id, new_order))
            .await
        {
            Ok(result) => result.aggregate,
            Err(e) => {
                self.rollback(&reserved, &order_number).await;
                return Err(e.into());
            }
        };

        self.collaborators.carts.clear(cart_id).await;
        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(%order_number, total = %order.total(), items = order.items().len(), "Order placed");
        self.notify(&order, NotificationKind::OrderPlaced, format!(
            "Order {order_number} placed for {}",
            order.total()
        ));

        Ok(order)
    }

    /// Cancels an order owned by `user_id`, releasing all of its reservations.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        order_id: OrderId,
        user_id: UserId,
        reason: &str,
    ) -> Result<Order> {
        let _guard = self.lock(order_id).await;
        let order = self.orders.load(order_id).await?;
        if !order.is_owned_by(user_id) {
            return Err(FulfillmentError::unauthorized("order"));
        }

        self.cancel_locked(&order, reason, &user_id.to_string()).await
    }

    /// Administrative status change.
    ///
    /// CANCELLED goes through the cancellation path. DELIVERED commits the
    /// order's stock first. REFUNDED releases reservations not yet committed.
    #[tracing::instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        order_id: OrderId,
        new_status: OrderStatus,
        actor: &str,
        notes: Option<&str>,
    ) -> Result<Order> {
        let _guard = self.lock(order_id).await;
        let order = self.orders.load(order_id).await?;

        match new_status {
            OrderStatus::Cancelled => {
                self.cancel_locked(&order, notes.unwrap_or("Cancelled by administrator"), actor)
                    .await
            }
            OrderStatus::Delivered => {
                order.transition(new_status, Some(actor), notes)?;
                let items: Vec<_> = order.items().iter().map(|i| (i.sku, i.quantity)).collect();
                self.commit_inventory_locked(&order, &items, actor).await?;
                self.transition_locked(order_id, new_status, actor, notes).await
            }
            OrderStatus::Refunded => {
                order.transition(new_status, Some(actor), notes)?;
                if !order.inventory_committed() {
                    self.release_items(&order, "Order refunded", actor).await?;
                }
                self.transition_locked(order_id, new_status, actor, notes).await
            }
            _ => self.transition_locked(order_id, new_status, actor, notes).await,
        }
    }

    /// Appends a note to the order log.
    pub async fn add_note(&self, order_id: OrderId, text: &str, author: &str) -> Result<Order> {
        let _guard = self.lock(order_id).await;
        let result = self
            .orders
            .execute(order_id, |o| o.add_note(text, Some(author)))
            .await?;
        Ok(result.aggregate)
    }

    // Internal steps. Callers hold the order's lock.

    async fn cancel_locked(&self, order: &Order, reason: &str, actor: &str) -> Result<Order> {
        let order_id = order_id_of(order)?;
        order.cancel(reason, Some(actor))?;

        self.release_items(order, &format!("Order cancelled: {reason}"), actor)
            .await?;
        let result = self
            .orders
            .execute(order_id, |o| o.cancel(reason, Some(actor)))
            .await?;
        self.cancel_pending_payments(order_id, reason).await;

        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(order_number = %order.order_number(), %reason, "Order cancelled");
        self.notify(
            &result.aggregate,
            NotificationKind::OrderCancelled,
            format!("Order {} cancelled: {reason}", order.order_number()),
        );

        Ok(result.aggregate)
    }

    /// Voids payments of the order that never reached the gateway.
    async fn cancel_pending_payments(&self, order_id: OrderId, reason: &str) {
        let pending = self
            .payments
            .repository()
            .find(|p| p.order_id() == Some(order_id) && p.status() == PaymentStatus::Pending)
            .await;
        for payment in pending {
            let Some(payment_id) = payment.id() else {
                continue;
            };
            match self
                .payments
                .execute(payment_id, |p| p.cancel(format!("Order cancelled: {reason}")))
                .await
            {
                Ok(_) => {
                    tracing::info!(payment_reference = %payment.reference(), "Pending payment cancelled");
                }
                Err(e) => {
                    tracing::error!(payment_reference = %payment.reference(), error = %e, "Failed to cancel pending payment");
                }
            }
        }
    }

    pub(crate) async fn transition_locked(
        &self,
        order_id: OrderId,
        to: OrderStatus,
        actor: &str,
        notes: Option<&str>,
    ) -> Result<Order> {
        let result = self
            .orders
            .execute(order_id, |o| o.transition(to, Some(actor), notes))
            .await?;
        let order = result.aggregate;

        tracing::info!(order_number = %order.order_number(), status = %to, %actor, "Order status updated");
        self.notify(
            &order,
            NotificationKind::OrderStatusChanged,
            format!("Order {} is now {to}", order.order_number()),
        );
        Ok(order)
    }

    /// Releases every line of the order.
    pub(crate) async fn release_items(&self, order: &Order, reason: &str, actor: &str) -> Result<()> {
        let audit = AuditContext::new()
            .reason(reason)
            .actor(actor)
            .order(order.order_number());
        for item in order.items() {
            let released = self.coordinator.release(item.sku, item.quantity, &audit).await?;
            if released < item.quantity {
                tracing::warn!(
                    order_number = %order.order_number(),
                    sku = %item.sku,
                    requested = item.quantity,
                    released,
                    "Released less than the order held"
                );
            }
        }
        Ok(())
    }

    /// Deducts the given lines from stock, once per order.
    pub(crate) async fn commit_inventory_locked(
        &self,
        order: &Order,
        lines: &[(Sku, u32)],
        actor: &str,
    ) -> Result<()> {
        if order.inventory_committed() {
            tracing::debug!(order_number = %order.order_number(), "Inventory already committed");
            return Ok(());
        }
        let order_id = order_id_of(order)?;
        order.mark_inventory_committed()?;

        let audit = AuditContext::new()
            .reason(format!("Order {} delivered", order.order_number()))
            .actor(actor)
            .order(order.order_number());
        for &(sku, quantity) in lines {
            let outcome = self.coordinator.commit_reduction(sku, quantity, &audit).await?;
            if outcome.shortfall > 0 {
                tracing::warn!(
                    order_number = %order.order_number(),
                    %sku,
                    shortfall = outcome.shortfall,
                    "Committed less stock than shipped"
                );
            }
        }

        self.orders
            .execute(order_id, |o| o.mark_inventory_committed())
            .await?;
        Ok(())
    }

    /// Hands the notification to the notifier on a background task.
    pub(crate) fn notify(&self, order: &Order, kind: NotificationKind, message: String) {
        let Some(user_id) = order.user_id() else {
            return;
        };
        let notification = Notification {
            kind,
            user_id,
            order_number: order.order_number().to_string(),
            message,
        };
        let notifier = Arc::clone(&self.collaborators.notifier);
        let handle = tokio::spawn(async move { notifier.notify(notification).await });

        let mut pending = self
            .notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Waits until every notification dispatched so far has been delivered.
    pub async fn flush_notifications(&self) {
        let pending = std::mem::take(
            &mut *self
                .notifications
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for handle in pending {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Notification task failed");
            }
        }
    }

    async fn snapshot_items(&self, cart: &Cart) -> Result<Vec<NewOrderItem>> {
        let catalog = &self.collaborators.catalog;
        let mut items = Vec::with_capacity(cart.items.len());

        for line in &cart.items {
            if line.quantity == 0 {
                return Err(FulfillmentError::validation(format!(
                    "Invalid quantity for {}",
                    line.sku
                )));
            }

            let product = catalog
                .product(line.sku.product_id)
                .await
                .ok_or_else(|| FulfillmentError::not_found("Product", line.sku.product_id))?;
            if !product.active {
                return Err(FulfillmentError::validation(format!(
                    "Product {} is not available",
                    product.name
                )));
            }

            let mut unit_price = product.price;
            let mut variant_name = None;
            if let Some(variant_id) = line.sku.variant_id {
                let variant = catalog
                    .variant(variant_id)
                    .await
                    .ok_or_else(|| FulfillmentError::not_found("Variant", variant_id))?;
                if variant.product_id != product.id {
                    return Err(FulfillmentError::validation(format!(
                        "Variant {variant_id} does not belong to product {}",
                        product.id
                    )));
                }
                if !variant.active {
                    return Err(FulfillmentError::validation(format!(
                        "Variant {} of {} is not available",
                        variant.name, product.name
                    )));
                }
                unit_price = variant.price.unwrap_or(product.price);
                variant_name = Some(variant.name);
            }

            items.push(NewOrderItem {
                sku: line.sku,
                product_name: product.name,
                variant_name,
                unit_price,
                quantity: line.quantity,
            });
        }

        Ok(items)
    }

    async fn rollback(&self, reserved: &[(Sku, u32)], order_number: &str) {
        let audit = AuditContext::new()
            .reason(format!("Rollback of order {order_number}"))
            .actor(self.config.system_actor.clone())
            .order(order_number);
        for &(sku, quantity) in reserved.iter().rev() {
            if let Err(e) = self.coordinator.release(sku, quantity, &audit).await {
                tracing::error!(%order_number, %sku, quantity, error = %e, "Rollback release failed");
            }
        }
    }
}

// Queries
impl OrderLifecycle {
    /// Loads an order without an ownership check.
    pub async fn order(&self, order_id: OrderId) -> Result<Order> {
        Ok(self.orders.load(order_id).await?)
    }

    pub async fn get_order(&self, order_id: OrderId, user_id: UserId) -> Result<Order> {
        let order = self.orders.load(order_id).await?;
        if !order.is_owned_by(user_id) {
            return Err(FulfillmentError::unauthorized("order"));
        }
        Ok(order)
    }

    pub async fn get_order_by_number(&self, order_number: &str, user_id: UserId) -> Result<Order> {
        let order = self
            .orders
            .repository()
            .find(|o| o.order_number() == order_number)
            .await
            .into_iter()
            .next()
            .ok_or_else(|| FulfillmentError::not_found("Order", order_number))?;
        if !order.is_owned_by(user_id) {
            return Err(FulfillmentError::unauthorized("order"));
        }
        Ok(order)
    }

    pub async fn user_orders(&self, user_id: UserId, status: Option<OrderStatus>) -> Vec<Order> {
        self.orders
            .repository()
            .find(|o| o.is_owned_by(user_id) && status.is_none_or(|s| o.status() == s))
            .await
    }

    pub async fn orders_by_status(&self, status: OrderStatus) -> Vec<Order> {
        self.orders
            .repository()
            .find(|o| o.status() == status)
            .await
    }

    /// Orders placed within `[from, to]`.
    pub async fn orders_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Order> {
        self.orders
            .repository()
            .find(|o| o.placed_at().is_some_and(|at| at >= from && at <= to))
            .await
    }

    pub async fn order_count_by_status(&self, status: OrderStatus) -> usize {
        self.orders_by_status(status).await.len()
    }

    /// Sum of totals over orders that were paid and not refunded.
    pub async fn total_revenue(&self) -> Money {
        self.orders
            .repository()
            .find(|o| o.status().is_revenue())
            .await
            .iter()
            .map(Order::total)
            .sum()
    }
}

pub(crate) fn order_id_of(order: &Order) -> Result<OrderId> {
    order
        .id()
        .ok_or_else(|| FulfillmentError::validation("Order has not been placed"))
}
