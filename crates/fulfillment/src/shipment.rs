//! Shipment creation and tracking.

use common::{OrderId, ShipmentId, UserId};
use domain::order::{Order, OrderError, OrderStatus};
use domain::shipment::{NewShipment, Shipment, ShipmentItem, ShipmentStatus};
use domain::{Aggregate, CommandHandler};

use crate::collaborators::NotificationKind;
use crate::error::{FulfillmentError, Result};
use crate::lifecycle::{OrderLifecycle, order_id_of};

/// Creates shipments for paid orders and advances them to delivery.
///
/// Delivery is what finally deducts the order's stock.
#[derive(Clone)]
pub struct ShipmentTracker {
    shipments: CommandHandler<Shipment>,
    lifecycle: OrderLifecycle,
}

impl ShipmentTracker {
    pub fn new(shipments: CommandHandler<Shipment>, lifecycle: OrderLifecycle) -> Self {
        Self {
            shipments,
            lifecycle,
        }
    }

    /// Opens a shipment carrying every order line in full and moves the order
    /// to PROCESSING.
    ///
    /// An order holds at most one live shipment; another may be opened once the
    /// previous ones were returned, lost or damaged.
    #[tracing::instrument(skip(self))]
    pub async fn create_shipment(
        &self,
        order_id: OrderId,
        carrier: &str,
        method: Option<&str>,
        actor: &str,
    ) -> Result<Shipment> {
        let _guard = self.lifecycle.lock(order_id).await;
        let order = self.lifecycle.orders().load(order_id).await?;
        if !order.status().can_create_shipment() {
            return Err(OrderError::InvalidStateTransition {
                current_state: order.status(),
                action: "create shipment",
            }
            .into());
        }

        let live = self
            .shipments
            .repository()
            .find(|s| s.order_id() == Some(order_id) && s.is_live())
            .await;
        if let Some(existing) = live.first() {
            return Err(FulfillmentError::validation(format!(
                "Order {} already has shipment {}",
                order.order_number(),
                existing.tracking_number()
            )));
        }

        let items: Vec<ShipmentItem> = order
            .items()
            .iter()
            .map(|item| ShipmentItem {
                order_item_id: item.id,
                sku: item.sku,
                quantity: item.quantity,
            })
            .collect();
        let tracking_number = common::reference::tracking_number();
        let shipment = self
            .shipments
            .create(|id, shipment| {
                shipment.create(
                    id,
                    NewShipment {
                        tracking_number: tracking_number.clone(),
                        order_id,
                        carrier: carrier.to_string(),
                        method: method.map(str::to_string),
                        items,
                    },
                )
            })
            .await?
            .aggregate;

        if order.status() == OrderStatus::Confirmed {
            self.lifecycle
                .transition_locked(order_id, OrderStatus::Processing, actor, None)
                .await?;
        }

        tracing::info!(%tracking_number, order_number = %order.order_number(), %carrier, "Shipment created");
        self.lifecycle
            .notify(
                &order,
                NotificationKind::ShipmentCreated,
                format!("Shipment {tracking_number} created via {carrier}"),
            );
        Ok(shipment)
    }

    /// Advances a shipment.
    ///
    /// SHIPPED moves the order to SHIPPED. DELIVERED commits the shipped
    /// quantities, then marks shipment and order delivered.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        shipment_id: ShipmentId,
        new_status: ShipmentStatus,
        notes: Option<&str>,
        actor: &str,
    ) -> Result<Shipment> {
        let order_id = self
            .shipments
            .load(shipment_id)
            .await?
            .order_id()
            .ok_or_else(|| FulfillmentError::validation("Shipment has no order"))?;

        let _guard = self.lifecycle.lock(order_id).await;
        let shipment = self.shipments.load(shipment_id).await?;
        shipment.update_status(new_status, Some(actor), notes)?;
        let order = self.lifecycle.orders().load(order_id).await?;

        let updated = if new_status == ShipmentStatus::Delivered {
            self.deliver(&shipment, &order, notes, actor).await?
        } else {
            let updated = self.persist_status(shipment_id, new_status, notes, actor).await?;
            match new_status {
                ShipmentStatus::Shipped
                    if order.status().can_transition_to(OrderStatus::Shipped) =>
                {
                    self.lifecycle
                        .transition_locked(order_id, OrderStatus::Shipped, actor, None)
                        .await?;
                }
                status if status.is_undelivered_end() => {
                    tracing::warn!(
                        tracking_number = %updated.tracking_number(),
                        order_number = %order.order_number(),
                        %status,
                        "Shipment ended without delivery"
                    );
                }
                _ => {}
            }
            updated
        };

        self.lifecycle
            .notify(
                &order,
                NotificationKind::ShipmentStatusChanged,
                format!("Shipment {} is now {new_status}", updated.tracking_number()),
            );
        Ok(updated)
    }

    /// Commits the shipped quantities before either record says DELIVERED.
    async fn deliver(
        &self,
        shipment: &Shipment,
        order: &Order,
        notes: Option<&str>,
        actor: &str,
    ) -> Result<Shipment> {
        let order_id = order_id_of(order)?;
        let deliver_order = order.status().can_transition_to(OrderStatus::Delivered);
        if deliver_order {
            let lines: Vec<_> = shipment
                .items()
                .iter()
                .map(|item| (item.sku, item.quantity))
                .collect();
            self.lifecycle
                .commit_inventory_locked(order, &lines, actor)
                .await?;
        }

        let shipment_id = shipment
            .id()
            .ok_or_else(|| FulfillmentError::validation("Shipment has not been created"))?;
        let delivered = self
            .persist_status(shipment_id, ShipmentStatus::Delivered, notes, actor)
            .await?;
        if deliver_order {
            self.lifecycle
                .transition_locked(order_id, OrderStatus::Delivered, actor, None)
                .await?;
        } else {
            tracing::warn!(
                order_number = %order.order_number(),
                status = %order.status(),
                "Shipment delivered for an order that cannot be delivered"
            );
        }
        metrics::counter!("shipments_delivered_total").increment(1);
        Ok(delivered)
    }

    pub async fn add_note(&self, shipment_id: ShipmentId, text: &str, author: &str) -> Result<Shipment> {
        let result = self
            .shipments
            .execute(shipment_id, |s| s.add_note(text, Some(author)))
            .await?;
        Ok(result.aggregate)
    }

    async fn persist_status(
        &self,
        shipment_id: ShipmentId,
        status: ShipmentStatus,
        notes: Option<&str>,
        actor: &str,
    ) -> Result<Shipment> {
        let result = self
            .shipments
            .execute(shipment_id, |s| s.update_status(status, Some(actor), notes))
            .await?;
        Ok(result.aggregate)
    }
}

// Queries
impl ShipmentTracker {
    pub async fn shipment(&self, shipment_id: ShipmentId) -> Result<Shipment> {
        Ok(self.shipments.load(shipment_id).await?)
    }

    pub async fn shipment_by_tracking_number(&self, tracking_number: &str) -> Result<Shipment> {
        self.shipments
            .repository()
            .find(|s| s.tracking_number() == tracking_number)
            .await
            .into_iter()
            .next()
            .ok_or_else(|| FulfillmentError::not_found("Shipment", tracking_number))
    }

    pub async fn order_shipments(&self, order_id: OrderId, user_id: UserId) -> Result<Vec<Shipment>> {
        self.lifecycle.get_order(order_id, user_id).await?;
        Ok(self
            .shipments
            .repository()
            .find(|s| s.order_id() == Some(order_id))
            .await)
    }

    pub async fn shipments_by_status(&self, status: ShipmentStatus) -> Vec<Shipment> {
        self.shipments
            .repository()
            .find(|s| s.status() == status)
            .await
    }
}
