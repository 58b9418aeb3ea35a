//! Integration tests for the order, payment and shipment aggregates.
//!
//! These tests drive the aggregates through `CommandHandler` and verify
//! persistence, history, version checks and state reconstruction.

use common::{Money, OrderId, OrderItemId, PaymentId, ProductId, ShipmentId, Sku, UserId, Version};
use domain::order::{NewOrder, NewOrderItem, Order, OrderError, OrderEvent, OrderStatus, Pricing};
use domain::payment::{NewPayment, Payment, PaymentMethod, PaymentStatus};
use domain::shipment::{NewShipment, Shipment, ShipmentItem, ShipmentStatus};
use domain::{Aggregate, AggregateRepository, CommandHandler, DomainError, DomainEvent};

fn new_order(user: u64) -> NewOrder {
    NewOrder::new(common::reference::order_number(), UserId::new(user))
        .item(NewOrderItem {
            sku: Sku::product(ProductId::new(1)),
            product_name: "Widget A".to_string(),
            variant_name: None,
            unit_price: Money::from_cents(1000),
            quantity: 2,
        })
        .item(NewOrderItem {
            sku: Sku::product(ProductId::new(2)),
            product_name: "Widget B".to_string(),
            variant_name: None,
            unit_price: Money::from_cents(500),
            quantity: 1,
        })
        .pricing(Pricing {
            tax: Money::from_cents(200),
            shipping: Money::from_cents(300),
            discount: Money::zero(),
        })
}

async fn place(handler: &CommandHandler<Order>, user: u64) -> OrderId {
    let result = handler
        .create(|id, order| order.place(id, new_order(user)))
        .await
        .unwrap();
    result.aggregate.id().unwrap()
}

mod order_lifecycle {
    use super::*;

    #[tokio::test]
    async fn complete_order_lifecycle() {
        let handler = CommandHandler::<Order>::default();
        let order_id = place(&handler, 1).await;

        let order = handler.load(order_id).await.unwrap();
        assert_eq!(order.status(), OrderStatus::Placed);
        assert_eq!(order.total(), Money::from_cents(3000));
        assert_eq!(order.version(), Version::first());

        let result = handler
            .execute(order_id, |o| o.confirm(Some("payment")))
            .await
            .unwrap();
        assert_eq!(result.aggregate.status(), OrderStatus::Confirmed);

        handler
            .execute(order_id, |o| o.start_processing(None))
            .await
            .unwrap();
        handler.execute(order_id, |o| o.ship(None)).await.unwrap();
        handler
            .execute(order_id, |o| o.mark_inventory_committed())
            .await
            .unwrap();
        let result = handler.execute(order_id, |o| o.deliver(None)).await.unwrap();

        assert_eq!(result.aggregate.status(), OrderStatus::Delivered);
        assert!(result.aggregate.inventory_committed());
        assert!(result.aggregate.actual_delivery().is_some());
        assert_eq!(result.new_version, Version::new(6));
    }

    #[tokio::test]
    async fn cancelled_order_rejects_delivery_and_is_unchanged() {
        let handler = CommandHandler::<Order>::default();
        let order_id = place(&handler, 1).await;

        handler
            .execute(order_id, |o| o.cancel("Customer request", Some("1")))
            .await
            .unwrap();
        let before = handler.load(order_id).await.unwrap();

        let result = handler.execute(order_id, |o| o.deliver(None)).await;
        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::InvalidStateTransition {
                current_state: OrderStatus::Cancelled,
                ..
            }))
        ));

        let after = handler.load(order_id).await.unwrap();
        assert_eq!(after.status(), OrderStatus::Cancelled);
        assert_eq!(after.version(), before.version());
    }

    #[tokio::test]
    async fn history_replays_to_current_state() {
        let handler = CommandHandler::<Order>::default();
        let order_id = place(&handler, 1).await;
        handler
            .execute(order_id, |o| o.add_note("Gift wrap please", Some("1")))
            .await
            .unwrap();
        handler.execute(order_id, |o| o.confirm(None)).await.unwrap();

        let history = handler.repository().history(order_id).await;
        let types: Vec<_> = history.iter().map(|r| r.event.event_type()).collect();
        assert_eq!(types, vec!["OrderPlaced", "OrderNoteAdded", "OrderStatusChanged"]);

        let mut rebuilt = Order::default();
        rebuilt.apply_events(history.into_iter().map(|r| r.event));
        let live = handler.load(order_id).await.unwrap();
        assert_eq!(rebuilt.status(), live.status());
        assert_eq!(rebuilt.notes(), live.notes());
    }

    #[tokio::test]
    async fn events_round_trip_through_json() {
        let handler = CommandHandler::<Order>::default();
        let order_id = place(&handler, 1).await;
        let history = handler.repository().history(order_id).await;

        let json = serde_json::to_string(&history[0].event).unwrap();
        let back: OrderEvent = serde_json::from_str(&json).unwrap();
        let mut order = Order::default();
        order.apply(back);

        assert_eq!(order.items().len(), 2);
        assert_eq!(order.item(OrderItemId::new(2)).unwrap().product_name, "Widget B");
    }
}

mod concurrency {
    use super::*;

    #[tokio::test]
    async fn stale_writer_gets_conflict() {
        let repository = AggregateRepository::<Order>::new();
        let handler = CommandHandler::new(repository.clone());
        let order_id = place(&handler, 1).await;

        let stale = handler.load(order_id).await.unwrap();
        handler.execute(order_id, |o| o.confirm(None)).await.unwrap();

        let events = stale.cancel("racing", None).unwrap();
        let result = repository.append(order_id, stale.version(), events).await;
        assert!(matches!(
            result,
            Err(DomainError::ConcurrencyConflict { .. })
        ));
        assert_eq!(
            handler.load(order_id).await.unwrap().status(),
            OrderStatus::Confirmed
        );
    }

    #[tokio::test]
    async fn ids_are_unique_across_concurrent_creates() {
        let handler = CommandHandler::<Order>::default();
        let mut tasks = Vec::new();
        for user in 0..20 {
            let handler = handler.clone();
            tasks.push(tokio::spawn(async move { place(&handler, user).await }));
        }

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 20);
        assert_eq!(handler.repository().count().await, 20);
    }
}

mod queries {
    use super::*;

    #[tokio::test]
    async fn find_filters_by_owner_and_status() {
        let handler = CommandHandler::<Order>::default();
        let first = place(&handler, 1).await;
        place(&handler, 2).await;
        place(&handler, 1).await;
        handler.execute(first, |o| o.confirm(None)).await.unwrap();

        let user_orders = handler
            .repository()
            .find(|o| o.is_owned_by(UserId::new(1)))
            .await;
        assert_eq!(user_orders.len(), 2);

        let confirmed = handler
            .repository()
            .find(|o| o.status() == OrderStatus::Confirmed)
            .await;
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].id(), Some(first));
    }
}

mod payments_and_shipments {
    use super::*;

    #[tokio::test]
    async fn payment_refund_flow() {
        let handler = CommandHandler::<Payment>::default();
        let created = handler
            .create(|id, payment| {
                payment.initiate(
                    id,
                    NewPayment {
                        reference: common::reference::payment_reference(),
                        order_id: OrderId::new(1),
                        user_id: UserId::new(1),
                        method: PaymentMethod::Stripe,
                        amount: Money::from_cents(10_000),
                    },
                )
            })
            .await
            .unwrap();
        let payment_id: PaymentId = created.aggregate.id().unwrap();

        handler
            .execute(payment_id, |p| p.start_processing(None))
            .await
            .unwrap();
        handler
            .execute(payment_id, |p| p.complete("TXN-1", None))
            .await
            .unwrap();

        let too_much = handler
            .execute(payment_id, |p| p.refund(Money::from_cents(15_000), "x", None))
            .await;
        assert!(too_much.is_err());

        let result = handler
            .execute(payment_id, |p| {
                p.refund(Money::from_cents(10_000), "Returned", Some("admin"))
            })
            .await
            .unwrap();
        assert_eq!(result.aggregate.status(), PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn shipment_progression() {
        let handler = CommandHandler::<Shipment>::default();
        let created = handler
            .create(|id, shipment| {
                shipment.create(
                    id,
                    NewShipment {
                        tracking_number: common::reference::tracking_number(),
                        order_id: OrderId::new(1),
                        carrier: "DHL".to_string(),
                        method: Some("priority".to_string()),
                        items: vec![ShipmentItem {
                            order_item_id: OrderItemId::new(1),
                            sku: Sku::product(ProductId::new(1)),
                            quantity: 2,
                        }],
                    },
                )
            })
            .await
            .unwrap();
        let shipment_id: ShipmentId = created.aggregate.id().unwrap();
        assert!(created.aggregate.tracking_number().starts_with("TRK-"));

        for status in [
            ShipmentStatus::Shipped,
            ShipmentStatus::InTransit,
            ShipmentStatus::OutForDelivery,
            ShipmentStatus::Delivered,
        ] {
            handler
                .execute(shipment_id, |s| s.update_status(status, None, None))
                .await
                .unwrap();
        }

        let shipment = handler.load(shipment_id).await.unwrap();
        assert_eq!(shipment.status(), ShipmentStatus::Delivered);
        assert!(shipment.shipped_at().is_some());
        assert!(shipment.actual_delivery().is_some());
        assert_eq!(shipment.version(), Version::new(5));
    }
}
