//! Order fulfillment services.
//!
//! This crate ties orders, payments and shipments to the inventory ledger:
//! 1. Placing an order reserves stock for every line
//! 2. Cancelling or refunding an undelivered order releases it
//! 3. Delivering a shipment commits the reduction, once per order
//!
//! All three services share one [`OrderLifecycle`] and its per-order locks.

pub mod collaborators;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod payment;
pub mod shipment;

use std::sync::Arc;

use domain::CommandHandler;
use inventory::ReservationCoordinator;

pub use collaborators::{
    Cart, CartItem, CartStore, Catalog, ChargeRequest, Collaborators, GatewayError,
    GatewayReceipt, InMemoryCartStore, InMemoryCatalog, InMemoryNotifier, LogNotifier,
    Notification, NotificationKind, Notifier, PaymentGateway, Product, RefundRequest,
    SimulatedGateway, Variant,
};
pub use config::FulfillmentConfig;
pub use error::{ErrorKind, FulfillmentError, Result};
pub use lifecycle::OrderLifecycle;
pub use payment::PaymentProcessor;
pub use shipment::ShipmentTracker;

/// The three fulfillment services wired to one coordinator.
#[derive(Clone)]
pub struct Fulfillment {
    pub orders: OrderLifecycle,
    pub payments: PaymentProcessor,
    pub shipments: ShipmentTracker,
}

impl Fulfillment {
    pub fn new(
        coordinator: ReservationCoordinator,
        collaborators: Collaborators,
        config: FulfillmentConfig,
    ) -> Self {
        let payment_handler = CommandHandler::default();
        let orders = OrderLifecycle::new(
            CommandHandler::default(),
            payment_handler.clone(),
            coordinator,
            collaborators,
            Arc::new(config),
        );
        let payments = PaymentProcessor::new(payment_handler, orders.clone());
        let shipments = ShipmentTracker::new(CommandHandler::default(), orders.clone());
        Self {
            orders,
            payments,
            shipments,
        }
    }
}
