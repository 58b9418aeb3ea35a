//! External collaborators of the fulfillment core and in-memory implementations.

pub mod cart;
pub mod catalog;
pub mod gateway;
pub mod notifier;

use std::sync::Arc;

pub use cart::{Cart, CartItem, CartStore, InMemoryCartStore};
pub use catalog::{Catalog, InMemoryCatalog, Product, Variant};
pub use gateway::{
    ChargeRequest, GatewayError, GatewayReceipt, PaymentGateway, RefundRequest, SimulatedGateway,
};
pub use notifier::{InMemoryNotifier, LogNotifier, Notification, NotificationKind, Notifier};

/// The set of collaborators the services talk to.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn Catalog>,
    pub carts: Arc<dyn CartStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn Notifier>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            catalog: Arc::new(InMemoryCatalog::new()),
            carts: Arc::new(InMemoryCartStore::new()),
            gateway: Arc::new(SimulatedGateway::new()),
            notifier: Arc::new(LogNotifier),
        }
    }
}
