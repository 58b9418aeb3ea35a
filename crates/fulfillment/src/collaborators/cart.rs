//! Shopping cart access and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{CartId, Sku, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub sku: Sku,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub items: Vec<CartItem>,
}

impl Cart {
    pub fn new(id: CartId, user_id: UserId) -> Self {
        Self {
            id,
            user_id,
            items: Vec::new(),
        }
    }

    pub fn with_item(mut self, sku: Sku, quantity: u32) -> Self {
        self.items.push(CartItem { sku, quantity });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Cart storage owned by the storefront.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn get_cart(&self, id: CartId) -> Option<Cart>;

    /// Empties the cart after a successful checkout.
    async fn clear(&self, id: CartId);
}

/// In-memory cart store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartStore {
    carts: Arc<RwLock<HashMap<CartId, Cart>>>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, cart: Cart) {
        self.carts.write().await.insert(cart.id, cart);
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn get_cart(&self, id: CartId) -> Option<Cart> {
        self.carts.read().await.get(&id).cloned()
    }

    async fn clear(&self, id: CartId) {
        if let Some(cart) = self.carts.write().await.get_mut(&id) {
            cart.items.clear();
        }
    }
}
