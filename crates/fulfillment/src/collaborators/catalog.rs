//! Product catalog lookup and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{Money, ProductId, VariantId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// A sellable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub active: bool,
}

/// A variant of a product, optionally overriding its price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub name: String,
    pub price: Option<Money>,
    pub active: bool,
}

/// Read access to products and variants.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn product(&self, id: ProductId) -> Option<Product>;

    async fn variant(&self, id: VariantId) -> Option<Variant>;
}

#[derive(Debug, Default)]
struct CatalogState {
    products: HashMap<ProductId, Product>,
    variants: HashMap<VariantId, Variant>,
}

/// In-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<RwLock<CatalogState>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_product(&self, product: Product) {
        self.state.write().await.products.insert(product.id, product);
    }

    pub async fn add_variant(&self, variant: Variant) {
        self.state.write().await.variants.insert(variant.id, variant);
    }

    /// Flips the active flag of a product, if it exists.
    pub async fn set_product_active(&self, id: ProductId, active: bool) {
        if let Some(product) = self.state.write().await.products.get_mut(&id) {
            product.active = active;
        }
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn product(&self, id: ProductId) -> Option<Product> {
        self.state.read().await.products.get(&id).cloned()
    }

    async fn variant(&self, id: VariantId) -> Option<Variant> {
        self.state.read().await.variants.get(&id).cloned()
    }
}
