//! HTTP API server for the order-fulfillment services.
//!
//! Exposes orders, payments, shipments and inventory administration over REST,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use fulfillment::{Collaborators, Fulfillment, FulfillmentConfig};
use inventory::{InventoryLedger, ReservationCoordinator};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub fulfillment: Fulfillment,
}

impl AppState {
    pub fn coordinator(&self) -> &ReservationCoordinator {
        self.fulfillment.orders.coordinator()
    }

    pub fn ledger(&self) -> &InventoryLedger {
        self.coordinator().ledger()
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create).get(routes::orders::list))
        .route("/orders/{id}", get(routes::orders::get))
        .route("/orders/{id}/cancel", post(routes::orders::cancel))
        .route("/orders/{id}/status", post(routes::orders::update_status))
        .route("/orders/{id}/payments", post(routes::payments::initiate))
        .route("/orders/{id}/shipments", post(routes::shipments::create))
        .route("/payments/{reference}/process", post(routes::payments::process))
        .route("/payments/{id}/refund", post(routes::payments::refund))
        .route("/shipments/{id}/status", post(routes::shipments::update_status))
        .route("/warehouses", post(routes::inventory::register_warehouse))
        .route("/inventory/stock", post(routes::inventory::set_stock))
        .route("/inventory/adjust", post(routes::inventory::adjust))
        .route("/inventory/transfer", post(routes::inventory::transfer))
        .route("/inventory/{product_id}", get(routes::inventory::product_stock))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over the given ledger and collaborators.
pub fn create_state(
    ledger: InventoryLedger,
    collaborators: Collaborators,
    config: FulfillmentConfig,
) -> Arc<AppState> {
    let coordinator = ReservationCoordinator::new(ledger);
    Arc::new(AppState {
        fulfillment: Fulfillment::new(coordinator, collaborators, config),
    })
}

/// Creates state backed by an in-memory ledger and in-memory collaborators.
pub fn create_default_state(config: FulfillmentConfig) -> Arc<AppState> {
    create_state(InventoryLedger::default(), Collaborators::default(), config)
}
