//! Order placement, lookup and status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{CartId, OrderId};
use domain::order::{Order, OrderItem, OrderStatus, OrderTotals, Pricing, ShippingAddress};
use domain::{Aggregate, Note};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;
use crate::routes::Caller;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub cart_id: CartId,
    #[serde(default)]
    pub pricing: Pricing,
    pub shipping_address: Option<ShippingAddress>,
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersParams {
    pub status: Option<OrderStatus>,
}

#[derive(Deserialize)]
pub struct CancelOrderRequest {
    pub reason: String,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    pub notes: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: Option<OrderId>,
    pub order_number: String,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub totals: OrderTotals,
    pub shipping_address: Option<ShippingAddress>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub actual_delivery: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub inventory_committed: bool,
    pub notes: Vec<Note>,
    pub placed_at: Option<DateTime<Utc>>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id(),
            order_number: order.order_number().to_string(),
            status: order.status(),
            items: order.items().to_vec(),
            totals: order.totals(),
            shipping_address: order.shipping_address().cloned(),
            estimated_delivery: order.estimated_delivery(),
            actual_delivery: order.actual_delivery(),
            cancellation_reason: order.cancellation_reason().map(String::from),
            inventory_committed: order.inventory_committed(),
            notes: order.notes().to_vec(),
            placed_at: order.placed_at(),
        }
    }
}

// -- Handlers --

/// POST /orders: place an order from the caller's cart.
#[tracing::instrument(skip(state, req))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = state
        .fulfillment
        .orders
        .create_order(req.cart_id, caller.0, req.pricing, req.shipping_address)
        .await?;

    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

/// GET /orders: the caller's orders, optionally filtered by status.
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(params): Query<ListOrdersParams>,
) -> Json<Vec<OrderResponse>> {
    let orders = state
        .fulfillment
        .orders
        .user_orders(caller.0, params.status)
        .await;
    Json(orders.iter().map(OrderResponse::from).collect())
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<u64>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .fulfillment
        .orders
        .get_order(OrderId::new(id), caller.0)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/cancel
#[tracing::instrument(skip(state, req))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<u64>,
    Json(req): Json<CancelOrderRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .fulfillment
        .orders
        .cancel_order(OrderId::new(id), caller.0, &req.reason)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/status: administrative status change.
#[tracing::instrument(skip(state, req))]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<u64>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .fulfillment
        .orders
        .update_order_status(
            OrderId::new(id),
            req.status,
            &caller.actor(),
            req.notes.as_deref(),
        )
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}
