//! Shipment endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{OrderId, ShipmentId};
use domain::shipment::{Shipment, ShipmentItem, ShipmentStatus};
use domain::{Aggregate, Note};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;
use crate::routes::Caller;

#[derive(Deserialize)]
pub struct CreateShipmentRequest {
    pub carrier: String,
    pub method: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateShipmentRequest {
    pub status: ShipmentStatus,
    pub notes: Option<String>,
}

#[derive(Serialize)]
pub struct ShipmentResponse {
    pub id: Option<ShipmentId>,
    pub tracking_number: String,
    pub order_id: Option<OrderId>,
    pub carrier: String,
    pub method: Option<String>,
    pub status: ShipmentStatus,
    pub items: Vec<ShipmentItem>,
    pub notes: Vec<Note>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub actual_delivery: Option<DateTime<Utc>>,
}

impl From<&Shipment> for ShipmentResponse {
    fn from(shipment: &Shipment) -> Self {
        Self {
            id: shipment.id(),
            tracking_number: shipment.tracking_number().to_string(),
            order_id: shipment.order_id(),
            carrier: shipment.carrier().to_string(),
            method: shipment.method().map(String::from),
            status: shipment.status(),
            items: shipment.items().to_vec(),
            notes: shipment.notes().to_vec(),
            shipped_at: shipment.shipped_at(),
            estimated_delivery: shipment.estimated_delivery(),
            actual_delivery: shipment.actual_delivery(),
        }
    }
}

/// POST /orders/{id}/shipments
#[tracing::instrument(skip(state, req))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(order_id): Path<u64>,
    Json(req): Json<CreateShipmentRequest>,
) -> Result<(StatusCode, Json<ShipmentResponse>), ApiError> {
    let shipment = state
        .fulfillment
        .shipments
        .create_shipment(
            OrderId::new(order_id),
            &req.carrier,
            req.method.as_deref(),
            &caller.actor(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ShipmentResponse::from(&shipment))))
}

/// POST /shipments/{id}/status
#[tracing::instrument(skip(state, req))]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<u64>,
    Json(req): Json<UpdateShipmentRequest>,
) -> Result<Json<ShipmentResponse>, ApiError> {
    let shipment = state
        .fulfillment
        .shipments
        .update_status(
            ShipmentId::new(id),
            req.status,
            req.notes.as_deref(),
            &caller.actor(),
        )
        .await?;
    Ok(Json(ShipmentResponse::from(&shipment)))
}
