//! Payment endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, PaymentId};
use domain::Aggregate;
use domain::payment::{Payment, PaymentMethod, PaymentStatus};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;
use crate::routes::Caller;

#[derive(Deserialize)]
pub struct InitiatePaymentRequest {
    pub method: PaymentMethod,
}

#[derive(Deserialize)]
pub struct ProcessPaymentRequest {
    #[serde(default)]
    pub gateway_transaction_id: Option<String>,
}

#[derive(Deserialize)]
pub struct RefundRequest {
    pub amount_cents: i64,
    pub reason: String,
}

#[derive(Serialize)]
pub struct PaymentResponse {
    pub id: Option<PaymentId>,
    pub reference: String,
    pub order_id: Option<OrderId>,
    pub method: Option<PaymentMethod>,
    pub status: PaymentStatus,
    pub amount: Money,
    pub refunded_amount: Money,
    pub gateway_transaction_id: Option<String>,
    pub gateway_response: Option<String>,
    pub failure_reason: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl From<&Payment> for PaymentResponse {
    fn from(payment: &Payment) -> Self {
        Self {
            id: payment.id(),
            reference: payment.reference().to_string(),
            order_id: payment.order_id(),
            method: payment.method(),
            status: payment.status(),
            amount: payment.amount(),
            refunded_amount: payment.refunded_amount(),
            gateway_transaction_id: payment.gateway_transaction_id().map(String::from),
            gateway_response: payment.gateway_response().map(String::from),
            failure_reason: payment.failure_reason().map(String::from),
            processed_at: payment.processed_at(),
        }
    }
}

/// POST /orders/{id}/payments: open a PENDING payment for the order total.
#[tracing::instrument(skip(state, req))]
pub async fn initiate(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(order_id): Path<u64>,
    Json(req): Json<InitiatePaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), ApiError> {
    let payment = state
        .fulfillment
        .payments
        .initiate(OrderId::new(order_id), req.method, caller.0)
        .await?;
    Ok((StatusCode::CREATED, Json(PaymentResponse::from(&payment))))
}

/// POST /payments/{reference}/process
///
/// A declined or timed-out charge still answers 200 with a FAILED payment.
#[tracing::instrument(skip(state, req))]
pub async fn process(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(reference): Path<String>,
    Json(req): Json<ProcessPaymentRequest>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payments = &state.fulfillment.payments;
    payments.payment_by_reference(&reference, caller.0).await?;

    let payment = payments
        .process(&reference, req.gateway_transaction_id)
        .await?;
    Ok(Json(PaymentResponse::from(&payment)))
}

/// POST /payments/{id}/refund
#[tracing::instrument(skip(state, req))]
pub async fn refund(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<u64>,
    Json(req): Json<RefundRequest>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payment = state
        .fulfillment
        .payments
        .refund(
            PaymentId::new(id),
            Money::from_cents(req.amount_cents),
            &req.reason,
            &caller.actor(),
        )
        .await?;
    Ok(Json(PaymentResponse::from(&payment)))
}
