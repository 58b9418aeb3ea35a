//! Payment initiation, gateway processing and refunds.

use std::time::Instant;

use common::{Money, OrderId, PaymentId, UserId};
use domain::order::{OrderError, OrderStatus};
use domain::payment::{NewPayment, Payment, PaymentMethod, PaymentStatus};
use domain::{Aggregate, CommandHandler};

use crate::collaborators::{ChargeRequest, GatewayError, NotificationKind, RefundRequest};
use crate::error::{FulfillmentError, Result};
use crate::lifecycle::OrderLifecycle;

const DECLINED_RESPONSE: &str = "Transaction declined";

/// Moves payments through PENDING → PROCESSING → COMPLETED/FAILED and
/// handles refunds, flipping the order's status where the payment demands it.
#[derive(Clone)]
pub struct PaymentProcessor {
    payments: CommandHandler<Payment>,
    lifecycle: OrderLifecycle,
}

impl PaymentProcessor {
    pub fn new(payments: CommandHandler<Payment>, lifecycle: OrderLifecycle) -> Self {
        Self {
            payments,
            lifecycle,
        }
    }

    /// Opens a PENDING payment for the order's total.
    #[tracing::instrument(skip(self))]
    pub async fn initiate(
        &self,
        order_id: OrderId,
        method: PaymentMethod,
        user_id: UserId,
    ) -> Result<Payment> {
        let _guard = self.lifecycle.lock(order_id).await;
        let order = self.lifecycle.orders().load(order_id).await?;
        if !order.is_owned_by(user_id) {
            return Err(FulfillmentError::unauthorized("order"));
        }
        if !order.status().accepts_payment() {
            return Err(OrderError::InvalidStateTransition {
                current_state: order.status(),
                action: "accept payment",
            }
            .into());
        }

        let reference = common::reference::payment_reference();
        let result = self
            .payments
            .create(|id, payment| {
                payment.initiate(
                    id,
                    NewPayment {
                        reference: reference.clone(),
                        order_id,
                        user_id,
                        method,
                        amount: order.total(),
                    },
                )
            })
            .await?;

        tracing::info!(%reference, order_number = %order.order_number(), amount = %order.total(), "Payment initiated");
        Ok(result.aggregate)
    }

    /// Calls the gateway for a PENDING payment.
    ///
    /// A decline or a timeout leaves the payment FAILED and is not an error;
    /// the order keeps its reservations.
    #[tracing::instrument(skip(self))]
    pub async fn process(
        &self,
        payment_reference: &str,
        gateway_transaction_id: Option<String>,
    ) -> Result<Payment> {
        let found = self.find_by_reference(payment_reference).await?;
        let (payment_id, order_id) = ids_of(&found)?;

        let _guard = self.lifecycle.lock(order_id).await;
        let order = self.lifecycle.orders().load(order_id).await?;
        if !order.status().accepts_payment() {
            return Err(OrderError::InvalidStateTransition {
                current_state: order.status(),
                action: "accept payment",
            }
            .into());
        }

        let payment = self
            .payments
            .execute(payment_id, |p| p.start_processing(gateway_transaction_id.clone()))
            .await?
            .aggregate;

        let request = ChargeRequest {
            payment_reference: payment_reference.to_string(),
            gateway_transaction_id,
            method: payment.method().unwrap_or(PaymentMethod::CreditCard),
            amount: payment.amount(),
        };
        let timeout = self.lifecycle.config().gateway_timeout;
        let gateway = &self.lifecycle.collaborators().gateway;

        let started = Instant::now();
        let outcome = match tokio::time::timeout(timeout, gateway.charge(&request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(GatewayError::Timeout(timeout)),
        };
        metrics::histogram!("payment_gateway_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        let payment = match outcome {
            Ok(receipt) => {
                let payment = self
                    .payments
                    .execute(payment_id, |p| {
                        p.complete(receipt.transaction_id.clone(), Some(receipt.response.clone()))
                    })
                    .await?
                    .aggregate;

                if order.status() == OrderStatus::Placed {
                    let actor = self.lifecycle.config().system_actor.clone();
                    self.lifecycle
                        .transition_locked(order_id, OrderStatus::Confirmed, &actor, None)
                        .await?;
                }

                metrics::counter!("payments_completed_total").increment(1);
                tracing::info!(%payment_reference, order_number = %order.order_number(), "Payment completed");
                self.lifecycle
                    .notify(
                        &order,
                        NotificationKind::PaymentCompleted,
                        format!("Payment of {} received", payment.amount()),
                    );
                payment
            }
            Err(e) => {
                let (reason, response) = match &e {
                    GatewayError::Declined(reason) => {
                        (reason.clone(), Some(DECLINED_RESPONSE.to_string()))
                    }
                    other => (other.to_string(), None),
                };
                let payment = self
                    .payments
                    .execute(payment_id, |p| p.fail(reason.clone(), response))
                    .await?
                    .aggregate;

                metrics::counter!("payments_failed_total").increment(1);
                tracing::error!(%payment_reference, %reason, "Payment failed");
                self.lifecycle
                    .notify(
                        &order,
                        NotificationKind::PaymentFailed,
                        format!("Payment for order {} failed: {reason}", order.order_number()),
                    );
                payment
            }
        };

        Ok(payment)
    }

    /// Refunds part or all of a COMPLETED payment.
    ///
    /// A full refund moves the order to REFUNDED when it is still in flight and
    /// releases stock that was never committed.
    #[tracing::instrument(skip(self))]
    pub async fn refund(
        &self,
        payment_id: PaymentId,
        amount: Money,
        reason: &str,
        actor: &str,
    ) -> Result<Payment> {
        let found = self.payments.load(payment_id).await?;
        let (_, order_id) = ids_of(&found)?;

        let _guard = self.lifecycle.lock(order_id).await;
        let payment = self.payments.load(payment_id).await?;
        payment.refund(amount, reason, Some(actor))?;

        let request = RefundRequest {
            payment_reference: payment.reference().to_string(),
            gateway_transaction_id: payment.gateway_transaction_id().map(str::to_string),
            amount,
            reason: reason.to_string(),
        };
        let timeout = self.lifecycle.config().gateway_timeout;
        let gateway = &self.lifecycle.collaborators().gateway;
        let started = Instant::now();
        let outcome = tokio::time::timeout(timeout, gateway.refund(&request)).await;
        metrics::histogram!("payment_gateway_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        match outcome {
            Ok(Ok(receipt)) => {
                tracing::debug!(transaction_id = %receipt.transaction_id, "Refund accepted by gateway");
            }
            Ok(Err(e)) => {
                tracing::error!(payment_reference = %payment.reference(), error = %e, "Refund failed");
                return Err(e.into());
            }
            Err(_) => {
                tracing::error!(payment_reference = %payment.reference(), "Refund timed out");
                return Err(GatewayError::Timeout(timeout).into());
            }
        }

        let payment = self
            .payments
            .execute(payment_id, |p| p.refund(amount, reason, Some(actor)))
            .await?
            .aggregate;

        let order = self.lifecycle.orders().load(order_id).await?;
        if payment.status() == PaymentStatus::Refunded {
            if order.status().can_refund() {
                if !order.inventory_committed() {
                    self.lifecycle
                        .release_items(&order, "Order refunded", actor)
                        .await?;
                }
                self.lifecycle
                    .transition_locked(order_id, OrderStatus::Refunded, actor, Some(reason))
                    .await?;
            } else {
                tracing::info!(
                    order_number = %order.order_number(),
                    status = %order.status(),
                    "Order keeps its status after full refund"
                );
            }
        }

        tracing::info!(payment_reference = %payment.reference(), %amount, status = %payment.status(), "Payment refunded");
        self.lifecycle
            .notify(
                &order,
                NotificationKind::PaymentRefunded,
                format!("Refund of {amount} issued: {reason}"),
            );
        Ok(payment)
    }
}

// Queries
impl PaymentProcessor {
    pub async fn payment(&self, payment_id: PaymentId) -> Result<Payment> {
        Ok(self.payments.load(payment_id).await?)
    }

    pub async fn payment_by_reference(&self, reference: &str, user_id: UserId) -> Result<Payment> {
        let payment = self.find_by_reference(reference).await?;
        if !payment.is_owned_by(user_id) {
            return Err(FulfillmentError::unauthorized("payment"));
        }
        Ok(payment)
    }

    pub async fn order_payments(&self, order_id: OrderId, user_id: UserId) -> Result<Vec<Payment>> {
        self.lifecycle.get_order(order_id, user_id).await?;
        Ok(self
            .payments
            .repository()
            .find(|p| p.order_id() == Some(order_id))
            .await)
    }

    pub async fn user_payments(&self, user_id: UserId) -> Vec<Payment> {
        self.payments
            .repository()
            .find(|p| p.is_owned_by(user_id))
            .await
    }

    pub async fn payments_by_status(&self, status: PaymentStatus) -> Vec<Payment> {
        self.payments
            .repository()
            .find(|p| p.status() == status)
            .await
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Payment> {
        self.payments
            .repository()
            .find(|p| p.reference() == reference)
            .await
            .into_iter()
            .next()
            .ok_or_else(|| FulfillmentError::not_found("Payment", reference))
    }
}

fn ids_of(payment: &Payment) -> Result<(PaymentId, OrderId)> {
    match (payment.id(), payment.order_id()) {
        (Some(id), Some(order_id)) => Ok((id, order_id)),
        _ => Err(FulfillmentError::validation("Payment has not been initiated")),
    }
}
