//! Payment aggregate implementation.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, PaymentId, UserId, Version};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{
    PaymentError, PaymentEvent, PaymentMethod, PaymentStatus,
    events::{
        PaymentCancelledData, PaymentCompletedData, PaymentFailedData, PaymentInitiatedData,
        PaymentRefundedData, ProcessingStartedData,
    },
};

/// Everything needed to open a payment.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub reference: String,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub method: PaymentMethod,
    pub amount: Money,
}

/// Payment aggregate root. Payments are never deleted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Payment {
    id: Option<PaymentId>,
    #[serde(default)]
    version: Version,
    reference: String,
    order_id: Option<OrderId>,
    user_id: Option<UserId>,
    method: Option<PaymentMethod>,
    status: PaymentStatus,
    amount: Money,
    refunded_amount: Money,
    gateway_transaction_id: Option<String>,
    gateway_response: Option<String>,
    failure_reason: Option<String>,
    refund_reason: Option<String>,
    created_at: Option<DateTime<Utc>>,
    processed_at: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl Aggregate for Payment {
    type Id = PaymentId;
    type Event = PaymentEvent;
    type Error = PaymentError;

    fn aggregate_type() -> &'static str {
        "Payment"
    }

    fn id(&self) -> Option<PaymentId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            PaymentEvent::PaymentInitiated(data) => {
                self.id = Some(data.payment_id);
                self.reference = data.reference;
                self.order_id = Some(data.order_id);
                self.user_id = Some(data.user_id);
                self.method = Some(data.method);
                self.amount = data.amount;
                self.status = PaymentStatus::Pending;
                self.created_at = Some(data.initiated_at);
                self.updated_at = Some(data.initiated_at);
            }
            PaymentEvent::ProcessingStarted(data) => {
                self.status = PaymentStatus::Processing;
                if data.gateway_transaction_id.is_some() {
                    self.gateway_transaction_id = data.gateway_transaction_id;
                }
                self.updated_at = Some(data.started_at);
            }
            PaymentEvent::PaymentCompleted(data) => {
                self.status = PaymentStatus::Completed;
                self.gateway_transaction_id = Some(data.gateway_transaction_id);
                self.gateway_response = data.gateway_response;
                self.processed_at = Some(data.completed_at);
                self.updated_at = Some(data.completed_at);
            }
            PaymentEvent::PaymentFailed(data) => {
                self.status = PaymentStatus::Failed;
                self.failure_reason = Some(data.reason);
                self.gateway_response = data.gateway_response;
                self.processed_at = Some(data.failed_at);
                self.updated_at = Some(data.failed_at);
            }
            PaymentEvent::PaymentRefunded(data) => {
                self.status = if data.full {
                    PaymentStatus::Refunded
                } else {
                    PaymentStatus::PartiallyRefunded
                };
                self.refunded_amount += data.amount;
                self.refund_reason = Some(data.reason);
                self.refunded_at = Some(data.refunded_at);
                self.updated_at = Some(data.refunded_at);
            }
            PaymentEvent::PaymentCancelled(data) => {
                self.status = PaymentStatus::Cancelled;
                self.failure_reason = Some(data.reason);
                self.updated_at = Some(data.cancelled_at);
            }
        }
    }
}

// Query methods
impl Payment {
    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == Some(user_id)
    }

    pub fn method(&self) -> Option<PaymentMethod> {
        self.method
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn refunded_amount(&self) -> Money {
        self.refunded_amount
    }

    pub fn gateway_transaction_id(&self) -> Option<&str> {
        self.gateway_transaction_id.as_deref()
    }

    pub fn gateway_response(&self) -> Option<&str> {
        self.gateway_response.as_deref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn refund_reason(&self) -> Option<&str> {
        self.refund_reason.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn processed_at(&self) -> Option<DateTime<Utc>> {
        self.processed_at
    }

    pub fn refunded_at(&self) -> Option<DateTime<Utc>> {
        self.refunded_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

// Command methods (return events)
impl Payment {
    /// Opens a PENDING payment.
    pub fn initiate(
        &self,
        payment_id: PaymentId,
        payment: NewPayment,
    ) -> Result<Vec<PaymentEvent>, PaymentError> {
        if self.id.is_some() {
            return Err(PaymentError::AlreadyCreated);
        }
        if payment.amount.is_negative() {
            return Err(PaymentError::InvalidAmount {
                amount: payment.amount,
            });
        }

        Ok(vec![PaymentEvent::PaymentInitiated(PaymentInitiatedData {
            payment_id,
            reference: payment.reference,
            order_id: payment.order_id,
            user_id: payment.user_id,
            method: payment.method,
            amount: payment.amount,
            initiated_at: Utc::now(),
        })])
    }

    /// Moves PENDING to PROCESSING before the gateway is called.
    pub fn start_processing(
        &self,
        gateway_transaction_id: Option<String>,
    ) -> Result<Vec<PaymentEvent>, PaymentError> {
        self.ensure(self.status.can_process(), "process")?;

        Ok(vec![PaymentEvent::ProcessingStarted(ProcessingStartedData {
            gateway_transaction_id,
            started_at: Utc::now(),
        })])
    }

    pub fn complete(
        &self,
        gateway_transaction_id: impl Into<String>,
        gateway_response: Option<String>,
    ) -> Result<Vec<PaymentEvent>, PaymentError> {
        self.ensure(self.status.awaiting_outcome(), "complete")?;

        Ok(vec![PaymentEvent::PaymentCompleted(PaymentCompletedData {
            gateway_transaction_id: gateway_transaction_id.into(),
            gateway_response,
            completed_at: Utc::now(),
        })])
    }

    pub fn fail(
        &self,
        reason: impl Into<String>,
        gateway_response: Option<String>,
    ) -> Result<Vec<PaymentEvent>, PaymentError> {
        self.ensure(self.status.awaiting_outcome(), "fail")?;

        Ok(vec![PaymentEvent::PaymentFailed(PaymentFailedData {
            reason: reason.into(),
            gateway_response,
            failed_at: Utc::now(),
        })])
    }

    pub fn cancel(&self, reason: impl Into<String>) -> Result<Vec<PaymentEvent>, PaymentError> {
        self.ensure(self.status.can_cancel(), "cancel")?;

        Ok(vec![PaymentEvent::PaymentCancelled(PaymentCancelledData {
            reason: reason.into(),
            cancelled_at: Utc::now(),
        })])
    }

    /// Refunds part or all of a COMPLETED payment.
    ///
    /// The amount must be positive and at most the original amount.
    pub fn refund(
        &self,
        amount: Money,
        reason: impl Into<String>,
        actor: Option<&str>,
    ) -> Result<Vec<PaymentEvent>, PaymentError> {
        self.ensure(self.status.can_refund(), "refund")?;

        let refundable = self.amount - self.refunded_amount;
        if !amount.is_positive() || amount > refundable {
            return Err(PaymentError::InvalidRefundAmount {
                requested: amount,
                refundable,
            });
        }

        Ok(vec![PaymentEvent::PaymentRefunded(PaymentRefundedData {
            amount,
            reason: reason.into(),
            actor: actor.map(str::to_string),
            full: amount == refundable,
            refunded_at: Utc::now(),
        })])
    }

    fn ensure(&self, allowed: bool, action: &'static str) -> Result<(), PaymentError> {
        if self.id.is_none() {
            return Err(PaymentError::NotInitiated);
        }
        if !allowed {
            return Err(PaymentError::InvalidStateTransition {
                current_state: self.status,
                action,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed_payment(amount_cents: i64) -> Payment {
        let mut payment = Payment::default();
        let events = payment
            .initiate(
                PaymentId::new(1),
                NewPayment {
                    reference: "PAY-1".to_string(),
                    order_id: OrderId::new(10),
                    user_id: UserId::new(5),
                    method: PaymentMethod::CreditCard,
                    amount: Money::from_cents(amount_cents),
                },
            )
            .unwrap();
        payment.apply_events(events);
        let events = payment.start_processing(None).unwrap();
        payment.apply_events(events);
        let events = payment.complete("TXN-1", Some("approved".to_string())).unwrap();
        payment.apply_events(events);
        payment
    }

    #[test]
    fn test_successful_flow() {
        let payment = completed_payment(10_000);

        assert_eq!(payment.status(), PaymentStatus::Completed);
        assert_eq!(payment.gateway_transaction_id(), Some("TXN-1"));
        assert_eq!(payment.gateway_response(), Some("approved"));
        assert!(payment.processed_at().is_some());
        assert!(payment.is_owned_by(UserId::new(5)));
    }

    #[test]
    fn test_cannot_process_twice() {
        let payment = completed_payment(100);
        assert!(matches!(
            payment.start_processing(None),
            Err(PaymentError::InvalidStateTransition {
                current_state: PaymentStatus::Completed,
                ..
            })
        ));
    }

    #[test]
    fn test_failure_records_reason() {
        let mut payment = Payment::default();
        let events = payment
            .initiate(
                PaymentId::new(1),
                NewPayment {
                    reference: "PAY-1".to_string(),
                    order_id: OrderId::new(1),
                    user_id: UserId::new(1),
                    method: PaymentMethod::Paypal,
                    amount: Money::from_cents(500),
                },
            )
            .unwrap();
        payment.apply_events(events);
        let events = payment.start_processing(Some("GW-9".to_string())).unwrap();
        payment.apply_events(events);
        let events = payment.fail("Card declined", None).unwrap();
        payment.apply_events(events);

        assert_eq!(payment.status(), PaymentStatus::Failed);
        assert_eq!(payment.failure_reason(), Some("Card declined"));
        assert_eq!(payment.gateway_transaction_id(), Some("GW-9"));
        assert!(payment.refund(Money::from_cents(100), "x", None).is_err());
    }

    #[test]
    fn test_refund_above_amount_rejected() {
        let payment = completed_payment(10_000);
        let result = payment.refund(Money::from_cents(15_000), "too much", None);
        assert!(matches!(
            result,
            Err(PaymentError::InvalidRefundAmount { .. })
        ));
        assert!(payment.refund(Money::zero(), "nothing", None).is_err());
    }

    #[test]
    fn test_full_refund() {
        let mut payment = completed_payment(10_000);
        let events = payment
            .refund(Money::from_cents(10_000), "Returned", Some("admin"))
            .unwrap();
        payment.apply_events(events);

        assert_eq!(payment.status(), PaymentStatus::Refunded);
        assert_eq!(payment.refunded_amount(), Money::from_cents(10_000));
        assert_eq!(payment.refund_reason(), Some("Returned"));
    }

    #[test]
    fn test_partial_refund() {
        let mut payment = completed_payment(10_000);
        let events = payment
            .refund(Money::from_cents(2_500), "Damaged item", None)
            .unwrap();
        payment.apply_events(events);

        assert_eq!(payment.status(), PaymentStatus::PartiallyRefunded);
        assert_eq!(payment.refunded_amount(), Money::from_cents(2_500));
        assert!(payment.refund(Money::from_cents(100), "again", None).is_err());
    }

    #[test]
    fn test_cancel_only_while_pending() {
        let payment = completed_payment(100);
        assert!(payment.cancel("late").is_err());
    }
}
