//! Payment gateway trait and simulated implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::Money;
use domain::payment::PaymentMethod;
use thiserror::Error;
use tokio::sync::RwLock;

/// A charge sent to the gateway.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub payment_reference: String,
    /// Correlation id supplied by the caller, if the payment was started elsewhere.
    pub gateway_transaction_id: Option<String>,
    pub method: PaymentMethod,
    pub amount: Money,
}

/// A refund sent to the gateway.
#[derive(Debug, Clone)]
pub struct RefundRequest {
    pub payment_reference: String,
    pub gateway_transaction_id: Option<String>,
    pub amount: Money,
    pub reason: String,
}

/// Gateway acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReceipt {
    pub transaction_id: String,
    pub response: String,
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The gateway answered and refused the operation.
    #[error("Declined: {0}")]
    Declined(String),

    #[error("Gateway did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Gateway unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: &ChargeRequest) -> Result<GatewayReceipt, GatewayError>;

    async fn refund(&self, request: &RefundRequest) -> Result<GatewayReceipt, GatewayError>;
}

#[derive(Debug, Default)]
struct SimulatedState {
    decline_charges: bool,
    fail_refunds: bool,
    delay: Option<Duration>,
    charges: u32,
    refunds: u32,
}

/// Gateway that approves everything unless told otherwise.
#[derive(Debug, Clone, Default)]
pub struct SimulatedGateway {
    state: Arc<RwLock<SimulatedState>>,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declines every charge while set.
    pub async fn set_decline_charges(&self, decline: bool) {
        self.state.write().await.decline_charges = decline;
    }

    /// Reports every refund as unavailable while set.
    pub async fn set_fail_refunds(&self, fail: bool) {
        self.state.write().await.fail_refunds = fail;
    }

    /// Sleeps this long before answering.
    pub async fn set_delay(&self, delay: Option<Duration>) {
        self.state.write().await.delay = delay;
    }

    pub async fn charge_count(&self) -> u32 {
        self.state.read().await.charges
    }

    pub async fn refund_count(&self) -> u32 {
        self.state.read().await.refunds
    }

    async fn wait(&self) {
        let delay = self.state.read().await.delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<GatewayReceipt, GatewayError> {
        self.wait().await;

        let mut state = self.state.write().await;
        state.charges += 1;
        if state.decline_charges {
            return Err(GatewayError::Declined(
                "Payment gateway declined the transaction".to_string(),
            ));
        }

        let transaction_id = request
            .gateway_transaction_id
            .clone()
            .unwrap_or_else(common::reference::transaction_reference);
        Ok(GatewayReceipt {
            transaction_id,
            response: "Payment completed successfully".to_string(),
        })
    }

    async fn refund(&self, request: &RefundRequest) -> Result<GatewayReceipt, GatewayError> {
        self.wait().await;

        let mut state = self.state.write().await;
        if state.fail_refunds {
            return Err(GatewayError::Unavailable("Refund processing failed".to_string()));
        }
        state.refunds += 1;

        Ok(GatewayReceipt {
            transaction_id: common::reference::transaction_reference(),
            response: format!(
                "Refund processed successfully. Amount: {}. Reason: {}",
                request.amount, request.reason
            ),
        })
    }
}
