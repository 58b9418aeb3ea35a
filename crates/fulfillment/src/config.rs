use std::time::Duration;

/// Default gateway timeout in milliseconds.
pub const DEFAULT_GATEWAY_TIMEOUT_MS: u64 = 5000;

/// Runtime settings for the fulfillment services.
#[derive(Debug, Clone)]
pub struct FulfillmentConfig {
    /// Upper bound on a single payment gateway call.
    pub gateway_timeout: Duration,

    /// Days between placement and the estimated delivery of a new order.
    pub default_delivery_days: i64,

    /// Actor recorded for transitions the system makes on its own.
    pub system_actor: String,
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            gateway_timeout: Duration::from_millis(DEFAULT_GATEWAY_TIMEOUT_MS),
            default_delivery_days: domain::order::DEFAULT_DELIVERY_DAYS,
            system_actor: "system".to_string(),
        }
    }
}

impl FulfillmentConfig {
    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    pub fn with_default_delivery_days(mut self, days: i64) -> Self {
        self.default_delivery_days = days;
        self
    }

    pub fn with_system_actor(mut self, actor: impl Into<String>) -> Self {
        self.system_actor = actor.into();
        self
    }
}
