//! Billing error types

use messmarkt_shared::StoreError;
use thiserror::Error;

/// Billing-specific errors
#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Rate limit counter unavailable: {0}")]
    CounterUnavailable(String),

    #[error("Webhook signature verification failed")]
    WebhookSignatureInvalid,

    #[error("Webhook timestamp outside tolerance")]
    WebhookTimestampOutOfTolerance,

    #[error("Webhook payload malformed: {0}")]
    WebhookPayload(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<redis::RedisError> for BillingError {
    fn from(err: redis::RedisError) -> Self {
        BillingError::CounterUnavailable(err.to_string())
    }
}

pub type BillingResult<T> = Result<T, BillingError>;
