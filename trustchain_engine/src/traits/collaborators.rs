//! Contracts for the external services the engine calls out to. Transport mechanics live with the implementations.
use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::Money;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureReceipt {
    pub transaction_ref: String,
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("The payment gateway rejected the request. {0}")]
    Rejected(String),
    #[error("The payment gateway could not be reached. {0}")]
    Unavailable(String),
}

/// A mobile-money or card gateway. Captures are confirmed out of band; see
/// [`crate::EscrowApi::confirm_capture`].
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    async fn initiate_capture(
        &self,
        order_id: i64,
        account: &str,
        amount: Money,
    ) -> Result<CaptureReceipt, GatewayError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsReceipt {
    pub message_id: String,
}

#[derive(Debug, Clone, Error)]
#[error("SMS delivery failed. {0}")]
pub struct TransportError(pub String);

/// Fire-and-forget text messaging. Callers log failures and carry on.
pub trait SmsTransport: Send + Sync {
    fn send(
        &self,
        recipient: &str,
        message: &str,
        correlation_id: &str,
    ) -> impl Future<Output = Result<SmsReceipt, TransportError>> + Send;
}
