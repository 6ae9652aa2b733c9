use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Payment, PaymentStatusType},
    events::{EventProducers, PaymentStatusChangedEvent},
    fraud::FraudThresholds,
    helpers::normalize_msisdn,
    tce_api::{
        fraud_api::FraudDetectionApi,
        fraud_objects::FraudCheckRequest,
        notification_api::NotificationDispatcher,
        notification_objects,
    },
    traits::{DeliveryLedger, EscrowRelease, LedgerError, PaymentGateway, PaymentTransition},
};

/// `EscrowApi` moves money through escrow: capture from the customer, hold while the order is on the road, and release
/// to the driver once the delivery code has been verified.
pub struct EscrowApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
    notifier: NotificationDispatcher<B>,
    fraud: FraudDetectionApi<B>,
}

impl<B, G> Debug for EscrowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EscrowApi")
    }
}

impl<B: Clone, G> EscrowApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        let notifier = NotificationDispatcher::new(db.clone(), producers.clone());
        let fraud = FraudDetectionApi::new(db.clone(), producers.clone());
        Self { db, gateway, producers, notifier, fraud }
    }

    pub fn with_fraud_thresholds(mut self, thresholds: FraudThresholds) -> Self {
        self.fraud = self.fraud.with_thresholds(thresholds);
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }
}

impl<B, G> EscrowApi<B, G>
where
    B: DeliveryLedger,
    G: PaymentGateway,
{
    /// Asks the gateway to collect the order amount from `phone`.
    ///
    /// The payment stays `pending` until the gateway calls back with [`Self::confirm_capture`] or
    /// [`Self::fail_capture`]. If the gateway refuses the request, nothing is recorded.
    pub async fn initiate_capture(
        &self,
        order_id: i64,
        customer_id: &str,
        phone: &str,
    ) -> Result<PaymentTransition, LedgerError> {
        let account = normalize_msisdn(phone).map_err(|e| LedgerError::Validation(e.to_string()))?;
        let order = self.db.fetch_order(order_id).await?.ok_or(LedgerError::OrderNotFound(order_id))?;
        if order.customer_id != customer_id {
            return Err(LedgerError::Forbidden(format!("Order {order_id} does not belong to {customer_id}")));
        }
        if order.status.is_terminal() {
            return Err(LedgerError::OrderNotAvailable { order_id, status: order.status });
        }
        let payment = self.db.fetch_payment_for_order(order_id).await?.ok_or(LedgerError::PaymentNotFound(order_id))?;
        if payment.status != PaymentStatusType::Pending {
            return Err(LedgerError::IllegalPaymentTransition {
                order_id,
                from: payment.status,
                to: PaymentStatusType::HeldEscrow,
            });
        }
        let receipt = self.gateway.initiate_capture(order_id, &account, order.amount).await.map_err(|e| {
            warn!("💰️ Capture request for order #{order_id} failed. {e}");
            LedgerError::Upstream(e.to_string())
        })?;
        let transition = self.db.record_capture_request(order_id, &receipt.transaction_ref, &account).await?;
        info!("💰️ Capture of {} requested for order #{order_id} ({})", order.amount.with_currency(), receipt.transaction_ref);
        Ok(transition)
    }

    /// pending → held_escrow. A replay with the same reference returns the held payment unchanged.
    pub async fn confirm_capture(&self, order_id: i64, transaction_ref: &str) -> Result<PaymentTransition, LedgerError> {
        let transition = self.db.confirm_capture(order_id, transaction_ref).await?;
        if !transition.changed {
            debug!("💰️ Capture {transaction_ref} for order #{order_id} was already confirmed");
            return Ok(transition);
        }
        info!("💰️ {} held in escrow for order #{order_id}", transition.payment.amount.with_currency());
        self.publish(&transition);
        let notifications = notification_objects::payment_held(&transition.order, &transition.payment);
        self.notifier.dispatch_best_effort(notifications).await;
        Ok(transition)
    }

    /// pending → failed.
    pub async fn fail_capture(&self, order_id: i64, reason: &str) -> Result<PaymentTransition, LedgerError> {
        let transition = self.db.fail_capture(order_id, reason).await?;
        if transition.changed {
            warn!("💰️ Capture for order #{order_id} failed. {reason}");
            self.publish(&transition);
            let notifications = notification_objects::payment_failed(&transition.order, &transition.payment);
            self.notifier.dispatch_best_effort(notifications).await;
        }
        Ok(transition)
    }

    /// held_escrow → released, paying out to `driver_id`.
    ///
    /// Fails with [`LedgerError::OrderNotDelivered`], [`LedgerError::OtpNotVerified`] or
    /// [`LedgerError::PaymentNotInEscrow`], checked in that order. Retrying after a success is safe: the released
    /// payment is returned and nothing else happens.
    pub async fn release_escrow(&self, order_id: i64, driver_id: &str) -> Result<EscrowRelease, LedgerError> {
        let release = self.db.release_escrow(order_id, driver_id).await?;
        if !release.newly_released {
            debug!("💰️ Escrow for order #{order_id} was already released to {driver_id}");
            return Ok(release);
        }
        info!(
            "💰️ {} released to {driver_id} for order #{order_id}. They have now completed {} deliveries",
            release.payment.amount.with_currency(),
            release.driver_total_deliveries
        );
        self.producers.publish_payment_status(PaymentStatusChangedEvent::new(
            release.payment.clone(),
            PaymentStatusType::HeldEscrow,
        ));
        let notifications = notification_objects::payment_released(&release.order, &release.payment, driver_id);
        self.notifier.dispatch_best_effort(notifications).await;
        self.fraud.check_after_commit(FraudCheckRequest::new("payment_released").for_order(order_id)).await;
        Ok(release)
    }

    pub async fn payment_for_order(&self, order_id: i64) -> Result<Option<Payment>, LedgerError> {
        self.db.fetch_payment_for_order(order_id).await
    }

    fn publish(&self, transition: &PaymentTransition) {
        let event = PaymentStatusChangedEvent::new(transition.payment.clone(), transition.previous_status);
        self.producers.publish_payment_status(event);
    }
}
