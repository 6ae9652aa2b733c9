use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    db_types::{Delivery, LocationUpdate, OrderStatusType},
    events::{DeliveryUpdatedEvent, EventProducers, OrderStatusChangedEvent},
    fraud::FraudThresholds,
    tce_api::{
        fraud_api::FraudDetectionApi,
        fraud_objects::FraudCheckRequest,
        notification_api::NotificationDispatcher,
        notification_objects,
        order_objects::OrderFlowConfig,
    },
    traits::{CompletedDelivery, DeliveryLedger, LedgerError, LocationUpdateResult},
};

/// How far ahead of the server clock a driver's reading may be dated, in minutes.
pub const MAX_LOCATION_CLOCK_SKEW_MINUTES: i64 = 5;

/// `DeliveryApi` handles what happens on the road: position reports from the driver and the hand-over, which is gated
/// on the customer's delivery code.
pub struct DeliveryApi<B> {
    db: B,
    producers: EventProducers,
    notifier: NotificationDispatcher<B>,
    fraud: FraudDetectionApi<B>,
    config: OrderFlowConfig,
}

impl<B> Debug for DeliveryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeliveryApi ({:?})", self.config)
    }
}

impl<B: Clone> DeliveryApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        let notifier = NotificationDispatcher::new(db.clone(), producers.clone());
        let fraud = FraudDetectionApi::new(db.clone(), producers.clone());
        Self { db, producers, notifier, fraud, config: OrderFlowConfig::default() }
    }

    pub fn with_config(mut self, config: OrderFlowConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_fraud_thresholds(mut self, thresholds: FraudThresholds) -> Self {
        self.fraud = self.fraud.with_thresholds(thresholds);
        self
    }
}

impl<B> DeliveryApi<B>
where B: DeliveryLedger
{
    /// in_transit → delivered, if `otp` matches the order's delivery code.
    ///
    /// A wrong code costs one attempt, and the error says how many remain. Once they are used up, every call fails with
    /// [`LedgerError::OtpAttemptsExceeded`] until an administrator calls [`Self::reset_otp_attempts`].
    pub async fn complete_delivery(
        &self,
        order_id: i64,
        driver_id: &str,
        otp: &str,
    ) -> Result<CompletedDelivery, LedgerError> {
        let otp = otp.trim();
        if otp.is_empty() {
            return Err(LedgerError::Validation("A delivery code is required".into()));
        }
        let completed = match self.db.complete_delivery(order_id, driver_id, otp, self.config.max_otp_attempts).await {
            Ok(c) => c,
            Err(e @ LedgerError::OtpMismatch { .. }) | Err(e @ LedgerError::OtpAttemptsExceeded(_)) => {
                warn!("🔐️ Delivery code rejected for order #{order_id} (driver {driver_id}). {e}");
                return Err(e);
            },
            Err(e) => return Err(e),
        };
        info!("🔐️ Order #{order_id} delivered by {driver_id}. Delivery code verified");
        self.producers.publish_order_status(OrderStatusChangedEvent::new(
            completed.order.clone(),
            Some(OrderStatusType::InTransit),
        ));
        self.producers.publish_delivery(DeliveryUpdatedEvent::new(completed.delivery.clone()));
        let notifications = notification_objects::order_delivered(&completed.order, driver_id);
        self.notifier.dispatch_best_effort(notifications).await;
        let check = FraudCheckRequest::new("delivery_completed").for_user(driver_id).for_order(order_id);
        self.fraud.check_after_commit(check).await;
        Ok(completed)
    }

    /// Records the driver's position. Readings that are not newer than the stored one are dropped and reported as
    /// [`LocationUpdateResult::Stale`]. Readings dated more than
    /// [`MAX_LOCATION_CLOCK_SKEW_MINUTES`] ahead of the server clock are refused.
    pub async fn update_location(
        &self,
        driver_id: &str,
        update: LocationUpdate,
    ) -> Result<LocationUpdateResult, LedgerError> {
        if !update.position.is_valid() {
            return Err(LedgerError::Validation(format!(
                "({}, {}) is not a valid position",
                update.position.lat, update.position.lng
            )));
        }
        if update.recorded_at > Utc::now() + Duration::minutes(MAX_LOCATION_CLOCK_SKEW_MINUTES) {
            return Err(LedgerError::Validation(format!(
                "A location reading dated {} is in the future",
                update.recorded_at.to_rfc3339()
            )));
        }
        let result = self.db.update_location(driver_id, update).await?;
        match &result {
            LocationUpdateResult::Applied(delivery) => {
                self.producers.publish_delivery(DeliveryUpdatedEvent::new(delivery.clone()));
            },
            LocationUpdateResult::Stale(delivery) => {
                debug!("🔐️ Out-of-order location reading for delivery #{} ignored", delivery.id);
            },
        }
        Ok(result)
    }

    /// Clears the delivery code lockout on the order's active delivery.
    pub async fn reset_otp_attempts(&self, order_id: i64, admin_id: &str) -> Result<Delivery, LedgerError> {
        let delivery = self.db.reset_otp_attempts(order_id, admin_id).await?;
        info!("🔐️ Delivery code lockout for order #{order_id} reset by {admin_id}");
        Ok(delivery)
    }
}
