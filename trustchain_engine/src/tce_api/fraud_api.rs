use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::{FraudAlert, NewFraudAlert},
    events::{EventProducers, FraudAlertRaisedEvent, FraudCheckRequestedEvent},
    fraud::{order_alerts, user_alerts, FraudThresholds, UserActivity},
    tce_api::{
        fraud_objects::{FraudCheckReport, FraudCheckRequest},
        notification_api::NotificationDispatcher,
        notification_objects,
    },
    traits::{FraudManagement, LedgerError, NotificationManagement},
};

/// `FraudDetectionApi` scores users and orders against the fraud rules.
///
/// It only ever reads order, delivery and payment state. Its outputs are fraud alerts, an audit entry, and
/// notifications to every administrator for high and critical alerts.
pub struct FraudDetectionApi<B> {
    db: B,
    producers: EventProducers,
    notifier: NotificationDispatcher<B>,
    thresholds: FraudThresholds,
}

impl<B> Debug for FraudDetectionApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FraudDetectionApi ({:?})", self.thresholds)
    }
}

impl<B: Clone> Clone for FraudDetectionApi<B> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            producers: self.producers.clone(),
            notifier: self.notifier.clone(),
            thresholds: self.thresholds,
        }
    }
}

impl<B: Clone> FraudDetectionApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        let notifier = NotificationDispatcher::new(db.clone(), producers.clone());
        Self { db, producers, notifier, thresholds: FraudThresholds::default() }
    }

    pub fn with_thresholds(mut self, thresholds: FraudThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn thresholds(&self) -> &FraudThresholds {
        &self.thresholds
    }
}

impl<B> FraudDetectionApi<B>
where B: FraudManagement + NotificationManagement
{
    /// Runs every applicable rule and records the alerts that fired in one batch.
    ///
    /// User rules run if `user_id` is given, order rules if `order_id` is given. At least one is required. Admin
    /// notifications are best-effort; a failure there is logged and the report is still returned.
    pub async fn run_check(&self, request: FraudCheckRequest) -> Result<FraudCheckReport, LedgerError> {
        if request.user_id.is_none() && request.order_id.is_none() {
            return Err(LedgerError::Validation("A fraud check needs a user_id, an order_id, or both".into()));
        }
        let action = request.action.as_str();
        let mut fired: Vec<NewFraudAlert> = Vec::new();
        if let Some(user_id) = &request.user_id {
            let now = Utc::now();
            let recent_orders =
                self.db.count_orders_since(user_id, now - self.thresholds.rapid_order_window).await?;
            let recent_cancellations =
                self.db.count_cancellations_since(user_id, now - self.thresholds.cancellation_window).await?;
            let profile = self.db.fetch_profile(user_id).await?;
            let activity = UserActivity { user_id: user_id.clone(), profile, recent_orders, recent_cancellations };
            fired.extend(user_alerts(&activity, &self.thresholds, action));
        }
        if let Some(order_id) = request.order_id {
            let order = self.db.fetch_order(order_id).await?.ok_or(LedgerError::OrderNotFound(order_id))?;
            let delivery = self.db.fetch_active_delivery(order_id).await?;
            fired.extend(order_alerts(&order, delivery.as_ref(), &self.thresholds, action));
        }
        let recorded = self.db.record_fraud_alerts(fired.clone(), action).await?;
        for alert in &recorded {
            warn!(
                "🚨️ {} alert #{}: {} (user: {:?}, order: {:?})",
                alert.severity, alert.id, alert.alert_type, alert.user_id, alert.order_id
            );
            self.producers.publish_fraud_alert(FraudAlertRaisedEvent::new(alert.clone()));
        }
        self.notify_admins(&recorded).await;
        debug!("🚨️ Fraud check ({action}) completed. {} alerts generated, {} recorded", fired.len(), recorded.len());
        Ok(FraudCheckReport { fired, recorded })
    }

    /// Scores a workflow operation that has already committed. Never fails.
    ///
    /// The check is queued for the fraud worker subscribed to the event bus, so the operation does not wait on it. With
    /// no worker subscribed, or a full queue, the check runs here instead.
    pub async fn check_after_commit(&self, request: FraudCheckRequest) {
        if self.producers.publish_fraud_check(FraudCheckRequestedEvent::new(request.clone())) {
            trace!("🚨️ Fraud check after {} queued", request.action);
            return;
        }
        let action = request.action.clone();
        if let Err(e) = self.run_check(request).await {
            warn!("🚨️ Fraud check after {action} failed: {e}");
        }
    }

    async fn notify_admins(&self, alerts: &[FraudAlert]) {
        let urgent = alerts.iter().filter(|a| a.severity.notifies_admins()).collect::<Vec<_>>();
        if urgent.is_empty() {
            return;
        }
        let admin_ids = match self.db.fetch_admin_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("🚨️ Could not fetch administrators to notify: {e}");
                return;
            },
        };
        if admin_ids.is_empty() {
            warn!("🚨️ There are no administrators to notify of {} urgent fraud alerts", urgent.len());
            return;
        }
        let notifications =
            urgent.into_iter().flat_map(|alert| notification_objects::fraud_alert(&admin_ids, alert)).collect();
        self.notifier.dispatch_best_effort(notifications).await;
    }

    /// Unresolved alerts, newest first.
    pub async fn open_alerts(&self) -> Result<Vec<FraudAlert>, LedgerError> {
        self.db.search_fraud_alerts(true, None).await
    }

    pub async fn alerts_for_user(&self, user_id: &str, unresolved_only: bool) -> Result<Vec<FraudAlert>, LedgerError> {
        self.db.search_fraud_alerts(unresolved_only, Some(user_id)).await
    }

    pub async fn resolve_alert(&self, alert_id: i64, admin_id: &str) -> Result<FraudAlert, LedgerError> {
        let alert = self.db.resolve_fraud_alert(alert_id, admin_id).await?;
        info!("🚨️ Alert #{alert_id} ({}) resolved by {admin_id}", alert.alert_type);
        Ok(alert)
    }
}
