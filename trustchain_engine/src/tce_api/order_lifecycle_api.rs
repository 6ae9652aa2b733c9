use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::{ActivityLog, Delivery, NewOrder, Order, OrderStatusType, Role, TrackingId},
    events::{DeliveryUpdatedEvent, EventProducers, OrderStatusChangedEvent, PaymentStatusChangedEvent},
    fraud::FraudThresholds,
    helpers::{new_delivery_otp, new_tracking_id},
    tce_api::{
        fraud_api::FraudDetectionApi,
        fraud_objects::FraudCheckRequest,
        notification_api::NotificationDispatcher,
        notification_objects,
        order_objects::OrderQueryFilter,
    },
    traits::{AcceptedOrder, CancelledOrder, DeliveryLedger, LedgerError, NewOrderResult, TransitStarted},
};

/// Fresh tracking ids are drawn this many times before giving up on a collision.
const MAX_TRACKING_ID_ATTEMPTS: usize = 3;

/// `OrderLifecycleApi` drives an order from creation to assignment and pickup, or to cancellation.
///
/// Every transition is committed by the backend first. Only then are events published, the parties notified, and the
/// fraud rules run. None of these follow-ups can undo or fail a committed transition.
pub struct OrderLifecycleApi<B> {
    db: B,
    producers: EventProducers,
    notifier: NotificationDispatcher<B>,
    fraud: FraudDetectionApi<B>,
}

impl<B> Debug for OrderLifecycleApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderLifecycleApi")
    }
}

impl<B: Clone> OrderLifecycleApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        let notifier = NotificationDispatcher::new(db.clone(), producers.clone());
        let fraud = FraudDetectionApi::new(db.clone(), producers.clone());
        Self { db, producers, notifier, fraud }
    }

    pub fn with_fraud_thresholds(mut self, thresholds: FraudThresholds) -> Self {
        self.fraud = self.fraud.with_thresholds(thresholds);
        self
    }
}

impl<B> OrderLifecycleApi<B>
where B: DeliveryLedger
{
    /// Creates a `pending` order with a fresh tracking id and delivery code, plus its `pending` payment record.
    ///
    /// The customer is sent the delivery code by SMS if they have a phone number on file.
    pub async fn create_order(&self, order: NewOrder) -> Result<NewOrderResult, LedgerError> {
        order.validate().map_err(LedgerError::Validation)?;
        let mut attempt = 1;
        let result = loop {
            let tracking_id = new_tracking_id(Utc::now());
            match self.db.create_order(order.clone(), tracking_id.clone(), new_delivery_otp()).await {
                Err(LedgerError::AlreadyExists(_)) if attempt < MAX_TRACKING_ID_ATTEMPTS => {
                    debug!("📦️ Tracking id {tracking_id} is taken. Drawing another one");
                    attempt += 1;
                },
                other => break other?,
            }
        };
        let new_order = &result.order;
        info!("📦️ Order #{} ({}) created for {}", new_order.id, new_order.tracking_id, new_order.customer_id);
        self.producers.publish_order_status(OrderStatusChangedEvent::new(new_order.clone(), None));
        self.notifier.dispatch_best_effort(notification_objects::order_created(new_order)).await;
        let sms = notification_objects::delivery_code_sms(new_order);
        self.notifier.send_sms(&new_order.customer_id, Some(new_order.id), sms).await;
        let check = FraudCheckRequest::new("order_created").for_user(new_order.customer_id.as_str()).for_order(new_order.id);
        self.fraud.check_after_commit(check).await;
        Ok(result)
    }

    /// pending → assigned. Of several drivers racing for the same order, exactly one wins; the rest get
    /// [`LedgerError::OrderNotAvailable`].
    pub async fn accept_order(&self, order_id: i64, driver_id: &str) -> Result<AcceptedOrder, LedgerError> {
        let accepted = self.db.accept_order(order_id, driver_id).await?;
        info!("📦️ Order #{order_id} accepted by driver {driver_id}");
        self.producers.publish_order_status(OrderStatusChangedEvent::new(
            accepted.order.clone(),
            Some(OrderStatusType::Pending),
        ));
        self.producers.publish_delivery(DeliveryUpdatedEvent::new(accepted.delivery.clone()));
        self.notifier.dispatch_best_effort(notification_objects::order_accepted(&accepted.order)).await;
        Ok(accepted)
    }

    /// assigned → in_transit. Calling this again once the order is in transit succeeds without side effects.
    pub async fn start_transit(&self, order_id: i64, driver_id: &str) -> Result<TransitStarted, LedgerError> {
        let started = self.db.start_transit(order_id, driver_id).await?;
        if !started.newly_started {
            trace!("📦️ Order #{order_id} was already in transit");
            return Ok(started);
        }
        info!("📦️ Order #{order_id} picked up by driver {driver_id}");
        self.producers.publish_order_status(OrderStatusChangedEvent::new(
            started.order.clone(),
            Some(OrderStatusType::Assigned),
        ));
        self.producers.publish_delivery(DeliveryUpdatedEvent::new(started.delivery.clone()));
        self.notifier.dispatch_best_effort(notification_objects::order_in_transit(&started.order)).await;
        Ok(started)
    }

    /// pending|assigned → cancelled.
    ///
    /// Only an administrator, the customer or the merchant may cancel. Once an order is in transit it can no longer be
    /// cancelled, and a cancel that loses a race against a committed transition fails with a state conflict.
    pub async fn cancel_order(
        &self,
        order_id: i64,
        actor_id: &str,
        role: Role,
        reason: Option<String>,
    ) -> Result<CancelledOrder, LedgerError> {
        if role != Role::Admin {
            let order = self.db.fetch_order(order_id).await?.ok_or(LedgerError::OrderNotFound(order_id))?;
            if !order.is_party(actor_id) {
                warn!("📦️ {actor_id} tried to cancel order #{order_id}, which is not theirs");
                return Err(LedgerError::Forbidden(format!("{actor_id} may not cancel order {order_id}")));
            }
        }
        let cancelled = self.db.cancel_order(order_id, actor_id, reason).await?;
        info!(
            "📦️ Order #{order_id} cancelled by {actor_id} (was {}). Payment is now {}",
            cancelled.previous_status, cancelled.payment.status
        );
        self.producers.publish_order_status(OrderStatusChangedEvent::new(
            cancelled.order.clone(),
            Some(cancelled.previous_status),
        ));
        if cancelled.payment.status != cancelled.previous_payment_status {
            self.producers.publish_payment_status(PaymentStatusChangedEvent::new(
                cancelled.payment.clone(),
                cancelled.previous_payment_status,
            ));
        }
        if let Some(delivery) = &cancelled.voided_delivery {
            self.producers.publish_delivery(DeliveryUpdatedEvent::new(delivery.clone()));
        }
        self.notifier.dispatch_best_effort(notification_objects::order_cancelled(&cancelled)).await;
        let check = FraudCheckRequest::new("order_cancelled").for_user(cancelled.order.customer_id.as_str());
        self.fraud.check_after_commit(check).await;
        Ok(cancelled)
    }

    pub async fn order(&self, order_id: i64) -> Result<Option<Order>, LedgerError> {
        self.db.fetch_order(order_id).await
    }

    pub async fn order_by_tracking_id(&self, tracking_id: &TrackingId) -> Result<Option<Order>, LedgerError> {
        self.db.fetch_order_by_tracking_id(tracking_id).await
    }

    /// Orders still waiting for a driver, oldest first.
    pub async fn available_orders(&self, limit: Option<i64>) -> Result<Vec<Order>, LedgerError> {
        let mut filter = OrderQueryFilter::default().with_status(OrderStatusType::Pending);
        if let Some(limit) = limit {
            filter = filter.with_limit(limit);
        }
        self.db.search_orders(filter).await
    }

    pub async fn search_orders(&self, filter: OrderQueryFilter) -> Result<Vec<Order>, LedgerError> {
        trace!("📦️ Searching orders: {filter}");
        self.db.search_orders(filter).await
    }

    pub async fn active_delivery(&self, order_id: i64) -> Result<Option<Delivery>, LedgerError> {
        self.db.fetch_active_delivery(order_id).await
    }

    /// The audit trail for an order, oldest entry first.
    pub async fn activity(&self, order_id: i64) -> Result<Vec<ActivityLog>, LedgerError> {
        self.db.fetch_activity_for_order(order_id).await
    }
}
