//! `SqliteDatabase` is a concrete implementation of a TrustChain engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`] module.
//!
//! Every state transition runs in a single transaction whose first statement is the guarded (compare-and-set) write.
//! SQLite then holds the write lock for the rest of the transaction, so the diagnostic reads that follow a failed
//! guard see the state that made it fail. Returning an error before `commit` drops the transaction, which rolls it
//! back.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::db::{
    activity,
    db_url,
    deliveries,
    fraud_alerts,
    insurance,
    new_pool,
    notifications,
    orders,
    payments,
    profiles,
    ratings,
};
use crate::{
    db_types::{
        ActivityDetails,
        ActivityLog,
        Delivery,
        FraudAlert,
        InsurancePolicy,
        InsuranceStatus,
        LocationUpdate,
        NewActivity,
        NewFraudAlert,
        NewInsurancePolicy,
        NewNotification,
        NewOrder,
        NewProfile,
        NewRating,
        Notification,
        Order,
        OrderStatusType,
        Payment,
        PaymentStatusType,
        Rating,
        TrackingId,
        UserProfile,
    },
    tce_api::order_objects::OrderQueryFilter,
    traits::{
        AcceptedOrder,
        CancelledOrder,
        CompletedDelivery,
        DeliveryLedger,
        EscrowRelease,
        FraudManagement,
        InsuranceManagement,
        LedgerError,
        LocationUpdateResult,
        NewOrderResult,
        NotificationManagement,
        OrderManagement,
        PaymentTransition,
        ProfileManagement,
        TransitStarted,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

fn order_transition(
    order: &Order,
    from: Option<OrderStatusType>,
    driver_id: Option<&str>,
    reason: Option<String>,
) -> ActivityDetails {
    ActivityDetails::OrderTransition {
        tracking_id: order.tracking_id.clone(),
        from,
        to: order.status,
        amount: order.amount,
        driver_id: driver_id.map(String::from),
        payment_status: Some(order.payment_status),
        reason,
    }
}

fn payment_transition(
    order: &Order,
    payment: &Payment,
    from: PaymentStatusType,
    reason: Option<String>,
) -> ActivityDetails {
    ActivityDetails::PaymentTransition {
        tracking_id: order.tracking_id.clone(),
        from,
        to: payment.status,
        amount: payment.amount,
        transaction_ref: payment.transaction_ref.clone(),
        reason,
    }
}

impl DeliveryLedger for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn create_order(
        &self,
        order: NewOrder,
        tracking_id: TrackingId,
        delivery_otp: String,
    ) -> Result<NewOrderResult, LedgerError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, tracking_id, delivery_otp, now, &mut tx).await?;
        let payment = payments::insert_payment(&order, now, &mut tx).await?;
        let details = order_transition(&order, None, None, None);
        activity::append(NewActivity::for_order(order.id, &order.customer_id, details), now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order #{} [{}] has been saved for {}", order.id, order.tracking_id, order.customer_id);
        Ok(NewOrderResult { order, payment })
    }

    async fn accept_order(&self, order_id: i64, driver_id: &str) -> Result<AcceptedOrder, LedgerError> {
        use OrderStatusType::*;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let Some(order) = orders::compare_and_set_status(order_id, &[Pending], Assigned, now, &mut tx).await? else {
            let status = orders::fetch_order(order_id, &mut tx).await?.map(|o| o.status);
            debug!("🗃️ Driver {driver_id} lost the race for order #{order_id}. Status is {status:?}");
            return Err(match status {
                None => LedgerError::OrderNotFound(order_id),
                Some(status) => LedgerError::OrderNotAvailable { order_id, status },
            });
        };
        let delivery = deliveries::insert_delivery(order_id, driver_id, now, &mut tx).await?;
        let details = order_transition(&order, Some(Pending), Some(driver_id), None);
        activity::append(NewActivity::for_order(order_id, driver_id, details), now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order #{order_id} assigned to {driver_id} (delivery #{})", delivery.id);
        Ok(AcceptedOrder { order, delivery })
    }

    async fn start_transit(&self, order_id: i64, driver_id: &str) -> Result<TransitStarted, LedgerError> {
        use OrderStatusType::*;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let Some(order) = orders::compare_and_set_status(order_id, &[Assigned], InTransit, now, &mut tx).await? else {
            let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(LedgerError::OrderNotFound(order_id))?;
            if order.status != InTransit {
                return Err(LedgerError::InvalidTransition { order_id, from: order.status, to: InTransit });
            }
            let delivery = deliveries::fetch_active_delivery(order_id, &mut tx)
                .await?
                .ok_or(LedgerError::NoActiveDelivery(order_id))?;
            if delivery.driver_id != driver_id {
                return Err(LedgerError::NotAssignedDriver { order_id, driver_id: driver_id.to_string() });
            }
            trace!("🗃️ Order #{order_id} is already in transit. Nothing to do");
            return Ok(TransitStarted { order, delivery, newly_started: false });
        };
        let delivery =
            deliveries::fetch_active_delivery(order_id, &mut tx).await?.ok_or(LedgerError::NoActiveDelivery(order_id))?;
        if delivery.driver_id != driver_id {
            // Dropping the transaction undoes the status change
            return Err(LedgerError::NotAssignedDriver { order_id, driver_id: driver_id.to_string() });
        }
        let delivery = deliveries::mark_picked_up(delivery.id, now, &mut tx).await?;
        let details = order_transition(&order, Some(Assigned), Some(driver_id), None);
        activity::append(NewActivity::for_order(order_id, driver_id, details), now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order #{order_id} is in transit with {driver_id}");
        Ok(TransitStarted { order, delivery, newly_started: true })
    }

    async fn complete_delivery(
        &self,
        order_id: i64,
        driver_id: &str,
        otp: &str,
        max_attempts: u32,
    ) -> Result<CompletedDelivery, LedgerError> {
        use OrderStatusType::*;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        if let Some(delivery) = deliveries::verify_otp(order_id, driver_id, otp, max_attempts, now, &mut tx).await? {
            let order = orders::compare_and_set_status(order_id, &[InTransit], Delivered, now, &mut tx)
                .await?
                .ok_or(LedgerError::OrderNotFound(order_id))?;
            let details = order_transition(&order, Some(InTransit), Some(driver_id), None);
            activity::append(NewActivity::for_order(order_id, driver_id, details), now, &mut tx).await?;
            tx.commit().await?;
            debug!("🗃️ Order #{order_id} delivered by {driver_id}");
            return Ok(CompletedDelivery { order, delivery });
        }
        // The guarded update wrote nothing. Work out why, in order of precedence.
        let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(LedgerError::OrderNotFound(order_id))?;
        if order.status != InTransit {
            return Err(LedgerError::InvalidTransition { order_id, from: order.status, to: Delivered });
        }
        let delivery =
            deliveries::fetch_active_delivery(order_id, &mut tx).await?.ok_or(LedgerError::NoActiveDelivery(order_id))?;
        if delivery.driver_id != driver_id {
            return Err(LedgerError::NotAssignedDriver { order_id, driver_id: driver_id.to_string() });
        }
        let max_attempts = i64::from(max_attempts);
        if delivery.otp_failed_attempts >= max_attempts {
            return Err(LedgerError::OtpAttemptsExceeded(order_id));
        }
        // Only a wrong code is left. The failed attempt is committed before reporting the mismatch.
        let delivery = deliveries::record_failed_otp(delivery.id, now, &mut tx).await?;
        let details =
            ActivityDetails::OtpRejected { delivery_id: delivery.id, failed_attempts: delivery.otp_failed_attempts };
        activity::append(NewActivity::for_order(order_id, driver_id, details), now, &mut tx).await?;
        tx.commit().await?;
        let attempts_remaining = u32::try_from(max_attempts - delivery.otp_failed_attempts).unwrap_or(0);
        debug!("🗃️ Wrong delivery code for order #{order_id}. {attempts_remaining} attempts remaining");
        Err(LedgerError::OtpMismatch { attempts_remaining })
    }

    async fn cancel_order(
        &self,
        order_id: i64,
        actor_id: &str,
        reason: Option<String>,
    ) -> Result<CancelledOrder, LedgerError> {
        use PaymentStatusType::*;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let cancellable = OrderStatusType::cancellable();
        let Some(order) =
            orders::compare_and_set_status(order_id, cancellable, OrderStatusType::Cancelled, now, &mut tx).await?
        else {
            let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(LedgerError::OrderNotFound(order_id))?;
            return Err(LedgerError::InvalidTransition { order_id, from: order.status, to: OrderStatusType::Cancelled });
        };
        let voided_delivery = deliveries::void_active_delivery(order_id, now, &mut tx).await?;
        // Every assigned order has an active delivery, and a pending one never does
        let previous_status =
            if voided_delivery.is_some() { OrderStatusType::Assigned } else { OrderStatusType::Pending };
        let payment =
            payments::fetch_payment_for_order(order_id, &mut tx).await?.ok_or(LedgerError::PaymentNotFound(order_id))?;
        let previous_payment_status = payment.status;
        let next_payment_status = match payment.status {
            HeldEscrow => Some(Refunded),
            Pending => Some(Failed),
            _ => None,
        };
        let payment = match next_payment_status {
            Some(next) => payments::compare_and_set_status(order_id, &[payment.status], next, None, now, &mut tx)
                .await?
                .ok_or(LedgerError::PaymentNotFound(order_id))?,
            None => payment,
        };
        let order = if order.payment_status == payment.status {
            order
        } else {
            orders::set_payment_status(order_id, payment.status, now, &mut tx).await?
        };
        let driver_id = voided_delivery.as_ref().map(|d| d.driver_id.as_str());
        let details = order_transition(&order, Some(previous_status), driver_id, reason);
        activity::append(NewActivity::for_order(order_id, actor_id, details), now, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🗃️ Order #{order_id} cancelled by {actor_id}. Payment moved from {previous_payment_status} to {}",
            payment.status
        );
        Ok(CancelledOrder { order, previous_status, payment, previous_payment_status, voided_delivery })
    }

    async fn update_location(&self, driver_id: &str, update: LocationUpdate) -> Result<LocationUpdateResult, LedgerError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        if let Some(delivery) = deliveries::update_location(driver_id, &update, now, &mut tx).await? {
            let details = ActivityDetails::LocationUpdated {
                delivery_id: delivery.id,
                position: update.position,
                recorded_at: update.recorded_at,
            };
            activity::append(NewActivity::for_order(delivery.order_id, driver_id, details), now, &mut tx).await?;
            tx.commit().await?;
            trace!("🗃️ Delivery #{} is now at {:?}", delivery.id, update.position);
            return Ok(LocationUpdateResult::Applied(delivery));
        }
        let delivery_id = update.delivery_id;
        let delivery =
            deliveries::fetch_delivery(delivery_id, &mut tx).await?.ok_or(LedgerError::DeliveryNotFound(delivery_id))?;
        if delivery.voided || delivery.driver_id != driver_id {
            return Err(LedgerError::NotAssignedDriver { order_id: delivery.order_id, driver_id: driver_id.to_string() });
        }
        let order = orders::fetch_order(delivery.order_id, &mut tx)
            .await?
            .ok_or(LedgerError::OrderNotFound(delivery.order_id))?;
        if order.status != OrderStatusType::InTransit {
            return Err(LedgerError::LocationRejected { delivery_id, status: order.status });
        }
        trace!("🗃️ Dropped a stale location reading for delivery #{delivery_id}");
        Ok(LocationUpdateResult::Stale(delivery))
    }

    async fn reset_otp_attempts(&self, order_id: i64, admin_id: &str) -> Result<Delivery, LedgerError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let Some(delivery) = deliveries::reset_otp_attempts(order_id, now, &mut tx).await? else {
            return match orders::fetch_order(order_id, &mut tx).await? {
                Some(_) => Err(LedgerError::NoActiveDelivery(order_id)),
                None => Err(LedgerError::OrderNotFound(order_id)),
            };
        };
        let details = ActivityDetails::OtpLockoutReset { delivery_id: delivery.id };
        activity::append(NewActivity::for_order(order_id, admin_id, details), now, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Delivery code lockout for order #{order_id} reset by {admin_id}");
        Ok(delivery)
    }

    async fn record_capture_request(
        &self,
        order_id: i64,
        transaction_ref: &str,
        phone: &str,
    ) -> Result<PaymentTransition, LedgerError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let Some(payment) = payments::set_transaction_ref(order_id, transaction_ref, now, &mut tx).await? else {
            orders::fetch_order(order_id, &mut tx).await?.ok_or(LedgerError::OrderNotFound(order_id))?;
            let payment =
                payments::fetch_payment_for_order(order_id, &mut tx).await?.ok_or(LedgerError::PaymentNotFound(order_id))?;
            return Err(LedgerError::IllegalPaymentTransition {
                order_id,
                from: payment.status,
                to: PaymentStatusType::HeldEscrow,
            });
        };
        let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(LedgerError::OrderNotFound(order_id))?;
        let details = ActivityDetails::PaymentInitiated {
            transaction_ref: transaction_ref.to_string(),
            amount: payment.amount,
            phone: phone.to_string(),
        };
        activity::append(NewActivity::for_order(order_id, &order.customer_id, details), now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Capture {transaction_ref} requested for order #{order_id}");
        Ok(PaymentTransition { order, payment, previous_status: PaymentStatusType::Pending, changed: true })
    }

    async fn confirm_capture(&self, order_id: i64, transaction_ref: &str) -> Result<PaymentTransition, LedgerError> {
        use PaymentStatusType::*;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let updated =
            payments::compare_and_set_status(order_id, &[Pending], HeldEscrow, Some(transaction_ref), now, &mut tx)
                .await?;
        let Some(payment) = updated else {
            let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(LedgerError::OrderNotFound(order_id))?;
            let payment =
                payments::fetch_payment_for_order(order_id, &mut tx).await?.ok_or(LedgerError::PaymentNotFound(order_id))?;
            if payment.status == HeldEscrow && payment.transaction_ref.as_deref() == Some(transaction_ref) {
                trace!("🗃️ Capture {transaction_ref} for order #{order_id} was already confirmed");
                return Ok(PaymentTransition { order, payment, previous_status: HeldEscrow, changed: false });
            }
            return Err(LedgerError::IllegalPaymentTransition { order_id, from: payment.status, to: HeldEscrow });
        };
        let order = orders::set_payment_status(order_id, HeldEscrow, now, &mut tx).await?;
        let details = payment_transition(&order, &payment, Pending, None);
        activity::append(NewActivity::for_order(order_id, &order.customer_id, details), now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Payment for order #{order_id} is held in escrow ({transaction_ref})");
        Ok(PaymentTransition { order, payment, previous_status: Pending, changed: true })
    }

    async fn fail_capture(&self, order_id: i64, reason: &str) -> Result<PaymentTransition, LedgerError> {
        use PaymentStatusType::*;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let Some(payment) = payments::compare_and_set_status(order_id, &[Pending], Failed, None, now, &mut tx).await?
        else {
            let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(LedgerError::OrderNotFound(order_id))?;
            let payment =
                payments::fetch_payment_for_order(order_id, &mut tx).await?.ok_or(LedgerError::PaymentNotFound(order_id))?;
            if payment.status == Failed {
                return Ok(PaymentTransition { order, payment, previous_status: Failed, changed: false });
            }
            return Err(LedgerError::IllegalPaymentTransition { order_id, from: payment.status, to: Failed });
        };
        let order = orders::set_payment_status(order_id, Failed, now, &mut tx).await?;
        let details = payment_transition(&order, &payment, Pending, Some(reason.to_string()));
        activity::append(NewActivity::for_order(order_id, &order.customer_id, details), now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Payment capture for order #{order_id} failed: {reason}");
        Ok(PaymentTransition { order, payment, previous_status: Pending, changed: true })
    }

    async fn release_escrow(&self, order_id: i64, driver_id: &str) -> Result<EscrowRelease, LedgerError> {
        use PaymentStatusType::*;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        if let Some(payment) = payments::release_if_eligible(order_id, driver_id, now, &mut tx).await? {
            let order = orders::set_payment_status(order_id, Released, now, &mut tx).await?;
            let total = profiles::increment_total_deliveries(driver_id, now, &mut tx).await?;
            let details = payment_transition(&order, &payment, HeldEscrow, None);
            activity::append(NewActivity::for_order(order_id, driver_id, details), now, &mut tx).await?;
            tx.commit().await?;
            debug!("🗃️ Escrow for order #{order_id} released to {driver_id}. They have made {total} deliveries");
            return Ok(EscrowRelease { order, payment, driver_total_deliveries: total, newly_released: true });
        }
        let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(LedgerError::OrderNotFound(order_id))?;
        if order.status != OrderStatusType::Delivered {
            return Err(LedgerError::OrderNotDelivered(order_id));
        }
        match deliveries::fetch_active_delivery(order_id, &mut tx).await? {
            Some(d) if !d.otp_verified => return Err(LedgerError::OtpNotVerified(order_id)),
            None => return Err(LedgerError::OtpNotVerified(order_id)),
            Some(d) if d.driver_id != driver_id => {
                return Err(LedgerError::NotAssignedDriver { order_id, driver_id: driver_id.to_string() })
            },
            Some(_) => {},
        }
        let payment =
            payments::fetch_payment_for_order(order_id, &mut tx).await?.ok_or(LedgerError::PaymentNotFound(order_id))?;
        if payment.status == Released && payment.driver_id.as_deref() == Some(driver_id) {
            let total = profiles::fetch_profile(driver_id, &mut tx).await?.map(|p| p.total_deliveries).unwrap_or_default();
            trace!("🗃️ Escrow for order #{order_id} was already released to {driver_id}");
            return Ok(EscrowRelease { order, payment, driver_total_deliveries: total, newly_released: false });
        }
        Err(LedgerError::PaymentNotInEscrow { order_id, status: payment.status })
    }

    async fn append_activity(&self, activity: NewActivity) -> Result<ActivityLog, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let entry = activity::append(activity, Utc::now(), &mut conn).await?;
        Ok(entry)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_tracking_id(&self, tracking_id: &TrackingId) -> Result<Option<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_tracking_id(tracking_id, &mut conn).await?;
        Ok(order)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_active_delivery(&self, order_id: i64) -> Result<Option<Delivery>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let delivery = deliveries::fetch_active_delivery(order_id, &mut conn).await?;
        Ok(delivery)
    }

    async fn fetch_delivery(&self, delivery_id: i64) -> Result<Option<Delivery>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let delivery = deliveries::fetch_delivery(delivery_id, &mut conn).await?;
        Ok(delivery)
    }

    async fn fetch_payment_for_order(&self, order_id: i64) -> Result<Option<Payment>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment_for_order(order_id, &mut conn).await?;
        Ok(payment)
    }

    async fn fetch_activity_for_order(&self, order_id: i64) -> Result<Vec<ActivityLog>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let entries = activity::fetch_for_order(order_id, &mut conn).await?;
        Ok(entries)
    }
}

impl ProfileManagement for SqliteDatabase {
    async fn upsert_profile(&self, profile: NewProfile) -> Result<UserProfile, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let profile = profiles::upsert_profile(profile, Utc::now(), &mut conn).await?;
        trace!("🗃️ Profile {} saved", profile.id);
        Ok(profile)
    }

    async fn fetch_profile(&self, user_id: &str) -> Result<Option<UserProfile>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let profile = profiles::fetch_profile(user_id, &mut conn).await?;
        Ok(profile)
    }

    async fn fetch_admin_ids(&self) -> Result<Vec<String>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let ids = profiles::fetch_admin_ids(&mut conn).await?;
        Ok(ids)
    }

    async fn submit_rating(&self, rating: NewRating) -> Result<Rating, LedgerError> {
        let now = Utc::now();
        let order_id = rating.order_id;
        let customer_id = rating.customer_id.clone();
        let mut tx = self.pool.begin().await?;
        let Some(rating) = ratings::insert_rating(rating, now, &mut tx).await? else {
            let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(LedgerError::OrderNotFound(order_id))?;
            if order.customer_id != customer_id {
                return Err(LedgerError::Forbidden(format!("Only the customer may rate order {order_id}")));
            }
            return Err(LedgerError::OrderNotDelivered(order_id));
        };
        if let Some(driver_id) = &rating.driver_id {
            let average = profiles::refresh_driver_rating(driver_id, now, &mut tx).await?;
            trace!("🗃️ Driver {driver_id} rating is now {average:?}");
        }
        if let Some(merchant_id) = &rating.merchant_id {
            let average = profiles::refresh_merchant_rating(merchant_id, now, &mut tx).await?;
            trace!("🗃️ Merchant {merchant_id} rating is now {average:?}");
        }
        let details = ActivityDetails::RatingSubmitted {
            rating_id: rating.id,
            driver_rating: rating.driver_rating,
            merchant_rating: rating.merchant_rating,
        };
        activity::append(NewActivity::for_order(order_id, &customer_id, details), now, &mut tx).await?;
        tx.commit().await?;
        Ok(rating)
    }
}

impl FraudManagement for SqliteDatabase {
    async fn count_orders_since(&self, customer_id: &str, since: DateTime<Utc>) -> Result<i64, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let count = orders::count_orders_since(customer_id, since, &mut conn).await?;
        Ok(count)
    }

    async fn count_cancellations_since(&self, customer_id: &str, since: DateTime<Utc>) -> Result<i64, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let count = orders::count_cancellations_since(customer_id, since, &mut conn).await?;
        Ok(count)
    }

    async fn record_fraud_alerts(
        &self,
        alerts: Vec<NewFraudAlert>,
        context: &str,
    ) -> Result<Vec<FraudAlert>, LedgerError> {
        if alerts.is_empty() {
            return Ok(vec![]);
        }
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut recorded = Vec::with_capacity(alerts.len());
        for alert in alerts {
            match fraud_alerts::insert_if_new(alert, now, &mut tx).await? {
                Some(alert) => recorded.push(alert),
                None => trace!("🗃️ Skipping an alert that is already open"),
            }
        }
        if !recorded.is_empty() {
            let details = ActivityDetails::FraudAlertsRaised {
                context: context.to_string(),
                alert_types: recorded.iter().map(|a| a.alert_type.clone()).collect(),
            };
            let order_id = recorded.iter().find_map(|a| a.order_id);
            let user_id = recorded.iter().find_map(|a| a.user_id.as_deref());
            activity::append(NewActivity::new(order_id, user_id, details), now, &mut tx).await?;
        }
        tx.commit().await?;
        debug!("🗃️ {} fraud alerts recorded ({context})", recorded.len());
        Ok(recorded)
    }

    async fn fetch_fraud_alert(&self, alert_id: i64) -> Result<Option<FraudAlert>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let alert = fraud_alerts::fetch_alert(alert_id, &mut conn).await?;
        Ok(alert)
    }

    async fn search_fraud_alerts(
        &self,
        unresolved_only: bool,
        user_id: Option<&str>,
    ) -> Result<Vec<FraudAlert>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let alerts = fraud_alerts::search_alerts(unresolved_only, user_id, &mut conn).await?;
        Ok(alerts)
    }

    async fn resolve_fraud_alert(&self, alert_id: i64, admin_id: &str) -> Result<FraudAlert, LedgerError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let Some(alert) = fraud_alerts::resolve_alert(alert_id, admin_id, now, &mut tx).await? else {
            return match fraud_alerts::fetch_alert(alert_id, &mut tx).await? {
                Some(_) => Err(LedgerError::AlertAlreadyResolved(alert_id)),
                None => Err(LedgerError::FraudAlertNotFound(alert_id)),
            };
        };
        let details = ActivityDetails::FraudAlertResolved { alert_id, alert_type: alert.alert_type.clone() };
        activity::append(NewActivity::new(alert.order_id, Some(admin_id), details), now, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Fraud alert #{alert_id} resolved by {admin_id}");
        Ok(alert)
    }
}

impl NotificationManagement for SqliteDatabase {
    async fn insert_notifications(&self, notifications: Vec<NewNotification>) -> Result<Vec<Notification>, LedgerError> {
        if notifications.is_empty() {
            return Ok(vec![]);
        }
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut result = Vec::with_capacity(notifications.len());
        for notification in notifications {
            result.push(notifications::insert_notification(notification, now, &mut tx).await?);
        }
        tx.commit().await?;
        trace!("🗃️ {} notifications stored", result.len());
        Ok(result)
    }

    async fn fetch_notifications(&self, user_id: &str, unread_only: bool) -> Result<Vec<Notification>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let result = notifications::fetch_for_user(user_id, unread_only, &mut conn).await?;
        Ok(result)
    }

    async fn mark_notification_read(&self, notification_id: i64, user_id: &str) -> Result<Notification, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        if let Some(n) = notifications::mark_read(notification_id, user_id, Utc::now(), &mut conn).await? {
            return Ok(n);
        }
        match notifications::fetch_notification(notification_id, &mut conn).await? {
            Some(_) => Err(LedgerError::Forbidden(format!("Notification {notification_id} belongs to another user"))),
            None => Err(LedgerError::NotificationNotFound(notification_id)),
        }
    }
}

impl InsuranceManagement for SqliteDatabase {
    async fn insert_policy(&self, policy: NewInsurancePolicy) -> Result<InsurancePolicy, LedgerError> {
        let now = Utc::now();
        let order_id = policy.order_id;
        let buyer = policy.purchased_by.clone();
        let mut tx = self.pool.begin().await?;
        let Some(policy) = insurance::insert_policy(policy, now, &mut tx).await? else {
            let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(LedgerError::OrderNotFound(order_id))?;
            if order.customer_id != buyer {
                return Err(LedgerError::Forbidden(format!("Only the customer may insure order {order_id}")));
            }
            return Err(LedgerError::Validation(format!("Order {order_id} is {} and cannot be insured", order.status)));
        };
        let details = ActivityDetails::InsurancePurchased {
            policy_number: policy.policy_number.clone(),
            provider: policy.provider.clone(),
            coverage_amount: policy.coverage_amount,
            premium_amount: policy.premium_amount,
        };
        activity::append(NewActivity::for_order(order_id, &buyer, details), now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Policy {} issued for order #{order_id}", policy.policy_number);
        Ok(policy)
    }

    async fn fetch_policy(&self, policy_id: i64) -> Result<Option<InsurancePolicy>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let policy = insurance::fetch_policy(policy_id, &mut conn).await?;
        Ok(policy)
    }

    async fn fetch_policies_for_order(&self, order_id: i64) -> Result<Vec<InsurancePolicy>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let policies = insurance::fetch_for_order(order_id, &mut conn).await?;
        Ok(policies)
    }

    async fn update_policy_status(
        &self,
        policy_id: i64,
        actor_id: &str,
        status: InsuranceStatus,
    ) -> Result<InsurancePolicy, LedgerError> {
        if status == InsuranceStatus::Active {
            return Err(LedgerError::Validation("A policy cannot be reactivated".into()));
        }
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let Some(policy) = insurance::compare_and_set_status(policy_id, status, now, &mut tx).await? else {
            let policy =
                insurance::fetch_policy(policy_id, &mut tx).await?.ok_or(LedgerError::PolicyNotFound(policy_id))?;
            return Err(LedgerError::IllegalPolicyTransition { policy_id, from: policy.status, to: status });
        };
        let details = ActivityDetails::InsuranceTransition {
            policy_number: policy.policy_number.clone(),
            from: InsuranceStatus::Active,
            to: status,
        };
        activity::append(NewActivity::for_order(policy.order_id, actor_id, details), now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Policy {} is now {status}", policy.policy_number);
        Ok(policy)
    }

    async fn expire_policies(&self, now: DateTime<Utc>) -> Result<Vec<InsurancePolicy>, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let expired = insurance::expire_due(now, &mut tx).await?;
        for policy in &expired {
            let details = ActivityDetails::InsuranceTransition {
                policy_number: policy.policy_number.clone(),
                from: InsuranceStatus::Active,
                to: InsuranceStatus::Expired,
            };
            activity::append(NewActivity::new(Some(policy.order_id), None, details), now, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(expired)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
