use chrono::Duration;

use crate::db_types::{AlertDetails, Delivery, Money, NewFraudAlert, Order, UserProfile};

/// Tunables for the six fraud rules. The defaults are the production values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FraudThresholds {
    /// Trailing window for rapid order creation.
    pub rapid_order_window: Duration,
    /// Alert when a customer creates more than this many orders within the window.
    pub max_orders_in_window: i64,
    /// Alert when a rating is below this value...
    pub low_rating: f64,
    /// ...and the user has made more than this many deliveries.
    pub low_rating_min_deliveries: i64,
    pub cancellation_window: Duration,
    pub max_cancellations_in_window: i64,
    /// Orders strictly above this amount are flagged.
    pub high_value_threshold: Money,
    /// Deliveries completed faster than this, measured from assignment, are flagged.
    pub fast_delivery: Duration,
}

impl Default for FraudThresholds {
    fn default() -> Self {
        Self {
            rapid_order_window: Duration::hours(1),
            max_orders_in_window: 5,
            low_rating: 2.0,
            low_rating_min_deliveries: 10,
            cancellation_window: Duration::days(7),
            max_cancellations_in_window: 3,
            high_value_threshold: Money::from_units(50_000),
            fast_delivery: Duration::minutes(5),
        }
    }
}

impl FraudThresholds {
    pub fn with_high_value_threshold(mut self, threshold: Money) -> Self {
        self.high_value_threshold = threshold;
        self
    }
}

/// What the user rules look at. The counts cover the trailing windows in [`FraudThresholds`].
#[derive(Debug, Clone, PartialEq)]
pub struct UserActivity {
    pub user_id: String,
    pub profile: Option<UserProfile>,
    pub recent_orders: i64,
    pub recent_cancellations: i64,
}

fn describe_window(window: Duration) -> String {
    let plural = |n: i64, unit: &str| if n == 1 { format!("1 {unit}") } else { format!("{n} {unit}s") };
    if window.num_days() > 0 && window == Duration::days(window.num_days()) {
        plural(window.num_days(), "day")
    } else if window.num_hours() > 0 && window == Duration::hours(window.num_hours()) {
        plural(window.num_hours(), "hour")
    } else {
        plural(window.num_minutes(), "minute")
    }
}

/// Rules 1 to 3: rapid order creation, chronic low rating and excessive cancellations.
pub fn user_alerts(activity: &UserActivity, thresholds: &FraudThresholds, action: &str) -> Vec<NewFraudAlert> {
    let user_id = Some(activity.user_id.as_str());
    let mut alerts = Vec::new();
    if activity.recent_orders > thresholds.max_orders_in_window {
        let details = AlertDetails::RapidOrderCreation {
            order_count: activity.recent_orders,
            timeframe: describe_window(thresholds.rapid_order_window),
            action: action.to_string(),
        };
        alerts.push(NewFraudAlert::new(user_id, None, details));
    }
    if let Some(profile) = &activity.profile {
        if profile.rating < thresholds.low_rating && profile.total_deliveries > thresholds.low_rating_min_deliveries {
            let details = AlertDetails::LowRating {
                rating: profile.rating,
                total_deliveries: profile.total_deliveries,
                action: action.to_string(),
            };
            alerts.push(NewFraudAlert::new(user_id, None, details));
        }
    }
    if activity.recent_cancellations > thresholds.max_cancellations_in_window {
        let details = AlertDetails::ExcessiveCancellations {
            cancelled_count: activity.recent_cancellations,
            timeframe: describe_window(thresholds.cancellation_window),
            action: action.to_string(),
        };
        alerts.push(NewFraudAlert::new(user_id, None, details));
    }
    alerts
}

/// Rules 4 to 6: high value, suspiciously fast delivery, and a verified code without a delivery time.
///
/// The high-value alert is raised against the customer; the delivery alerts against the driver.
pub fn order_alerts(
    order: &Order,
    delivery: Option<&Delivery>,
    thresholds: &FraudThresholds,
    action: &str,
) -> Vec<NewFraudAlert> {
    let mut alerts = Vec::new();
    if order.amount > thresholds.high_value_threshold {
        let details = AlertDetails::HighValueTransaction {
            amount: order.amount,
            tracking_id: order.tracking_id.clone(),
            action: action.to_string(),
        };
        alerts.push(NewFraudAlert::new(Some(&order.customer_id), Some(order.id), details));
    }
    let Some(delivery) = delivery else {
        return alerts;
    };
    let driver_id = Some(delivery.driver_id.as_str());
    if let Some(elapsed) = delivery.delivery_time() {
        if elapsed < thresholds.fast_delivery {
            #[allow(clippy::cast_possible_truncation)]
            let minutes = (elapsed.num_milliseconds() as f64 / 60_000.0).round() as i64;
            let details = AlertDetails::SuspiciouslyFastDelivery {
                delivery_time_minutes: minutes,
                tracking_id: order.tracking_id.clone(),
                action: action.to_string(),
            };
            alerts.push(NewFraudAlert::new(driver_id, Some(order.id), details));
        }
    }
    if delivery.otp_verified && delivery.delivered_at.is_none() {
        let details = AlertDetails::OtpVerifiedWithoutDelivery {
            delivery_id: delivery.id,
            tracking_id: order.tracking_id.clone(),
            action: action.to_string(),
        };
        alerts.push(NewFraudAlert::new(driver_id, Some(order.id), details));
    }
    alerts
}

#[cfg(test)]
mod test {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::db_types::{OrderStatusType, PaymentMethod, PaymentStatusType, Role, Severity};

    fn order(amount: Money) -> Order {
        let t = Utc.with_ymd_and_hms(2024, 6, 11, 9, 0, 0).unwrap();
        Order {
            id: 42,
            customer_id: "alice".into(),
            merchant_id: None,
            tracking_id: "TC-20240611-AAAAAA".into(),
            delivery_otp: "1234".into(),
            pickup_address: "Westlands".into(),
            delivery_address: "Kilimani".into(),
            pickup_lat: None,
            pickup_lng: None,
            delivery_lat: None,
            delivery_lng: None,
            status: OrderStatusType::Delivered,
            payment_method: PaymentMethod::Prepay,
            payment_status: PaymentStatusType::HeldEscrow,
            amount,
            notes: None,
            created_at: t,
            updated_at: t,
        }
    }

    fn delivery(minutes_to_deliver: Option<i64>, otp_verified: bool) -> Delivery {
        let assigned = Utc.with_ymd_and_hms(2024, 6, 11, 9, 30, 0).unwrap();
        Delivery {
            id: 7,
            order_id: 42,
            driver_id: "bob".into(),
            assigned_at: assigned,
            picked_up_at: Some(assigned),
            delivered_at: minutes_to_deliver.map(|m| assigned + Duration::minutes(m)),
            current_lat: None,
            current_lng: None,
            last_location_update: None,
            otp_verified,
            otp_failed_attempts: 0,
            voided: false,
            voided_at: None,
            created_at: assigned,
            updated_at: assigned,
        }
    }

    fn profile(rating: f64, total_deliveries: i64) -> UserProfile {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        UserProfile {
            id: "bob".into(),
            role: Role::Driver,
            full_name: "Bob".into(),
            phone: None,
            verified: true,
            rating,
            total_deliveries,
            created_at: t,
            updated_at: t,
        }
    }

    #[test]
    fn high_value_is_strictly_above_threshold() {
        let t = FraudThresholds::default();
        let alerts = order_alerts(&order(Money::from_units(60_000)), None, &t, "manual");
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type(), "high_value_transaction");
        assert_eq!(alerts[0].severity(), Severity::Medium);
        assert_eq!(alerts[0].user_id.as_deref(), Some("alice"));
        assert!(order_alerts(&order(Money::from_units(50_000)), None, &t, "manual").is_empty());
    }

    #[test]
    fn fast_delivery() {
        let t = FraudThresholds::default();
        let o = order(Money::from_units(100));
        let alerts = order_alerts(&o, Some(&delivery(Some(4), true)), &t, "delivery_completed");
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity(), Severity::High);
        assert_eq!(alerts[0].user_id.as_deref(), Some("bob"));
        match &alerts[0].details {
            AlertDetails::SuspiciouslyFastDelivery { delivery_time_minutes, .. } => assert_eq!(*delivery_time_minutes, 4),
            other => panic!("Unexpected alert {other:?}"),
        }
        assert!(order_alerts(&o, Some(&delivery(Some(10), true)), &t, "x").is_empty());
        assert!(order_alerts(&o, Some(&delivery(Some(5), true)), &t, "x").is_empty());
        assert!(order_alerts(&o, Some(&delivery(None, false)), &t, "x").is_empty());
    }

    #[test]
    fn otp_without_delivery_time_is_critical() {
        let t = FraudThresholds::default();
        let alerts = order_alerts(&order(Money::from_units(100)), Some(&delivery(None, true)), &t, "x");
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type(), "otp_verified_without_delivery");
        assert_eq!(alerts[0].severity(), Severity::Critical);
    }

    #[test]
    fn user_rules() {
        let t = FraudThresholds::default();
        let mut activity =
            UserActivity { user_id: "bob".into(), profile: None, recent_orders: 5, recent_cancellations: 3 };
        assert!(user_alerts(&activity, &t, "x").is_empty());

        activity.recent_orders = 6;
        activity.recent_cancellations = 4;
        activity.profile = Some(profile(1.5, 11));
        let alerts = user_alerts(&activity, &t, "order_created");
        let types = alerts.iter().map(|a| a.alert_type()).collect::<Vec<_>>();
        assert_eq!(types, vec!["rapid_order_creation", "low_rating", "excessive_cancellations"]);
        match &alerts[0].details {
            AlertDetails::RapidOrderCreation { order_count, timeframe, action } => {
                assert_eq!(*order_count, 6);
                assert_eq!(timeframe, "1 hour");
                assert_eq!(action, "order_created");
            },
            other => panic!("Unexpected alert {other:?}"),
        }
        match &alerts[2].details {
            AlertDetails::ExcessiveCancellations { timeframe, .. } => assert_eq!(timeframe, "7 days"),
            other => panic!("Unexpected alert {other:?}"),
        }

        activity.profile = Some(profile(1.5, 10));
        assert_eq!(user_alerts(&activity, &t, "x").len(), 2);
    }

    #[test]
    fn windows_read_naturally() {
        assert_eq!(describe_window(Duration::hours(1)), "1 hour");
        assert_eq!(describe_window(Duration::hours(36)), "36 hours");
        assert_eq!(describe_window(Duration::days(7)), "7 days");
        assert_eq!(describe_window(Duration::minutes(90)), "90 minutes");
    }
}
