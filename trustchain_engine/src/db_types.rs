//! Row types and enums shared by the storage backends and the public API.
//!
//! Every status column is stored as snake_case text, every money column as an integer number of cents (see [`Money`]),
//! and every timestamp as an RFC 3339 string written by the engine itself.
use std::{fmt, fmt::Display, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, Type};
pub use tc_common::Money;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid {kind}: {value}")]
pub struct ConversionError {
    kind: &'static str,
    value: String,
}

impl ConversionError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

// Display and FromStr must agree with the `rename_all = "snake_case"` encoding used for the database.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(ConversionError::new(stringify!($name), other)),
                }
            }
        }
    };
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// Created and waiting for a driver.
    Pending,
    /// A driver has accepted the order and a delivery record exists.
    Assigned,
    /// The driver has collected the goods.
    InTransit,
    /// The customer's OTP has been verified. Terminal.
    Delivered,
    /// Cancelled before pickup. Terminal.
    Cancelled,
}

text_enum!(OrderStatusType {
    Pending => "pending",
    Assigned => "assigned",
    InTransit => "in_transit",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl OrderStatusType {
    /// The order state machine. Anything not listed here is an invalid transition.
    pub fn can_transition_to(&self, next: OrderStatusType) -> bool {
        use OrderStatusType::*;
        matches!(
            (self, next),
            (Pending, Assigned) | (Assigned, InTransit) | (InTransit, Delivered) | (Pending, Cancelled) |
                (Assigned, Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// The statuses from which an order may still be cancelled
    pub fn cancellable() -> &'static [OrderStatusType] {
        &[Self::Pending, Self::Assigned]
    }
}

//--------------------------------------   PaymentStatusType   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatusType {
    Pending,
    HeldEscrow,
    Released,
    Refunded,
    Failed,
}

text_enum!(PaymentStatusType {
    Pending => "pending",
    HeldEscrow => "held_escrow",
    Released => "released",
    Refunded => "refunded",
    Failed => "failed",
});

impl PaymentStatusType {
    pub fn can_transition_to(&self, next: PaymentStatusType) -> bool {
        use PaymentStatusType::*;
        matches!((self, next), (Pending, HeldEscrow) | (Pending, Failed) | (HeldEscrow, Released) | (HeldEscrow, Refunded))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Released | Self::Refunded | Self::Failed)
    }
}

//--------------------------------------     PaymentMethod     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Prepay,
    Postpay,
    Cheque,
}

text_enum!(PaymentMethod {
    Prepay => "prepay",
    Postpay => "postpay",
    Cheque => "cheque",
});

//--------------------------------------          Role         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Customer,
    Driver,
    Merchant,
    Admin,
}

text_enum!(Role {
    Customer => "customer",
    Driver => "driver",
    Merchant => "merchant",
    Admin => "admin",
});

//--------------------------------------       Severity        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

text_enum!(Severity {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

impl Severity {
    /// Alerts at or above `High` are pushed to every administrator.
    pub fn notifies_admins(&self) -> bool {
        *self >= Severity::High
    }
}

//--------------------------------------   NotificationType    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Order,
    Delivery,
    Payment,
    FraudAlert,
    System,
}

text_enum!(NotificationType {
    Order => "order",
    Delivery => "delivery",
    Payment => "payment",
    FraudAlert => "fraud_alert",
    System => "system",
});

//--------------------------------------    InsuranceStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InsuranceStatus {
    Active,
    Claimed,
    Expired,
    Cancelled,
}

text_enum!(InsuranceStatus {
    Active => "active",
    Claimed => "claimed",
    Expired => "expired",
    Cancelled => "cancelled",
});

impl InsuranceStatus {
    pub fn can_transition_to(&self, next: InsuranceStatus) -> bool {
        matches!(self, Self::Active) && !matches!(next, Self::Active)
    }
}

//--------------------------------------      TrackingId       ---------------------------------------------------------
/// The human-readable order reference printed on labels and quoted to customers, e.g. `TC-20240611-7QX2KD`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct TrackingId(pub String);

impl TrackingId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TrackingId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TrackingId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for TrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//--------------------------------------       GeoPoint        ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite() && (-90.0..=90.0).contains(&self.lat) &&
            (-180.0..=180.0).contains(&self.lng)
    }

    fn from_columns(lat: Option<f64>, lng: Option<f64>) -> Option<Self> {
        lat.zip(lng).map(|(lat, lng)| Self { lat, lng })
    }
}

//--------------------------------------         Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub customer_id: String,
    pub merchant_id: Option<String>,
    pub tracking_id: TrackingId,
    /// Only ever shown to the customer. Never serialized; use [`Order::delivery_otp`] explicitly where required.
    #[serde(skip_serializing, default)]
    pub delivery_otp: String,
    pub pickup_address: String,
    pub delivery_address: String,
    pub pickup_lat: Option<f64>,
    pub pickup_lng: Option<f64>,
    pub delivery_lat: Option<f64>,
    pub delivery_lng: Option<f64>,
    pub status: OrderStatusType,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatusType,
    pub amount: Money,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn delivery_otp(&self) -> &str {
        &self.delivery_otp
    }

    pub fn pickup_location(&self) -> Option<GeoPoint> {
        GeoPoint::from_columns(self.pickup_lat, self.pickup_lng)
    }

    pub fn delivery_location(&self) -> Option<GeoPoint> {
        GeoPoint::from_columns(self.delivery_lat, self.delivery_lng)
    }

    /// Whether `user_id` is one of the parties the order belongs to (customer or merchant).
    pub fn is_party(&self, user_id: &str) -> bool {
        self.customer_id == user_id || self.merchant_id.as_deref() == Some(user_id)
    }
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer_id: String,
    #[serde(default)]
    pub merchant_id: Option<String>,
    pub pickup_address: String,
    pub delivery_address: String,
    #[serde(default)]
    pub pickup_location: Option<GeoPoint>,
    #[serde(default)]
    pub delivery_location: Option<GeoPoint>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub amount: Money,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewOrder {
    pub fn new<S: Into<String>>(customer_id: S, pickup_address: S, delivery_address: S, amount: Money) -> Self {
        Self {
            customer_id: customer_id.into(),
            merchant_id: None,
            pickup_address: pickup_address.into(),
            delivery_address: delivery_address.into(),
            pickup_location: None,
            delivery_location: None,
            payment_method: PaymentMethod::default(),
            amount,
            notes: None,
        }
    }

    pub fn with_merchant<S: Into<String>>(mut self, merchant_id: S) -> Self {
        self.merchant_id = Some(merchant_id.into());
        self
    }

    pub fn with_locations(mut self, pickup: GeoPoint, delivery: GeoPoint) -> Self {
        self.pickup_location = Some(pickup);
        self.delivery_location = Some(delivery);
        self
    }

    pub fn with_payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = method;
        self
    }

    pub fn with_notes<S: Into<String>>(mut self, notes: S) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Checks the order for missing or malformed fields. Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.customer_id.trim().is_empty() {
            return Err("customer_id is required".into());
        }
        if self.pickup_address.trim().is_empty() {
            return Err("pickup_address is required".into());
        }
        if self.delivery_address.trim().is_empty() {
            return Err("delivery_address is required".into());
        }
        if !self.amount.is_positive() {
            return Err(format!("amount must be greater than zero, got {}", self.amount));
        }
        let bad_point = [self.pickup_location, self.delivery_location].into_iter().flatten().find(|p| !p.is_valid());
        if let Some(p) = bad_point {
            return Err(format!("invalid coordinates ({}, {})", p.lat, p.lng));
        }
        Ok(())
    }
}

//--------------------------------------       Delivery        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Delivery {
    pub id: i64,
    pub order_id: i64,
    pub driver_id: String,
    pub assigned_at: DateTime<Utc>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub current_lat: Option<f64>,
    pub current_lng: Option<f64>,
    pub last_location_update: Option<DateTime<Utc>>,
    pub otp_verified: bool,
    pub otp_failed_attempts: i64,
    /// Set when the owning order is cancelled after assignment. Voided deliveries are kept for the audit trail.
    pub voided: bool,
    pub voided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Delivery {
    pub fn current_location(&self) -> Option<GeoPoint> {
        GeoPoint::from_columns(self.current_lat, self.current_lng)
    }

    /// Time from assignment to handoff, if the delivery has been completed.
    pub fn delivery_time(&self) -> Option<Duration> {
        self.delivered_at.map(|t| t - self.assigned_at)
    }
}

/// A position report from a driver's device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdate {
    pub delivery_id: i64,
    pub position: GeoPoint,
    /// When the device took the reading. Readings older than the last stored one are dropped.
    pub recorded_at: DateTime<Utc>,
}

//--------------------------------------        Payment        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub order_id: i64,
    pub customer_id: String,
    pub driver_id: Option<String>,
    pub merchant_id: Option<String>,
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub transaction_ref: Option<String>,
    pub status: PaymentStatusType,
    pub released_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      UserProfile      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub role: Role,
    pub full_name: String,
    pub phone: Option<String>,
    pub verified: bool,
    pub rating: f64,
    pub total_deliveries: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProfile {
    pub id: String,
    pub role: Role,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub verified: bool,
}

impl NewProfile {
    pub fn new<S: Into<String>>(id: S, role: Role, full_name: S) -> Self {
        Self { id: id.into(), role, full_name: full_name.into(), phone: None, verified: false }
    }

    pub fn with_phone<S: Into<String>>(mut self, phone: S) -> Self {
        self.phone = Some(phone.into());
        self
    }
}

//--------------------------------------     ActivityLog       ---------------------------------------------------------
/// The closed set of audit entries the engine writes, plus a free-form fallback for integrations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ActivityDetails {
    OrderTransition {
        tracking_id: TrackingId,
        from: Option<OrderStatusType>,
        to: OrderStatusType,
        amount: Money,
        driver_id: Option<String>,
        payment_status: Option<PaymentStatusType>,
        reason: Option<String>,
    },
    PaymentTransition {
        tracking_id: TrackingId,
        from: PaymentStatusType,
        to: PaymentStatusType,
        amount: Money,
        transaction_ref: Option<String>,
        reason: Option<String>,
    },
    PaymentInitiated {
        transaction_ref: String,
        amount: Money,
        phone: String,
    },
    LocationUpdated {
        delivery_id: i64,
        position: GeoPoint,
        recorded_at: DateTime<Utc>,
    },
    OtpRejected {
        delivery_id: i64,
        failed_attempts: i64,
    },
    OtpLockoutReset {
        delivery_id: i64,
    },
    FraudAlertsRaised {
        context: String,
        alert_types: Vec<String>,
    },
    FraudAlertResolved {
        alert_id: i64,
        alert_type: String,
    },
    RatingSubmitted {
        rating_id: i64,
        driver_rating: Option<i64>,
        merchant_rating: Option<i64>,
    },
    InsurancePurchased {
        policy_number: String,
        provider: String,
        coverage_amount: Money,
        premium_amount: Money,
    },
    InsuranceTransition {
        policy_number: String,
        from: InsuranceStatus,
        to: InsuranceStatus,
    },
    SmsSent {
        phone: String,
        message_id: String,
    },
    Other {
        action: String,
        payload: serde_json::Value,
    },
}

impl ActivityDetails {
    /// The tag stored in the `action` column.
    pub fn action(&self) -> String {
        match self {
            Self::OrderTransition { to, .. } => format!("order_{to}"),
            Self::PaymentTransition { to, .. } => format!("payment_{to}"),
            Self::PaymentInitiated { .. } => "payment_initiated".into(),
            Self::LocationUpdated { .. } => "location_updated".into(),
            Self::OtpRejected { .. } => "otp_rejected".into(),
            Self::OtpLockoutReset { .. } => "otp_lockout_reset".into(),
            Self::FraudAlertsRaised { .. } => "fraud_alerts_raised".into(),
            Self::FraudAlertResolved { .. } => "fraud_alert_resolved".into(),
            Self::RatingSubmitted { .. } => "rating_submitted".into(),
            Self::InsurancePurchased { .. } => "insurance_purchased".into(),
            Self::InsuranceTransition { to, .. } => format!("insurance_{to}"),
            Self::SmsSent { .. } => "sms_sent".into(),
            Self::Other { action, .. } => action.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActivity {
    pub order_id: Option<i64>,
    pub user_id: Option<String>,
    pub details: ActivityDetails,
}

impl NewActivity {
    pub fn new(order_id: Option<i64>, user_id: Option<&str>, details: ActivityDetails) -> Self {
        Self { order_id, user_id: user_id.map(String::from), details }
    }

    pub fn for_order(order_id: i64, user_id: &str, details: ActivityDetails) -> Self {
        Self::new(Some(order_id), Some(user_id), details)
    }
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ActivityLog {
    pub id: i64,
    pub order_id: Option<i64>,
    pub user_id: Option<String>,
    pub action: String,
    pub details: Json<ActivityDetails>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------      FraudAlert       ---------------------------------------------------------
/// Alert payloads, one variant per fraud rule. `action` is the context tag the check was invoked with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "alert_type", content = "details", rename_all = "snake_case")]
pub enum AlertDetails {
    RapidOrderCreation { order_count: i64, timeframe: String, action: String },
    LowRating { rating: f64, total_deliveries: i64, action: String },
    ExcessiveCancellations { cancelled_count: i64, timeframe: String, action: String },
    HighValueTransaction { amount: Money, tracking_id: TrackingId, action: String },
    SuspiciouslyFastDelivery { delivery_time_minutes: i64, tracking_id: TrackingId, action: String },
    OtpVerifiedWithoutDelivery { delivery_id: i64, tracking_id: TrackingId, action: String },
    Other { alert_type: String, severity: Severity, payload: serde_json::Value },
}

impl AlertDetails {
    pub fn alert_type(&self) -> &str {
        match self {
            Self::RapidOrderCreation { .. } => "rapid_order_creation",
            Self::LowRating { .. } => "low_rating",
            Self::ExcessiveCancellations { .. } => "excessive_cancellations",
            Self::HighValueTransaction { .. } => "high_value_transaction",
            Self::SuspiciouslyFastDelivery { .. } => "suspiciously_fast_delivery",
            Self::OtpVerifiedWithoutDelivery { .. } => "otp_verified_without_delivery",
            Self::Other { alert_type, .. } => alert_type.as_str(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::RapidOrderCreation { .. } => Severity::High,
            Self::LowRating { .. } => Severity::Medium,
            Self::ExcessiveCancellations { .. } => Severity::High,
            Self::HighValueTransaction { .. } => Severity::Medium,
            Self::SuspiciouslyFastDelivery { .. } => Severity::High,
            Self::OtpVerifiedWithoutDelivery { .. } => Severity::Critical,
            Self::Other { severity, .. } => *severity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFraudAlert {
    pub user_id: Option<String>,
    pub order_id: Option<i64>,
    pub details: AlertDetails,
}

impl NewFraudAlert {
    pub fn new(user_id: Option<&str>, order_id: Option<i64>, details: AlertDetails) -> Self {
        Self { user_id: user_id.map(String::from), order_id, details }
    }

    pub fn alert_type(&self) -> &str {
        self.details.alert_type()
    }

    pub fn severity(&self) -> Severity {
        self.details.severity()
    }
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct FraudAlert {
    pub id: i64,
    pub user_id: Option<String>,
    pub order_id: Option<i64>,
    pub alert_type: String,
    pub severity: Severity,
    pub details: Json<AlertDetails>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------     Notification      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum NotificationData {
    Order { order_id: i64, tracking_id: TrackingId },
    Payment { order_id: i64, tracking_id: TrackingId, amount: Money },
    FraudAlert(AlertDetails),
    Other(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: String,
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub data: NotificationData,
}

impl NewNotification {
    pub fn new<S: Into<String>>(user_id: &str, kind: NotificationType, title: S, message: S, data: NotificationData) -> Self {
        Self { user_id: user_id.to_string(), kind, title: title.into(), message: message.into(), data }
    }
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: String,
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub data: Json<NotificationData>,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------        Rating         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRating {
    pub order_id: i64,
    pub customer_id: String,
    #[serde(default)]
    pub driver_rating: Option<i64>,
    #[serde(default)]
    pub merchant_rating: Option<i64>,
    #[serde(default)]
    pub driver_review: Option<String>,
    #[serde(default)]
    pub merchant_review: Option<String>,
}

impl NewRating {
    pub fn validate(&self) -> Result<(), String> {
        if self.driver_rating.is_none() && self.merchant_rating.is_none() {
            return Err("at least one of driver_rating or merchant_rating is required".into());
        }
        for score in [self.driver_rating, self.merchant_rating].into_iter().flatten() {
            if !(1..=5).contains(&score) {
                return Err(format!("ratings must be between 1 and 5, got {score}"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Rating {
    pub id: i64,
    pub order_id: i64,
    pub customer_id: String,
    pub driver_id: Option<String>,
    pub merchant_id: Option<String>,
    pub driver_rating: Option<i64>,
    pub merchant_rating: Option<i64>,
    pub driver_review: Option<String>,
    pub merchant_review: Option<String>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------    InsurancePolicy    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInsurancePolicy {
    pub order_id: i64,
    pub purchased_by: String,
    pub provider: String,
    pub policy_number: String,
    pub coverage_amount: Money,
    pub premium_amount: Money,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct InsurancePolicy {
    pub id: i64,
    pub order_id: i64,
    pub purchased_by: String,
    pub provider: String,
    pub policy_number: String,
    pub coverage_amount: Money,
    pub premium_amount: Money,
    pub status: InsuranceStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
