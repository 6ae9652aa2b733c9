//! Request and response bodies that only exist at the HTTP boundary. Engine types that are already fit for the wire
//! (e.g. [`trustchain_engine::fraud_objects::FraudCheckRequest`]) are used directly.
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tc_common::Money;
use trustchain_engine::{
    db_types::{
        GeoPoint,
        LocationUpdate,
        NewOrder,
        NewProfile,
        NewRating,
        Order,
        OrderStatusType,
        Payment,
        PaymentMethod,
        Role,
    },
    order_objects::OrderQueryFilter,
};

use crate::{errors::ServerError, identity::Identity};

/// The customer is taken from the caller's identity, never from the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
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
    /// In cents.
    pub amount: Money,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CreateOrderRequest {
    pub fn into_new_order(self, customer_id: &str) -> NewOrder {
        NewOrder {
            customer_id: customer_id.to_string(),
            merchant_id: self.merchant_id,
            pickup_address: self.pickup_address,
            delivery_address: self.delivery_address,
            pickup_location: self.pickup_location,
            delivery_location: self.delivery_location,
            payment_method: self.payment_method,
            amount: self.amount,
            notes: self.notes,
        }
    }
}

/// The delivery code is only ever returned here, to the customer who placed the order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderResponse {
    pub order: Order,
    pub payment: Payment,
    pub delivery_otp: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelOrderRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteDeliveryRequest {
    pub otp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationUpdateRequest {
    pub lat: f64,
    pub lng: f64,
    /// When the device took the reading. Defaults to the time the request is received.
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl LocationUpdateRequest {
    pub fn into_update(self, delivery_id: i64) -> LocationUpdate {
        LocationUpdate {
            delivery_id,
            position: GeoPoint::new(self.lat, self.lng),
            recorded_at: self.recorded_at.unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitiatePaymentRequest {
    /// The number to charge. Defaults to the phone number on the customer's profile.
    #[serde(default)]
    pub phone: Option<String>,
}

/// The gateway's result callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub order_id: i64,
    pub transaction_ref: String,
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvailableOrdersParams {
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Query string for order searches. `status` is a comma-separated list, e.g. `status=pending,assigned`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderSearchParams {
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub merchant_id: Option<String>,
    #[serde(default)]
    pub driver_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl OrderSearchParams {
    /// Builds the engine filter. Callers other than administrators only ever search their own orders, whatever the
    /// query string says.
    pub fn into_filter(self, identity: &Identity) -> Result<OrderQueryFilter, ServerError> {
        let mut filter = OrderQueryFilter {
            customer_id: self.customer_id,
            merchant_id: self.merchant_id,
            driver_id: self.driver_id,
            since: self.since,
            until: self.until,
            limit: self.limit,
            ..Default::default()
        };
        for status in self.status.iter().flat_map(|s| s.split(',')).map(str::trim).filter(|s| !s.is_empty()) {
            let status = OrderStatusType::from_str(status).map_err(|e| ServerError::InvalidRequestBody(e.to_string()))?;
            filter = filter.with_status(status);
        }
        match identity.role {
            Role::Admin => {},
            Role::Customer => filter.customer_id = Some(identity.user_id.clone()),
            Role::Merchant => filter.merchant_id = Some(identity.user_id.clone()),
            Role::Driver => filter.driver_id = Some(identity.user_id.clone()),
        }
        Ok(filter)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationParams {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileUpdateRequest {
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl ProfileUpdateRequest {
    pub fn into_new_profile(self, user_id: &str, role: Role, verified: bool) -> NewProfile {
        NewProfile { id: user_id.to_string(), role, full_name: self.full_name, phone: self.phone, verified }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatingRequest {
    #[serde(default)]
    pub driver_rating: Option<i64>,
    #[serde(default)]
    pub merchant_rating: Option<i64>,
    #[serde(default)]
    pub driver_review: Option<String>,
    #[serde(default)]
    pub merchant_review: Option<String>,
}

impl RatingRequest {
    pub fn into_new_rating(self, order_id: i64, customer_id: &str) -> NewRating {
        NewRating {
            order_id,
            customer_id: customer_id.to_string(),
            driver_rating: self.driver_rating,
            merchant_rating: self.merchant_rating,
            driver_review: self.driver_review,
            merchant_review: self.merchant_review,
        }
    }
}
