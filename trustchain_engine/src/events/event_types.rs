use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Delivery, FraudAlert, Notification, Order, OrderStatusType, Payment, PaymentStatusType},
    tce_api::fraud_objects::FraudCheckRequest,
};

/// Published after every committed order status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    /// `None` for a newly created order.
    pub previous_status: Option<OrderStatusType>,
}

impl OrderStatusChangedEvent {
    pub fn new(order: Order, previous_status: Option<OrderStatusType>) -> Self {
        Self { order, previous_status }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentStatusChangedEvent {
    pub payment: Payment,
    pub previous_status: PaymentStatusType,
}

impl PaymentStatusChangedEvent {
    pub fn new(payment: Payment, previous_status: PaymentStatusType) -> Self {
        Self { payment, previous_status }
    }
}

/// Published when a delivery is created, picked up, moves, is completed or is voided.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryUpdatedEvent {
    pub delivery: Delivery,
}

impl DeliveryUpdatedEvent {
    pub fn new(delivery: Delivery) -> Self {
        Self { delivery }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudAlertRaisedEvent {
    pub alert: FraudAlert,
}

impl FraudAlertRaisedEvent {
    pub fn new(alert: FraudAlert) -> Self {
        Self { alert }
    }
}

/// Asks a background worker to score a user and/or order after a workflow operation has committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudCheckRequestedEvent {
    pub request: FraudCheckRequest,
}

impl FraudCheckRequestedEvent {
    pub fn new(request: FraudCheckRequest) -> Self {
        Self { request }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationCreatedEvent {
    pub notification: Notification,
}

impl NotificationCreatedEvent {
    pub fn new(notification: Notification) -> Self {
        Self { notification }
    }
}

/// A text message to be handed to the SMS transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsRequestedEvent {
    pub user_id: String,
    pub order_id: Option<i64>,
    /// The recipient's phone number in international form, e.g. `254712345678`.
    pub recipient: String,
    pub message: String,
    pub correlation_id: String,
}
