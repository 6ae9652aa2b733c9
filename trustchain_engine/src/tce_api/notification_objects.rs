//! Notification wording for every workflow event.
//!
//! Each builder returns one [`NewNotification`] per recipient. Parties that do not exist on the order (e.g. orders
//! without a merchant) are skipped.
use crate::{
    db_types::{
        FraudAlert,
        NewNotification,
        NotificationData,
        NotificationType,
        Order,
        Payment,
    },
    traits::CancelledOrder,
};

fn order_data(order: &Order) -> NotificationData {
    NotificationData::Order { order_id: order.id, tracking_id: order.tracking_id.clone() }
}

fn payment_data(order: &Order, payment: &Payment) -> NotificationData {
    NotificationData::Payment { order_id: order.id, tracking_id: order.tracking_id.clone(), amount: payment.amount }
}

fn merchant_notice(order: &Order, kind: NotificationType, title: &str, message: String) -> Option<NewNotification> {
    order.merchant_id.as_deref().map(|m| NewNotification::new(m, kind, title.to_string(), message, order_data(order)))
}

pub fn order_created(order: &Order) -> Vec<NewNotification> {
    let t = &order.tracking_id;
    let mut result = vec![NewNotification::new(
        &order.customer_id,
        NotificationType::Order,
        "Order Created".to_string(),
        format!("Your order {t} has been created and is waiting for a driver"),
        order_data(order),
    )];
    result.extend(merchant_notice(order, NotificationType::Order, "New Order", format!("Order {t} has been placed")));
    result
}

pub fn order_accepted(order: &Order) -> Vec<NewNotification> {
    let message = format!("A driver has accepted order {}", order.tracking_id);
    let mut result = vec![NewNotification::new(
        &order.customer_id,
        NotificationType::Delivery,
        "Driver Assigned".to_string(),
        message.clone(),
        order_data(order),
    )];
    result.extend(merchant_notice(order, NotificationType::Delivery, "Driver Assigned", message));
    result
}

pub fn order_in_transit(order: &Order) -> Vec<NewNotification> {
    let message = format!("Order {} has been picked up and is on its way", order.tracking_id);
    let mut result = vec![NewNotification::new(
        &order.customer_id,
        NotificationType::Delivery,
        "Order In Transit".to_string(),
        message.clone(),
        order_data(order),
    )];
    result.extend(merchant_notice(order, NotificationType::Delivery, "Order In Transit", message));
    result
}

pub fn order_delivered(order: &Order, driver_id: &str) -> Vec<NewNotification> {
    let t = &order.tracking_id;
    let message = format!("Order {t} has been delivered");
    let mut result = vec![
        NewNotification::new(
            &order.customer_id,
            NotificationType::Delivery,
            "Order Delivered".to_string(),
            message.clone(),
            order_data(order),
        ),
        NewNotification::new(
            driver_id,
            NotificationType::Delivery,
            "Delivery Confirmed".to_string(),
            format!("Delivery of order {t} has been confirmed"),
            order_data(order),
        ),
    ];
    result.extend(merchant_notice(order, NotificationType::Delivery, "Order Delivered", message));
    result
}

pub fn order_cancelled(cancelled: &CancelledOrder) -> Vec<NewNotification> {
    let order = &cancelled.order;
    let t = &order.tracking_id;
    let message = format!("Order {t} has been cancelled");
    let mut result = vec![NewNotification::new(
        &order.customer_id,
        NotificationType::Order,
        "Order Cancelled".to_string(),
        message.clone(),
        order_data(order),
    )];
    result.extend(merchant_notice(order, NotificationType::Order, "Order Cancelled", message.clone()));
    if let Some(delivery) = &cancelled.voided_delivery {
        result.push(NewNotification::new(
            &delivery.driver_id,
            NotificationType::Delivery,
            "Order Cancelled".to_string(),
            message,
            order_data(order),
        ));
    }
    if cancelled.refunded() {
        result.push(NewNotification::new(
            &order.customer_id,
            NotificationType::Payment,
            "Payment Refunded".to_string(),
            format!("Payment of {} for order {t} has been refunded", cancelled.payment.amount.with_currency()),
            payment_data(order, &cancelled.payment),
        ));
    }
    result
}

pub fn payment_held(order: &Order, payment: &Payment) -> Vec<NewNotification> {
    let message = format!(
        "Payment of {} for order {} is held in escrow until delivery",
        payment.amount.with_currency(),
        order.tracking_id
    );
    let mut result = vec![NewNotification::new(
        &order.customer_id,
        NotificationType::Payment,
        "Payment Secured".to_string(),
        message.clone(),
        payment_data(order, payment),
    )];
    if let Some(merchant_id) = &order.merchant_id {
        result.push(NewNotification::new(
            merchant_id,
            NotificationType::Payment,
            "Payment Secured".to_string(),
            message,
            payment_data(order, payment),
        ));
    }
    result
}

pub fn payment_failed(order: &Order, payment: &Payment) -> Vec<NewNotification> {
    vec![NewNotification::new(
        &order.customer_id,
        NotificationType::Payment,
        "Payment Failed".to_string(),
        format!("Payment for order {} could not be completed", order.tracking_id),
        payment_data(order, payment),
    )]
}

pub fn payment_released(order: &Order, payment: &Payment, driver_id: &str) -> Vec<NewNotification> {
    let amount = payment.amount.with_currency();
    let t = &order.tracking_id;
    let mut result = vec![
        NewNotification::new(
            &order.customer_id,
            NotificationType::Payment,
            "Payment Released".to_string(),
            format!("Payment of {amount} has been released for order {t}"),
            payment_data(order, payment),
        ),
        NewNotification::new(
            driver_id,
            NotificationType::Payment,
            "Payment Received".to_string(),
            format!("You received {amount} for delivering order {t}"),
            payment_data(order, payment),
        ),
    ];
    result.extend(merchant_notice(
        order,
        NotificationType::Order,
        "Order Completed",
        format!("Order {t} has been successfully delivered and payment released"),
    ));
    result
}

/// One notification per administrator, e.g. "HIGH Fraud Alert" / "RAPID ORDER CREATION detected".
pub fn fraud_alert(admin_ids: &[String], alert: &FraudAlert) -> Vec<NewNotification> {
    let title = format!("{} Fraud Alert", alert.severity.as_str().to_uppercase());
    let message = format!("{} detected", alert.alert_type.replace('_', " ").to_uppercase());
    admin_ids
        .iter()
        .map(|admin| {
            NewNotification::new(
                admin,
                NotificationType::FraudAlert,
                title.clone(),
                message.clone(),
                NotificationData::FraudAlert(alert.details.0.clone()),
            )
        })
        .collect()
}

/// The text message that gives the customer their delivery code.
pub fn delivery_code_sms(order: &Order) -> String {
    format!(
        "TrustChain: your delivery code for order {} is {}. Only share it with the driver when you receive your package.",
        order.tracking_id,
        order.delivery_otp()
    )
}
