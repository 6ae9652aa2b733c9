use support::*;
use trustchain_engine::{
    db_types::{AlertDetails, NotificationType, Role, Severity},
    fraud_objects::FraudCheckRequest,
    traits::{ErrorKind, LedgerError},
};

mod support;

#[tokio::test]
async fn high_value_orders_are_flagged_once() {
    let sys = TestSystem::new().await;
    let order = sys.order_in_transit(60_000).await;
    sys.backdate_assignment(order.id, 30).await;
    sys.deliveries.complete_delivery(order.id, DRIVER, order.delivery_otp()).await.unwrap();
    sys.escrow.release_escrow(order.id, DRIVER).await.unwrap();

    let alerts = sys.fraud.alerts_for_user(CUSTOMER, false).await.unwrap();
    assert_eq!(alerts.len(), 1);
    let alert = &alerts[0];
    assert_eq!(alert.alert_type, "high_value_transaction");
    assert_eq!(alert.severity, Severity::Medium);
    assert_eq!(alert.order_id, Some(order.id));
    match &alert.details.0 {
        AlertDetails::HighValueTransaction { amount, action, .. } => {
            assert_eq!(*amount, order.amount);
            assert_eq!(action, "order_created");
        },
        other => panic!("Unexpected details: {other:?}"),
    }

    // A manual check still reports the rule, but does not store a duplicate
    let report = sys.fraud.run_check(FraudCheckRequest::new("manual_review").for_order(order.id)).await.unwrap();
    assert_eq!(report.alerts_generated(), 1);
    assert!(report.recorded.is_empty());
    // Medium alerts do not page the administrators
    assert!(sys.notifications.notifications_for(ADMIN, false).await.unwrap().is_empty());
    sys.tear_down().await;
}

#[tokio::test]
async fn rapid_order_creation() {
    let sys = TestSystem::new().await;
    for _ in 0..5 {
        sys.new_order(100).await;
    }
    assert!(sys.fraud.open_alerts().await.unwrap().is_empty());
    sys.new_order(100).await;

    let alerts = sys.fraud.open_alerts().await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].user_id.as_deref(), Some(CUSTOMER));
    assert_eq!(alerts[0].severity, Severity::High);
    match &alerts[0].details.0 {
        AlertDetails::RapidOrderCreation { order_count, timeframe, .. } => {
            assert_eq!(*order_count, 6);
            assert_eq!(timeframe, "1 hour");
        },
        other => panic!("Unexpected details: {other:?}"),
    }

    let inbox = sys.notifications.notifications_for(ADMIN, true).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, NotificationType::FraudAlert);
    assert_eq!(inbox[0].title, "HIGH Fraud Alert");
    assert_eq!(inbox[0].message, "RAPID ORDER CREATION detected");

    // The seventh order trips the same rule, but the open alert is not repeated
    sys.new_order(100).await;
    assert_eq!(sys.fraud.open_alerts().await.unwrap().len(), 1);
    sys.tear_down().await;
}

#[tokio::test]
async fn suspiciously_fast_delivery() {
    let sys = TestSystem::new().await;
    let quick = sys.order_in_transit(500).await;
    sys.backdate_assignment(quick.id, 4).await;
    sys.deliveries.complete_delivery(quick.id, DRIVER, quick.delivery_otp()).await.unwrap();

    let slow = sys.order_in_transit(500).await;
    sys.backdate_assignment(slow.id, 10).await;
    sys.deliveries.complete_delivery(slow.id, DRIVER, slow.delivery_otp()).await.unwrap();

    let alerts = sys.fraud.alerts_for_user(DRIVER, true).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].order_id, Some(quick.id));
    assert_eq!(alerts[0].severity, Severity::High);
    match &alerts[0].details.0 {
        AlertDetails::SuspiciouslyFastDelivery { delivery_time_minutes, tracking_id, action } => {
            assert_eq!(*delivery_time_minutes, 4);
            assert_eq!(tracking_id, &quick.tracking_id);
            assert_eq!(action, "delivery_completed");
        },
        other => panic!("Unexpected details: {other:?}"),
    }
    sys.tear_down().await;
}

#[tokio::test]
async fn excessive_cancellations() {
    let sys = TestSystem::new().await;
    for i in 0..4 {
        let order = sys.new_order(100 + i).await;
        sys.orders.cancel_order(order.id, CUSTOMER, Role::Customer, None).await.unwrap();
    }
    let alerts = sys.fraud.alerts_for_user(CUSTOMER, true).await.unwrap();
    assert_eq!(alerts.len(), 1);
    match &alerts[0].details.0 {
        AlertDetails::ExcessiveCancellations { cancelled_count, timeframe, action } => {
            assert_eq!(*cancelled_count, 4);
            assert_eq!(timeframe, "7 days");
            assert_eq!(action, "order_cancelled");
        },
        other => panic!("Unexpected details: {other:?}"),
    }
    sys.tear_down().await;
}

#[tokio::test]
async fn chronic_low_rating() {
    let sys = TestSystem::new().await;
    sqlx::query("UPDATE profiles SET rating = 1.5, total_deliveries = 11 WHERE id = $1")
        .bind(DRIVER)
        .execute(sys.db.pool())
        .await
        .unwrap();
    let report = sys.fraud.run_check(FraudCheckRequest::new("manual_review").for_user(DRIVER)).await.unwrap();
    assert_eq!(report.recorded.len(), 1);
    assert_eq!(report.recorded[0].alert_type, "low_rating");
    assert_eq!(report.recorded[0].severity, Severity::Medium);
    // Nobody else is flagged
    let report = sys.fraud.run_check(FraudCheckRequest::new("manual_review").for_user(OTHER_DRIVER)).await.unwrap();
    assert!(report.fired.is_empty());
    sys.tear_down().await;
}

#[tokio::test]
async fn checks_need_a_subject() {
    let sys = TestSystem::new().await;
    let err = sys.fraud.run_check(FraudCheckRequest::new("manual_review")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = sys.fraud.run_check(FraudCheckRequest::new("manual_review").for_order(31_337)).await.unwrap_err();
    assert!(matches!(err, LedgerError::OrderNotFound(31_337)), "{err}");
    sys.tear_down().await;
}

#[tokio::test]
async fn resolving_alerts() {
    let sys = TestSystem::new().await;
    let order = sys.new_order(75_000).await;
    let alert = sys.fraud.alerts_for_user(CUSTOMER, true).await.unwrap().pop().expect("high value alert");

    let resolved = sys.fraud.resolve_alert(alert.id, ADMIN).await.unwrap();
    assert!(resolved.resolved);
    assert_eq!(resolved.resolved_by.as_deref(), Some(ADMIN));
    assert!(resolved.resolved_at.is_some());
    let err = sys.fraud.resolve_alert(alert.id, ADMIN).await.unwrap_err();
    assert!(matches!(err, LedgerError::AlertAlreadyResolved(_)), "{err}");
    let err = sys.fraud.resolve_alert(9_999, ADMIN).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(sys.fraud.open_alerts().await.unwrap().is_empty());

    // Once resolved, the same finding can be raised again
    let report = sys.fraud.run_check(FraudCheckRequest::new("manual_review").for_order(order.id)).await.unwrap();
    assert_eq!(report.recorded.len(), 1);
    assert_eq!(sys.fraud.alerts_for_user(CUSTOMER, false).await.unwrap().len(), 2);
    sys.tear_down().await;
}
