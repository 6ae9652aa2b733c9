use futures_util::future::join_all;
use regex::Regex;
use support::*;
use tc_common::Money;
use trustchain_engine::{
    db_types::{NewOrder, OrderStatusType, PaymentStatusType, Role},
    order_objects::OrderQueryFilter,
    traits::{ErrorKind, LedgerError},
};

mod support;

#[tokio::test]
async fn create_order() {
    let sys = TestSystem::new().await;
    let order = sys.new_order(1250).await;
    let re = Regex::new(r"^TC-\d{8}-[2-9A-HJ-NP-Z]{6}$").unwrap();
    assert!(re.is_match(order.tracking_id.as_str()), "{}", order.tracking_id);
    assert_eq!(order.delivery_otp().len(), 4);
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.payment_status, PaymentStatusType::Pending);
    assert_eq!(order.amount, Money::from_units(1250));

    let payment = sys.escrow.payment_for_order(order.id).await.unwrap().expect("payment record");
    assert_eq!(payment.status, PaymentStatusType::Pending);
    assert_eq!(payment.amount, order.amount);

    let by_tracking_id = sys.orders.order_by_tracking_id(&order.tracking_id).await.unwrap().unwrap();
    assert_eq!(by_tracking_id.id, order.id);

    let activity = sys.orders.activity(order.id).await.unwrap();
    assert_eq!(activity.len(), 1);
    assert_eq!(activity[0].action, "order_pending");

    let inbox = sys.notifications.notifications_for(CUSTOMER, true).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].title, "Order Created");
    let inbox = sys.notifications.notifications_for(MERCHANT, true).await.unwrap();
    assert_eq!(inbox[0].title, "New Order");
    sys.tear_down().await;
}

#[tokio::test]
async fn invalid_orders_are_rejected() {
    let sys = TestSystem::new().await;
    let free = NewOrder::new(CUSTOMER, "A", "B", Money::from(0));
    let err = sys.orders.create_order(free).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let nowhere = NewOrder::new(CUSTOMER, "A", " ", Money::from_units(10));
    let err = sys.orders.create_order(nowhere).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)), "{err}");
    let orders = sys.orders.search_orders(OrderQueryFilter::default()).await.unwrap();
    assert!(orders.is_empty());
    sys.tear_down().await;
}

#[tokio::test]
async fn only_one_driver_wins_the_accept_race() {
    let sys = TestSystem::new().await;
    let order = sys.new_order(800).await;
    let drivers = ["d1", "d2", "d3", "d4", "d5"];
    let results = join_all(drivers.iter().map(|d| sys.orders.accept_order(order.id, d))).await;
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for result in results.iter().filter(|r| r.is_err()) {
        match result {
            Err(LedgerError::OrderNotAvailable { order_id, status }) => {
                assert_eq!(*order_id, order.id);
                assert_eq!(*status, OrderStatusType::Assigned);
            },
            other => panic!("Unexpected result: {other:?}"),
        }
    }
    let winner = results.into_iter().find_map(|r| r.ok()).unwrap();
    let delivery = sys.orders.active_delivery(order.id).await.unwrap().unwrap();
    assert_eq!(delivery.driver_id, winner.delivery.driver_id);
    assert_eq!(delivery.id, winner.delivery.id);
    // Exactly one assignment was logged
    let activity = sys.orders.activity(order.id).await.unwrap();
    assert_eq!(activity.iter().filter(|a| a.action == "order_assigned").count(), 1);
    sys.tear_down().await;
}

#[tokio::test]
async fn start_transit() {
    let sys = TestSystem::new().await;
    let order = sys.new_order(500).await;
    let err = sys.orders.start_transit(order.id, DRIVER).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidTransition { from: OrderStatusType::Pending, .. }), "{err}");

    sys.orders.accept_order(order.id, DRIVER).await.unwrap();
    let err = sys.orders.start_transit(order.id, OTHER_DRIVER).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotAssignedDriver { .. }), "{err}");

    let started = sys.orders.start_transit(order.id, DRIVER).await.unwrap();
    assert!(started.newly_started);
    assert_eq!(started.order.status, OrderStatusType::InTransit);
    let picked_up_at = started.delivery.picked_up_at.expect("pickup time");

    let replay = sys.orders.start_transit(order.id, DRIVER).await.unwrap();
    assert!(!replay.newly_started);
    assert_eq!(replay.delivery.picked_up_at, Some(picked_up_at));
    let activity = sys.orders.activity(order.id).await.unwrap();
    assert_eq!(activity.iter().filter(|a| a.action == "order_in_transit").count(), 1);
    sys.tear_down().await;
}

#[tokio::test]
async fn cancel_after_assignment_refunds_escrow() {
    let sys = TestSystem::new().await;
    let order = sys.new_order(2000).await;
    sys.escrow.confirm_capture(order.id, "REF-CANCEL").await.unwrap();
    let accepted = sys.orders.accept_order(order.id, DRIVER).await.unwrap();

    let err = sys.orders.cancel_order(order.id, OTHER_DRIVER, Role::Driver, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let cancelled =
        sys.orders.cancel_order(order.id, CUSTOMER, Role::Customer, Some("Changed my mind".into())).await.unwrap();
    assert_eq!(cancelled.previous_status, OrderStatusType::Assigned);
    assert_eq!(cancelled.order.status, OrderStatusType::Cancelled);
    assert_eq!(cancelled.order.payment_status, PaymentStatusType::Refunded);
    assert!(cancelled.refunded());
    let voided = cancelled.voided_delivery.expect("voided delivery");
    assert_eq!(voided.id, accepted.delivery.id);
    assert!(voided.voided);
    assert!(sys.orders.active_delivery(order.id).await.unwrap().is_none());

    let inbox = sys.notifications.notifications_for(DRIVER, false).await.unwrap();
    assert_eq!(inbox[0].title, "Order Cancelled");

    // Cancelled is terminal
    let err = sys.orders.accept_order(order.id, OTHER_DRIVER).await.unwrap_err();
    assert!(matches!(err, LedgerError::OrderNotAvailable { status: OrderStatusType::Cancelled, .. }), "{err}");
    sys.tear_down().await;
}

#[tokio::test]
async fn cancel_unpaid_order_fails_the_payment() {
    let sys = TestSystem::new().await;
    let order = sys.new_order(300).await;
    let cancelled = sys.orders.cancel_order(order.id, ADMIN, Role::Admin, None).await.unwrap();
    assert_eq!(cancelled.previous_status, OrderStatusType::Pending);
    assert_eq!(cancelled.payment.status, PaymentStatusType::Failed);
    assert!(cancelled.voided_delivery.is_none());
    // A late confirmation from the gateway is rejected
    let err = sys.escrow.confirm_capture(order.id, "LATE").await.unwrap_err();
    assert!(matches!(err, LedgerError::IllegalPaymentTransition { from: PaymentStatusType::Failed, .. }), "{err}");
    sys.tear_down().await;
}

#[tokio::test]
async fn orders_in_transit_cannot_be_cancelled() {
    let sys = TestSystem::new().await;
    let order = sys.order_in_transit(900).await;
    let err = sys.orders.cancel_order(order.id, CUSTOMER, Role::Customer, None).await.unwrap_err();
    assert!(
        matches!(err, LedgerError::InvalidTransition {
            from: OrderStatusType::InTransit,
            to: OrderStatusType::Cancelled,
            ..
        }),
        "{err}"
    );
    assert_eq!(err.kind(), ErrorKind::StateConflict);
    let order = sys.orders.order(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::InTransit);
    assert_eq!(order.payment_status, PaymentStatusType::HeldEscrow);
    sys.tear_down().await;
}

#[tokio::test]
async fn order_queries() {
    let sys = TestSystem::new().await;
    let first = sys.new_order(100).await;
    let second = sys.new_order(200).await;
    let third = sys.new_order(300).await;
    sys.orders.accept_order(second.id, DRIVER).await.unwrap();

    let available = sys.orders.available_orders(None).await.unwrap();
    assert_eq!(available.iter().map(|o| o.id).collect::<Vec<_>>(), vec![first.id, third.id]);
    let available = sys.orders.available_orders(Some(1)).await.unwrap();
    assert_eq!(available.len(), 1);

    let mine = sys.orders.search_orders(OrderQueryFilter::default().with_driver_id(DRIVER)).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, second.id);

    let filter = OrderQueryFilter::default()
        .with_customer_id(CUSTOMER)
        .with_status(OrderStatusType::Pending)
        .with_status(OrderStatusType::Assigned);
    assert_eq!(sys.orders.search_orders(filter).await.unwrap().len(), 3);
    assert!(sys.orders.order(9_999).await.unwrap().is_none());
    sys.tear_down().await;
}
