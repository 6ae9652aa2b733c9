use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use futures_util::FutureExt;
use log::*;
use support::*;
use trustchain_engine::{
    db_types::{OrderStatusType, PaymentStatusType},
    events::{EventHandlers, EventHooks, FraudCheckRequestedEvent, SmsRequestedEvent},
};

mod support;

#[derive(Clone)]
struct Recorder<T> {
    seen: Arc<Mutex<Vec<T>>>,
}

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self { seen: Arc::new(Mutex::new(Vec::new())) }
    }
}

impl<T: Clone> Recorder<T> {
    fn record(&self, value: T) {
        self.seen.lock().unwrap().push(value);
    }

    fn values(&self) -> Vec<T> {
        self.seen.lock().unwrap().clone()
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(250)).await;
}

#[tokio::test]
async fn lifecycle_events_are_published_after_commit() {
    let statuses = Recorder::<(Option<OrderStatusType>, OrderStatusType)>::default();
    let payments = Recorder::<(PaymentStatusType, PaymentStatusType)>::default();
    let sms = Recorder::<SmsRequestedEvent>::default();
    let mut hooks = EventHooks::default();
    let s = statuses.clone();
    hooks.on_order_status_changed(move |ev| {
        info!("🪝️ Order #{} is now {}", ev.order.id, ev.order.status);
        s.record((ev.previous_status, ev.order.status));
        async {}.boxed()
    });
    let p = payments.clone();
    hooks.on_payment_status_changed(move |ev| {
        p.record((ev.previous_status, ev.payment.status));
        async {}.boxed()
    });
    let m = sms.clone();
    hooks.on_sms_requested(move |ev| {
        m.record(ev);
        async {}.boxed()
    });
    let handlers = EventHandlers::new(32, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let sys = TestSystem::with_producers(producers, TestGateway::default()).await;
    let order = sys.delivered_order(1000).await;
    sys.escrow.release_escrow(order.id, DRIVER).await.unwrap();
    // Replays and failures publish nothing
    sys.escrow.release_escrow(order.id, DRIVER).await.unwrap();
    sys.orders.start_transit(order.id, DRIVER).await.unwrap_err();
    settle().await;

    use OrderStatusType::*;
    let mut seen = statuses.values();
    seen.sort_by_key(|(_, to)| match to {
        Pending => 0,
        Assigned => 1,
        InTransit => 2,
        Delivered => 3,
        Cancelled => 4,
    });
    assert_eq!(seen, vec![
        (None, Pending),
        (Some(Pending), Assigned),
        (Some(Assigned), InTransit),
        (Some(InTransit), Delivered)
    ]);
    let mut seen = payments.values();
    seen.sort_by_key(|(from, _)| *from == PaymentStatusType::HeldEscrow);
    assert_eq!(seen, vec![
        (PaymentStatusType::Pending, PaymentStatusType::HeldEscrow),
        (PaymentStatusType::HeldEscrow, PaymentStatusType::Released)
    ]);

    let texts = sms.values();
    assert_eq!(texts.len(), 1);
    assert_eq!(texts[0].recipient, "254712345678");
    assert_eq!(texts[0].order_id, Some(order.id));
    assert!(texts[0].message.contains(order.delivery_otp()));
    assert!(texts[0].message.contains(order.tracking_id.as_str()));
    sys.tear_down().await;
}

#[tokio::test]
async fn no_sms_without_a_phone_number() {
    let sms = Recorder::<SmsRequestedEvent>::default();
    let mut hooks = EventHooks::default();
    let m = sms.clone();
    hooks.on_sms_requested(move |ev| {
        m.record(ev);
        async {}.boxed()
    });
    let handlers = EventHandlers::new(8, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let sys = TestSystem::with_producers(producers, TestGateway::default()).await;

    let sent = sys.notifications.send_sms(MERCHANT, None, "Hello".into()).await;
    assert!(!sent);
    let sent = sys.notifications.send_sms("nobody", None, "Hello".into()).await;
    assert!(!sent);
    let sent = sys.notifications.send_sms(CUSTOMER, None, "Hello".into()).await;
    assert!(sent);
    settle().await;
    let texts = sms.values();
    assert_eq!(texts.len(), 1);
    assert_eq!(texts[0].correlation_id, format!("user-{CUSTOMER}"));
    sys.tear_down().await;
}

#[tokio::test]
async fn fraud_checks_are_queued_for_a_subscribed_worker() {
    let checks = Recorder::<FraudCheckRequestedEvent>::default();
    let mut hooks = EventHooks::default();
    let c = checks.clone();
    hooks.on_fraud_check_requested(move |ev| {
        c.record(ev);
        async {}.boxed()
    });
    let handlers = EventHandlers::new(8, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let sys = TestSystem::with_producers(producers, TestGateway::default()).await;

    let order = sys.new_order(60_000).await;
    // Nothing is scored on the request path
    assert!(sys.fraud.alerts_for_user(CUSTOMER, false).await.unwrap().is_empty());
    settle().await;
    let queued = checks.values();
    assert_eq!(queued.len(), 1);
    let request = queued[0].request.clone();
    assert_eq!(request.action, "order_created");
    assert_eq!(request.user_id.as_deref(), Some(CUSTOMER));
    assert_eq!(request.order_id, Some(order.id));

    // The worker's side of the queue
    let report = sys.fraud.run_check(request).await.unwrap();
    assert_eq!(report.recorded.len(), 1);
    assert_eq!(report.recorded[0].alert_type, "high_value_transaction");
    sys.tear_down().await;
}
