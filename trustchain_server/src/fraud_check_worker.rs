use futures::FutureExt;
use log::*;
use trustchain_engine::{
    events::{EventHandlers, EventHooks, FraudCheckRequestedEvent},
    FraudDetectionApi,
    SqliteDatabase,
};

/// Subscribes `api` to the fraud checks that workflow operations queue after they commit. The checks run on the
/// handler's task, so requests never wait for them.
pub fn create_fraud_check_handlers(api: FraudDetectionApi<SqliteDatabase>, buffer_size: usize) -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_fraud_check_requested(move |ev| {
        let api = api.clone();
        run_queued_check(api, ev).boxed()
    });
    EventHandlers::new(buffer_size, hooks)
}

async fn run_queued_check(api: FraudDetectionApi<SqliteDatabase>, ev: FraudCheckRequestedEvent) {
    let action = ev.request.action.clone();
    match api.run_check(ev.request).await {
        Ok(report) => trace!("🚨️ Queued fraud check after {action} recorded {} alerts", report.recorded.len()),
        Err(e) => warn!("🚨️ Fraud check after {action} failed: {e}"),
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use trustchain_engine::{
        db_types::{Money, NewOrder},
        events::EventProducers,
        test_utils::prepare_env::{prepare_test_env, random_db_path},
        OrderLifecycleApi,
    };

    use super::*;

    #[tokio::test]
    async fn queued_checks_record_alerts() {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        let worker_api = FraudDetectionApi::new(db.clone(), EventProducers::default());
        let handlers = create_fraud_check_handlers(worker_api, 8);
        let producers = handlers.producers();
        handlers.start_handlers().await;

        let lifecycle = OrderLifecycleApi::new(db.clone(), producers.clone());
        let order = NewOrder::new("alice", "Gikomba Market", "Kilimani", Money::from_units(60_000));
        let order = lifecycle.create_order(order).await.unwrap().order;

        let fraud = FraudDetectionApi::new(db.clone(), EventProducers::default());
        let mut alerts = Vec::new();
        for _ in 0..20 {
            alerts = fraud.alerts_for_user("alice", false).await.unwrap();
            if !alerts.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, "high_value_transaction");
        assert_eq!(alerts[0].order_id, Some(order.id));
    }
}
