use std::sync::Arc;

use chrono::Utc;
use futures::{future::BoxFuture, FutureExt};
use log::*;
use trustchain_engine::{
    db_types::{ActivityDetails, NewActivity},
    events::{EventHandlers, EventHooks, FraudAlertRaisedEvent, SmsRequestedEvent},
    traits::{DeliveryLedger, SmsReceipt, SmsTransport, TransportError},
    SqliteDatabase,
};

use crate::config::SmsConfig;

/// Hands messages to the SMS provider. Until the provider is integrated, messages are written to the log.
#[derive(Debug, Clone)]
pub struct LoggingSmsTransport {
    config: SmsConfig,
}

impl LoggingSmsTransport {
    pub fn new(config: SmsConfig) -> Self {
        Self { config }
    }
}

impl SmsTransport for LoggingSmsTransport {
    async fn send(&self, recipient: &str, message: &str, correlation_id: &str) -> Result<SmsReceipt, TransportError> {
        if !self.config.enabled {
            return Err(TransportError("SMS is disabled".into()));
        }
        if recipient.is_empty() || message.is_empty() {
            return Err(TransportError("A recipient and a message are required".into()));
        }
        let message_id = format!("SMS{}", Utc::now().timestamp_millis());
        info!("{}", sent_summary(&self.config.sender_id, recipient, correlation_id, &message_id));
        trace!("📨️ {message_id}: {message}");
        Ok(SmsReceipt { message_id })
    }
}

/// The log line for a sent message. Message bodies carry delivery codes, so they are left out.
fn sent_summary(sender_id: &str, recipient: &str, correlation_id: &str, message_id: &str) -> String {
    format!("📨️ [{sender_id}] SMS to {recipient} ({correlation_id}, {message_id})")
}

/// Subscribes the SMS transport to the engine's SMS requests, and records each message sent for an order in that
/// order's activity log. Fraud alerts are also echoed to the log here.
pub fn create_sms_event_handlers<T>(transport: T, db: SqliteDatabase, buffer_size: usize) -> EventHandlers
where T: SmsTransport + 'static {
    let mut hooks = EventHooks::default();
    let transport = Arc::new(transport);
    hooks.on_sms_requested(move |ev| {
        let transport = Arc::clone(&transport);
        let db = db.clone();
        send_and_record(transport, db, ev).boxed()
    });
    hooks.on_fraud_alert(log_fraud_alert);
    EventHandlers::new(buffer_size, hooks)
}

async fn send_and_record<T: SmsTransport>(transport: Arc<T>, db: SqliteDatabase, ev: SmsRequestedEvent) {
    let receipt = match transport.send(&ev.recipient, &ev.message, &ev.correlation_id).await {
        Ok(receipt) => receipt,
        Err(e) => {
            warn!("📨️ Could not send SMS to {} ({}). {e}", ev.recipient, ev.correlation_id);
            return;
        },
    };
    let Some(order_id) = ev.order_id else {
        return;
    };
    let details = ActivityDetails::SmsSent { phone: ev.recipient, message_id: receipt.message_id };
    if let Err(e) = db.append_activity(NewActivity::for_order(order_id, &ev.user_id, details)).await {
        warn!("📨️ SMS for order #{order_id} was sent, but could not be recorded. {e}");
    }
}

fn log_fraud_alert(ev: FraudAlertRaisedEvent) -> BoxFuture<'static, ()> {
    let alert = ev.alert;
    warn!(
        "🚨️ {} fraud alert #{}: {} (user: {}, order: {})",
        alert.severity,
        alert.id,
        alert.alert_type,
        alert.user_id.as_deref().unwrap_or("-"),
        alert.order_id.map(|id| id.to_string()).unwrap_or_else(|| "-".into())
    );
    async {}.boxed()
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn logging_transport() {
        let transport = LoggingSmsTransport::new(SmsConfig::default());
        let receipt = transport.send("254712345678", "Your code is 123456", "order-1").await.unwrap();
        assert!(receipt.message_id.starts_with("SMS"));
        assert!(transport.send("", "hello", "order-1").await.is_err());
        let disabled = LoggingSmsTransport::new(SmsConfig { enabled: false, ..SmsConfig::default() });
        assert!(disabled.send("254712345678", "hello", "order-1").await.is_err());
    }

    #[test]
    fn sent_summary_leaves_out_the_body() {
        let line = sent_summary("TRUSTCHAIN", "254712345678", "order-1", "SMS1700000000000");
        assert_eq!(line, "📨️ [TRUSTCHAIN] SMS to 254712345678 (order-1, SMS1700000000000)");
    }
}
