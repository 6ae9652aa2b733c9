use std::{future::Future, pin::Pin, sync::Arc};

use log::*;

use crate::events::{
    DeliveryUpdatedEvent,
    EventHandler,
    EventProducer,
    FraudAlertRaisedEvent,
    FraudCheckRequestedEvent,
    Handler,
    NotificationCreatedEvent,
    OrderStatusChangedEvent,
    PaymentStatusChangedEvent,
    SmsRequestedEvent,
};

fn publish<E: Clone + Send + Sync>(producers: &[EventProducer<E>], event: E) {
    for producer in producers {
        producer.publish_event(event.clone());
    }
}

/// The publishing side of the event bus. Cheap to clone; every workflow API holds a copy.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_status_producer: Vec<EventProducer<OrderStatusChangedEvent>>,
    pub payment_status_producer: Vec<EventProducer<PaymentStatusChangedEvent>>,
    pub delivery_producer: Vec<EventProducer<DeliveryUpdatedEvent>>,
    pub fraud_alert_producer: Vec<EventProducer<FraudAlertRaisedEvent>>,
    pub fraud_check_producer: Vec<EventProducer<FraudCheckRequestedEvent>>,
    pub notification_producer: Vec<EventProducer<NotificationCreatedEvent>>,
    pub sms_producer: Vec<EventProducer<SmsRequestedEvent>>,
}

impl EventProducers {
    pub fn publish_order_status(&self, event: OrderStatusChangedEvent) {
        trace!("📬️ Order #{} is now {}", event.order.id, event.order.status);
        publish(&self.order_status_producer, event);
    }

    pub fn publish_payment_status(&self, event: PaymentStatusChangedEvent) {
        trace!("📬️ Payment for order #{} is now {}", event.payment.order_id, event.payment.status);
        publish(&self.payment_status_producer, event);
    }

    pub fn publish_delivery(&self, event: DeliveryUpdatedEvent) {
        publish(&self.delivery_producer, event);
    }

    pub fn publish_fraud_alert(&self, event: FraudAlertRaisedEvent) {
        publish(&self.fraud_alert_producer, event);
    }

    /// Hands the check to the fraud worker. Returns false if no worker accepted it, in which case the caller must run
    /// the check itself.
    pub fn publish_fraud_check(&self, event: FraudCheckRequestedEvent) -> bool {
        let mut accepted = false;
        for producer in &self.fraud_check_producer {
            accepted |= producer.publish_event(event.clone());
        }
        accepted
    }

    pub fn publish_notification(&self, event: NotificationCreatedEvent) {
        publish(&self.notification_producer, event);
    }

    pub fn publish_sms(&self, event: SmsRequestedEvent) {
        if self.sms_producer.is_empty() {
            debug!("📬️ No SMS transport is subscribed. Message to {} not sent", event.recipient);
        }
        publish(&self.sms_producer, event);
    }
}

pub struct EventHandlers {
    pub on_order_status_changed: Option<EventHandler<OrderStatusChangedEvent>>,
    pub on_payment_status_changed: Option<EventHandler<PaymentStatusChangedEvent>>,
    pub on_delivery_updated: Option<EventHandler<DeliveryUpdatedEvent>>,
    pub on_fraud_alert: Option<EventHandler<FraudAlertRaisedEvent>>,
    pub on_fraud_check_requested: Option<EventHandler<FraudCheckRequestedEvent>>,
    pub on_notification: Option<EventHandler<NotificationCreatedEvent>>,
    pub on_sms_requested: Option<EventHandler<SmsRequestedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_order_status_changed: hooks.on_order_status_changed.map(|f| EventHandler::new(buffer_size, f)),
            on_payment_status_changed: hooks.on_payment_status_changed.map(|f| EventHandler::new(buffer_size, f)),
            on_delivery_updated: hooks.on_delivery_updated.map(|f| EventHandler::new(buffer_size, f)),
            on_fraud_alert: hooks.on_fraud_alert.map(|f| EventHandler::new(buffer_size, f)),
            on_fraud_check_requested: hooks.on_fraud_check_requested.map(|f| EventHandler::new(buffer_size, f)),
            on_notification: hooks.on_notification.map(|f| EventHandler::new(buffer_size, f)),
            on_sms_requested: hooks.on_sms_requested.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_status_changed {
            result.order_status_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_status_changed {
            result.payment_status_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_delivery_updated {
            result.delivery_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_fraud_alert {
            result.fraud_alert_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_fraud_check_requested {
            result.fraud_check_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_notification {
            result.notification_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_sms_requested {
            result.sms_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_status_changed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_payment_status_changed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_delivery_updated {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_fraud_alert {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_fraud_check_requested {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_notification {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_sms_requested {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_status_changed: Option<Handler<OrderStatusChangedEvent>>,
    pub on_payment_status_changed: Option<Handler<PaymentStatusChangedEvent>>,
    pub on_delivery_updated: Option<Handler<DeliveryUpdatedEvent>>,
    pub on_fraud_alert: Option<Handler<FraudAlertRaisedEvent>>,
    pub on_fraud_check_requested: Option<Handler<FraudCheckRequestedEvent>>,
    pub on_notification: Option<Handler<NotificationCreatedEvent>>,
    pub on_sms_requested: Option<Handler<SmsRequestedEvent>>,
}

impl EventHooks {
    pub fn on_order_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderStatusChangedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_payment_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentStatusChangedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payment_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_delivery_updated<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(DeliveryUpdatedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_delivery_updated = Some(Arc::new(f));
        self
    }

    pub fn on_fraud_alert<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(FraudAlertRaisedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_fraud_alert = Some(Arc::new(f));
        self
    }

    pub fn on_fraud_check_requested<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(FraudCheckRequestedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_fraud_check_requested = Some(Arc::new(f));
        self
    }

    pub fn on_notification<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(NotificationCreatedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_notification = Some(Arc::new(f));
        self
    }

    pub fn on_sms_requested<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(SmsRequestedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_sms_requested = Some(Arc::new(f));
        self
    }
}
