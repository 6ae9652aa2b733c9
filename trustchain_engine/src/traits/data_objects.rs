use serde::{Deserialize, Serialize};

use crate::db_types::{Delivery, Order, OrderStatusType, Payment, PaymentStatusType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrderResult {
    pub order: Order,
    pub payment: Payment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedOrder {
    pub order: Order,
    pub delivery: Delivery,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitStarted {
    pub order: Order,
    pub delivery: Delivery,
    /// False when the order was already in transit and nothing changed.
    pub newly_started: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedDelivery {
    pub order: Order,
    pub delivery: Delivery,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelledOrder {
    pub order: Order,
    pub previous_status: OrderStatusType,
    pub payment: Payment,
    pub previous_payment_status: PaymentStatusType,
    pub voided_delivery: Option<Delivery>,
}

impl CancelledOrder {
    pub fn refunded(&self) -> bool {
        self.payment.status == PaymentStatusType::Refunded
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", content = "delivery", rename_all = "snake_case")]
pub enum LocationUpdateResult {
    Applied(Delivery),
    /// The reading was older than the stored one and was dropped. Carries the delivery as stored.
    Stale(Delivery),
}

impl LocationUpdateResult {
    pub fn delivery(&self) -> &Delivery {
        match self {
            Self::Applied(d) | Self::Stale(d) => d,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTransition {
    pub order: Order,
    pub payment: Payment,
    pub previous_status: PaymentStatusType,
    /// False for an idempotent replay.
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscrowRelease {
    pub order: Order,
    pub payment: Payment,
    /// The driver's delivery count after this release.
    pub driver_total_deliveries: i64,
    /// False when the payment had already been released to this driver and the call was a replay.
    pub newly_released: bool,
}
