use thiserror::Error;

use crate::{
    db_types::{
        ActivityLog,
        Delivery,
        InsuranceStatus,
        LocationUpdate,
        NewActivity,
        NewOrder,
        OrderStatusType,
        PaymentStatusType,
        TrackingId,
    },
    traits::{
        data_objects::{
            AcceptedOrder,
            CancelledOrder,
            CompletedDelivery,
            EscrowRelease,
            LocationUpdateResult,
            NewOrderResult,
            PaymentTransition,
            TransitStarted,
        },
        FraudManagement,
        NotificationManagement,
        OrderManagement,
        ProfileManagement,
    },
};

/// This trait defines the highest level of behaviour for backends supporting the TrustChain engine: every state
/// transition on the order, delivery and payment state machines.
///
/// Each method is all-or-nothing. Implementations must apply the transition as a compare-and-set against the current
/// status (never read-then-write), append exactly one activity log entry in the same atomic unit, and leave the prior
/// committed state untouched on any error.
#[allow(async_fn_in_trait)]
pub trait DeliveryLedger:
    Clone + OrderManagement + ProfileManagement + FraudManagement + NotificationManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new `pending` order together with its `pending` payment record.
    ///
    /// Returns [`LedgerError::AlreadyExists`] if the tracking id is taken, so that the caller can retry with a fresh
    /// one.
    async fn create_order(
        &self,
        order: NewOrder,
        tracking_id: TrackingId,
        delivery_otp: String,
    ) -> Result<NewOrderResult, LedgerError>;

    /// pending → assigned, creating the single active delivery for `driver_id`.
    ///
    /// When several drivers race for the same order, exactly one call succeeds. The others receive
    /// [`LedgerError::OrderNotAvailable`] and create nothing.
    async fn accept_order(&self, order_id: i64, driver_id: &str) -> Result<AcceptedOrder, LedgerError>;

    /// assigned → in_transit. Sets `picked_up_at` only if it is unset. A repeat call by the assigned driver once the
    /// order is already in transit is a no-op.
    async fn start_transit(&self, order_id: i64, driver_id: &str) -> Result<TransitStarted, LedgerError>;

    /// in_transit → delivered, gated on the delivery code.
    ///
    /// On a match, `delivered_at`, `otp_verified` and the order status are written together. On a mismatch the
    /// failed-attempt counter is incremented (and committed) and [`LedgerError::OtpMismatch`] is returned. Once
    /// `max_attempts` mismatches have been recorded, every call fails with [`LedgerError::OtpAttemptsExceeded`].
    async fn complete_delivery(
        &self,
        order_id: i64,
        driver_id: &str,
        otp: &str,
        max_attempts: u32,
    ) -> Result<CompletedDelivery, LedgerError>;

    /// pending|assigned → cancelled. Voids the active delivery, refunds an escrowed payment and fails a payment that was
    /// never captured.
    async fn cancel_order(
        &self,
        order_id: i64,
        actor_id: &str,
        reason: Option<String>,
    ) -> Result<CancelledOrder, LedgerError>;

    /// Records a driver position. Only accepted while the order is in transit, and only if the reading is newer than
    /// the last one stored.
    async fn update_location(&self, driver_id: &str, update: LocationUpdate) -> Result<LocationUpdateResult, LedgerError>;

    /// Clears the failed delivery code counter on the active delivery for `order_id`.
    async fn reset_otp_attempts(&self, order_id: i64, admin_id: &str) -> Result<Delivery, LedgerError>;

    /// Stores the gateway reference for a capture request on a `pending` payment.
    async fn record_capture_request(
        &self,
        order_id: i64,
        transaction_ref: &str,
        phone: &str,
    ) -> Result<PaymentTransition, LedgerError>;

    /// pending → held_escrow, mirrored on the order's payment status. Replaying the same confirmation is a no-op.
    async fn confirm_capture(&self, order_id: i64, transaction_ref: &str) -> Result<PaymentTransition, LedgerError>;

    /// pending → failed.
    async fn fail_capture(&self, order_id: i64, reason: &str) -> Result<PaymentTransition, LedgerError>;

    /// held_escrow → released.
    ///
    /// Requires the order to be delivered, its delivery's code to be verified, and the payment to be held in escrow.
    /// The first failing precondition is reported as [`LedgerError::OrderNotDelivered`],
    /// [`LedgerError::OtpNotVerified`] or [`LedgerError::PaymentNotInEscrow`]. The driver's delivery count is incremented
    /// in the same atomic unit. A replay by the same driver after success returns the released payment unchanged.
    async fn release_escrow(&self, order_id: i64, driver_id: &str) -> Result<EscrowRelease, LedgerError>;

    /// Appends an audit entry that is not part of a state transition (e.g. an SMS having been sent).
    async fn append_activity(&self, activity: NewActivity) -> Result<ActivityLog, LedgerError>;
}

/// The error taxonomy callers act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing input. Nothing was changed.
    Validation,
    /// The entity is not in the state the operation requires. Re-read and decide.
    StateConflict,
    NotFound,
    /// The caller is not a party to the entity.
    Forbidden,
    /// A collaborator (gateway, SMS) failed.
    UpstreamFailure,
    Internal,
}

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Invalid input. {0}")]
    Validation(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(i64),
    #[error("Delivery {0} does not exist")]
    DeliveryNotFound(i64),
    #[error("Order {0} has no active delivery")]
    NoActiveDelivery(i64),
    #[error("Order {0} has no payment record")]
    PaymentNotFound(i64),
    #[error("Profile {0} does not exist")]
    ProfileNotFound(String),
    #[error("Fraud alert {0} does not exist")]
    FraudAlertNotFound(i64),
    #[error("Notification {0} does not exist")]
    NotificationNotFound(i64),
    #[error("Insurance policy {0} does not exist")]
    PolicyNotFound(i64),
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidTransition { order_id: i64, from: OrderStatusType, to: OrderStatusType },
    #[error("Order {order_id} is no longer available (status: {status})")]
    OrderNotAvailable { order_id: i64, status: OrderStatusType },
    #[error("The delivery code does not match. {attempts_remaining} attempt(s) remaining")]
    OtpMismatch { attempts_remaining: u32 },
    #[error("Too many incorrect delivery codes for order {0}. An administrator must reset the lockout")]
    OtpAttemptsExceeded(i64),
    #[error("Driver {driver_id} is not assigned to order {order_id}")]
    NotAssignedDriver { order_id: i64, driver_id: String },
    #[error("Order {0} has not been delivered")]
    OrderNotDelivered(i64),
    #[error("The delivery code for order {0} has not been verified")]
    OtpNotVerified(i64),
    #[error("The payment for order {order_id} is not held in escrow (status: {status})")]
    PaymentNotInEscrow { order_id: i64, status: PaymentStatusType },
    #[error("The payment for order {order_id} cannot move from {from} to {to}")]
    IllegalPaymentTransition { order_id: i64, from: PaymentStatusType, to: PaymentStatusType },
    #[error("Delivery {delivery_id} only accepts location updates while in transit (order status: {status})")]
    LocationRejected { delivery_id: i64, status: OrderStatusType },
    #[error("Insurance policy {policy_id} cannot move from {from} to {to}")]
    IllegalPolicyTransition { policy_id: i64, from: InsuranceStatus, to: InsuranceStatus },
    #[error("Fraud alert {0} has already been resolved")]
    AlertAlreadyResolved(i64),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("Forbidden. {0}")]
    Forbidden(String),
    #[error("An upstream service failed. {0}")]
    Upstream(String),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        use LedgerError::*;
        match self {
            DatabaseError(_) => ErrorKind::Internal,
            Validation(_) => ErrorKind::Validation,
            OrderNotFound(_) | DeliveryNotFound(_) | NoActiveDelivery(_) | PaymentNotFound(_) | ProfileNotFound(_) |
            FraudAlertNotFound(_) | NotificationNotFound(_) | PolicyNotFound(_) => ErrorKind::NotFound,
            InvalidTransition { .. } |
            OrderNotAvailable { .. } |
            OtpMismatch { .. } |
            OtpAttemptsExceeded(_) |
            OrderNotDelivered(_) |
            OtpNotVerified(_) |
            PaymentNotInEscrow { .. } |
            IllegalPaymentTransition { .. } |
            LocationRejected { .. } |
            IllegalPolicyTransition { .. } |
            AlertAlreadyResolved(_) |
            AlreadyExists(_) => ErrorKind::StateConflict,
            NotAssignedDriver { .. } | Forbidden(_) => ErrorKind::Forbidden,
            Upstream(_) => ErrorKind::UpstreamFailure,
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn taxonomy() {
        assert_eq!(LedgerError::OrderNotDelivered(1).kind(), ErrorKind::StateConflict);
        assert_eq!(LedgerError::OtpMismatch { attempts_remaining: 2 }.kind(), ErrorKind::StateConflict);
        assert_eq!(LedgerError::OrderNotFound(1).kind(), ErrorKind::NotFound);
        assert_eq!(LedgerError::Validation("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(LedgerError::Upstream("x".into()).kind(), ErrorKind::UpstreamFailure);
        assert_eq!(
            LedgerError::NotAssignedDriver { order_id: 1, driver_id: "d".into() }.kind(),
            ErrorKind::Forbidden
        );
        assert_eq!(LedgerError::from(sqlx::Error::RowNotFound).kind(), ErrorKind::Internal);
    }

    #[test]
    fn messages_name_the_status() {
        let err = LedgerError::PaymentNotInEscrow { order_id: 7, status: PaymentStatusType::Refunded };
        assert_eq!(err.to_string(), "The payment for order 7 is not held in escrow (status: refunded)");
        let err = LedgerError::InvalidTransition {
            order_id: 3,
            from: OrderStatusType::Delivered,
            to: OrderStatusType::Cancelled,
        };
        assert_eq!(err.to_string(), "Order 3 cannot move from delivered to cancelled");
    }
}
