use crate::{
    db_types::{ActivityLog, Delivery, Order, Payment, TrackingId},
    tce_api::order_objects::OrderQueryFilter,
    traits::LedgerError,
};

/// Read access to orders and the records they own.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, LedgerError>;

    async fn fetch_order_by_tracking_id(&self, tracking_id: &TrackingId) -> Result<Option<Order>, LedgerError>;

    /// Fetches orders according to the criteria in `query`, oldest first.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, LedgerError>;

    /// The delivery currently attached to the order. Voided deliveries are never returned.
    async fn fetch_active_delivery(&self, order_id: i64) -> Result<Option<Delivery>, LedgerError>;

    async fn fetch_delivery(&self, delivery_id: i64) -> Result<Option<Delivery>, LedgerError>;

    async fn fetch_payment_for_order(&self, order_id: i64) -> Result<Option<Payment>, LedgerError>;

    /// The audit trail for the order, oldest first.
    async fn fetch_activity_for_order(&self, order_id: i64) -> Result<Vec<ActivityLog>, LedgerError>;
}
