use chrono::{DateTime, Utc};

use crate::{
    db_types::{FraudAlert, NewFraudAlert},
    traits::{LedgerError, OrderManagement, ProfileManagement},
};

/// History queries used by the fraud rules, and storage for the alerts they raise.
#[allow(async_fn_in_trait)]
pub trait FraudManagement: OrderManagement + ProfileManagement {
    /// Number of orders the customer created at or after `since`.
    async fn count_orders_since(&self, customer_id: &str, since: DateTime<Utc>) -> Result<i64, LedgerError>;

    /// Number of the customer's orders that were cancelled at or after `since`.
    async fn count_cancellations_since(&self, customer_id: &str, since: DateTime<Utc>) -> Result<i64, LedgerError>;

    /// Stores the alerts in a single atomic batch and returns the rows that were written.
    ///
    /// An alert is skipped if an unresolved alert with the same type, user and order already exists. If anything is
    /// written, one `fraud_alerts_raised` activity entry tagged with `context` is appended in the same batch.
    async fn record_fraud_alerts(
        &self,
        alerts: Vec<NewFraudAlert>,
        context: &str,
    ) -> Result<Vec<FraudAlert>, LedgerError>;

    async fn fetch_fraud_alert(&self, alert_id: i64) -> Result<Option<FraudAlert>, LedgerError>;

    /// Alerts, newest first, optionally restricted to open alerts and/or a single user.
    async fn search_fraud_alerts(
        &self,
        unresolved_only: bool,
        user_id: Option<&str>,
    ) -> Result<Vec<FraudAlert>, LedgerError>;

    /// Marks an open alert as resolved by `admin_id`. Resolving twice is an error.
    async fn resolve_fraud_alert(&self, alert_id: i64, admin_id: &str) -> Result<FraudAlert, LedgerError>;
}
