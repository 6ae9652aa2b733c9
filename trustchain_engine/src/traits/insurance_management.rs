use chrono::{DateTime, Utc};

use crate::{
    db_types::{InsurancePolicy, InsuranceStatus, NewInsurancePolicy},
    traits::LedgerError,
};

#[allow(async_fn_in_trait)]
pub trait InsuranceManagement {
    /// Stores an active policy. The purchaser must be the order's customer and the order must not be cancelled.
    async fn insert_policy(&self, policy: NewInsurancePolicy) -> Result<InsurancePolicy, LedgerError>;

    async fn fetch_policy(&self, policy_id: i64) -> Result<Option<InsurancePolicy>, LedgerError>;

    async fn fetch_policies_for_order(&self, order_id: i64) -> Result<Vec<InsurancePolicy>, LedgerError>;

    /// Moves an active policy to `status`.
    async fn update_policy_status(
        &self,
        policy_id: i64,
        actor_id: &str,
        status: InsuranceStatus,
    ) -> Result<InsurancePolicy, LedgerError>;

    /// Expires every active policy whose `expires_at` is at or before `now`.
    async fn expire_policies(&self, now: DateTime<Utc>) -> Result<Vec<InsurancePolicy>, LedgerError>;
}
