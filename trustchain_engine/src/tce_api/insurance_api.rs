use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    db_types::{InsurancePolicy, InsuranceStatus, NewInsurancePolicy},
    helpers::new_policy_number,
    tce_api::insurance_objects::{percent_to_bps, InsuranceConfig, PolicyRequest, MAX_POLICY_DAYS},
    traits::{InsuranceManagement, LedgerError},
};

const MAX_POLICY_NUMBER_ATTEMPTS: usize = 3;

/// `InsuranceApi` sells and settles optional transit cover for an order. It sits beside the order state machine and
/// never changes order or payment state.
pub struct InsuranceApi<B> {
    db: B,
    config: InsuranceConfig,
}

impl<B> Debug for InsuranceApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InsuranceApi ({:?})", self.config)
    }
}

impl<B> InsuranceApi<B> {
    pub fn new(db: B) -> Self {
        Self { db, config: InsuranceConfig::default() }
    }

    pub fn with_config(mut self, config: InsuranceConfig) -> Self {
        self.config = config;
        self
    }
}

impl<B> InsuranceApi<B>
where B: InsuranceManagement
{
    /// Issues an active policy on `order_id` for its customer. The premium is the coverage times the rate.
    pub async fn purchase_policy(
        &self,
        order_id: i64,
        buyer_id: &str,
        request: PolicyRequest,
    ) -> Result<InsurancePolicy, LedgerError> {
        if request.provider.trim().is_empty() {
            return Err(LedgerError::Validation("An insurance provider is required".into()));
        }
        if !request.coverage_amount.is_positive() {
            return Err(LedgerError::Validation("The coverage amount must be positive".into()));
        }
        let rate_bps = match request.premium_rate_percent {
            Some(p) if p.is_finite() && p > 0.0 && p <= 100.0 => percent_to_bps(p),
            Some(p) => return Err(LedgerError::Validation(format!("{p}% is not a valid premium rate"))),
            None => self.config.default_rate_bps,
        };
        let duration = match request.duration_days {
            Some(d) if d > 0 && d <= MAX_POLICY_DAYS => Duration::days(d),
            Some(d) => return Err(LedgerError::Validation(format!("{d} days is not a valid policy term"))),
            None => self.config.default_duration,
        };
        let premium_amount = request.coverage_amount.apply_rate_bps(rate_bps);
        let mut attempt = 1;
        let policy = loop {
            let now = Utc::now();
            let policy = NewInsurancePolicy {
                order_id,
                purchased_by: buyer_id.to_string(),
                provider: request.provider.clone(),
                policy_number: new_policy_number(now),
                coverage_amount: request.coverage_amount,
                premium_amount,
                expires_at: now
                    .checked_add_signed(duration)
                    .ok_or_else(|| LedgerError::Validation("The policy term is too long".into()))?,
            };
            match self.db.insert_policy(policy).await {
                Err(LedgerError::AlreadyExists(what)) if attempt < MAX_POLICY_NUMBER_ATTEMPTS => {
                    debug!("🛡️ {what} already exists. Drawing another policy number");
                    attempt += 1;
                },
                other => break other?,
            }
        };
        info!(
            "🛡️ Policy {} issued on order #{order_id}. Cover {} for a premium of {}",
            policy.policy_number,
            policy.coverage_amount.with_currency(),
            policy.premium_amount.with_currency()
        );
        Ok(policy)
    }

    pub async fn claim_policy(&self, policy_id: i64, actor_id: &str) -> Result<InsurancePolicy, LedgerError> {
        self.settle(policy_id, actor_id, InsuranceStatus::Claimed).await
    }

    pub async fn cancel_policy(&self, policy_id: i64, actor_id: &str) -> Result<InsurancePolicy, LedgerError> {
        self.settle(policy_id, actor_id, InsuranceStatus::Cancelled).await
    }

    async fn settle(
        &self,
        policy_id: i64,
        actor_id: &str,
        status: InsuranceStatus,
    ) -> Result<InsurancePolicy, LedgerError> {
        let policy = self.db.fetch_policy(policy_id).await?.ok_or(LedgerError::PolicyNotFound(policy_id))?;
        if policy.purchased_by != actor_id {
            return Err(LedgerError::Forbidden(format!("Policy {} does not belong to {actor_id}", policy.policy_number)));
        }
        let policy = self.db.update_policy_status(policy_id, actor_id, status).await?;
        info!("🛡️ Policy {} is now {status}", policy.policy_number);
        Ok(policy)
    }

    /// Expires every active policy whose term has ended.
    pub async fn expire_policies(&self) -> Result<Vec<InsurancePolicy>, LedgerError> {
        let expired = self.db.expire_policies(Utc::now()).await?;
        if !expired.is_empty() {
            info!("🛡️ {} insurance policies expired", expired.len());
        }
        Ok(expired)
    }

    pub async fn policies_for_order(&self, order_id: i64) -> Result<Vec<InsurancePolicy>, LedgerError> {
        self.db.fetch_policies_for_order(order_id).await
    }

    pub async fn policy(&self, policy_id: i64) -> Result<Option<InsurancePolicy>, LedgerError> {
        self.db.fetch_policy(policy_id).await
    }
}
