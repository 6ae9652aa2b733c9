use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::{
    db_types::{InsurancePolicy, InsuranceStatus, NewInsurancePolicy},
    traits::LedgerError,
};

/// Stores an active policy. Nothing is written, and `None` is returned, unless `purchased_by` is the order's customer
/// and the order has not been cancelled.
pub async fn insert_policy(
    policy: NewInsurancePolicy,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<InsurancePolicy>, LedgerError> {
    let policy_number = policy.policy_number.clone();
    let result = sqlx::query_as(
        r#"
            INSERT INTO insurance_policies (
                order_id,
                purchased_by,
                provider,
                policy_number,
                coverage_amount,
                premium_amount,
                expires_at,
                created_at,
                updated_at
            )
            SELECT o.id, $2, $3, $4, $5, $6, $7, $8, $8
            FROM orders o
            WHERE o.id = $1 AND o.customer_id = $2 AND o.status != 'cancelled'
            RETURNING *;
        "#,
    )
    .bind(policy.order_id)
    .bind(policy.purchased_by)
    .bind(policy.provider)
    .bind(policy.policy_number)
    .bind(policy.coverage_amount)
    .bind(policy.premium_amount)
    .bind(policy.expires_at)
    .bind(now)
    .fetch_optional(conn)
    .await;
    match result {
        Ok(policy) => Ok(policy),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(LedgerError::AlreadyExists(format!("Policy number {policy_number}")))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_policy(id: i64, conn: &mut SqliteConnection) -> Result<Option<InsurancePolicy>, sqlx::Error> {
    let policy =
        sqlx::query_as("SELECT * FROM insurance_policies WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(policy)
}

pub async fn fetch_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<InsurancePolicy>, sqlx::Error> {
    let policies = sqlx::query_as("SELECT * FROM insurance_policies WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(policies)
}

/// Moves an `active` policy to `status`. Returns `None` if the policy does not exist or is no longer active.
pub async fn compare_and_set_status(
    id: i64,
    status: InsuranceStatus,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<InsurancePolicy>, sqlx::Error> {
    let policy = sqlx::query_as(
        "UPDATE insurance_policies SET status = $1, updated_at = $2 WHERE id = $3 AND status = 'active' RETURNING *",
    )
    .bind(status)
    .bind(now)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(policy)
}

pub async fn expire_due(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<InsurancePolicy>, sqlx::Error> {
    let policies = sqlx::query_as(
        r#"
            UPDATE insurance_policies SET status = 'expired', updated_at = $1
            WHERE status = 'active' AND expires_at <= $1
            RETURNING *;
        "#,
    )
    .bind(now)
    .fetch_all(conn)
    .await?;
    Ok(policies)
}
