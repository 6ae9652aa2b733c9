use chrono::{DateTime, Utc};
use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::db_types::{Order, Payment, PaymentStatusType};

/// Creates the `pending` payment that accompanies a new order.
pub async fn insert_payment(order: &Order, now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Payment, sqlx::Error> {
    let payment = sqlx::query_as(
        r#"
            INSERT INTO payments (order_id, customer_id, merchant_id, amount, payment_method, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING *;
        "#,
    )
    .bind(order.id)
    .bind(&order.customer_id)
    .bind(&order.merchant_id)
    .bind(order.amount)
    .bind(order.payment_method)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(payment)
}

pub async fn fetch_payment_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment =
        sqlx::query_as("SELECT * FROM payments WHERE order_id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(payment)
}

/// Moves the order's payment to `new_status` if its current status is one of `expected`. If `transaction_ref` is
/// given, it is stored at the same time.
///
/// Not for releases: use [`release_if_eligible`], which also stamps `released_at`.
pub async fn compare_and_set_status(
    order_id: i64,
    expected: &[PaymentStatusType],
    new_status: PaymentStatusType,
    transaction_ref: Option<&str>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let mut builder = QueryBuilder::new("UPDATE payments SET status = ");
    builder.push_bind(new_status);
    builder.push(", transaction_ref = COALESCE(");
    builder.push_bind(transaction_ref);
    builder.push(", transaction_ref), updated_at = ");
    builder.push_bind(now);
    builder.push(" WHERE order_id = ");
    builder.push_bind(order_id);
    builder.push(" AND status IN (");
    let mut statuses = builder.separated(", ");
    for status in expected {
        statuses.push_bind(*status);
    }
    statuses.push_unseparated(") RETURNING *");
    let payment = builder.build_query_as::<Payment>().fetch_optional(conn).await?;
    if payment.is_some() {
        trace!("🗃️ Payment for order #{order_id} moved to {new_status}");
    }
    Ok(payment)
}

/// Stores the gateway reference on a payment that is still `pending`.
pub async fn set_transaction_ref(
    order_id: i64,
    transaction_ref: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as(
        r#"
            UPDATE payments SET transaction_ref = $1, updated_at = $2
            WHERE order_id = $3 AND status = 'pending'
            RETURNING *;
        "#,
    )
    .bind(transaction_ref)
    .bind(now)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}

/// held_escrow → released, in a single statement that also checks that the order is delivered and that its active
/// delivery belongs to `driver_id` and has a verified code.
///
/// Returns `None` if any precondition fails.
pub async fn release_if_eligible(
    order_id: i64,
    driver_id: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment = sqlx::query_as(
        r#"
            UPDATE payments SET status = 'released', released_at = $1, driver_id = $2, updated_at = $1
            WHERE order_id = $3
              AND status = 'held_escrow'
              AND EXISTS (SELECT 1 FROM orders o WHERE o.id = payments.order_id AND o.status = 'delivered')
              AND EXISTS (
                SELECT 1 FROM deliveries d
                WHERE d.order_id = payments.order_id AND d.voided = 0 AND d.otp_verified = 1 AND d.driver_id = $2
              )
            RETURNING *;
        "#,
    )
    .bind(now)
    .bind(driver_id)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}
