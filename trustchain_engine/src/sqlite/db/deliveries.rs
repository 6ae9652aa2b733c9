use chrono::{DateTime, Utc};
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Delivery, LocationUpdate},
    traits::LedgerError,
};

/// Creates the active delivery for the order. The partial unique index on `order_id` guarantees there is at most one.
pub async fn insert_delivery(
    order_id: i64,
    driver_id: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Delivery, LedgerError> {
    let result = sqlx::query_as(
        r#"
            INSERT INTO deliveries (order_id, driver_id, assigned_at, created_at, updated_at)
            VALUES ($1, $2, $3, $3, $3)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(driver_id)
    .bind(now)
    .fetch_one(conn)
    .await;
    match result {
        Ok(delivery) => Ok(delivery),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(LedgerError::AlreadyExists(format!("An active delivery for order {order_id}")))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_active_delivery(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Delivery>, sqlx::Error> {
    let delivery = sqlx::query_as("SELECT * FROM deliveries WHERE order_id = $1 AND voided = 0")
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(delivery)
}

pub async fn fetch_delivery(id: i64, conn: &mut SqliteConnection) -> Result<Option<Delivery>, sqlx::Error> {
    let delivery = sqlx::query_as("SELECT * FROM deliveries WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(delivery)
}

/// Sets `picked_up_at` if it has not been set before.
pub async fn mark_picked_up(
    delivery_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Delivery, LedgerError> {
    let delivery: Option<Delivery> = sqlx::query_as(
        "UPDATE deliveries SET picked_up_at = COALESCE(picked_up_at, $1), updated_at = $1 WHERE id = $2 RETURNING *",
    )
    .bind(now)
    .bind(delivery_id)
    .fetch_optional(conn)
    .await?;
    delivery.ok_or(LedgerError::DeliveryNotFound(delivery_id))
}

/// Marks the active delivery as handed over, but only if every condition for a successful handoff holds at the moment
/// of writing: the driver is the assigned one, the code has not already been verified, the driver is not locked out,
/// the order is in transit, and `otp` matches the order's code.
///
/// Returns `None` if any of these fails. Nothing is written in that case.
pub async fn verify_otp(
    order_id: i64,
    driver_id: &str,
    otp: &str,
    max_attempts: u32,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Delivery>, sqlx::Error> {
    let delivery = sqlx::query_as(
        r#"
            UPDATE deliveries SET otp_verified = 1, delivered_at = $1, updated_at = $1
            WHERE order_id = $2
              AND voided = 0
              AND driver_id = $3
              AND otp_verified = 0
              AND otp_failed_attempts < $4
              AND EXISTS (
                SELECT 1 FROM orders o
                WHERE o.id = deliveries.order_id AND o.status = 'in_transit' AND o.delivery_otp = $5
              )
            RETURNING *;
        "#,
    )
    .bind(now)
    .bind(order_id)
    .bind(driver_id)
    .bind(i64::from(max_attempts))
    .bind(otp)
    .fetch_optional(conn)
    .await?;
    Ok(delivery)
}

pub async fn record_failed_otp(
    delivery_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Delivery, LedgerError> {
    let delivery: Option<Delivery> = sqlx::query_as(
        r#"
            UPDATE deliveries SET otp_failed_attempts = otp_failed_attempts + 1, updated_at = $1
            WHERE id = $2
            RETURNING *;
        "#,
    )
    .bind(now)
    .bind(delivery_id)
    .fetch_optional(conn)
    .await?;
    let delivery = delivery.ok_or(LedgerError::DeliveryNotFound(delivery_id))?;
    trace!("🗃️ Delivery #{delivery_id} has {} failed code attempts", delivery.otp_failed_attempts);
    Ok(delivery)
}

pub async fn reset_otp_attempts(
    order_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Delivery>, sqlx::Error> {
    let delivery = sqlx::query_as(
        "UPDATE deliveries SET otp_failed_attempts = 0, updated_at = $1 WHERE order_id = $2 AND voided = 0 RETURNING *",
    )
    .bind(now)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(delivery)
}

/// Voids the order's active delivery, if it has one. The row is kept for the audit trail.
pub async fn void_active_delivery(
    order_id: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Delivery>, sqlx::Error> {
    let delivery = sqlx::query_as(
        r#"
            UPDATE deliveries SET voided = 1, voided_at = $1, updated_at = $1
            WHERE order_id = $2 AND voided = 0
            RETURNING *;
        "#,
    )
    .bind(now)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    Ok(delivery)
}

/// Stores the position only if the delivery belongs to `driver_id`, its order is in transit, and the reading is
/// strictly newer than the last one stored. Returns `None` otherwise.
pub async fn update_location(
    driver_id: &str,
    update: &LocationUpdate,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Delivery>, sqlx::Error> {
    let delivery = sqlx::query_as(
        r#"
            UPDATE deliveries SET current_lat = $1, current_lng = $2, last_location_update = $3, updated_at = $4
            WHERE id = $5
              AND voided = 0
              AND driver_id = $6
              AND (last_location_update IS NULL OR last_location_update < $3)
              AND EXISTS (SELECT 1 FROM orders o WHERE o.id = deliveries.order_id AND o.status = 'in_transit')
            RETURNING *;
        "#,
    )
    .bind(update.position.lat)
    .bind(update.position.lng)
    .bind(update.recorded_at)
    .bind(now)
    .bind(update.delivery_id)
    .bind(driver_id)
    .fetch_optional(conn)
    .await?;
    Ok(delivery)
}
