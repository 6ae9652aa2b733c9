use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderStatusType, PaymentStatusType, TrackingId},
    tce_api::order_objects::OrderQueryFilter,
    traits::LedgerError,
};

/// Inserts a new `pending` order. This is not atomic on its own; run it inside a transaction with the paired payment
/// insert.
///
/// A clash on the tracking id is reported as [`LedgerError::AlreadyExists`].
pub async fn insert_order(
    order: NewOrder,
    tracking_id: TrackingId,
    delivery_otp: String,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Order, LedgerError> {
    let pickup = order.pickup_location;
    let delivery = order.delivery_location;
    let result = sqlx::query_as(
        r#"
            INSERT INTO orders (
                customer_id,
                merchant_id,
                tracking_id,
                delivery_otp,
                pickup_address,
                delivery_address,
                pickup_lat,
                pickup_lng,
                delivery_lat,
                delivery_lng,
                payment_method,
                amount,
                notes,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14)
            RETURNING *;
        "#,
    )
    .bind(order.customer_id)
    .bind(order.merchant_id)
    .bind(tracking_id.as_str())
    .bind(delivery_otp)
    .bind(order.pickup_address)
    .bind(order.delivery_address)
    .bind(pickup.map(|p| p.lat))
    .bind(pickup.map(|p| p.lng))
    .bind(delivery.map(|p| p.lat))
    .bind(delivery.map(|p| p.lng))
    .bind(order.payment_method)
    .bind(order.amount)
    .bind(order.notes)
    .bind(now)
    .fetch_one(conn)
    .await;
    match result {
        Ok(order) => Ok(order),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            debug!("🗃️ Tracking id {tracking_id} is already in use");
            Err(LedgerError::AlreadyExists(format!("Tracking id {tracking_id}")))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_order(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_by_tracking_id(
    tracking_id: &TrackingId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE tracking_id = $1")
        .bind(tracking_id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in ascending order
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(cid) = query.customer_id {
        where_clause.push("customer_id = ");
        where_clause.push_bind_unseparated(cid);
    }
    if let Some(mid) = query.merchant_id {
        where_clause.push("merchant_id = ");
        where_clause.push_bind_unseparated(mid);
    }
    if let Some(did) = query.driver_id {
        where_clause.push("id IN (SELECT order_id FROM deliveries WHERE voided = 0 AND driver_id = ");
        where_clause.push_bind_unseparated(did);
        where_clause.push_unseparated(")");
    }
    if let Some(tracking_id) = query.tracking_id {
        where_clause.push("tracking_id = ");
        where_clause.push_bind_unseparated(tracking_id.0);
    }
    if let Some(statuses) = query.status.filter(|s| !s.is_empty()) {
        // Enum values, so safe to inline
        let status_clause = statuses.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
        where_clause.push(format!("status IN ({status_clause})"));
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC, id ASC");
    if let Some(limit) = query.limit {
        builder.push(" LIMIT ");
        builder.push_bind(limit);
    }
    trace!("🗃️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("🗃️ Result of search_orders: {}", orders.len());
    Ok(orders)
}

/// Moves the order to `new_status` if, and only if, its current status is one of `expected`.
///
/// Returns the updated order, or `None` if the order does not exist or was not in an expected state. The caller
/// decides which, typically by fetching the order afterwards.
pub async fn compare_and_set_status(
    id: i64,
    expected: &[OrderStatusType],
    new_status: OrderStatusType,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("UPDATE orders SET status = ");
    builder.push_bind(new_status);
    builder.push(", updated_at = ");
    builder.push_bind(now);
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(" AND status IN (");
    let mut statuses = builder.separated(", ");
    for status in expected {
        statuses.push_bind(*status);
    }
    statuses.push_unseparated(") RETURNING *");
    let order = builder.build_query_as::<Order>().fetch_optional(conn).await?;
    if let Some(o) = &order {
        trace!("🗃️ Order #{id} moved to {new_status} ({})", o.tracking_id);
    }
    Ok(order)
}

/// Mirrors the payment status onto the order row.
pub async fn set_payment_status(
    id: i64,
    status: PaymentStatusType,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Order, LedgerError> {
    let order: Option<Order> =
        sqlx::query_as("UPDATE orders SET payment_status = $1, updated_at = $2 WHERE id = $3 RETURNING *")
            .bind(status)
            .bind(now)
            .bind(id)
            .fetch_optional(conn)
            .await?;
    order.ok_or(LedgerError::OrderNotFound(id))
}

pub async fn count_orders_since(
    customer_id: &str,
    since: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE customer_id = $1 AND created_at >= $2")
        .bind(customer_id)
        .bind(since)
        .fetch_one(conn)
        .await?;
    Ok(count)
}

/// Cancelled is terminal, so `updated_at` on a cancelled order is the time of cancellation.
pub async fn count_cancellations_since(
    customer_id: &str,
    since: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let count = sqlx::query_scalar(
        "SELECT COUNT(*) FROM orders WHERE customer_id = $1 AND status = 'cancelled' AND updated_at >= $2",
    )
    .bind(customer_id)
    .bind(since)
    .fetch_one(conn)
    .await?;
    Ok(count)
}
