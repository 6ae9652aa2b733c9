use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewRating, Rating},
    traits::LedgerError,
};

/// Stores the rating against the order's driver and merchant. Only the order's customer may rate, only once, and
/// only after delivery; the insert writes nothing otherwise and `None` is returned.
pub async fn insert_rating(
    rating: NewRating,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Rating>, LedgerError> {
    let order_id = rating.order_id;
    let result = sqlx::query_as(
        r#"
            INSERT INTO ratings (
                order_id,
                customer_id,
                driver_id,
                merchant_id,
                driver_rating,
                merchant_rating,
                driver_review,
                merchant_review,
                created_at
            )
            SELECT o.id, o.customer_id, d.driver_id, o.merchant_id, $3, $4, $5, $6, $7
            FROM orders o LEFT JOIN deliveries d ON d.order_id = o.id AND d.voided = 0
            WHERE o.id = $1 AND o.customer_id = $2 AND o.status = 'delivered'
            RETURNING *;
        "#,
    )
    .bind(rating.order_id)
    .bind(rating.customer_id)
    .bind(rating.driver_rating)
    .bind(rating.merchant_rating)
    .bind(rating.driver_review)
    .bind(rating.merchant_review)
    .bind(now)
    .fetch_optional(conn)
    .await;
    match result {
        Ok(rating) => Ok(rating),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(LedgerError::AlreadyExists(format!("A rating for order {order_id}")))
        },
        Err(e) => Err(e.into()),
    }
}
