use chrono::{DateTime, Utc};
use log::trace;
use sqlx::{types::Json, SqliteConnection};

use crate::db_types::{ActivityLog, NewActivity};

/// Appends an entry to the audit trail. The table rejects updates and deletes.
pub async fn append(
    activity: NewActivity,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<ActivityLog, sqlx::Error> {
    let action = activity.details.action();
    let entry: ActivityLog = sqlx::query_as(
        r#"
            INSERT INTO activity_logs (order_id, user_id, action, details, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(activity.order_id)
    .bind(activity.user_id)
    .bind(action)
    .bind(Json(activity.details))
    .bind(now)
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Activity #{} logged: {}", entry.id, entry.action);
    Ok(entry)
}

pub async fn fetch_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<ActivityLog>, sqlx::Error> {
    let entries = sqlx::query_as("SELECT * FROM activity_logs WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(entries)
}
