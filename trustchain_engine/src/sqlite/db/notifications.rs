use chrono::{DateTime, Utc};
use sqlx::{types::Json, SqliteConnection};

use crate::db_types::{NewNotification, Notification};

pub async fn insert_notification(
    notification: NewNotification,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Notification, sqlx::Error> {
    let notification = sqlx::query_as(
        r#"
            INSERT INTO notifications (user_id, kind, title, message, data, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(notification.user_id)
    .bind(notification.kind)
    .bind(notification.title)
    .bind(notification.message)
    .bind(Json(notification.data))
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(notification)
}

pub async fn fetch_notification(id: i64, conn: &mut SqliteConnection) -> Result<Option<Notification>, sqlx::Error> {
    let notification =
        sqlx::query_as("SELECT * FROM notifications WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(notification)
}

pub async fn fetch_for_user(
    user_id: &str,
    unread_only: bool,
    conn: &mut SqliteConnection,
) -> Result<Vec<Notification>, sqlx::Error> {
    let sql = if unread_only {
        "SELECT * FROM notifications WHERE user_id = $1 AND read = 0 ORDER BY created_at DESC, id DESC"
    } else {
        "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
    };
    let notifications = sqlx::query_as(sql).bind(user_id).fetch_all(conn).await?;
    Ok(notifications)
}

/// Marks the notification as read if it belongs to `user_id`. The first `read_at` is kept on repeat calls.
pub async fn mark_read(
    id: i64,
    user_id: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Notification>, sqlx::Error> {
    let notification = sqlx::query_as(
        r#"
            UPDATE notifications SET read = 1, read_at = COALESCE(read_at, $1)
            WHERE id = $2 AND user_id = $3
            RETURNING *;
        "#,
    )
    .bind(now)
    .bind(id)
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    Ok(notification)
}
