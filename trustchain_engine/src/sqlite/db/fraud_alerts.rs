use chrono::{DateTime, Utc};
use sqlx::{types::Json, QueryBuilder, SqliteConnection};

use crate::db_types::{FraudAlert, NewFraudAlert};

/// Inserts the alert unless an unresolved alert with the same type, user and order already exists.
///
/// Returns `None` when the alert was a duplicate.
pub async fn insert_if_new(
    alert: NewFraudAlert,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<FraudAlert>, sqlx::Error> {
    let alert_type = alert.alert_type().to_string();
    let severity = alert.severity();
    let alert = sqlx::query_as(
        r#"
            INSERT INTO fraud_alerts (user_id, order_id, alert_type, severity, details, created_at)
            SELECT $1, $2, $3, $4, $5, $6
            WHERE NOT EXISTS (
                SELECT 1 FROM fraud_alerts
                WHERE resolved = 0 AND user_id IS $1 AND order_id IS $2 AND alert_type = $3
            )
            RETURNING *;
        "#,
    )
    .bind(alert.user_id)
    .bind(alert.order_id)
    .bind(alert_type)
    .bind(severity)
    .bind(Json(alert.details))
    .bind(now)
    .fetch_optional(conn)
    .await?;
    Ok(alert)
}

pub async fn fetch_alert(id: i64, conn: &mut SqliteConnection) -> Result<Option<FraudAlert>, sqlx::Error> {
    let alert = sqlx::query_as("SELECT * FROM fraud_alerts WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(alert)
}

pub async fn search_alerts(
    unresolved_only: bool,
    user_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Vec<FraudAlert>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM fraud_alerts ");
    if unresolved_only || user_id.is_some() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if unresolved_only {
        where_clause.push("resolved = 0");
    }
    if let Some(uid) = user_id {
        where_clause.push("user_id = ");
        where_clause.push_bind_unseparated(uid);
    }
    builder.push(" ORDER BY created_at DESC, id DESC");
    let alerts = builder.build_query_as::<FraudAlert>().fetch_all(conn).await?;
    Ok(alerts)
}

/// Resolves the alert if it is still open. Returns `None` if it does not exist or was already resolved.
pub async fn resolve_alert(
    id: i64,
    admin_id: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<FraudAlert>, sqlx::Error> {
    let alert = sqlx::query_as(
        r#"
            UPDATE fraud_alerts SET resolved = 1, resolved_at = $1, resolved_by = $2
            WHERE id = $3 AND resolved = 0
            RETURNING *;
        "#,
    )
    .bind(now)
    .bind(admin_id)
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(alert)
}
