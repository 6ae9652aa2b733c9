use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::db_types::{NewProfile, UserProfile};

pub async fn upsert_profile(
    profile: NewProfile,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<UserProfile, sqlx::Error> {
    let profile = sqlx::query_as(
        r#"
            INSERT INTO profiles (id, role, full_name, phone, verified, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            ON CONFLICT (id) DO UPDATE SET
                role = excluded.role,
                full_name = excluded.full_name,
                phone = excluded.phone,
                verified = excluded.verified,
                updated_at = excluded.updated_at
            RETURNING *;
        "#,
    )
    .bind(profile.id)
    .bind(profile.role)
    .bind(profile.full_name)
    .bind(profile.phone)
    .bind(profile.verified)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(profile)
}

pub async fn fetch_profile(id: &str, conn: &mut SqliteConnection) -> Result<Option<UserProfile>, sqlx::Error> {
    let profile = sqlx::query_as("SELECT * FROM profiles WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(profile)
}

pub async fn fetch_admin_ids(conn: &mut SqliteConnection) -> Result<Vec<String>, sqlx::Error> {
    let ids = sqlx::query_scalar("SELECT id FROM profiles WHERE role = 'admin' ORDER BY id").fetch_all(conn).await?;
    Ok(ids)
}

/// Adds one to the driver's delivery count and returns the new total. The increment happens in the database, so
/// concurrent releases never lose an update. A driver without a profile row gets a minimal one.
pub async fn increment_total_deliveries(
    driver_id: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let total = sqlx::query_scalar(
        r#"
            INSERT INTO profiles (id, role, total_deliveries, created_at, updated_at)
            VALUES ($1, 'driver', 1, $2, $2)
            ON CONFLICT (id) DO UPDATE SET
                total_deliveries = total_deliveries + 1,
                updated_at = excluded.updated_at
            RETURNING total_deliveries;
        "#,
    )
    .bind(driver_id)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(total)
}

/// Recomputes the driver's average from every rating they have received. Returns the new average, or `None` if the
/// driver has no profile.
pub async fn refresh_driver_rating(
    driver_id: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<f64>, sqlx::Error> {
    let rating = sqlx::query_scalar(
        r#"
            UPDATE profiles SET
                rating = COALESCE(
                    (SELECT AVG(driver_rating) FROM ratings WHERE driver_id = $1 AND driver_rating IS NOT NULL),
                    rating
                ),
                updated_at = $2
            WHERE id = $1
            RETURNING rating;
        "#,
    )
    .bind(driver_id)
    .bind(now)
    .fetch_optional(conn)
    .await?;
    Ok(rating)
}

pub async fn refresh_merchant_rating(
    merchant_id: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<f64>, sqlx::Error> {
    let rating = sqlx::query_scalar(
        r#"
            UPDATE profiles SET
                rating = COALESCE(
                    (SELECT AVG(merchant_rating) FROM ratings WHERE merchant_id = $1 AND merchant_rating IS NOT NULL),
                    rating
                ),
                updated_at = $2
            WHERE id = $1
            RETURNING rating;
        "#,
    )
    .bind(merchant_id)
    .bind(now)
    .fetch_optional(conn)
    .await?;
    Ok(rating)
}
