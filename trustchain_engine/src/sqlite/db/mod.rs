//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interaction are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool,
//! or create an atomic transaction as the need arises and call through to the functions without any other changes.
//!
//! Status changes go through the `compare_and_set_*` functions, which only touch a row whose current status is one of
//! the expected values, and return `None` otherwise. Inside a transaction, the first statement should be the guarded
//! write so that the transaction holds the write lock before it reads anything.
use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod activity;
pub mod deliveries;
pub mod fraud_alerts;
pub mod insurance;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod profiles;
pub mod ratings;

const SQLITE_DB_URL: &str = "sqlite://data/trustchain.db";

pub fn db_url() -> String {
    let result = env::var("TC_DATABASE_URL").unwrap_or_else(|_| {
        info!("TC_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

/// Writers queue on the database lock for up to this long before giving up with a "database is locked" error.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
