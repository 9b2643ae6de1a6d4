//! # SQLite database methods
//!
//! "Low-level" SQLite interactions for the reconciliation store.
//!
//! All interactions are plain functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool, or open a
//! transaction and pass `&mut *tx` when several calls need to be atomic together.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod bookings;
pub mod cleaners;
pub mod ledger;
pub mod payments;
pub mod subscriptions;

const SQLITE_DB_URL: &str = "sqlite://data/cleanpay_store.db";

pub fn db_url() -> String {
    let result = env::var("CPS_DATABASE_URL").unwrap_or_else(|_| {
        info!("CPS_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

/// SQLite allows a single writer, and pooled reader connections can serve stale WAL snapshots,
/// making a freshly committed row invisible to the next read. One shared connection keeps every
/// statement on the latest commit.
pub async fn new_pool(url: &str) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(1).connect(url).await?;
    Ok(pool)
}
