//! # SQLite database methods
//!
//! This module contains the "low-level" SQLite interactions of the marketplace.
//!
//! Every interaction is a plain function (rather than a method on a stateful struct) that accepts a
//! `&mut SqliteConnection`. Callers can pass a pooled connection, or open a transaction with `pool.begin()` and pass
//! that instead, which is how the backend composes a status write, its ledger side effects and its audit rows into a
//! single atomic unit.
//!
//! Timestamps are always bound explicitly from the caller's clock rather than taken from SQLite, so that tests with a
//! fixed clock see consistent values.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod addresses;
pub mod catalog;
pub mod ledger;
pub mod orders;
pub mod payments;
pub mod refunds;
pub mod settlement;
pub mod transactions;
pub mod vouchers;

const SQLITE_DB_URL: &str = "sqlite://data/marketplace.db";

pub fn db_url() -> String {
    let result = env::var("MKT_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ MKT_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}
