//! # SQLite database methods
//!
//! "Low-level" SQLite interactions, maintained as plain functions that accept a
//! `&mut SqliteConnection`. Callers can obtain a connection from a pool, or open a transaction
//! and pass `&mut tx` through unchanged, so multi-statement operations stay atomic.

use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod campaigns;
pub mod rules;
pub mod usage;

const SQLITE_DB_URL: &str = "sqlite://data/campaign_store.db";

pub fn db_url() -> String {
    let result = env::var("CDE_DATABASE_URL").unwrap_or_else(|_| {
        info!("CDE_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}
