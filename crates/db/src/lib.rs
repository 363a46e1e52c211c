//! Postgres implementations of the `artforge-core` store traits.
//!
//! Every cross-request invariant (credit ledger, terminal job states,
//! usage counters) is enforced by single-statement conditional updates
//! judged via `rows_affected()`, so multiple server instances can share
//! one database without application-level locking.

pub mod models;
pub mod repositories;

use artforge_core::store::StoreError;
use sqlx::postgres::PgPoolOptions;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Verify the database answers a trivial query.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Map a sqlx failure into the store-trait error space.
pub(crate) fn store_err(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(err.to_string())
        }
        other => StoreError::Backend(other.to_string()),
    }
}
