//! Repository for the monthly usage counters.
//!
//! Counts live in `usage_counters(user_id, period_start, count)` with
//! one row per user per calendar month; plan limits come from the
//! user's plan row.

use async_trait::async_trait;
use sqlx::PgPool;

use artforge_core::store::{QuotaSnapshot, StoreError, UsageStore};
use artforge_core::types::DbId;

use crate::models::usage::QuotaRow;
use crate::store_err;

/// Postgres-backed [`UsageStore`].
#[derive(Clone)]
pub struct PgUsageStore {
    pool: PgPool,
}

impl PgUsageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsageStore for PgUsageStore {
    async fn quota(&self, user_id: DbId) -> Result<QuotaSnapshot, StoreError> {
        let row = sqlx::query_as::<_, QuotaRow>(
            "SELECT COALESCE(uc.count, 0) AS used, \
                    p.monthly_generation_limit AS plan_limit, \
                    p.id AS plan_id \
             FROM users u \
             JOIN plans p ON p.id = u.plan_id \
             LEFT JOIN usage_counters uc \
               ON uc.user_id = u.id \
              AND uc.period_start = date_trunc('month', NOW())::date \
             WHERE u.id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row.map(QuotaSnapshot::from)
            .ok_or_else(|| StoreError::Backend(format!("user {user_id} has no plan row")))
    }

    async fn increment(&self, user_id: DbId) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO usage_counters (user_id, period_start, count) \
             VALUES ($1, date_trunc('month', NOW())::date, 1) \
             ON CONFLICT (user_id, period_start) \
             DO UPDATE SET count = usage_counters.count + 1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }
}
