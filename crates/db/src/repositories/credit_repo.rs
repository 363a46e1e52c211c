//! Repository for the `credit_accounts` table.
//!
//! Every debit is a single conditional UPDATE whose predicate and
//! mutation execute together in Postgres, so concurrent requests for
//! the same user cannot both observe headroom and both spend it. The
//! application layer never does read-compare-write on these balances.

use async_trait::async_trait;
use sqlx::PgPool;

use artforge_core::credit::CreditAccount;
use artforge_core::store::{CreditStore, StoreError};
use artforge_core::types::DbId;

use crate::models::credit::CreditAccountRow;
use crate::store_err;

/// Postgres-backed [`CreditStore`].
#[derive(Clone)]
pub struct PgCreditStore {
    pool: PgPool,
}

impl PgCreditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CreditStore for PgCreditStore {
    async fn fetch(&self, user_id: DbId) -> Result<Option<CreditAccount>, StoreError> {
        let row = sqlx::query_as::<_, CreditAccountRow>(
            "SELECT user_id, monthly_alloc, monthly_used, top_up_credits \
             FROM credit_accounts WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(row.map(CreditAccount::from))
    }

    async fn try_debit_monthly(&self, user_id: DbId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE credit_accounts \
             SET monthly_used = monthly_used + 1, updated_at = NOW() \
             WHERE user_id = $1 AND monthly_used < monthly_alloc",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn try_debit_top_up(&self, user_id: DbId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE credit_accounts \
             SET top_up_credits = top_up_credits - 1, updated_at = NOW() \
             WHERE user_id = $1 AND top_up_credits > 0",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn credit_monthly(&self, user_id: DbId) -> Result<(), StoreError> {
        // The floor guard keeps a duplicate refund from driving the
        // counter negative.
        sqlx::query(
            "UPDATE credit_accounts \
             SET monthly_used = monthly_used - 1, updated_at = NOW() \
             WHERE user_id = $1 AND monthly_used > 0",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn credit_top_up(&self, user_id: DbId) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE credit_accounts \
             SET top_up_credits = top_up_credits + 1, updated_at = NOW() \
             WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }
}
