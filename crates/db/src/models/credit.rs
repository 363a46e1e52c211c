//! Row type for the `credit_accounts` table.

use sqlx::FromRow;

use artforge_core::credit::CreditAccount;
use artforge_core::types::DbId;

#[derive(Debug, Clone, FromRow)]
pub struct CreditAccountRow {
    pub user_id: DbId,
    pub monthly_alloc: i64,
    pub monthly_used: i64,
    pub top_up_credits: i64,
}

impl From<CreditAccountRow> for CreditAccount {
    fn from(row: CreditAccountRow) -> Self {
        CreditAccount {
            user_id: row.user_id,
            monthly_alloc: row.monthly_alloc,
            monthly_used: row.monthly_used,
            top_up_credits: row.top_up_credits,
        }
    }
}
