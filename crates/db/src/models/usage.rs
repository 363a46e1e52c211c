//! Row type for quota lookups (users x plans x usage_counters).

use sqlx::FromRow;

use artforge_core::store::QuotaSnapshot;

#[derive(Debug, Clone, FromRow)]
pub struct QuotaRow {
    pub used: i64,
    pub plan_limit: i64,
    pub plan_id: String,
}

impl From<QuotaRow> for QuotaSnapshot {
    fn from(row: QuotaRow) -> Self {
        QuotaSnapshot {
            used: row.used,
            limit: row.plan_limit,
            plan_id: row.plan_id,
        }
    }
}
