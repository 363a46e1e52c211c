//! Monthly generation-count quota evaluation.
//!
//! This is the coarse per-plan limit checked before any work begins,
//! independent of the HD-credit ledger. A limit of zero or less means
//! the plan is unlimited.

use serde::Serialize;

use crate::store::QuotaSnapshot;

/// Result of evaluating a user's quota ahead of a generation.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaStatus {
    pub allowed: bool,
    pub used: i64,
    pub limit: i64,
    pub plan_id: String,
}

/// Evaluate a usage snapshot against its plan limit.
pub fn evaluate(snapshot: &QuotaSnapshot) -> QuotaStatus {
    let unlimited = snapshot.limit <= 0;
    QuotaStatus {
        allowed: unlimited || snapshot.used < snapshot.limit,
        used: snapshot.used,
        limit: snapshot.limit,
        plan_id: snapshot.plan_id.clone(),
    }
}
