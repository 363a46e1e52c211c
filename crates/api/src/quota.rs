//! The usage quota gate: coarse monthly generation-count limit,
//! checked before any work begins.
//!
//! Hosted mode only. Self-hosted installs have no quota -- BYOK users
//! pay their own provider bills.

use std::sync::Arc;

use artforge_core::error::CoreError;
use artforge_core::quota::{self, QuotaStatus};
use artforge_core::store::UsageStore;
use artforge_core::types::DbId;
use artforge_providers::resolver::ServerMode;

use crate::error::AppError;

#[derive(Clone)]
pub struct QuotaGate {
    mode: ServerMode,
    usage: Option<Arc<dyn UsageStore>>,
}

impl QuotaGate {
    pub fn new(mode: ServerMode, usage: Option<Arc<dyn UsageStore>>) -> Self {
        Self { mode, usage }
    }

    /// Check the user's monthly quota before any provider call or
    /// credit reservation.
    ///
    /// Returns `Ok(None)` when no quota applies (self-hosted mode).
    /// Hosted mode requires an authenticated user and rejects with
    /// `QuotaExceeded` when the plan limit is reached.
    pub async fn check(&self, user_id: Option<DbId>) -> Result<Option<QuotaStatus>, AppError> {
        if self.mode != ServerMode::Hosted {
            return Ok(None);
        }

        let usage = self.usage.as_ref().ok_or_else(|| {
            AppError::InternalError("hosted mode requires a usage store".into())
        })?;
        let user_id = user_id.ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized("Authentication required".into()))
        })?;

        let snapshot = usage
            .quota(user_id)
            .await
            .map_err(|e| AppError::InternalError(format!("quota lookup failed: {e}")))?;

        let status = quota::evaluate(&snapshot);
        if !status.allowed {
            return Err(AppError::Core(CoreError::QuotaExceeded {
                used: status.used,
                limit: status.limit,
            }));
        }
        Ok(Some(status))
    }

    /// Record one confirmed success. Called only after the adapter
    /// returned a result -- a failed generation never consumes quota.
    /// Counter errors are logged, not surfaced.
    pub async fn record_success(&self, user_id: Option<DbId>) {
        if self.mode != ServerMode::Hosted {
            return;
        }
        let (Some(usage), Some(user_id)) = (self.usage.as_ref(), user_id) else {
            return;
        };
        if let Err(e) = usage.increment(user_id).await {
            tracing::warn!(user_id, error = %e, "Failed to increment usage counter");
        }
    }
}
