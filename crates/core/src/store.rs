//! Durable-store traits consumed by the orchestrator.
//!
//! The generation core never talks to Postgres directly; it is handed
//! trait objects implemented in `artforge-db`. Correctness under
//! concurrency depends on the `try_debit_*` methods being single atomic
//! conditional updates in the backing store (update-if-predicate, judged
//! by rows-affected), never an application-level read-then-write.

use async_trait::async_trait;

use crate::credit::CreditAccount;
use crate::job::{Job, JobStatus, NewJob, Tool};
use crate::types::DbId;

/// Errors from a store implementation.
///
/// These never surface to API callers: job persistence degrades to
/// untracked mode, and ledger store failures map to a 500 only when the
/// ledger cannot answer at all.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store is not reachable or not configured.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The backing database rejected the operation.
    #[error("Store operation failed: {0}")]
    Backend(String),
}

/// Filters and cursor for listing recent jobs.
#[derive(Debug, Clone, Default)]
pub struct JobListQuery {
    /// Maximum rows to return. Capped at 100 by the API layer.
    pub limit: i64,
    /// Exclusive upper bound on job id (cursor pagination, newest first).
    pub cursor: Option<DbId>,
    pub tool: Option<Tool>,
    pub status: Option<JobStatus>,
    /// Restrict to one user's jobs (hosted mode).
    pub user_id: Option<DbId>,
}

/// One page of jobs plus the cursor for the next page.
#[derive(Debug, Clone)]
pub struct JobPage {
    pub jobs: Vec<Job>,
    pub next_cursor: Option<DbId>,
    pub has_more: bool,
}

/// Durable repository for [`Job`] rows.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job in `Running` state and return the stored row.
    async fn create(&self, job: &NewJob) -> Result<Job, StoreError>;

    /// Move a running job to `Succeeded` and attach its results.
    ///
    /// Implementations must ignore jobs already in a terminal state.
    async fn complete(
        &self,
        job_id: DbId,
        result_url: Option<&str>,
        result_urls: &[String],
    ) -> Result<(), StoreError>;

    /// Move a running job to `Failed` with an error message.
    ///
    /// Implementations must ignore jobs already in a terminal state.
    async fn fail(&self, job_id: DbId, error: &str) -> Result<(), StoreError>;

    async fn find_by_id(&self, job_id: DbId) -> Result<Option<Job>, StoreError>;

    /// List jobs newest-first with cursor pagination.
    async fn list(&self, query: &JobListQuery) -> Result<JobPage, StoreError>;
}

/// Atomic conditional-update contract over [`CreditAccount`] rows.
#[async_trait]
pub trait CreditStore: Send + Sync {
    async fn fetch(&self, user_id: DbId) -> Result<Option<CreditAccount>, StoreError>;

    /// Increment `monthly_used` by 1 only if `monthly_used < monthly_alloc`.
    /// Returns whether the predicate held and the row was mutated.
    async fn try_debit_monthly(&self, user_id: DbId) -> Result<bool, StoreError>;

    /// Decrement `top_up_credits` by 1 only if `top_up_credits > 0`.
    /// Returns whether the predicate held and the row was mutated.
    async fn try_debit_top_up(&self, user_id: DbId) -> Result<bool, StoreError>;

    /// Reverse a monthly debit: decrement `monthly_used` by 1 (not below 0).
    async fn credit_monthly(&self, user_id: DbId) -> Result<(), StoreError>;

    /// Reverse a top-up debit: increment `top_up_credits` by 1.
    async fn credit_top_up(&self, user_id: DbId) -> Result<(), StoreError>;
}

/// Coarse monthly usage counter, independent of the HD ledger.
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Current period usage and plan limit for a user.
    async fn quota(&self, user_id: DbId) -> Result<QuotaSnapshot, StoreError>;

    /// Record one confirmed successful generation.
    async fn increment(&self, user_id: DbId) -> Result<(), StoreError>;
}

/// Usage snapshot returned by [`UsageStore::quota`].
#[derive(Debug, Clone)]
pub struct QuotaSnapshot {
    pub used: i64,
    pub limit: i64,
    pub plan_id: String,
}

/// Side-effect sink for publishing succeeded public jobs to the gallery.
#[async_trait]
pub trait GalleryStore: Send + Sync {
    async fn publish(&self, job: &Job) -> Result<(), StoreError>;
}
