//! Best-effort job lifecycle persistence.
//!
//! The tracker wraps `Option<Arc<dyn JobStore>>`: when no store is
//! configured, or the store errors, the request proceeds untracked. A
//! persistence failure is logged and swallowed -- it must never mask
//! the generation outcome returned to the caller.

use std::sync::Arc;

use artforge_core::job::{Job, JobStatus, NewJob};
use artforge_core::store::JobStore;
use artforge_providers::adapter::GenerateResult;

/// Persists a job through `running -> succeeded | failed`.
#[derive(Clone)]
pub struct JobTracker {
    store: Option<Arc<dyn JobStore>>,
}

impl JobTracker {
    pub fn new(store: Option<Arc<dyn JobStore>>) -> Self {
        Self { store }
    }

    /// Create a `running` job record.
    ///
    /// Returns `None` when persistence is unavailable; the orchestrator
    /// continues in degraded, untracked mode without failing the
    /// request.
    pub async fn start(&self, new_job: &NewJob) -> Option<Job> {
        let store = self.store.as_ref()?;
        match store.create(new_job).await {
            Ok(job) => Some(job),
            Err(e) => {
                tracing::warn!(error = %e, "Job persistence unavailable, continuing untracked");
                None
            }
        }
    }

    /// Patch the terminal success fields onto a tracked job.
    ///
    /// Returns the job updated in memory so the response reflects the
    /// terminal state even if the store write failed.
    pub async fn complete(&self, job: Option<Job>, result: &GenerateResult) -> Option<Job> {
        let mut job = job?;
        if let Some(store) = &self.store {
            if let Err(e) = store
                .complete(job.id, result.result_url.as_deref(), &result.result_urls)
                .await
            {
                tracing::warn!(job_id = job.id, error = %e, "Failed to persist job completion");
            }
        }
        job.status = JobStatus::Succeeded;
        job.result_url = result.result_url.clone();
        job.result_urls = result.result_urls.clone();
        Some(job)
    }

    /// Patch the terminal failure fields onto a tracked job.
    pub async fn fail(&self, job: Option<Job>, error: &str) -> Option<Job> {
        let mut job = job?;
        if let Some(store) = &self.store {
            if let Err(e) = store.fail(job.id, error).await {
                tracing::warn!(job_id = job.id, error = %e, "Failed to persist job failure");
            }
        }
        job.status = JobStatus::Failed;
        job.error_message = Some(error.to_string());
        Some(job)
    }
}
