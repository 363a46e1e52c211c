//! Repository for the `jobs` table.
//!
//! Terminal updates carry a `WHERE status = 'running'` predicate so a
//! job can never leave `succeeded`/`failed` -- the status machine's
//! monotonicity is enforced by the database, not by callers.

use async_trait::async_trait;
use sqlx::PgPool;

use artforge_core::job::{Job, JobStatus, NewJob};
use artforge_core::store::{JobListQuery, JobPage, JobStore, StoreError};
use artforge_core::types::DbId;

use crate::models::job::JobRow;
use crate::store_err;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, user_id, tool, status, provider, prompt, negative_prompt, \
    width, height, seed, result_url, result_urls, error_message, \
    is_public, created_at, updated_at";

/// Maximum page size for job listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for job listing.
const DEFAULT_LIMIT: i64 = 20;

/// Postgres-backed [`JobStore`].
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, job: &NewJob) -> Result<Job, StoreError> {
        let query = format!(
            "INSERT INTO jobs \
                 (user_id, tool, status, provider, prompt, negative_prompt, \
                  width, height, seed, result_urls, is_public) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, '{{}}', $10) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(job.user_id)
            .bind(job.tool.as_str())
            .bind(JobStatus::Running.as_str())
            .bind(&job.provider)
            .bind(&job.prompt)
            .bind(&job.negative_prompt)
            .bind(job.width)
            .bind(job.height)
            .bind(job.seed)
            .bind(job.is_public)
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;
        row.into_job()
    }

    async fn complete(
        &self,
        job_id: DbId,
        result_url: Option<&str>,
        result_urls: &[String],
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET status = $2, result_url = $3, result_urls = $4, updated_at = NOW() \
             WHERE id = $1 AND status = $5",
        )
        .bind(job_id)
        .bind(JobStatus::Succeeded.as_str())
        .bind(result_url)
        .bind(result_urls)
        .bind(JobStatus::Running.as_str())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        if result.rows_affected() == 0 {
            tracing::warn!(job_id, "Ignored complete() on a non-running job");
        }
        Ok(())
    }

    async fn fail(&self, job_id: DbId, error: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET status = $2, error_message = $3, updated_at = NOW() \
             WHERE id = $1 AND status = $4",
        )
        .bind(job_id)
        .bind(JobStatus::Failed.as_str())
        .bind(error)
        .bind(JobStatus::Running.as_str())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        if result.rows_affected() == 0 {
            tracing::warn!(job_id, "Ignored fail() on a non-running job");
        }
        Ok(())
    }

    async fn find_by_id(&self, job_id: DbId) -> Result<Option<Job>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row.map(JobRow::into_job).transpose()
    }

    async fn list(&self, params: &JobListQuery) -> Result<JobPage, StoreError> {
        let limit = if params.limit <= 0 {
            DEFAULT_LIMIT
        } else {
            params.limit.min(MAX_LIMIT)
        };

        // Build the WHERE clause and track the next bind parameter index.
        let mut conditions: Vec<String> = Vec::new();
        let mut bind_idx: u32 = 1;

        if params.user_id.is_some() {
            conditions.push(format!("user_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.cursor.is_some() {
            conditions.push(format!("id < ${bind_idx}"));
            bind_idx += 1;
        }
        if params.tool.is_some() {
            conditions.push(format!("tool = ${bind_idx}"));
            bind_idx += 1;
        }
        if params.status.is_some() {
            conditions.push(format!("status = ${bind_idx}"));
            bind_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        // Fetch one extra row to learn whether another page exists.
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             {where_clause} \
             ORDER BY id DESC \
             LIMIT ${bind_idx}"
        );

        let mut q = sqlx::query_as::<_, JobRow>(&query);
        if let Some(user_id) = params.user_id {
            q = q.bind(user_id);
        }
        if let Some(cursor) = params.cursor {
            q = q.bind(cursor);
        }
        if let Some(tool) = params.tool {
            q = q.bind(tool.as_str());
        }
        if let Some(status) = params.status {
            q = q.bind(status.as_str());
        }
        q = q.bind(limit + 1);

        let rows = q.fetch_all(&self.pool).await.map_err(store_err)?;

        let has_more = rows.len() as i64 > limit;
        let jobs: Vec<Job> = rows
            .into_iter()
            .take(limit as usize)
            .map(JobRow::into_job)
            .collect::<Result<_, _>>()?;
        let next_cursor = if has_more {
            jobs.last().map(|j| j.id)
        } else {
            None
        };

        Ok(JobPage {
            jobs,
            next_cursor,
            has_more,
        })
    }
}
