//! Repository for the public gallery.
//!
//! The orchestrator publishes at most one gallery asset per job, and
//! only for a succeeded public job; the unique constraint on `job_id`
//! backs that up.

use async_trait::async_trait;
use sqlx::PgPool;

use artforge_core::job::Job;
use artforge_core::store::{GalleryStore, StoreError};

use crate::store_err;

/// Postgres-backed [`GalleryStore`].
#[derive(Clone)]
pub struct PgGalleryStore {
    pool: PgPool,
}

impl PgGalleryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GalleryStore for PgGalleryStore {
    async fn publish(&self, job: &Job) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO gallery_assets (job_id, user_id, tool, prompt, result_url) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (job_id) DO NOTHING",
        )
        .bind(job.id)
        .bind(job.user_id)
        .bind(job.tool.as_str())
        .bind(&job.prompt)
        .bind(&job.result_url)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }
}
