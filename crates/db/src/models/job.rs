//! Row type for the `jobs` table.

use sqlx::FromRow;

use artforge_core::job::{Job, JobStatus, Tool};
use artforge_core::store::StoreError;
use artforge_core::types::{DbId, Timestamp};

/// A row from the `jobs` table. Status and tool are stored as their
/// stable string forms; result URLs as a TEXT[] column.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: DbId,
    pub user_id: Option<DbId>,
    pub tool: String,
    pub status: String,
    pub provider: String,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub width: i32,
    pub height: i32,
    pub seed: Option<i64>,
    pub result_url: Option<String>,
    pub result_urls: Vec<String>,
    pub error_message: Option<String>,
    pub is_public: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl JobRow {
    /// Convert into the domain type, rejecting rows with unknown
    /// tool/status strings as backend corruption.
    pub fn into_job(self) -> Result<Job, StoreError> {
        let tool = Tool::parse(&self.tool)
            .map_err(|e| StoreError::Backend(format!("corrupt jobs row {}: {e}", self.id)))?;
        let status = JobStatus::parse(&self.status)
            .map_err(|e| StoreError::Backend(format!("corrupt jobs row {}: {e}", self.id)))?;

        Ok(Job {
            id: self.id,
            user_id: self.user_id,
            tool,
            status,
            provider: self.provider,
            prompt: self.prompt,
            negative_prompt: self.negative_prompt,
            width: self.width,
            height: self.height,
            seed: self.seed,
            result_url: self.result_url,
            result_urls: self.result_urls,
            error_message: self.error_message,
            is_public: self.is_public,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
