//! Job entity and its status state machine.
//!
//! A [`Job`] records a single generation attempt. Status transitions are
//! monotonic: `Running -> Succeeded | Failed`, never backward. The
//! Postgres repository additionally guards terminal updates with a
//! `WHERE status = 'running'` predicate so a late writer cannot move a
//! job out of a terminal state.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// The generation tool requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Generate,
    Animate,
    Rotate,
    Inpaint,
    Scene,
}

impl Tool {
    /// Stable string form used in the database and API payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tool::Generate => "generate",
            Tool::Animate => "animate",
            Tool::Rotate => "rotate",
            Tool::Inpaint => "inpaint",
            Tool::Scene => "scene",
        }
    }

    /// Parse a tool name, rejecting unknown values with a validation error.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "generate" => Ok(Tool::Generate),
            "animate" => Ok(Tool::Animate),
            "rotate" => Ok(Tool::Rotate),
            "inpaint" => Ok(Tool::Inpaint),
            "scene" => Ok(Tool::Scene),
            other => Err(CoreError::Validation(format!(
                "Invalid tool '{other}'. Must be one of: generate, animate, rotate, inpaint, scene"
            ))),
        }
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "running" => Ok(JobStatus::Running),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            other => Err(CoreError::Validation(format!(
                "Invalid job status '{other}'. Must be one of: running, succeeded, failed"
            ))),
        }
    }

    /// `Succeeded` and `Failed` are final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    /// Whether a transition from `self` to `next` is legal.
    ///
    /// Only `Running -> Succeeded` and `Running -> Failed` are allowed.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(self, JobStatus::Running) && next.is_terminal()
    }
}

/// One persisted generation attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: DbId,
    /// Owning user. `None` for anonymous requests in self-hosted mode.
    pub user_id: Option<DbId>,
    pub tool: Tool,
    pub status: JobStatus,
    pub provider: String,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub width: i32,
    pub height: i32,
    pub seed: Option<i64>,
    /// Set only when `status == Succeeded`.
    pub result_url: Option<String>,
    pub result_urls: Vec<String>,
    /// Set only when `status == Failed`.
    pub error_message: Option<String>,
    pub is_public: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Fields needed to create a `running` job row at orchestration start.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub user_id: Option<DbId>,
    pub tool: Tool,
    pub provider: String,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub width: i32,
    pub height: i32,
    pub seed: Option<i64>,
    pub is_public: bool,
}
