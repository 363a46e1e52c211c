//! Handlers for the image generation endpoint.
//!
//! Routes:
//! - `POST /generate` -- run one generation through the orchestrator
//! - `GET  /generate` -- list recent jobs with cursor pagination

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use artforge_core::error::CoreError;
use artforge_core::job::{Job, JobStatus, Tool};
use artforge_core::store::JobListQuery;
use artforge_core::types::DbId;
use artforge_providers::resolver::ServerMode;

use crate::auth::OptionalAuthUser;
use crate::error::{AppError, AppResult};
use crate::orchestrator::{self, GenerateRequest, GenerationFailure};
use crate::state::AppState;

/// Success body of `POST /generate`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub ok: bool,
    /// Terminal job record; `null` when running untracked.
    pub job: Option<Job>,
    pub result_url: Option<String>,
    pub result_urls: Vec<String>,
    pub duration_ms: u64,
    pub resolved_seed: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits_remaining: Option<i64>,
}

/// POST /api/v1/generate
pub async fn create(
    State(state): State<AppState>,
    OptionalAuthUser(user): OptionalAuthUser,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, GenerationFailure> {
    let user_id = user.map(|u| u.user_id);
    let success = orchestrator::run_generate(&state, user_id, request).await?;

    Ok(Json(GenerateResponse {
        ok: true,
        result_url: success.result.result_url.clone(),
        result_urls: success.result.result_urls.clone(),
        duration_ms: success.result.duration_ms,
        resolved_seed: success.result.resolved_seed,
        credits_remaining: success.credits_remaining,
        job: success.job,
    }))
}

/// Query parameters for `GET /generate`.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Maximum number of results. Defaults to 20, capped at 100.
    pub limit: Option<i64>,
    /// Exclusive upper bound on job id from a previous page.
    pub cursor: Option<DbId>,
    pub tool: Option<String>,
    pub status: Option<String>,
}

/// Response body of `GET /generate`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub jobs: Vec<Job>,
    pub next_cursor: Option<DbId>,
    pub has_more: bool,
}

/// GET /api/v1/generate
///
/// Hosted mode scopes the listing to the authenticated user;
/// self-hosted mode lists everything. Without a job store the listing
/// is empty rather than an error.
pub async fn list(
    State(state): State<AppState>,
    OptionalAuthUser(user): OptionalAuthUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ListResponse>> {
    let user_filter = match state.resolver.mode() {
        ServerMode::Hosted => {
            let user = user.ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized("Authentication required".into()))
            })?;
            Some(user.user_id)
        }
        ServerMode::SelfHosted => None,
    };

    let Some(jobs) = &state.jobs else {
        return Ok(Json(ListResponse {
            jobs: Vec::new(),
            next_cursor: None,
            has_more: false,
        }));
    };

    let tool = query.tool.as_deref().map(Tool::parse).transpose()?;
    let status = query.status.as_deref().map(JobStatus::parse).transpose()?;

    let page = jobs
        .list(&JobListQuery {
            limit: query.limit.unwrap_or(20).clamp(1, 100),
            cursor: query.cursor,
            tool,
            status,
            user_id: user_filter,
        })
        .await
        .map_err(|e| AppError::InternalError(format!("job listing failed: {e}")))?;

    Ok(Json(ListResponse {
        jobs: page.jobs,
        next_cursor: page.next_cursor,
        has_more: page.has_more,
    }))
}
