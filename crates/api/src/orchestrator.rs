//! The generation request orchestrator.
//!
//! One inbound request walks `Validating -> QuotaChecking ->
//! ProviderResolving -> [CreditReserving] -> Generating -> Persisting
//! -> Responding`, with a typed failure exit from every state. The
//! credit-reserving state exists only on the HD voice path; any failure
//! at or after it refunds the reservation before the error is returned.
//!
//! Client disconnects must not cancel this sequence: abandoning it
//! between reserve and commit/refund would strand a ledger debit. The
//! handler future is dropped on disconnect, so the flow runs in a
//! spawned task and the handler merely awaits its completion.

use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use artforge_core::error::CoreError;
use artforge_core::job::{Job, NewJob};
use artforge_core::ledger::LedgerError;
use artforge_core::params::{GenerateParams, VoiceParams, VoiceTier};
use artforge_core::types::DbId;
use artforge_providers::adapter::{GenerateResult, ProviderRequest};
use artforge_providers::error::ProviderError;
use artforge_providers::resolver::HOSTED_IMAGE_PROVIDER;

use crate::error::AppError;
use crate::quota::QuotaGate;
use crate::state::AppState;
use crate::tracker::JobTracker;

/// Body of `POST /api/v1/generate`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub tool: Option<String>,
    /// Requested provider; ignored in hosted mode.
    pub provider: Option<String>,
    #[validate(length(max = 2000))]
    pub prompt: Option<String>,
    pub neg_prompt: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub seed: Option<i64>,
    pub steps: Option<i32>,
    pub guidance: Option<f64>,
    pub style_preset: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    /// BYOK API key; honored in self-hosted mode only.
    pub api_key: Option<String>,
    /// BYOK ComfyUI host; honored in self-hosted mode only.
    pub comfyui_host: Option<String>,
    pub model_override: Option<String>,
    pub extra: Option<serde_json::Value>,
}

/// Body of `POST /api/v1/voice/generate`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VoiceRequest {
    #[validate(length(max = 500))]
    pub text: Option<String>,
    pub voice: Option<String>,
    pub language: Option<String>,
    pub speed: Option<f64>,
    pub tier: Option<String>,
    /// BYOK API key; honored in self-hosted mode only.
    pub api_key: Option<String>,
}

/// Successful outcome of the image generation flow.
pub struct GenerateSuccess {
    /// The terminal job record, when persistence is configured.
    pub job: Option<Job>,
    pub result: GenerateResult,
    /// The caller's remaining HD credits, when a ledger is configured.
    pub credits_remaining: Option<i64>,
}

/// Failed outcome of the image generation flow.
///
/// Carries the job id when the failure happened after a job record was
/// created, so the caller can correlate the failed attempt.
pub struct GenerationFailure {
    pub job_id: Option<DbId>,
    pub error: AppError,
}

impl GenerationFailure {
    fn early(error: impl Into<AppError>) -> Self {
        Self {
            job_id: None,
            error: error.into(),
        }
    }
}

impl IntoResponse for GenerationFailure {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let body = json!({
            "ok": false,
            "jobId": self.job_id,
            "error": self.error.public_message(),
            "statusCode": status.as_u16(),
        });
        (status, axum::Json(body)).into_response()
    }
}

/// Outcome of the voice flow. `Fallback` is a documented third outcome
/// for the standard tier, not an error: the caller is instructed to use
/// local speech synthesis.
pub enum VoiceOutcome {
    Audio {
        audio_base64: String,
        duration_estimate_secs: f64,
        credits_used: u32,
        hd_credits_remaining: Option<i64>,
    },
    Fallback {
        text: String,
        speed: f64,
        message: String,
    },
}

/// Run the image generation flow.
///
/// Spawned so a client abort cannot cancel it mid-flight; the full
/// generate -> persist sequence completes regardless of the caller.
pub async fn run_generate(
    state: &AppState,
    user_id: Option<DbId>,
    request: GenerateRequest,
) -> Result<GenerateSuccess, GenerationFailure> {
    let state = state.clone();
    match tokio::spawn(async move { run_generate_inner(&state, user_id, request).await }).await {
        Ok(outcome) => outcome,
        Err(e) => Err(GenerationFailure::early(AppError::InternalError(format!(
            "generation task failed: {e}"
        )))),
    }
}

async fn run_generate_inner(
    state: &AppState,
    user_id: Option<DbId>,
    request: GenerateRequest,
) -> Result<GenerateSuccess, GenerationFailure> {
    // -- Validating --
    request
        .validate()
        .map_err(|e| GenerationFailure::early(AppError::BadRequest(e.to_string())))?;

    let tool = request.tool.as_deref().ok_or_else(|| {
        GenerationFailure::early(CoreError::Validation("tool is required".into()))
    })?;
    let params = GenerateParams::normalize(
        tool,
        request.prompt.as_deref().unwrap_or(""),
        request.neg_prompt,
        request.width,
        request.height,
        request.seed,
        request.steps,
        request.guidance,
        request.style_preset,
        request.model_override,
        request.extra,
    )
    .map_err(GenerationFailure::early)?;

    // -- QuotaChecking --
    let gate = QuotaGate::new(state.resolver.mode(), state.usage.clone());
    gate.check(user_id).await.map_err(GenerationFailure::early)?;

    // -- ProviderResolving --
    let requested = request.provider.as_deref().unwrap_or(HOSTED_IMAGE_PROVIDER);
    let resolved = state
        .resolver
        .resolve_image(
            requested,
            request.api_key.as_deref(),
            request.comfyui_host.as_deref(),
        )
        .map_err(GenerationFailure::early)?;
    let adapter = state.registry.get(resolved.name).ok_or_else(|| {
        GenerationFailure::early(AppError::InternalError(format!(
            "no adapter registered for provider '{}'",
            resolved.name
        )))
    })?;

    let tracker = JobTracker::new(state.jobs.clone());
    let job = tracker
        .start(&NewJob {
            user_id,
            tool: params.tool,
            provider: resolved.name.to_string(),
            prompt: params.prompt.clone(),
            negative_prompt: params.negative_prompt.clone(),
            width: params.width,
            height: params.height,
            seed: params.seed,
            is_public: request.is_public,
        })
        .await;

    // -- Generating --
    let provider_request = ProviderRequest::Image(params);
    match adapter.generate(&provider_request, &resolved.config).await {
        Ok(result) => {
            // -- Persisting --
            let job = tracker.complete(job, &result).await;

            if let (Some(gallery), Some(job)) = (&state.gallery, &job) {
                if job.is_public {
                    if let Err(e) = gallery.publish(job).await {
                        tracing::warn!(job_id = job.id, error = %e, "Failed to publish gallery asset");
                    }
                }
            }

            gate.record_success(user_id).await;
            let credits_remaining = remaining_credits(state, user_id).await;

            Ok(GenerateSuccess {
                job,
                result,
                credits_remaining,
            })
        }
        Err(e) => {
            let job = tracker.fail(job, &e.to_string()).await;
            Err(GenerationFailure {
                job_id: job.map(|j| j.id),
                error: AppError::Provider(e),
            })
        }
    }
}

/// Run the voice generation flow.
///
/// Spawned for the same reason as [`run_generate`]: a reserve must
/// always reach its commit or refund, client present or not.
pub async fn run_voice(
    state: &AppState,
    user_id: Option<DbId>,
    request: VoiceRequest,
) -> Result<VoiceOutcome, AppError> {
    let state = state.clone();
    match tokio::spawn(async move { run_voice_inner(&state, user_id, request).await }).await {
        Ok(outcome) => outcome,
        Err(e) => Err(AppError::InternalError(format!("voice task failed: {e}"))),
    }
}

async fn run_voice_inner(
    state: &AppState,
    user_id: Option<DbId>,
    request: VoiceRequest,
) -> Result<VoiceOutcome, AppError> {
    // -- Validating --
    request
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let tier = match request.tier.as_deref().unwrap_or("standard") {
        "standard" => VoiceTier::Standard,
        "hd" => VoiceTier::Hd,
        other => {
            return Err(AppError::Core(CoreError::Validation(format!(
                "Invalid tier '{other}'. Must be 'standard' or 'hd'"
            ))))
        }
    };
    let params = VoiceParams::normalize(
        request.text.as_deref().unwrap_or(""),
        request.voice.as_deref().unwrap_or(""),
        request.language,
        request.speed,
        tier,
    )?;

    let byok_key = request.api_key.as_deref();
    match tier {
        VoiceTier::Standard => run_voice_standard(state, params, byok_key).await,
        VoiceTier::Hd => run_voice_hd(state, user_id, params, byok_key).await,
    }
}

/// Standard tier: degrade to client-side synthesis when the provider
/// is unconfigured or shedding load, instead of failing outright.
async fn run_voice_standard(
    state: &AppState,
    params: VoiceParams,
    byok_key: Option<&str>,
) -> Result<VoiceOutcome, AppError> {
    if !state.resolver.voice_credential_configured(byok_key) {
        return Ok(VoiceOutcome::Fallback {
            text: params.text,
            speed: params.speed,
            message: "No voice provider configured; use local speech synthesis".to_string(),
        });
    }

    let resolved = state.resolver.resolve_voice(byok_key)?;
    let adapter = state.registry.get(resolved.name).ok_or_else(|| {
        AppError::InternalError(format!(
            "no adapter registered for provider '{}'",
            resolved.name
        ))
    })?;

    let provider_request = ProviderRequest::Voice(params.clone());
    match adapter.generate(&provider_request, &resolved.config).await {
        Ok(result) => Ok(audio_outcome(result, 0, None)),
        Err(e) if is_fallback_eligible(&e) => {
            tracing::info!(error = %e, "Voice provider shedding load, instructing client fallback");
            Ok(VoiceOutcome::Fallback {
                text: params.text,
                speed: params.speed,
                message: "Voice provider unavailable; use local speech synthesis".to_string(),
            })
        }
        Err(e) => Err(AppError::Provider(e)),
    }
}

/// HD tier: reserve 1 credit up front, refund on any later failure.
async fn run_voice_hd(
    state: &AppState,
    user_id: Option<DbId>,
    params: VoiceParams,
    byok_key: Option<&str>,
) -> Result<VoiceOutcome, AppError> {
    // -- ProviderResolving -- (before reserving: an unpayable or
    // unroutable request must not touch the ledger)
    let resolved = state.resolver.resolve_voice(byok_key)?;
    let adapter = state.registry.get(resolved.name).ok_or_else(|| {
        AppError::InternalError(format!(
            "no adapter registered for provider '{}'",
            resolved.name
        ))
    })?;

    // -- CreditReserving -- hosted mode only; self-hosted installs have
    // no ledger and the BYOK key is the payment.
    let reservation = match &state.ledger {
        Some(ledger) => {
            let user_id = user_id.ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "HD voice requires an authenticated user".into(),
                ))
            })?;
            let reservation = ledger.reserve(user_id).await.map_err(|e| match e {
                LedgerError::Insufficient { .. } => {
                    AppError::Core(CoreError::InsufficientCredits)
                }
                LedgerError::Store(e) => {
                    AppError::InternalError(format!("credit reservation failed: {e}"))
                }
            })?;
            Some(reservation)
        }
        None => None,
    };

    // -- Generating --
    let provider_request = ProviderRequest::Voice(params);
    match adapter.generate(&provider_request, &resolved.config).await {
        Ok(result) => {
            let credits_used = match (&state.ledger, reservation) {
                (Some(ledger), Some(reservation)) => {
                    ledger.commit(&reservation);
                    1
                }
                _ => 0,
            };
            let hd_credits_remaining = remaining_credits(state, user_id).await;
            Ok(audio_outcome(result, credits_used, hd_credits_remaining))
        }
        Err(e) => {
            // Refund is unconditional on the failure path.
            if let (Some(ledger), Some(reservation)) = (&state.ledger, reservation) {
                ledger.refund(reservation).await;
            }
            tracing::warn!(error = %e, "HD voice generation failed after reservation");
            Err(AppError::HdGenerationFailed(e.to_string()))
        }
    }
}

fn audio_outcome(
    result: GenerateResult,
    credits_used: u32,
    hd_credits_remaining: Option<i64>,
) -> VoiceOutcome {
    VoiceOutcome::Audio {
        audio_base64: result.audio_base64.unwrap_or_default(),
        duration_estimate_secs: result.duration_estimate_secs.unwrap_or(0.0),
        credits_used,
        hd_credits_remaining,
    }
}

/// Standard-tier fallback triggers: the provider is rate limiting or
/// shedding load. Anything else is a real error.
fn is_fallback_eligible(error: &ProviderError) -> bool {
    matches!(
        error,
        ProviderError::Api {
            status: 429 | 503,
            ..
        }
    )
}

/// The caller's spendable HD balance, when a ledger and user exist.
async fn remaining_credits(state: &AppState, user_id: Option<DbId>) -> Option<i64> {
    let ledger = state.ledger.as_ref()?;
    let user_id = user_id?;
    match ledger.store().fetch(user_id).await {
        Ok(Some(account)) => Some(account.remaining()),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(user_id, error = %e, "Failed to read credit balance");
            None
        }
    }
}
