//! Handler for the voice generation endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::auth::OptionalAuthUser;
use crate::error::AppResult;
use crate::orchestrator::{self, VoiceOutcome, VoiceRequest};
use crate::state::AppState;

/// Success body of `POST /voice/generate`, both shapes.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum VoiceResponse {
    #[serde(rename_all = "camelCase")]
    Audio {
        audio_base64: String,
        format: &'static str,
        duration_estimate: f64,
        credits_used: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        hd_credits_remaining: Option<i64>,
    },
    #[serde(rename_all = "camelCase")]
    Fallback {
        fallback: bool,
        text: String,
        speed: f64,
        message: String,
    },
}

/// POST /api/v1/voice/generate
///
/// Standard tier may answer with `{fallback: true, ...}` (HTTP 200)
/// instructing the client to use local speech synthesis; HD tier
/// either returns audio or a 502 after refunding the reserved credit.
pub async fn create(
    State(state): State<AppState>,
    OptionalAuthUser(user): OptionalAuthUser,
    Json(request): Json<VoiceRequest>,
) -> AppResult<Json<VoiceResponse>> {
    let user_id = user.map(|u| u.user_id);
    let outcome = orchestrator::run_voice(&state, user_id, request).await?;

    let response = match outcome {
        VoiceOutcome::Audio {
            audio_base64,
            duration_estimate_secs,
            credits_used,
            hd_credits_remaining,
        } => VoiceResponse::Audio {
            audio_base64,
            format: "wav",
            duration_estimate: duration_estimate_secs,
            credits_used,
            hd_credits_remaining,
        },
        VoiceOutcome::Fallback {
            text,
            speed,
            message,
        } => VoiceResponse::Fallback {
            fallback: true,
            text,
            speed,
            message,
        },
    };
    Ok(Json(response))
}
