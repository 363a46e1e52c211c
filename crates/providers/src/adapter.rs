//! The uniform provider interface.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use artforge_core::params::{GenerateParams, VoiceParams};

use crate::error::ProviderError;

/// Request-scoped provider configuration.
///
/// Produced by the resolver for each request; never persisted. The
/// api key may legitimately be absent for keyless backends (a local
/// ComfyUI host).
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    /// Base URL of the provider API, no trailing slash.
    pub api_host: String,
    /// Per-HTTP-call deadline.
    pub timeout: Duration,
}

/// Input to [`Provider::generate`], one variant per modality.
///
/// The original surface exposed one loosely-typed function per
/// endpoint; the enum keeps the single-method adapter while letting
/// each concrete provider reject modalities it does not serve.
#[derive(Debug, Clone)]
pub enum ProviderRequest {
    Image(GenerateParams),
    Voice(VoiceParams),
}

impl ProviderRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderRequest::Image(_) => "image",
            ProviderRequest::Voice(_) => "voice",
        }
    }
}

/// Normalized result of a generation call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerateResult {
    /// Primary result URL (first of `result_urls` for image providers).
    pub result_url: Option<String>,
    pub result_urls: Vec<String>,
    /// WAV payload, base64-encoded. Voice providers only.
    pub audio_base64: Option<String>,
    /// Estimated audio duration in seconds. Voice providers only.
    pub duration_estimate_secs: Option<f64>,
    /// Backend-assigned job id, when the backend models generation as a job.
    pub provider_job_id: Option<String>,
    /// The seed that actually produced the result. Echoes the caller's
    /// seed when one was supplied, so results are reproducible from this
    /// value alone.
    pub resolved_seed: i64,
    pub duration_ms: u64,
}

/// A single external generation backend.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable provider name used for selection and error reporting.
    fn name(&self) -> &'static str;

    /// Run one generation to completion.
    ///
    /// Implementations own their retry/rotation and polling policy;
    /// an `Err` here means the provider is done trying.
    async fn generate(
        &self,
        request: &ProviderRequest,
        config: &ProviderConfig,
    ) -> Result<GenerateResult, ProviderError>;
}
