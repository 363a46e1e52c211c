//! Request normalization: dimension clamping, seed resolution, and the
//! validated parameter types handed to provider adapters.
//!
//! Out-of-range numeric inputs are clamped, not rejected -- a request
//! with `width=5000` proceeds at 2048. Only missing/invalid required
//! fields (empty prompt, unknown tool, over-long text) are errors.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::job::Tool;

/// Smallest accepted output dimension in pixels.
pub const MIN_DIMENSION: i32 = 32;
/// Largest accepted output dimension in pixels.
pub const MAX_DIMENSION: i32 = 2048;
/// Dimension used when the caller omits width/height.
pub const DEFAULT_DIMENSION: i32 = 512;

/// Seeds are 31-bit non-negative integers: `[0, 2^31)`.
pub const SEED_BOUND: i64 = 1 << 31;

/// Maximum voice text length in characters.
pub const MAX_VOICE_TEXT_CHARS: usize = 500;
/// Playback speed bounds.
pub const MIN_VOICE_SPEED: f64 = 0.5;
pub const MAX_VOICE_SPEED: f64 = 2.0;
pub const DEFAULT_VOICE_SPEED: f64 = 1.0;

/// Clamp an optional dimension into `[MIN_DIMENSION, MAX_DIMENSION]`.
pub fn clamp_dimension(value: Option<i32>) -> i32 {
    value
        .unwrap_or(DEFAULT_DIMENSION)
        .clamp(MIN_DIMENSION, MAX_DIMENSION)
}

/// Resolve the seed for a generation call.
///
/// A positive caller-supplied seed is echoed back unchanged so any past
/// result can be reproduced from its `resolved_seed` alone. Otherwise a
/// pseudo-random seed in `[0, SEED_BOUND)` is drawn.
pub fn resolve_seed(requested: Option<i64>) -> i64 {
    match requested {
        Some(seed) if seed > 0 => seed,
        _ => rand::rng().random_range(0..SEED_BOUND),
    }
}

/// Validated, normalized input to an image provider adapter.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateParams {
    pub tool: Tool,
    pub prompt: String,
    pub negative_prompt: Option<String>,
    pub width: i32,
    pub height: i32,
    /// Caller-requested seed; adapters resolve it via [`resolve_seed`].
    pub seed: Option<i64>,
    pub steps: Option<i32>,
    pub guidance: Option<f64>,
    pub style_preset: Option<String>,
    /// Specific model variant to pin instead of the rotation list.
    pub model_override: Option<String>,
    /// Provider-specific passthrough values.
    pub extra: Option<serde_json::Value>,
}

impl GenerateParams {
    /// Build normalized params from raw request fields.
    ///
    /// Rejects an unknown tool or an empty prompt; clamps dimensions.
    #[allow(clippy::too_many_arguments)]
    pub fn normalize(
        tool: &str,
        prompt: &str,
        negative_prompt: Option<String>,
        width: Option<i32>,
        height: Option<i32>,
        seed: Option<i64>,
        steps: Option<i32>,
        guidance: Option<f64>,
        style_preset: Option<String>,
        model_override: Option<String>,
        extra: Option<serde_json::Value>,
    ) -> Result<Self, CoreError> {
        let tool = Tool::parse(tool)?;

        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(CoreError::Validation("prompt must not be empty".into()));
        }

        Ok(Self {
            tool,
            prompt: prompt.to_string(),
            negative_prompt: negative_prompt.filter(|s| !s.trim().is_empty()),
            width: clamp_dimension(width),
            height: clamp_dimension(height),
            seed,
            steps,
            guidance,
            style_preset,
            model_override,
            extra,
        })
    }
}

/// Requested voice tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceTier {
    /// Free tier; falls back to client-side synthesis when the provider
    /// is unavailable.
    Standard,
    /// Premium tier; costs 1 HD credit, never falls back.
    Hd,
}

impl VoiceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceTier::Standard => "standard",
            VoiceTier::Hd => "hd",
        }
    }
}

/// Validated, normalized input to a voice provider adapter.
#[derive(Debug, Clone, Serialize)]
pub struct VoiceParams {
    pub text: String,
    pub voice: String,
    pub language: Option<String>,
    pub speed: f64,
    pub tier: VoiceTier,
}

impl VoiceParams {
    /// Build normalized voice params from raw request fields.
    ///
    /// Rejects empty/over-long text and an empty voice name; clamps
    /// speed into `[MIN_VOICE_SPEED, MAX_VOICE_SPEED]`.
    pub fn normalize(
        text: &str,
        voice: &str,
        language: Option<String>,
        speed: Option<f64>,
        tier: VoiceTier,
    ) -> Result<Self, CoreError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CoreError::Validation("text must not be empty".into()));
        }
        if text.chars().count() > MAX_VOICE_TEXT_CHARS {
            return Err(CoreError::Validation(format!(
                "text must be at most {MAX_VOICE_TEXT_CHARS} characters"
            )));
        }

        let voice = voice.trim();
        if voice.is_empty() {
            return Err(CoreError::Validation("voice must not be empty".into()));
        }

        Ok(Self {
            text: text.to_string(),
            voice: voice.to_string(),
            language,
            speed: speed
                .unwrap_or(DEFAULT_VOICE_SPEED)
                .clamp(MIN_VOICE_SPEED, MAX_VOICE_SPEED),
            tier,
        })
    }
}
