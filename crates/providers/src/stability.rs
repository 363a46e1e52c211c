//! Synchronous image provider with model-variant rotation.
//!
//! The adapter holds an ordered list of model variants. A request is
//! issued against variant *i*; on a transient failure (HTTP 5xx,
//! request timeout, transport error) it backs off a fixed delay and
//! retries with variant *i+1*. Any non-5xx HTTP error is a semantic
//! rejection and aborts immediately without rotation. When every
//! variant has failed the adapter raises one aggregate
//! [`ProviderError::Exhausted`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;

use artforge_core::params::{resolve_seed, GenerateParams};

use crate::adapter::{GenerateResult, Provider, ProviderConfig, ProviderRequest};
use crate::error::ProviderError;

const NAME: &str = "stability";

/// Default model rotation order, strongest first.
pub const DEFAULT_MODELS: &[&str] = &["sd3.5-large", "sd3.5-medium", "sdxl-1024-v1-0"];

/// Tunable parameters for the rotation policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Fixed delay between variant attempts.
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff: Duration::from_millis(1500),
        }
    }
}

/// Response returned by the image generation endpoint.
#[derive(Debug, Deserialize)]
struct ImageResponse {
    images: Vec<ImageArtifact>,
}

#[derive(Debug, Deserialize)]
struct ImageArtifact {
    url: String,
}

/// Hosted image generation API client.
pub struct StabilityProvider {
    client: reqwest::Client,
    models: Vec<String>,
    retry: RetryConfig,
}

impl Default for StabilityProvider {
    fn default() -> Self {
        Self::new(
            DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            RetryConfig::default(),
        )
    }
}

impl StabilityProvider {
    pub fn new(models: Vec<String>, retry: RetryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            models,
            retry,
        }
    }

    /// Issue one request against a single model variant.
    async fn attempt(
        &self,
        params: &GenerateParams,
        config: &ProviderConfig,
        model: &str,
        seed: i64,
    ) -> Result<GenerateResult, ProviderError> {
        let body = serde_json::json!({
            "model": model,
            "prompt": params.prompt,
            "negative_prompt": params.negative_prompt,
            "width": params.width,
            "height": params.height,
            "seed": seed,
            "steps": params.steps,
            "cfg_scale": params.guidance,
            "style_preset": params.style_preset,
            "extra": params.extra,
        });

        let mut request = self
            .client
            .post(format!("{}/v1/generation", config.api_host))
            .json(&body);
        if let Some(key) = &config.api_key {
            request = request.bearer_auth(key);
        }

        let response = match tokio::time::timeout(config.timeout, request.send()).await {
            Err(_) => {
                return Err(ProviderError::Timeout {
                    provider: NAME,
                    elapsed_ms: config.timeout.as_millis() as u64,
                })
            }
            Ok(Err(source)) => {
                return Err(ProviderError::Transport {
                    provider: NAME,
                    source,
                })
            }
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::Api {
                provider: NAME,
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ImageResponse =
            response.json().await.map_err(|e| ProviderError::Decode {
                provider: NAME,
                message: e.to_string(),
            })?;

        if parsed.images.is_empty() {
            return Err(ProviderError::Decode {
                provider: NAME,
                message: "response contained no images".to_string(),
            });
        }

        let result_urls: Vec<String> = parsed.images.into_iter().map(|a| a.url).collect();
        Ok(GenerateResult {
            result_url: result_urls.first().cloned(),
            result_urls,
            resolved_seed: seed,
            ..GenerateResult::default()
        })
    }
}

#[async_trait]
impl Provider for StabilityProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn generate(
        &self,
        request: &ProviderRequest,
        config: &ProviderConfig,
    ) -> Result<GenerateResult, ProviderError> {
        let params = match request {
            ProviderRequest::Image(params) => params,
            other => {
                return Err(ProviderError::Unsupported {
                    provider: NAME,
                    kind: other.kind(),
                })
            }
        };

        let seed = resolve_seed(params.seed);
        let started = Instant::now();

        // A pinned model disables rotation.
        let models: Vec<&str> = match &params.model_override {
            Some(model) => vec![model.as_str()],
            None => self.models.iter().map(String::as_str).collect(),
        };

        let mut last_error: Option<ProviderError> = None;
        for (index, model) in models.iter().enumerate() {
            match self.attempt(params, config, model, seed).await {
                Ok(mut result) => {
                    result.duration_ms = started.elapsed().as_millis() as u64;
                    tracing::info!(
                        model,
                        attempt = index + 1,
                        duration_ms = result.duration_ms,
                        "Image generation succeeded",
                    );
                    return Ok(result);
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(
                        model,
                        attempt = index + 1,
                        error = %e,
                        "Transient provider failure, rotating model variant",
                    );
                    last_error = Some(e);
                    if index + 1 < models.len() {
                        tokio::time::sleep(self.retry.backoff).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(ProviderError::Exhausted {
            provider: NAME,
            attempts: models.len(),
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempts made".to_string()),
        })
    }
}
