//! Asynchronous voice provider: create a TTS job, poll to completion,
//! download the audio.
//!
//! The audio payload is returned base64-encoded so the API layer can
//! hand it straight to the client without touching object storage.

use std::time::Instant;

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;

use artforge_core::params::{VoiceParams, VoiceTier};

use crate::adapter::{GenerateResult, Provider, ProviderConfig, ProviderRequest};
use crate::error::ProviderError;
use crate::poll::{self, PollConfig, PollStatus};

const NAME: &str = "playht";

/// Characters of input text synthesized per second of output audio,
/// used when the provider omits a duration.
const CHARS_PER_SECOND: f64 = 15.0;

#[derive(Debug, Deserialize)]
struct CreateJobResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct JobStatusResponse {
    status: String,
    #[serde(default)]
    output: Option<JobOutput>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobOutput {
    url: String,
    #[serde(default)]
    duration: Option<f64>,
}

/// Hosted TTS API client.
pub struct PlayHtProvider {
    client: reqwest::Client,
    poll: PollConfig,
}

impl Default for PlayHtProvider {
    fn default() -> Self {
        Self::new(PollConfig::default())
    }
}

impl PlayHtProvider {
    pub fn new(poll: PollConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            poll,
        }
    }

    async fn create_job(
        &self,
        params: &VoiceParams,
        config: &ProviderConfig,
    ) -> Result<String, ProviderError> {
        let quality = match params.tier {
            VoiceTier::Hd => "premium",
            VoiceTier::Standard => "draft",
        };
        let body = serde_json::json!({
            "text": params.text,
            "voice": params.voice,
            "speed": params.speed,
            "language": params.language,
            "quality": quality,
            "output_format": "wav",
        });

        let mut request = self
            .client
            .post(format!("{}/api/v2/tts", config.api_host))
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

        let parsed: CreateJobResponse =
            response.json().await.map_err(|e| ProviderError::Decode {
                provider: NAME,
                message: e.to_string(),
            })?;
        Ok(parsed.id)
    }

    async fn check_job(
        &self,
        job_id: &str,
        config: &ProviderConfig,
    ) -> Result<PollStatus<JobOutput>, ProviderError> {
        let mut request = self
            .client
            .get(format!("{}/api/v2/tts/{job_id}", config.api_host));
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

        let parsed: JobStatusResponse =
            response.json().await.map_err(|e| ProviderError::Decode {
                provider: NAME,
                message: e.to_string(),
            })?;

        match parsed.status.as_str() {
            "completed" => match parsed.output {
                Some(output) => Ok(PollStatus::Ready(output)),
                None => Err(ProviderError::Decode {
                    provider: NAME,
                    message: "completed job had no output".to_string(),
                }),
            },
            "failed" => Err(ProviderError::Api {
                provider: NAME,
                status: 500,
                message: parsed
                    .error_message
                    .unwrap_or_else(|| "generation failed".to_string()),
            }),
            // "created", "processing", "enqueued", ...
            _ => Ok(PollStatus::Pending),
        }
    }

    /// Download the finished audio and encode it for transport.
    async fn download_audio(
        &self,
        url: &str,
        config: &ProviderConfig,
    ) -> Result<String, ProviderError> {
        let response = match tokio::time::timeout(config.timeout, self.client.get(url).send())
            .await
        {
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
            return Err(ProviderError::Api {
                provider: NAME,
                status: status.as_u16(),
                message: "audio download failed".to_string(),
            });
        }

        let bytes = response.bytes().await.map_err(|e| ProviderError::Decode {
            provider: NAME,
            message: e.to_string(),
        })?;
        Ok(base64::engine::general_purpose::STANDARD.encode(&bytes))
    }
}

#[async_trait]
impl Provider for PlayHtProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn generate(
        &self,
        request: &ProviderRequest,
        config: &ProviderConfig,
    ) -> Result<GenerateResult, ProviderError> {
        let params = match request {
            ProviderRequest::Voice(params) => params,
            other => {
                return Err(ProviderError::Unsupported {
                    provider: NAME,
                    kind: other.kind(),
                })
            }
        };

        let started = Instant::now();
        let job_id = self.create_job(params, config).await?;
        tracing::info!(job_id = %job_id, tier = params.tier.as_str(), "Created TTS job");

        let outcome = poll::run(&self.poll, |_attempt| {
            let job_id = job_id.clone();
            async move { self.check_job(&job_id, config).await }
        })
        .await?;

        let Some(output) = outcome else {
            return Err(ProviderError::Timeout {
                provider: NAME,
                elapsed_ms: self.poll.budget().as_millis() as u64,
            });
        };

        let audio_base64 = self.download_audio(&output.url, config).await?;
        let duration_estimate = output
            .duration
            .unwrap_or_else(|| params.text.chars().count() as f64 / CHARS_PER_SECOND / params.speed);

        Ok(GenerateResult {
            audio_base64: Some(audio_base64),
            duration_estimate_secs: Some(duration_estimate),
            provider_job_id: Some(job_id),
            resolved_seed: 0,
            duration_ms: started.elapsed().as_millis() as u64,
            ..GenerateResult::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use assert_matches::assert_matches;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};

    use super::*;

    fn voice_request(tier: VoiceTier) -> ProviderRequest {
        ProviderRequest::Voice(
            VoiceParams::normalize("hello adventurer", "nova", None, Some(1.0), tier).unwrap(),
        )
    }

    fn fast_provider(max_polls: u32) -> PlayHtProvider {
        PlayHtProvider::new(PollConfig {
            interval: Duration::from_millis(1),
            max_polls,
        })
    }

    async fn spawn_mock(router: Router) -> ProviderConfig {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        ProviderConfig {
            api_key: Some("test-key".to_string()),
            api_host: format!("http://{addr}"),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn creates_polls_and_downloads_audio() {
        let polls = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/api/v2/tts",
                post(|| async { Json(serde_json::json!({ "id": "job-1" })) }),
            )
            .route(
                "/api/v2/tts/{id}",
                get(
                    |State((polls, config)): State<(Arc<AtomicUsize>, String)>| async move {
                        if polls.fetch_add(1, Ordering::SeqCst) < 1 {
                            Json(serde_json::json!({ "status": "processing" })).into_response()
                        } else {
                            Json(serde_json::json!({
                                "status": "completed",
                                "output": { "url": format!("{config}/audio/job-1.wav"), "duration": 2.5 },
                            }))
                            .into_response()
                        }
                    },
                ),
            )
            .route("/audio/{file}", get(|| async { "RIFFfakewav" }));

        // The status handler needs the mock's own base URL to build the
        // download link, so bind first and wire the state afterwards.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base = format!("http://{addr}");
        let router = router.with_state((polls.clone(), base.clone()));
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        let config = ProviderConfig {
            api_key: Some("test-key".to_string()),
            api_host: base,
            timeout: Duration::from_secs(5),
        };

        let provider = fast_provider(10);
        let result = provider
            .generate(&voice_request(VoiceTier::Hd), &config)
            .await
            .unwrap();

        assert_eq!(polls.load(Ordering::SeqCst), 2);
        assert_eq!(result.provider_job_id.as_deref(), Some("job-1"));
        assert_eq!(result.duration_estimate_secs, Some(2.5));
        let audio = base64::engine::general_purpose::STANDARD
            .decode(result.audio_base64.unwrap())
            .unwrap();
        assert_eq!(audio, b"RIFFfakewav");
    }

    #[tokio::test]
    async fn rate_limited_create_surfaces_429() {
        let router = Router::new().route(
            "/api/v2/tts",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down").into_response() }),
        );
        let config = spawn_mock(router).await;

        let provider = fast_provider(4);
        let err = provider
            .generate(&voice_request(VoiceTier::Standard), &config)
            .await
            .unwrap_err();

        assert_matches!(err, ProviderError::Api { status: 429, .. });
    }

    #[tokio::test]
    async fn poll_ceiling_is_a_timeout() {
        let router = Router::new()
            .route(
                "/api/v2/tts",
                post(|| async { Json(serde_json::json!({ "id": "job-1" })) }),
            )
            .route(
                "/api/v2/tts/{id}",
                get(|| async { Json(serde_json::json!({ "status": "processing" })) }),
            );
        let config = spawn_mock(router).await;

        let provider = fast_provider(3);
        let err = provider
            .generate(&voice_request(VoiceTier::Hd), &config)
            .await
            .unwrap_err();

        assert_matches!(err, ProviderError::Timeout { .. });
    }

    #[tokio::test]
    async fn failed_job_surfaces_provider_message() {
        let router = Router::new()
            .route(
                "/api/v2/tts",
                post(|| async { Json(serde_json::json!({ "id": "job-1" })) }),
            )
            .route(
                "/api/v2/tts/{id}",
                get(|| async {
                    Json(serde_json::json!({
                        "status": "failed",
                        "error_message": "voice not found",
                    }))
                }),
            );
        let config = spawn_mock(router).await;

        let provider = fast_provider(4);
        let err = provider
            .generate(&voice_request(VoiceTier::Hd), &config)
            .await
            .unwrap_err();

        assert_matches!(
            err,
            ProviderError::Api { status: 500, ref message, .. } if message == "voice not found"
        );
    }

    #[tokio::test]
    async fn image_requests_are_unsupported() {
        let provider = fast_provider(1);
        let config = ProviderConfig {
            api_key: None,
            api_host: "http://127.0.0.1:1".to_string(),
            timeout: Duration::from_secs(1),
        };
        let request = ProviderRequest::Image(
            artforge_core::params::GenerateParams::normalize(
                "generate",
                "a knight",
                None,
                None,
                None,
                None,
                None,
                None,
                None,
                None,
                None,
            )
            .unwrap(),
        );

        let err = provider.generate(&request, &config).await.unwrap_err();
        assert_matches!(err, ProviderError::Unsupported { kind: "image", .. });
    }
}
