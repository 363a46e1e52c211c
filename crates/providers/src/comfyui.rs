//! ComfyUI adapter: submit a txt2img workflow, then poll history.
//!
//! ComfyUI models generation as a queued prompt: `POST /prompt` returns
//! a `prompt_id` and the result only appears in `GET /history/{id}`
//! once execution finishes. The adapter polls on the shared
//! [`poll`](crate::poll) loop and converts output image records into
//! `/view` URLs on the instance host.

use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;

use artforge_core::params::{resolve_seed, GenerateParams};

use crate::adapter::{GenerateResult, Provider, ProviderConfig, ProviderRequest};
use crate::error::ProviderError;
use crate::poll::{self, PollConfig, PollStatus};

const NAME: &str = "comfyui";

/// Checkpoint used when the caller does not pin a model.
const DEFAULT_CHECKPOINT: &str = "sd_xl_base_1.0.safetensors";

/// Response returned by the ComfyUI `/prompt` endpoint after
/// successfully queuing a workflow.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    prompt_id: String,
}

/// Self-hosted ComfyUI instance client.
pub struct ComfyUiProvider {
    client: reqwest::Client,
    poll: PollConfig,
}

impl Default for ComfyUiProvider {
    fn default() -> Self {
        Self::new(PollConfig::default())
    }
}

impl ComfyUiProvider {
    pub fn new(poll: PollConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            poll,
        }
    }

    /// Build a minimal txt2img workflow graph from normalized params.
    fn build_workflow(params: &GenerateParams, seed: i64) -> serde_json::Value {
        let checkpoint = params
            .model_override
            .as_deref()
            .unwrap_or(DEFAULT_CHECKPOINT);

        serde_json::json!({
            "3": {
                "class_type": "KSampler",
                "inputs": {
                    "seed": seed,
                    "steps": params.steps.unwrap_or(20),
                    "cfg": params.guidance.unwrap_or(7.0),
                    "sampler_name": "euler",
                    "scheduler": "normal",
                    "denoise": 1.0,
                    "model": ["4", 0],
                    "positive": ["6", 0],
                    "negative": ["7", 0],
                    "latent_image": ["5", 0],
                },
            },
            "4": {
                "class_type": "CheckpointLoaderSimple",
                "inputs": { "ckpt_name": checkpoint },
            },
            "5": {
                "class_type": "EmptyLatentImage",
                "inputs": {
                    "width": params.width,
                    "height": params.height,
                    "batch_size": 1,
                },
            },
            "6": {
                "class_type": "CLIPTextEncode",
                "inputs": { "text": params.prompt, "clip": ["4", 1] },
            },
            "7": {
                "class_type": "CLIPTextEncode",
                "inputs": {
                    "text": params.negative_prompt.as_deref().unwrap_or(""),
                    "clip": ["4", 1],
                },
            },
            "8": {
                "class_type": "VAEDecode",
                "inputs": { "samples": ["3", 0], "vae": ["4", 2] },
            },
            "9": {
                "class_type": "SaveImage",
                "inputs": { "images": ["8", 0], "filename_prefix": "artforge" },
            },
        })
    }

    /// Queue a workflow for execution, returning the prompt id.
    async fn submit(
        &self,
        workflow: &serde_json::Value,
        config: &ProviderConfig,
    ) -> Result<String, ProviderError> {
        let client_id = uuid::Uuid::new_v4().to_string();
        let body = serde_json::json!({
            "prompt": workflow,
            "client_id": client_id,
        });

        let send = self
            .client
            .post(format!("{}/prompt", config.api_host))
            .json(&body)
            .send();

        let response = match tokio::time::timeout(config.timeout, send).await {
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

        let parsed: SubmitResponse =
            response.json().await.map_err(|e| ProviderError::Decode {
                provider: NAME,
                message: e.to_string(),
            })?;
        Ok(parsed.prompt_id)
    }

    /// One history check. The entry is absent until execution finishes.
    async fn check_history(
        &self,
        prompt_id: &str,
        config: &ProviderConfig,
    ) -> Result<PollStatus<Vec<String>>, ProviderError> {
        let send = self
            .client
            .get(format!("{}/history/{prompt_id}", config.api_host))
            .send();

        let response = match tokio::time::timeout(config.timeout, send).await {
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

        let history: serde_json::Value =
            response.json().await.map_err(|e| ProviderError::Decode {
                provider: NAME,
                message: e.to_string(),
            })?;

        let Some(entry) = history.get(prompt_id) else {
            return Ok(PollStatus::Pending);
        };

        if entry
            .pointer("/status/status_str")
            .and_then(|s| s.as_str())
            == Some("error")
        {
            return Err(ProviderError::Api {
                provider: NAME,
                status: 500,
                message: "workflow execution failed".to_string(),
            });
        }

        let urls = Self::extract_image_urls(entry, &config.api_host);
        if urls.is_empty() {
            return Err(ProviderError::Decode {
                provider: NAME,
                message: "history entry contained no output images".to_string(),
            });
        }
        Ok(PollStatus::Ready(urls))
    }

    /// Convert the `outputs` node map into `/view` URLs.
    fn extract_image_urls(entry: &serde_json::Value, api_host: &str) -> Vec<String> {
        let mut urls = Vec::new();
        let Some(outputs) = entry.get("outputs").and_then(|o| o.as_object()) else {
            return urls;
        };

        for node_output in outputs.values() {
            let Some(images) = node_output.get("images").and_then(|i| i.as_array()) else {
                continue;
            };
            for image in images {
                let filename = image.get("filename").and_then(|f| f.as_str());
                let subfolder = image
                    .get("subfolder")
                    .and_then(|s| s.as_str())
                    .unwrap_or("");
                let image_type = image.get("type").and_then(|t| t.as_str()).unwrap_or("output");
                if let Some(filename) = filename {
                    urls.push(format!(
                        "{api_host}/view?filename={filename}&subfolder={subfolder}&type={image_type}"
                    ));
                }
            }
        }
        urls
    }
}

#[async_trait]
impl Provider for ComfyUiProvider {
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

        let workflow = Self::build_workflow(params, seed);
        let prompt_id = self.submit(&workflow, config).await?;
        tracing::info!(prompt_id = %prompt_id, "Queued ComfyUI workflow");

        let outcome = poll::run(&self.poll, |_attempt| {
            let prompt_id = prompt_id.clone();
            async move { self.check_history(&prompt_id, config).await }
        })
        .await?;

        let Some(result_urls) = outcome else {
            return Err(ProviderError::Timeout {
                provider: NAME,
                elapsed_ms: self.poll.budget().as_millis() as u64,
            });
        };

        Ok(GenerateResult {
            result_url: result_urls.first().cloned(),
            result_urls,
            provider_job_id: Some(prompt_id),
            resolved_seed: seed,
            duration_ms: started.elapsed().as_millis() as u64,
            ..GenerateResult::default()
        })
    }
}
