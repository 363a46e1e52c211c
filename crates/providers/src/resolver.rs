//! Provider selection and credential resolution.
//!
//! In hosted mode the server's own provider and credentials are always
//! used and user-supplied keys/hosts are discarded regardless of what
//! the request claims -- this is a security boundary, not a convenience
//! default. In self-hosted mode BYOK values override the environment
//! defaults when present.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::adapter::{Provider, ProviderConfig};
use crate::comfyui::ComfyUiProvider;
use crate::playht::PlayHtProvider;
use crate::stability::StabilityProvider;

/// Image provider names accepted from requests (self-hosted mode).
pub const IMAGE_PROVIDERS: &[&str] = &["stability", "comfyui"];
/// The single image provider used in hosted mode.
pub const HOSTED_IMAGE_PROVIDER: &str = "stability";
/// The voice provider.
pub const VOICE_PROVIDER: &str = "playht";

/// Default per-HTTP-call deadline for provider requests.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(15);

/// Deployment mode, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    /// Multi-tenant SaaS: quotas and credits enforced, BYOK ignored.
    Hosted,
    /// Single-tenant install: no quotas, BYOK honored.
    SelfHosted,
}

/// Server-side provider credentials loaded from the environment.
#[derive(Debug, Clone)]
pub struct ProviderDefaults {
    pub stability_api_key: Option<String>,
    pub stability_host: String,
    pub comfyui_host: Option<String>,
    pub playht_api_key: Option<String>,
    pub playht_host: String,
}

impl Default for ProviderDefaults {
    fn default() -> Self {
        Self {
            stability_api_key: None,
            stability_host: "https://api.stability.ai".to_string(),
            comfyui_host: None,
            playht_api_key: None,
            playht_host: "https://api.play.ht".to_string(),
        }
    }
}

impl ProviderDefaults {
    /// Load provider credentials from environment variables.
    ///
    /// | Env Var             | Default                     |
    /// |---------------------|-----------------------------|
    /// | `STABILITY_API_KEY` | unset                       |
    /// | `STABILITY_HOST`    | `https://api.stability.ai`  |
    /// | `COMFYUI_HOST`      | unset                       |
    /// | `PLAYHT_API_KEY`    | unset                       |
    /// | `PLAYHT_HOST`       | `https://api.play.ht`       |
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            stability_api_key: std::env::var("STABILITY_API_KEY").ok().filter(|s| !s.is_empty()),
            stability_host: std::env::var("STABILITY_HOST").unwrap_or(base.stability_host),
            comfyui_host: std::env::var("COMFYUI_HOST").ok().filter(|s| !s.is_empty()),
            playht_api_key: std::env::var("PLAYHT_API_KEY").ok().filter(|s| !s.is_empty()),
            playht_host: std::env::var("PLAYHT_HOST").unwrap_or(base.playht_host),
        }
    }
}

/// Errors from provider resolution.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Unknown provider '{0}'")]
    UnknownProvider(String),

    /// No usable API key/host resolves for the chosen provider.
    #[error("No credential configured for provider '{provider}'")]
    MissingCredential { provider: &'static str },
}

/// The resolver's output: an effective provider name plus its
/// request-scoped configuration.
#[derive(Debug, Clone)]
pub struct ResolvedProvider {
    pub name: &'static str,
    pub config: ProviderConfig,
}

/// Merges server defaults with optional BYOK overrides.
#[derive(Debug, Clone)]
pub struct ProviderResolver {
    mode: ServerMode,
    defaults: ProviderDefaults,
    timeout: Duration,
}

impl ProviderResolver {
    pub fn new(mode: ServerMode, defaults: ProviderDefaults, timeout: Duration) -> Self {
        Self {
            mode,
            defaults,
            timeout,
        }
    }

    pub fn mode(&self) -> ServerMode {
        self.mode
    }

    /// Resolve the image provider for a request.
    ///
    /// `byok_key`/`byok_host` come from the request body and are
    /// honored only in self-hosted mode.
    pub fn resolve_image(
        &self,
        requested: &str,
        byok_key: Option<&str>,
        byok_host: Option<&str>,
    ) -> Result<ResolvedProvider, ResolveError> {
        let (effective, byok_key, byok_host) = match self.mode {
            ServerMode::Hosted => (HOSTED_IMAGE_PROVIDER, None, None),
            ServerMode::SelfHosted => {
                let name = IMAGE_PROVIDERS
                    .iter()
                    .find(|p| **p == requested)
                    .copied()
                    .ok_or_else(|| ResolveError::UnknownProvider(requested.to_string()))?;
                (name, byok_key, byok_host)
            }
        };

        match effective {
            "stability" => {
                let api_key = byok_key
                    .map(str::to_string)
                    .or_else(|| self.defaults.stability_api_key.clone())
                    .ok_or(ResolveError::MissingCredential {
                        provider: "stability",
                    })?;
                Ok(ResolvedProvider {
                    name: "stability",
                    config: ProviderConfig {
                        api_key: Some(api_key),
                        api_host: self.defaults.stability_host.clone(),
                        timeout: self.timeout,
                    },
                })
            }
            "comfyui" => {
                // ComfyUI is keyless; the credential is the host itself.
                let api_host = byok_host
                    .map(|h| h.trim_end_matches('/').to_string())
                    .or_else(|| self.defaults.comfyui_host.clone())
                    .ok_or(ResolveError::MissingCredential {
                        provider: "comfyui",
                    })?;
                Ok(ResolvedProvider {
                    name: "comfyui",
                    config: ProviderConfig {
                        api_key: None,
                        api_host,
                        timeout: self.timeout,
                    },
                })
            }
            other => Err(ResolveError::UnknownProvider(other.to_string())),
        }
    }

    /// Resolve the voice provider.
    pub fn resolve_voice(&self, byok_key: Option<&str>) -> Result<ResolvedProvider, ResolveError> {
        let byok_key = match self.mode {
            ServerMode::Hosted => None,
            ServerMode::SelfHosted => byok_key,
        };

        let api_key = byok_key
            .map(str::to_string)
            .or_else(|| self.defaults.playht_api_key.clone())
            .ok_or(ResolveError::MissingCredential { provider: "playht" })?;

        Ok(ResolvedProvider {
            name: VOICE_PROVIDER,
            config: ProviderConfig {
                api_key: Some(api_key),
                api_host: self.defaults.playht_host.clone(),
                timeout: self.timeout,
            },
        })
    }

    /// Whether any voice credential is configured at all (server-side,
    /// or potentially BYOK). The standard tier uses this to decide on
    /// client-side fallback instead of failing.
    pub fn voice_credential_configured(&self, byok_key: Option<&str>) -> bool {
        self.resolve_voice(byok_key).is_ok()
    }
}

/// Maps provider names to adapter instances.
pub struct ProviderRegistry {
    providers: HashMap<&'static str, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Registry with the three production adapters.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(StabilityProvider::default()));
        registry.register(Arc::new(ComfyUiProvider::default()));
        registry.register(Arc::new(PlayHtProvider::default()));
        registry
    }

    /// Register an adapter under its own name; the latest registration
    /// for a name wins.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.name(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
