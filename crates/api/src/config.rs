use artforge_providers::resolver::{ProviderDefaults, ServerMode};

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `120`).
    ///
    /// Must exceed the async providers' poll budget (~90 s) or polling
    /// requests get killed mid-ledger-operation; `main` asserts this at
    /// startup.
    pub request_timeout_secs: u64,
    /// Deployment mode: hosted SaaS or self-hosted install.
    pub mode: ServerMode,
    /// JWT token configuration. Required in hosted mode; optional in
    /// self-hosted mode (requests are then anonymous).
    pub jwt: Option<JwtConfig>,
    /// Server-side provider credentials.
    pub providers: ProviderDefaults,
    /// Per-provider-call HTTP deadline in seconds (default: `15`).
    pub provider_timeout_secs: u64,
    /// Sliding-window rate limit: max requests per window (default: `30`).
    pub rate_limit_max: u32,
    /// Sliding-window rate limit: window length in seconds (default: `60`).
    pub rate_limit_window_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                 |
    /// |--------------------------|-------------------------|
    /// | `HOST`                   | `0.0.0.0`               |
    /// | `PORT`                   | `3000`                  |
    /// | `CORS_ORIGINS`           | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`   | `120`                   |
    /// | `SERVER_MODE`            | `self-hosted`           |
    /// | `PROVIDER_TIMEOUT_SECS`  | `15`                    |
    /// | `RATE_LIMIT_MAX`         | `30`                    |
    /// | `RATE_LIMIT_WINDOW_SECS` | `60`                    |
    ///
    /// Provider credentials are documented on
    /// [`ProviderDefaults::from_env`]; JWT settings on
    /// [`JwtConfig::from_env`].
    ///
    /// # Panics
    ///
    /// Panics on unparseable numeric values, an unknown `SERVER_MODE`,
    /// or a missing `JWT_SECRET` in hosted mode.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let mode = match std::env::var("SERVER_MODE")
            .unwrap_or_else(|_| "self-hosted".into())
            .as_str()
        {
            "hosted" => ServerMode::Hosted,
            "self-hosted" => ServerMode::SelfHosted,
            other => panic!("SERVER_MODE must be 'hosted' or 'self-hosted', got '{other}'"),
        };

        // Hosted mode cannot run without sessions; self-hosted installs
        // may skip JWT entirely and accept anonymous requests.
        let jwt = match mode {
            ServerMode::Hosted => Some(JwtConfig::from_env()),
            ServerMode::SelfHosted => JwtConfig::from_env_opt(),
        };

        let provider_timeout_secs: u64 = std::env::var("PROVIDER_TIMEOUT_SECS")
            .unwrap_or_else(|_| "15".into())
            .parse()
            .expect("PROVIDER_TIMEOUT_SECS must be a valid u64");

        let rate_limit_max: u32 = std::env::var("RATE_LIMIT_MAX")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("RATE_LIMIT_MAX must be a valid u32");

        let rate_limit_window_secs: u64 = std::env::var("RATE_LIMIT_WINDOW_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("RATE_LIMIT_WINDOW_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            mode,
            jwt,
            providers: ProviderDefaults::from_env(),
            provider_timeout_secs,
            rate_limit_max,
            rate_limit_window_secs,
        }
    }
}
