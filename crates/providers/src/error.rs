//! Typed error channel shared by all provider adapters.

/// Errors raised by a provider adapter.
///
/// Carries enough structure for the orchestrator to map onto an HTTP
/// status and to decide whether the provider as a whole should be
/// skipped (`skip_provider`).
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider answered with a non-success HTTP status.
    #[error("{provider} returned HTTP {status}: {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },

    /// A single request (or the whole poll budget) ran out of time.
    #[error("{provider} timed out after {elapsed_ms}ms")]
    Timeout {
        provider: &'static str,
        elapsed_ms: u64,
    },

    /// The request never produced an HTTP response (DNS, connect, TLS).
    #[error("{provider} request failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The provider answered 2xx but the body was not in the expected shape.
    #[error("{provider} returned an unreadable response: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },

    /// Every model variant failed with a transient error.
    #[error("{provider} exhausted all {attempts} model variants; last error: {last_error}")]
    Exhausted {
        provider: &'static str,
        attempts: usize,
        last_error: String,
    },

    /// The adapter does not handle this request modality.
    #[error("{provider} does not support {kind} requests")]
    Unsupported {
        provider: &'static str,
        kind: &'static str,
    },
}

impl ProviderError {
    /// Which provider raised the error.
    pub fn provider(&self) -> &'static str {
        match self {
            ProviderError::Api { provider, .. }
            | ProviderError::Timeout { provider, .. }
            | ProviderError::Transport { provider, .. }
            | ProviderError::Decode { provider, .. }
            | ProviderError::Exhausted { provider, .. }
            | ProviderError::Unsupported { provider, .. } => provider,
        }
    }

    /// HTTP status to surface to the caller.
    ///
    /// Provider 4xx statuses pass through; everything transient maps to
    /// 502 except timeouts, which map to 504.
    pub fn status_code(&self) -> u16 {
        match self {
            ProviderError::Api { status, .. } if *status < 500 => *status,
            ProviderError::Api { .. } => 502,
            ProviderError::Timeout { .. } => 504,
            ProviderError::Transport { .. } => 502,
            ProviderError::Decode { .. } => 502,
            ProviderError::Exhausted { .. } => 502,
            ProviderError::Unsupported { .. } => 400,
        }
    }

    /// Whether this failure is transient availability trouble rather
    /// than a semantic rejection. Transient failures drive model
    /// rotation; semantic rejections abort immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Api { status, .. } => *status >= 500,
            ProviderError::Timeout { .. } | ProviderError::Transport { .. } => true,
            ProviderError::Decode { .. }
            | ProviderError::Exhausted { .. }
            | ProviderError::Unsupported { .. } => false,
        }
    }

    /// Whether the orchestrator should treat the whole provider as
    /// unavailable (all variants exhausted, or nothing reachable).
    pub fn skip_provider(&self) -> bool {
        matches!(
            self,
            ProviderError::Exhausted { .. }
                | ProviderError::Timeout { .. }
                | ProviderError::Transport { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_4xx_passes_status_through_and_is_not_transient() {
        let err = ProviderError::Api {
            provider: "stability",
            status: 422,
            message: "bad prompt".into(),
        };
        assert_eq!(err.status_code(), 422);
        assert!(!err.is_transient());
        assert!(!err.skip_provider());
    }

    #[test]
    fn api_5xx_is_transient_and_maps_to_502() {
        let err = ProviderError::Api {
            provider: "stability",
            status: 503,
            message: "overloaded".into(),
        };
        assert_eq!(err.status_code(), 502);
        assert!(err.is_transient());
    }

    #[test]
    fn timeout_maps_to_504_and_skips_provider() {
        let err = ProviderError::Timeout {
            provider: "playht",
            elapsed_ms: 90_000,
        };
        assert_eq!(err.status_code(), 504);
        assert!(err.skip_provider());
    }

    #[test]
    fn exhausted_skips_provider() {
        let err = ProviderError::Exhausted {
            provider: "stability",
            attempts: 3,
            last_error: "HTTP 500".into(),
        };
        assert_eq!(err.status_code(), 502);
        assert!(err.skip_provider());
        assert!(!err.is_transient());
    }
}
