use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use artforge_core::error::CoreError;
use artforge_providers::error::ProviderError;
use artforge_providers::resolver::ResolveError;

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain, resolver, and provider error enums and adds
/// HTTP-specific variants. Implements [`IntoResponse`] to produce the
/// generation API's `{ok:false, jobId, error, statusCode}` failure
/// shape (with a null job id; handlers that know the job id attach it
/// themselves, see `orchestrator::GenerationFailure`).
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `artforge-core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Provider selection / credential resolution failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The provider adapter gave up.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Too many requests from one user/client in the window.
    #[error("Rate limit exceeded, retry later")]
    RateLimited,

    /// HD voice generation failed after a successful credit
    /// reservation; the reservation has been refunded.
    #[error("HD voice generation failed: {0}")]
    HdGenerationFailed(String),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// The HTTP status this error maps to.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Core(core) => match core {
                CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                CoreError::Validation(_) => StatusCode::BAD_REQUEST,
                CoreError::Unauthorized(_) | CoreError::MissingCredential { .. } => {
                    StatusCode::UNAUTHORIZED
                }
                CoreError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
                CoreError::InsufficientCredits => StatusCode::PAYMENT_REQUIRED,
                CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Resolve(resolve) => match resolve {
                ResolveError::UnknownProvider(_) => StatusCode::BAD_REQUEST,
                ResolveError::MissingCredential { .. } => StatusCode::UNAUTHORIZED,
            },
            AppError::Provider(provider) => StatusCode::from_u16(provider.status_code())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::HdGenerationFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message exposed to the caller. Internal details are
    /// sanitized; everything else passes through.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Core(CoreError::Internal(msg)) => {
                tracing::error!(error = %msg, "Internal core error");
                "An internal error occurred".to_string()
            }
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "ok": false,
            "jobId": null,
            "error": self.public_message(),
            "statusCode": status.as_u16(),
        });
        (status, axum::Json(body)).into_response()
    }
}
