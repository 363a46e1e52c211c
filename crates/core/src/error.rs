use crate::types::DbId;

/// Domain-level errors shared across crates.
///
/// The api crate maps these onto HTTP status codes; nothing in here
/// knows about HTTP itself.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// No usable API key or host resolved for the chosen provider.
    #[error("No credential configured for provider '{provider}'")]
    MissingCredential { provider: String },

    /// Monthly generation count exhausted for the user's plan.
    #[error("Monthly generation quota exhausted ({used}/{limit})")]
    QuotaExceeded { used: i64, limit: i64 },

    /// Both the monthly allocation and the top-up bank are empty.
    #[error("Insufficient HD credits")]
    InsufficientCredits,

    #[error("Internal error: {0}")]
    Internal(String),
}
