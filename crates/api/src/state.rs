use std::sync::Arc;

use artforge_core::ledger::CreditLedger;
use artforge_core::store::{GalleryStore, JobStore, UsageStore};
use artforge_providers::resolver::{ProviderRegistry, ProviderResolver};

use crate::config::ServerConfig;
use crate::middleware::rate_limit::SlidingWindowLimiter;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`). The store
/// handles are `Option` because persistence is an injected, possibly
/// absent dependency: a self-hosted install without a database serves
/// generations in degraded, untracked mode. This is the single place
/// that branches on "is a store configured" -- downstream logic takes
/// the `Option` and behaves uniformly.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Provider name -> adapter instance.
    pub registry: Arc<ProviderRegistry>,
    /// Credential/BYOK merging per request.
    pub resolver: Arc<ProviderResolver>,
    /// Job persistence; absent in database-less installs.
    pub jobs: Option<Arc<dyn JobStore>>,
    /// HD-credit ledger; present in hosted mode only.
    pub ledger: Option<CreditLedger>,
    /// Monthly usage counters; present in hosted mode only.
    pub usage: Option<Arc<dyn UsageStore>>,
    /// Gallery publishing; absent in database-less installs.
    pub gallery: Option<Arc<dyn GalleryStore>>,
    /// In-process sliding-window rate limiter.
    pub limiter: Arc<SlidingWindowLimiter>,
}
