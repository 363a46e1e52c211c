//! Shared test harness: in-memory store implementations, scriptable
//! mock providers, and an app builder mirroring `main.rs` so the
//! integration tests exercise the production middleware stack.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use artforge_api::auth::jwt::{generate_access_token, JwtConfig};
use artforge_api::config::ServerConfig;
use artforge_api::middleware::rate_limit::SlidingWindowLimiter;
use artforge_api::router::build_app_router;
use artforge_api::state::AppState;
use artforge_core::credit::CreditAccount;
use artforge_core::job::{Job, JobStatus, NewJob};
use artforge_core::ledger::CreditLedger;
use artforge_core::params::resolve_seed;
use artforge_core::store::{
    CreditStore, GalleryStore, JobListQuery, JobPage, JobStore, QuotaSnapshot, StoreError,
    UsageStore,
};
use artforge_core::types::DbId;
use artforge_providers::adapter::{GenerateResult, Provider, ProviderConfig, ProviderRequest};
use artforge_providers::error::ProviderError;
use artforge_providers::resolver::{ProviderDefaults, ProviderRegistry, ProviderResolver, ServerMode};

pub const TEST_JWT_SECRET: &str = "integration-test-secret";

// ---------------------------------------------------------------------------
// In-memory stores
// ---------------------------------------------------------------------------

/// Vec-backed [`JobStore`] with the same terminal-state guard the
/// Postgres implementation enforces via its WHERE predicate.
#[derive(Default)]
pub struct MemoryJobStore {
    next_id: AtomicI64,
    jobs: Mutex<Vec<Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub fn snapshot(&self) -> Vec<Job> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, new_job: &NewJob) -> Result<Job, StoreError> {
        let now = chrono::Utc::now();
        let job = Job {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            user_id: new_job.user_id,
            tool: new_job.tool,
            status: JobStatus::Running,
            provider: new_job.provider.clone(),
            prompt: new_job.prompt.clone(),
            negative_prompt: new_job.negative_prompt.clone(),
            width: new_job.width,
            height: new_job.height,
            seed: new_job.seed,
            result_url: None,
            result_urls: Vec::new(),
            error_message: None,
            is_public: new_job.is_public,
            created_at: now,
            updated_at: now,
        };
        self.jobs.lock().unwrap().push(job.clone());
        Ok(job)
    }

    async fn complete(
        &self,
        job_id: DbId,
        result_url: Option<&str>,
        result_urls: &[String],
    ) -> Result<(), StoreError> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs
            .iter_mut()
            .find(|j| j.id == job_id && j.status == JobStatus::Running)
        {
            job.status = JobStatus::Succeeded;
            job.result_url = result_url.map(str::to_string);
            job.result_urls = result_urls.to_vec();
            job.updated_at = chrono::Utc::now();
        }
        Ok(())
    }

    async fn fail(&self, job_id: DbId, error: &str) -> Result<(), StoreError> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs
            .iter_mut()
            .find(|j| j.id == job_id && j.status == JobStatus::Running)
        {
            job.status = JobStatus::Failed;
            job.error_message = Some(error.to_string());
            job.updated_at = chrono::Utc::now();
        }
        Ok(())
    }

    async fn find_by_id(&self, job_id: DbId) -> Result<Option<Job>, StoreError> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .find(|j| j.id == job_id)
            .cloned())
    }

    async fn list(&self, query: &JobListQuery) -> Result<JobPage, StoreError> {
        let jobs = self.jobs.lock().unwrap();
        let mut matched: Vec<Job> = jobs
            .iter()
            .filter(|j| query.user_id.map_or(true, |u| j.user_id == Some(u)))
            .filter(|j| query.cursor.map_or(true, |c| j.id < c))
            .filter(|j| query.tool.map_or(true, |t| j.tool == t))
            .filter(|j| query.status.map_or(true, |s| j.status == s))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.id.cmp(&a.id));

        let limit = query.limit.max(1) as usize;
        let has_more = matched.len() > limit;
        matched.truncate(limit);
        let next_cursor = if has_more {
            matched.last().map(|j| j.id)
        } else {
            None
        };
        Ok(JobPage {
            jobs: matched,
            next_cursor,
            has_more,
        })
    }
}

/// HashMap-backed [`CreditStore`] whose conditional updates hold the
/// lock across predicate and mutation.
pub struct MemoryCreditStore {
    accounts: Mutex<HashMap<DbId, CreditAccount>>,
}

impl MemoryCreditStore {
    pub fn with_account(account: CreditAccount) -> Self {
        let mut accounts = HashMap::new();
        accounts.insert(account.user_id, account);
        Self {
            accounts: Mutex::new(accounts),
        }
    }

    pub fn snapshot(&self, user_id: DbId) -> CreditAccount {
        self.accounts.lock().unwrap().get(&user_id).unwrap().clone()
    }
}

#[async_trait]
impl CreditStore for MemoryCreditStore {
    async fn fetch(&self, user_id: DbId) -> Result<Option<CreditAccount>, StoreError> {
        Ok(self.accounts.lock().unwrap().get(&user_id).cloned())
    }

    async fn try_debit_monthly(&self, user_id: DbId) -> Result<bool, StoreError> {
        let mut accounts = self.accounts.lock().unwrap();
        match accounts.get_mut(&user_id) {
            Some(acc) if acc.monthly_used < acc.monthly_alloc => {
                acc.monthly_used += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn try_debit_top_up(&self, user_id: DbId) -> Result<bool, StoreError> {
        let mut accounts = self.accounts.lock().unwrap();
        match accounts.get_mut(&user_id) {
            Some(acc) if acc.top_up_credits > 0 => {
                acc.top_up_credits -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn credit_monthly(&self, user_id: DbId) -> Result<(), StoreError> {
        let mut accounts = self.accounts.lock().unwrap();
        if let Some(acc) = accounts.get_mut(&user_id) {
            acc.monthly_used = (acc.monthly_used - 1).max(0);
        }
        Ok(())
    }

    async fn credit_top_up(&self, user_id: DbId) -> Result<(), StoreError> {
        let mut accounts = self.accounts.lock().unwrap();
        if let Some(acc) = accounts.get_mut(&user_id) {
            acc.top_up_credits += 1;
        }
        Ok(())
    }
}

/// Fixed-limit [`UsageStore`].
pub struct MemoryUsageStore {
    limit: i64,
    used: Mutex<HashMap<DbId, i64>>,
}

impl MemoryUsageStore {
    pub fn with_limit(limit: i64) -> Self {
        Self {
            limit,
            used: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_used(&self, user_id: DbId, used: i64) {
        self.used.lock().unwrap().insert(user_id, used);
    }

    pub fn used(&self, user_id: DbId) -> i64 {
        *self.used.lock().unwrap().get(&user_id).unwrap_or(&0)
    }
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    async fn quota(&self, user_id: DbId) -> Result<QuotaSnapshot, StoreError> {
        Ok(QuotaSnapshot {
            used: self.used(user_id),
            limit: self.limit,
            plan_id: "indie".to_string(),
        })
    }

    async fn increment(&self, user_id: DbId) -> Result<(), StoreError> {
        *self.used.lock().unwrap().entry(user_id).or_insert(0) += 1;
        Ok(())
    }
}

/// Records published job ids.
#[derive(Default)]
pub struct MemoryGalleryStore {
    published: Mutex<Vec<DbId>>,
}

impl MemoryGalleryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<DbId> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl GalleryStore for MemoryGalleryStore {
    async fn publish(&self, job: &Job) -> Result<(), StoreError> {
        self.published.lock().unwrap().push(job.id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Mock providers
// ---------------------------------------------------------------------------

/// Scripted adapter behaviour for a test.
pub enum MockBehavior {
    /// Return one image URL, echoing the resolved seed.
    ImageOk,
    /// Return a small base64 WAV payload.
    VoiceOk,
    /// Fail with the given HTTP status.
    FailApi(u16),
    /// Fail with a poll-budget timeout.
    Timeout,
}

/// A [`Provider`] that follows a [`MockBehavior`] and counts calls, so
/// tests can assert that gating happened *before* any provider work.
pub struct MockProvider {
    name: &'static str,
    behavior: MockBehavior,
    pub calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(name: &'static str, behavior: MockBehavior) -> Arc<Self> {
        Arc::new(Self {
            name,
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn generate(
        &self,
        request: &ProviderRequest,
        _config: &ProviderConfig,
    ) -> Result<GenerateResult, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            MockBehavior::ImageOk => {
                let seed = match request {
                    ProviderRequest::Image(params) => resolve_seed(params.seed),
                    ProviderRequest::Voice(_) => 0,
                };
                Ok(GenerateResult {
                    result_url: Some("https://cdn.test/out-1.png".to_string()),
                    result_urls: vec!["https://cdn.test/out-1.png".to_string()],
                    resolved_seed: seed,
                    duration_ms: 12,
                    ..GenerateResult::default()
                })
            }
            MockBehavior::VoiceOk => Ok(GenerateResult {
                audio_base64: Some("UklGRmZha2V3YXY=".to_string()),
                duration_estimate_secs: Some(1.5),
                provider_job_id: Some("tts-1".to_string()),
                resolved_seed: 0,
                duration_ms: 40,
                ..GenerateResult::default()
            }),
            MockBehavior::FailApi(status) => Err(ProviderError::Api {
                provider: self.name,
                status: *status,
                message: "mock provider failure".to_string(),
            }),
            MockBehavior::Timeout => Err(ProviderError::Timeout {
                provider: self.name,
                elapsed_ms: 90_000,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` with safe defaults and all provider
/// credentials present.
pub fn test_config(mode: ServerMode) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 120,
        mode,
        jwt: Some(JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            access_token_expiry_mins: 15,
        }),
        providers: ProviderDefaults {
            stability_api_key: Some("server-stability-key".to_string()),
            comfyui_host: Some("http://gpu-box:8188".to_string()),
            playht_api_key: Some("server-playht-key".to_string()),
            ..ProviderDefaults::default()
        },
        provider_timeout_secs: 5,
        rate_limit_max: 10_000,
        rate_limit_window_secs: 60,
    }
}

/// Everything a test may want to inspect after driving the app.
pub struct TestHarness {
    pub config: ServerConfig,
    pub jobs: Arc<MemoryJobStore>,
    pub credits: Arc<MemoryCreditStore>,
    pub usage: Arc<MemoryUsageStore>,
    pub gallery: Arc<MemoryGalleryStore>,
}

impl TestHarness {
    pub fn new(config: ServerConfig, account: CreditAccount) -> Self {
        Self {
            config,
            jobs: Arc::new(MemoryJobStore::new()),
            credits: Arc::new(MemoryCreditStore::with_account(account)),
            usage: Arc::new(MemoryUsageStore::with_limit(100)),
            gallery: Arc::new(MemoryGalleryStore::new()),
        }
    }

    /// Build the app router exactly as `main.rs` does, with the given
    /// mock providers registered.
    pub fn build_app(&self, providers: Vec<Arc<MockProvider>>) -> Router {
        self.build_app_inner(providers, true)
    }

    /// Build the app without any stores (degraded, untracked mode).
    pub fn build_app_without_stores(&self, providers: Vec<Arc<MockProvider>>) -> Router {
        self.build_app_inner(providers, false)
    }

    fn build_app_inner(&self, providers: Vec<Arc<MockProvider>>, with_stores: bool) -> Router {
        let mut registry = ProviderRegistry::new();
        for provider in providers {
            registry.register(provider);
        }

        let resolver = Arc::new(ProviderResolver::new(
            self.config.mode,
            self.config.providers.clone(),
            Duration::from_secs(self.config.provider_timeout_secs),
        ));

        let hosted = self.config.mode == ServerMode::Hosted;
        let state = AppState {
            config: Arc::new(self.config.clone()),
            registry: Arc::new(registry),
            resolver,
            jobs: with_stores.then(|| self.jobs.clone() as Arc<dyn JobStore>),
            ledger: (with_stores && hosted)
                .then(|| CreditLedger::new(self.credits.clone() as Arc<dyn CreditStore>)),
            usage: (with_stores && hosted).then(|| self.usage.clone() as Arc<dyn UsageStore>),
            gallery: with_stores.then(|| self.gallery.clone() as Arc<dyn GalleryStore>),
            limiter: Arc::new(SlidingWindowLimiter::new(
                self.config.rate_limit_max,
                Duration::from_secs(self.config.rate_limit_window_secs),
            )),
        };

        build_app_router(state, &self.config)
    }
}

/// Default credit account used by most tests.
pub fn default_account(user_id: DbId) -> CreditAccount {
    CreditAccount {
        user_id,
        monthly_alloc: 5,
        monthly_used: 0,
        top_up_credits: 0,
    }
}

/// Mint a valid bearer token for the test JWT secret.
pub fn bearer_token(user_id: DbId) -> String {
    let config = JwtConfig {
        secret: TEST_JWT_SECRET.to_string(),
        access_token_expiry_mins: 15,
    };
    generate_access_token(user_id, &config).unwrap()
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn get_authed(app: Router, uri: &str, token: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .uri(uri)
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn post_json(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: Option<&str>,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    app.oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
