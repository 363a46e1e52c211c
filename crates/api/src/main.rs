use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use artforge_api::config::ServerConfig;
use artforge_api::middleware::rate_limit::SlidingWindowLimiter;
use artforge_api::router::build_app_router;
use artforge_api::state::AppState;
use artforge_core::ledger::CreditLedger;
use artforge_core::store::{GalleryStore, JobStore, UsageStore};
use artforge_db::repositories::{PgCreditStore, PgGalleryStore, PgJobStore, PgUsageStore};
use artforge_providers::poll::PollConfig;
use artforge_providers::resolver::{ProviderRegistry, ProviderResolver, ServerMode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "artforge_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, mode = ?config.mode, "Loaded server configuration");

    // The async providers block the inbound request while polling; the
    // platform timeout has to outlive their worst case or requests die
    // mid-ledger-operation.
    let request_deadline = Duration::from_secs(config.request_timeout_secs);
    let poll_budget = PollConfig::default().budget();
    anyhow::ensure!(
        request_deadline > poll_budget,
        "REQUEST_TIMEOUT_SECS ({:?}) must exceed the provider poll budget ({:?})",
        request_deadline,
        poll_budget,
    );

    // --- Database (optional) ---
    // Without DATABASE_URL the server runs in degraded mode: no job
    // history, no gallery, no quotas, no credit ledger. Hosted mode
    // cannot run that way.
    let pool = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let pool = artforge_db::create_pool(&url)
                .await
                .context("Failed to connect to database")?;
            artforge_db::health_check(&pool)
                .await
                .context("Database health check failed")?;
            tracing::info!("Database connection pool created");
            Some(pool)
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set, running untracked (no job history)");
            None
        }
    };
    anyhow::ensure!(
        !(config.mode == ServerMode::Hosted && pool.is_none()),
        "hosted mode requires DATABASE_URL",
    );

    // --- Stores ---
    let jobs: Option<Arc<dyn JobStore>> = pool
        .clone()
        .map(|p| Arc::new(PgJobStore::new(p)) as Arc<dyn JobStore>);
    let gallery: Option<Arc<dyn GalleryStore>> = pool
        .clone()
        .map(|p| Arc::new(PgGalleryStore::new(p)) as Arc<dyn GalleryStore>);
    // Credits and quotas only exist in hosted mode.
    let (ledger, usage) = match (config.mode, pool) {
        (ServerMode::Hosted, Some(pool)) => (
            Some(CreditLedger::new(Arc::new(PgCreditStore::new(pool.clone())))),
            Some(Arc::new(PgUsageStore::new(pool)) as Arc<dyn UsageStore>),
        ),
        _ => (None, None),
    };

    // --- Providers ---
    let resolver = Arc::new(ProviderResolver::new(
        config.mode,
        config.providers.clone(),
        Duration::from_secs(config.provider_timeout_secs),
    ));
    let registry = Arc::new(ProviderRegistry::with_defaults());

    // --- Rate limiter ---
    let limiter = Arc::new(SlidingWindowLimiter::new(
        config.rate_limit_max,
        Duration::from_secs(config.rate_limit_window_secs),
    ));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        registry,
        resolver,
        jobs,
        ledger,
        usage,
        gallery,
        limiter,
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(config.host.parse().context("Invalid HOST address")?, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
