use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use hemolink_db_memory::InMemoryStore;
use hemolink_registry::RegistryClient;
use hemolink_storage::{DynBloodBankStore, DynSyncLogStore};

use crate::config::AppConfig;
use crate::handlers::{health, import, sync};
use crate::importer::BatchImporter;
use crate::middleware as app_middleware;
use crate::middleware::RateLimiter;
use crate::state::AppState;
use crate::sync::{DedupCache, JobRunner};
use hemolink_core::now_utc;

/// Wires up the shared state: store, registry client, dedup cache, job
/// runner, importer, rate limiter.
pub fn build_state(cfg: AppConfig) -> anyhow::Result<AppState> {
    let config = Arc::new(cfg);

    let backend = Arc::new(InMemoryStore::new());
    let store: DynBloodBankStore = backend.clone();
    let sync_log: DynSyncLogStore = backend;

    let registry = Arc::new(
        RegistryClient::new(config.registry.clone())
            .map_err(|e| anyhow::anyhow!("registry client init failed: {e}"))?,
    );
    let dedup = Arc::new(DedupCache::new());
    let runner = Arc::new(JobRunner::new(
        store.clone(),
        sync_log.clone(),
        registry.clone(),
        dedup.clone(),
        config.sync.clone(),
    ));
    let importer = Arc::new(BatchImporter::new(store.clone()));
    let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));

    Ok(AppState {
        config,
        store,
        sync_log,
        registry,
        dedup,
        runner,
        importer,
        limiter,
        started_at: Instant::now(),
    })
}

pub fn build_app(state: AppState) -> Router {
    let api = Router::new()
        // Health endpoints (unauthenticated, rate-limit exempt)
        .route("/health", get(health::health))
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .route("/health/metrics", get(health::metrics))
        .route("/health/version", get(health::version))
        .route("/info", get(health::api_info))
        // Import endpoints
        .route("/import/donors", post(import::import_donors))
        .route("/import/donations", post(import::import_donations))
        .route("/import/blood-products", post(import::import_blood_products))
        .route(
            "/import/screening-results",
            post(import::import_screening_results),
        )
        // Sync endpoints
        .route("/sync/status", get(sync::sync_status))
        .route("/sync/donations", post(sync::start_donations_sync))
        .route("/sync/inventory", post(sync::start_inventory_sync))
        .route("/sync/full", post(sync::start_full_sync))
        .route("/sync/logs/{sync_id}", get(sync::get_sync_log))
        .route("/sync/cache", delete(sync::clear_sync_cache));

    Router::new()
        .route("/", get(health::root))
        .nest(crate::API_PREFIX, api)
        // Middleware stack (order: request id -> rate limit -> cors/compression/trace -> body limit)
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::rate_limit,
        ))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(axum::extract::DefaultBodyLimit::max(
            state.config.server.body_limit_bytes,
        ))
        .with_state(state)
}

/// Periodic audit retention sweep.
pub fn start_audit_sweep(state: AppState) -> tokio::task::JoinHandle<()> {
    let interval_duration = std::time::Duration::from_secs(state.config.audit.sweep_interval_secs);
    let retention_days = state.config.audit.retention_days;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(interval_duration);
        loop {
            interval.tick().await;
            let cutoff = now_utc().saturating_sub_days(retention_days);
            match state.store.prune_audit(cutoff).await {
                Ok(swept) if swept > 0 => {
                    tracing::debug!(swept, "Audit sweep completed");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Audit sweep failed");
                }
                _ => {}
            }
        }
    })
}

pub struct HemolinkServer {
    addr: SocketAddr,
    app: Router,
    state: AppState,
}

pub struct ServerBuilder {
    config: AppConfig,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.config = cfg;
        self
    }

    pub fn build(self) -> anyhow::Result<HemolinkServer> {
        let state = build_state(self.config)?;
        let addr = state.config.addr();
        let app = build_app(state.clone());
        Ok(HemolinkServer { addr, app, state })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HemolinkServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let sweep = start_audit_sweep(self.state.clone());

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(
            listener,
            self.app
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        sweep.abort();
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
