use std::sync::Arc;
use std::time::Instant;

use hemolink_registry::RegistryClient;
use hemolink_storage::{DynBloodBankStore, DynSyncLogStore};

use crate::config::AppConfig;
use crate::importer::BatchImporter;
use crate::middleware::RateLimiter;
use crate::sync::{DedupCache, JobRunner};

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: DynBloodBankStore,
    pub sync_log: DynSyncLogStore,
    pub registry: Arc<RegistryClient>,
    pub dedup: Arc<DedupCache>,
    pub runner: Arc<JobRunner>,
    pub importer: Arc<BatchImporter>,
    pub limiter: Arc<RateLimiter>,
    pub started_at: Instant,
}
