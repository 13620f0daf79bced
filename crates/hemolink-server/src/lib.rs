pub mod config;
pub mod handlers;
pub mod importer;
pub mod middleware;
pub mod observability;
pub mod server;
pub mod state;
pub mod sync;

/// Versioned path prefix for the whole HTTP surface.
pub const API_PREFIX: &str = "/api/v1";

pub use config::AppConfig;
pub use importer::{BatchImporter, ImportOutcome};
pub use server::{HemolinkServer, ServerBuilder, build_app, build_state, start_audit_sweep};
pub use state::AppState;
