//! Storage abstraction layer for the Hemolink service.
//!
//! Defines the traits all storage backends implement, the stored record
//! types (sync jobs, per-type status rows, audit entries), and the storage
//! error taxonomy. The audit write-interceptor contract is part of the
//! [`BloodBankStore`] trait: every mutating operation appends its own
//! before/after snapshot.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{ErrorCategory, StorageError};
pub use traits::{BloodBankStore, SyncLogStore};
pub use types::{
    AuditEntry, AuditOperation, JobCounters, PutOutcome, STATUS_ERROR_HISTORY, StoreMetrics,
    SyncJob, SyncOutcome, SyncTypeStatus,
};

use std::sync::Arc;

/// Shared handle to a domain record store.
pub type DynBloodBankStore = Arc<dyn BloodBankStore>;

/// Shared handle to a sync log store.
pub type DynSyncLogStore = Arc<dyn SyncLogStore>;
