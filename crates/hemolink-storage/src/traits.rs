//! Storage traits for the blood bank storage abstraction layer.

use async_trait::async_trait;
use hemolink_core::{BloodProduct, Donation, Donor, ScreeningResult, SyncType, Timestamp};

use crate::error::StorageError;
use crate::types::{
    AuditEntry, JobCounters, PutOutcome, StoreMetrics, SyncJob, SyncOutcome, SyncTypeStatus,
};

/// The domain record store all backends must implement.
///
/// Implementations must be thread-safe (`Send + Sync`). Every mutating
/// method is responsible for appending to the audit trail itself (the
/// write-interceptor contract): callers cannot perform a domain write
/// that bypasses auditing.
///
/// Put semantics are idempotent per identity: a byte-identical payload
/// for an existing id returns [`PutOutcome::Unchanged`] without writing,
/// while a differing payload returns [`StorageError::Conflict`]. Records
/// are never silently overwritten.
#[async_trait]
pub trait BloodBankStore: Send + Sync {
    // ==================== Imports ====================

    /// Persists a donor.
    async fn put_donor(&self, donor: &Donor, actor: &str) -> Result<PutOutcome, StorageError>;

    /// Persists a donation. The referenced donor must already exist.
    async fn put_donation(
        &self,
        donation: &Donation,
        actor: &str,
    ) -> Result<PutOutcome, StorageError>;

    /// Persists a blood product. The referenced donation must already exist.
    async fn put_product(
        &self,
        product: &BloodProduct,
        actor: &str,
    ) -> Result<PutOutcome, StorageError>;

    /// Inserts a screening result under a server-assigned id.
    async fn insert_screening(
        &self,
        id: &str,
        result: &ScreeningResult,
        actor: &str,
    ) -> Result<(), StorageError>;

    // ==================== Reads ====================

    /// Reads a donor by id. Returns `None` if absent.
    async fn get_donor(&self, id: &str) -> Result<Option<Donor>, StorageError>;

    /// Reads a donation by id. Returns `None` if absent.
    async fn get_donation(&self, id: &str) -> Result<Option<Donation>, StorageError>;

    /// Returns whether another donation exists for the same donor on the
    /// same calendar day. Used for duplicate detection during import.
    async fn donation_exists_for_day(
        &self,
        donor_id: &str,
        date: time::Date,
        excluding_id: &str,
    ) -> Result<bool, StorageError>;

    /// Donations dated at or after the cutoff, newest first.
    async fn donations_since(&self, cutoff: Timestamp) -> Result<Vec<Donation>, StorageError>;

    /// Current inventory snapshot: AVAILABLE and RESERVED products.
    async fn current_inventory(&self) -> Result<Vec<BloodProduct>, StorageError>;

    /// All known donors.
    async fn list_donors(&self) -> Result<Vec<Donor>, StorageError>;

    // ==================== Health & metrics ====================

    /// Cheap reachability probe for readiness checks. Must not mutate state.
    async fn ping(&self) -> Result<(), StorageError>;

    /// Domain counts for the metrics endpoint.
    async fn metrics(&self) -> Result<StoreMetrics, StorageError>;

    // ==================== Audit ====================

    /// Most recent audit entries, newest first, up to `limit`.
    async fn audit_entries(&self, limit: usize) -> Result<Vec<AuditEntry>, StorageError>;

    /// Removes audit entries older than the cutoff. Returns how many were
    /// swept. This is the only sanctioned way audit entries disappear.
    async fn prune_audit(&self, older_than: Timestamp) -> Result<u64, StorageError>;

    // ==================== Metadata ====================

    /// Returns the name of this storage backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

/// Durable store for sync jobs and the per-type status rows.
#[async_trait]
pub trait SyncLogStore: Send + Sync {
    /// Inserts a freshly created job record.
    async fn insert_job(&self, job: &SyncJob) -> Result<(), StorageError>;

    /// Reads a job by id. Returns `None` if absent.
    async fn get_job(&self, id: &str) -> Result<Option<SyncJob>, StorageError>;

    /// Finalizes a job as `SUCCESS` with its counters and the raw remote
    /// response. The job record never changes after this call.
    async fn complete_job(
        &self,
        id: &str,
        counters: JobCounters,
        registry_response: Option<serde_json::Value>,
    ) -> Result<(), StorageError>;

    /// Finalizes a job as `FAILED`, capturing the error message verbatim.
    /// Records already accepted by the remote stay counted in `counters`.
    async fn fail_job(
        &self,
        id: &str,
        counters: JobCounters,
        error_message: String,
        registry_response: Option<serde_json::Value>,
    ) -> Result<(), StorageError>;

    /// Atomically transitions the type's status row to `syncing`.
    ///
    /// This is the mutual-exclusion point: the transition happens under a
    /// CAS on the row's version, and a row already in `syncing` yields
    /// [`StorageError::SyncInProgress`]. Exactly one of any number of
    /// concurrent callers wins.
    async fn begin_sync(&self, sync_type: SyncType) -> Result<(), StorageError>;

    /// Transitions the type's status row out of `syncing` into its
    /// resting outcome, updating last-sync bookkeeping.
    async fn finish_sync(
        &self,
        sync_type: SyncType,
        outcome: SyncOutcome,
    ) -> Result<(), StorageError>;

    /// Reads the status row for one sync type.
    async fn type_status(&self, sync_type: SyncType) -> Result<SyncTypeStatus, StorageError>;

    /// Reads all status rows.
    async fn all_type_statuses(&self) -> Result<Vec<SyncTypeStatus>, StorageError>;
}
