//! Stored record types shared by all storage backends.

use hemolink_core::{JobStatus, SyncState, SyncType, Timestamp, generate_id, now_utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// How many recent error messages a sync-type status row retains.
pub const STATUS_ERROR_HISTORY: usize = 5;

/// Outcome of an idempotent put.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// A new record was written.
    Created,
    /// An identical record already existed; nothing was written.
    Unchanged,
    /// An existing record was updated in a sanctioned way (currently only
    /// a legal blood-product status transition).
    Updated,
}

/// Durable record of one synchronization attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncJob {
    pub id: String,
    pub sync_type: SyncType,
    pub status: JobStatus,
    pub records_processed: u64,
    pub records_success: u64,
    pub records_failed: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Raw response payload from the remote registry, captured verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_response: Option<Value>,
    pub started_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

impl SyncJob {
    /// Creates a fresh job in the `Started` state with a generated id.
    pub fn new(sync_type: SyncType) -> Self {
        Self {
            id: generate_id(),
            sync_type,
            status: JobStatus::Started,
            records_processed: 0,
            records_success: 0,
            records_failed: 0,
            error_message: None,
            registry_response: None,
            started_at: now_utc(),
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Record counters finalized when a job reaches a terminal state.
///
/// Invariant: `success + failed == processed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounters {
    pub processed: u64,
    pub success: u64,
    pub failed: u64,
}

impl JobCounters {
    pub fn new(processed: u64, success: u64, failed: u64) -> Self {
        debug_assert_eq!(success + failed, processed);
        Self {
            processed,
            success,
            failed,
        }
    }
}

/// The single status row per sync type.
///
/// This row is the lock surface: every transition goes through a CAS on
/// `version`, so two concurrent start requests cannot both observe a
/// startable state and proceed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncTypeStatus {
    pub sync_type: SyncType,
    pub status: SyncState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<Timestamp>,
    pub records_synced: u64,
    #[serde(default)]
    pub last_errors: Vec<String>,
    /// CAS version counter; bumped on every transition.
    pub version: u64,
}

impl SyncTypeStatus {
    pub fn new(sync_type: SyncType) -> Self {
        Self {
            sync_type,
            status: SyncState::Idle,
            last_sync: None,
            records_synced: 0,
            last_errors: Vec::new(),
            version: 0,
        }
    }
}

/// Terminal outcome applied to a sync-type status row when a job finishes.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Healthy { records_synced: u64 },
    Error { message: String },
}

/// Mutation kind recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOperation {
    Insert,
    Update,
    Delete,
}

impl std::fmt::Display for AuditOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Insert => write!(f, "insert"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Immutable audit record written by the storage layer for every domain
/// mutation. Application code never updates or deletes these; only the
/// retention sweep removes entries older than the configured window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub table: String,
    pub operation: AuditOperation,
    pub record_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Value>,
    pub actor: String,
    pub recorded_at: Timestamp,
}

impl AuditEntry {
    pub fn new(
        table: impl Into<String>,
        operation: AuditOperation,
        record_id: impl Into<String>,
        before: Option<Value>,
        after: Option<Value>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_id(),
            table: table.into(),
            operation,
            record_id: record_id.into(),
            before,
            after,
            actor: actor.into(),
            recorded_at: now_utc(),
        }
    }
}

/// Domain counts served by the metrics endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreMetrics {
    pub total_donations: u64,
    pub total_products: u64,
    pub available_products: u64,
    pub expired_products: u64,
    /// Available stock per blood type; always carries all eight keys.
    pub blood_type_distribution: BTreeMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_starts_fresh() {
        let job = SyncJob::new(SyncType::Donations);
        assert_eq!(job.status, JobStatus::Started);
        assert!(!job.is_terminal());
        assert_eq!(job.records_processed, 0);
        assert!(job.completed_at.is_none());
        assert!(uuid::Uuid::parse_str(&job.id).is_ok());
    }

    #[test]
    fn test_job_serialization_skips_empty_fields() {
        let job = SyncJob::new(SyncType::Inventory);
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["sync_type"], "INVENTORY");
        assert_eq!(value["status"], "STARTED");
        assert!(value.get("error_message").is_none());
        assert!(value.get("completed_at").is_none());
    }

    #[test]
    fn test_status_row_starts_idle() {
        let status = SyncTypeStatus::new(SyncType::Full);
        assert_eq!(status.status, SyncState::Idle);
        assert_eq!(status.version, 0);
        assert!(status.last_sync.is_none());
    }

    #[test]
    fn test_counters_invariant() {
        let counters = JobCounters::new(10, 7, 3);
        assert_eq!(counters.success + counters.failed, counters.processed);
    }

    #[test]
    fn test_audit_entry_construction() {
        let entry = AuditEntry::new(
            "donors",
            AuditOperation::Insert,
            "D001",
            None,
            Some(serde_json::json!({"id": "D001"})),
            "import",
        );
        assert_eq!(entry.table, "donors");
        assert_eq!(entry.operation, AuditOperation::Insert);
        assert!(entry.before.is_none());
        assert_eq!(
            serde_json::to_value(entry.operation).unwrap(),
            serde_json::json!("insert")
        );
    }
}
