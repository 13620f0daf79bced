//! Dedup cache for export synchronization.
//!
//! Remembers which (sync type, entity) pairs were last submitted with
//! which content fingerprint, so unchanged records are not re-sent inside
//! the same or overlapping sync windows. Entries have no wall-clock
//! expiry: they are invalidated only by an explicit clear or superseded
//! by a newer fingerprint for the same identity.

use dashmap::DashMap;
use hemolink_core::{SyncType, Timestamp, now_utc};
use serde::Serialize;
use std::hash::{DefaultHasher, Hash, Hasher};

#[derive(Debug, Clone, Copy)]
struct DedupEntry {
    fingerprint: u64,
    #[allow(dead_code)]
    submitted_at: Timestamp,
}

/// Content hash over the record's serialized form.
pub fn fingerprint<T: Serialize>(record: &T) -> u64 {
    let serialized = serde_json::to_string(record).unwrap_or_default();
    let mut hasher = DefaultHasher::new();
    serialized.hash(&mut hasher);
    hasher.finish()
}

/// Shared across concurrent sync-type jobs: concurrent reads, per-entry
/// serialized writes.
#[derive(Default)]
pub struct DedupCache {
    entries: DashMap<String, DedupEntry>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(sync_type: SyncType, entity_id: &str) -> String {
        format!("{sync_type}:{entity_id}")
    }

    /// True if this exact content was already submitted for this entity
    /// under this sync type.
    pub fn is_unchanged(&self, sync_type: SyncType, entity_id: &str, fingerprint: u64) -> bool {
        self.entries
            .get(&Self::key(sync_type, entity_id))
            .map(|entry| entry.fingerprint == fingerprint)
            .unwrap_or(false)
    }

    /// Records a submission, superseding any older fingerprint.
    pub fn record_submission(&self, sync_type: SyncType, entity_id: &str, fingerprint: u64) {
        self.entries.insert(
            Self::key(sync_type, entity_id),
            DedupEntry {
                fingerprint,
                submitted_at: now_utc(),
            },
        );
    }

    /// Forces the next sync to resubmit everything. Used operationally to
    /// recover from suspected partial or ambiguous remote state.
    pub fn clear(&self) -> usize {
        let cleared = self.entries.len();
        self.entries.clear();
        cleared
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
