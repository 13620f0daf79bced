use hemolink_core::{
    BloodProduct, BloodType, Donation, Donor, JobStatus, ProductStatus, ScreeningResult, SyncState,
    SyncType, Timestamp, now_utc,
};
use hemolink_storage::{
    AuditEntry, AuditOperation, BloodBankStore, JobCounters, PutOutcome, STATUS_ERROR_HISTORY,
    StorageError, StoreMetrics, SyncJob, SyncLogStore, SyncOutcome, SyncTypeStatus,
};

use async_trait::async_trait;
use papaya::HashMap as PapayaHashMap;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

const TABLE_DONORS: &str = "donors";
const TABLE_DONATIONS: &str = "donations";
const TABLE_PRODUCTS: &str = "blood_products";
const TABLE_SCREENINGS: &str = "screening_results";
const TABLE_JOBS: &str = "sync_jobs";

/// In-memory blood bank store.
///
/// Record tables are lock-free papaya maps. The sync-type status rows go
/// through a single write lock so the `begin_sync` check-and-transition is
/// atomic; the version counter on each row records every transition.
pub struct InMemoryStore {
    donors: PapayaHashMap<String, Donor>,
    donations: PapayaHashMap<String, Donation>,
    products: PapayaHashMap<String, BloodProduct>,
    screenings: PapayaHashMap<String, ScreeningResult>,
    jobs: PapayaHashMap<String, SyncJob>,
    statuses: RwLock<HashMap<SyncType, SyncTypeStatus>>,
    audit: RwLock<Vec<AuditEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            donors: PapayaHashMap::new(),
            donations: PapayaHashMap::new(),
            products: PapayaHashMap::new(),
            screenings: PapayaHashMap::new(),
            jobs: PapayaHashMap::new(),
            statuses: RwLock::new(HashMap::new()),
            audit: RwLock::new(Vec::new()),
        }
    }

    async fn record_audit(
        &self,
        table: &str,
        operation: AuditOperation,
        record_id: &str,
        before: Option<Value>,
        after: Option<Value>,
        actor: &str,
    ) {
        let entry = AuditEntry::new(table, operation, record_id, before, after, actor);
        self.audit.write().await.push(entry);
    }

    /// Shared put logic: identical payload is a no-op, differing payload
    /// is a conflict, absent identity is an insert.
    fn check_and_insert<T>(
        map: &PapayaHashMap<String, T>,
        table: &str,
        id: &str,
        record: &T,
    ) -> Result<PutOutcome, StorageError>
    where
        T: Clone + PartialEq + Send + Sync,
    {
        let guard = map.pin();
        match guard.get(id) {
            Some(existing) if existing == record => Ok(PutOutcome::Unchanged),
            Some(_) => Err(StorageError::conflict(table, id)),
            None => {
                guard.insert(id.to_string(), record.clone());
                Ok(PutOutcome::Created)
            }
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BloodBankStore for InMemoryStore {
    async fn put_donor(&self, donor: &Donor, actor: &str) -> Result<PutOutcome, StorageError> {
        let outcome = Self::check_and_insert(&self.donors, TABLE_DONORS, &donor.id, donor)?;
        if outcome == PutOutcome::Created {
            let after = serde_json::to_value(donor)
                .map_err(|e| StorageError::internal(format!("donor snapshot: {e}")))?;
            self.record_audit(
                TABLE_DONORS,
                AuditOperation::Insert,
                &donor.id,
                None,
                Some(after),
                actor,
            )
            .await;
        }
        Ok(outcome)
    }

    async fn put_donation(
        &self,
        donation: &Donation,
        actor: &str,
    ) -> Result<PutOutcome, StorageError> {
        let outcome =
            Self::check_and_insert(&self.donations, TABLE_DONATIONS, &donation.id, donation)?;
        if outcome == PutOutcome::Created {
            let after = serde_json::to_value(donation)
                .map_err(|e| StorageError::internal(format!("donation snapshot: {e}")))?;
            self.record_audit(
                TABLE_DONATIONS,
                AuditOperation::Insert,
                &donation.id,
                None,
                Some(after),
                actor,
            )
            .await;
        }
        Ok(outcome)
    }

    async fn put_product(
        &self,
        product: &BloodProduct,
        actor: &str,
    ) -> Result<PutOutcome, StorageError> {
        // A product's only sanctioned mutation is a legal status
        // transition; any other difference is a conflict.
        let (outcome, before) = {
            let guard = self.products.pin();
            match guard.get(&product.id) {
                Some(existing) if existing == product => (PutOutcome::Unchanged, None),
                Some(existing) => {
                    let mut retargeted = existing.clone();
                    retargeted.status = product.status;
                    if &retargeted != product
                        || !existing.status.can_transition_to(product.status)
                    {
                        return Err(StorageError::conflict(TABLE_PRODUCTS, &product.id));
                    }
                    let before = serde_json::to_value(existing)
                        .map_err(|e| StorageError::internal(format!("product snapshot: {e}")))?;
                    guard.insert(product.id.clone(), product.clone());
                    (PutOutcome::Updated, Some(before))
                }
                None => {
                    guard.insert(product.id.clone(), product.clone());
                    (PutOutcome::Created, None)
                }
            }
        };
        if outcome != PutOutcome::Unchanged {
            let after = serde_json::to_value(product)
                .map_err(|e| StorageError::internal(format!("product snapshot: {e}")))?;
            let operation = match outcome {
                PutOutcome::Created => AuditOperation::Insert,
                _ => AuditOperation::Update,
            };
            self.record_audit(
                TABLE_PRODUCTS,
                operation,
                &product.id,
                before,
                Some(after),
                actor,
            )
            .await;
        }
        Ok(outcome)
    }

    async fn insert_screening(
        &self,
        id: &str,
        result: &ScreeningResult,
        actor: &str,
    ) -> Result<(), StorageError> {
        {
            let guard = self.screenings.pin();
            if guard.get(id).is_some() {
                return Err(StorageError::conflict(TABLE_SCREENINGS, id));
            }
            guard.insert(id.to_string(), result.clone());
        }
        let after = serde_json::to_value(result)
            .map_err(|e| StorageError::internal(format!("screening snapshot: {e}")))?;
        self.record_audit(
            TABLE_SCREENINGS,
            AuditOperation::Insert,
            id,
            None,
            Some(after),
            actor,
        )
        .await;
        Ok(())
    }

    async fn get_donor(&self, id: &str) -> Result<Option<Donor>, StorageError> {
        let guard = self.donors.pin();
        Ok(guard.get(id).cloned())
    }

    async fn get_donation(&self, id: &str) -> Result<Option<Donation>, StorageError> {
        let guard = self.donations.pin();
        Ok(guard.get(id).cloned())
    }

    async fn donation_exists_for_day(
        &self,
        donor_id: &str,
        date: time::Date,
        excluding_id: &str,
    ) -> Result<bool, StorageError> {
        let guard = self.donations.pin();
        Ok(guard.iter().any(|(id, donation)| {
            id != excluding_id
                && donation.donor_id == donor_id
                && donation.donation_date.date() == date
        }))
    }

    async fn donations_since(&self, cutoff: Timestamp) -> Result<Vec<Donation>, StorageError> {
        let mut matching: Vec<Donation> = {
            let guard = self.donations.pin();
            guard
                .iter()
                .filter(|(_, donation)| donation.donation_date >= cutoff)
                .map(|(_, donation)| donation.clone())
                .collect()
        };
        matching.sort_by(|a, b| b.donation_date.cmp(&a.donation_date));
        Ok(matching)
    }

    async fn current_inventory(&self) -> Result<Vec<BloodProduct>, StorageError> {
        let mut snapshot: Vec<BloodProduct> = {
            let guard = self.products.pin();
            guard
                .iter()
                .filter(|(_, product)| {
                    matches!(
                        product.status,
                        ProductStatus::Available | ProductStatus::Reserved
                    )
                })
                .map(|(_, product)| product.clone())
                .collect()
        };
        snapshot.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(snapshot)
    }

    async fn list_donors(&self) -> Result<Vec<Donor>, StorageError> {
        let mut donors: Vec<Donor> = {
            let guard = self.donors.pin();
            guard.iter().map(|(_, donor)| donor.clone()).collect()
        };
        donors.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(donors)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn metrics(&self) -> Result<StoreMetrics, StorageError> {
        let total_donations = self.donations.pin().len() as u64;

        let mut metrics = StoreMetrics {
            total_donations,
            ..StoreMetrics::default()
        };
        for blood_type in BloodType::ALL {
            metrics
                .blood_type_distribution
                .insert(blood_type.as_str().to_string(), 0);
        }

        let guard = self.products.pin();
        for (_, product) in guard.iter() {
            metrics.total_products += 1;
            match product.status {
                ProductStatus::Available => {
                    metrics.available_products += 1;
                    *metrics
                        .blood_type_distribution
                        .entry(product.blood_type.as_str().to_string())
                        .or_insert(0) += 1;
                }
                ProductStatus::Expired => metrics.expired_products += 1,
                _ => {}
            }
        }
        Ok(metrics)
    }

    async fn audit_entries(&self, limit: usize) -> Result<Vec<AuditEntry>, StorageError> {
        let audit = self.audit.read().await;
        Ok(audit.iter().rev().take(limit).cloned().collect())
    }

    async fn prune_audit(&self, older_than: Timestamp) -> Result<u64, StorageError> {
        let mut audit = self.audit.write().await;
        let before = audit.len();
        audit.retain(|entry| entry.recorded_at >= older_than);
        let swept = (before - audit.len()) as u64;
        if swept > 0 {
            tracing::info!(swept, "Audit retention sweep completed");
        }
        Ok(swept)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl SyncLogStore for InMemoryStore {
    async fn insert_job(&self, job: &SyncJob) -> Result<(), StorageError> {
        let guard = self.jobs.pin();
        if guard.get(&job.id).is_some() {
            return Err(StorageError::conflict(TABLE_JOBS, &job.id));
        }
        guard.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn get_job(&self, id: &str) -> Result<Option<SyncJob>, StorageError> {
        let guard = self.jobs.pin();
        Ok(guard.get(id).cloned())
    }

    async fn complete_job(
        &self,
        id: &str,
        counters: JobCounters,
        registry_response: Option<Value>,
    ) -> Result<(), StorageError> {
        self.finalize_job(id, JobStatus::Success, counters, None, registry_response)
    }

    async fn fail_job(
        &self,
        id: &str,
        counters: JobCounters,
        error_message: String,
        registry_response: Option<Value>,
    ) -> Result<(), StorageError> {
        self.finalize_job(
            id,
            JobStatus::Failed,
            counters,
            Some(error_message),
            registry_response,
        )
    }

    async fn begin_sync(&self, sync_type: SyncType) -> Result<(), StorageError> {
        let mut statuses = self.statuses.write().await;
        let row = statuses
            .entry(sync_type)
            .or_insert_with(|| SyncTypeStatus::new(sync_type));
        if !row.status.can_start() {
            return Err(StorageError::sync_in_progress(sync_type.as_str()));
        }
        row.status = SyncState::Syncing;
        row.version += 1;
        tracing::debug!(sync_type = %sync_type, version = row.version, "Sync type locked");
        Ok(())
    }

    async fn finish_sync(
        &self,
        sync_type: SyncType,
        outcome: SyncOutcome,
    ) -> Result<(), StorageError> {
        let mut statuses = self.statuses.write().await;
        let row = statuses
            .get_mut(&sync_type)
            .ok_or_else(|| StorageError::internal(format!("no status row for {sync_type}")))?;
        if row.status != SyncState::Syncing {
            return Err(StorageError::internal(format!(
                "finish_sync for {sync_type} but status is {}",
                row.status
            )));
        }
        match outcome {
            SyncOutcome::Healthy { records_synced } => {
                row.status = SyncState::Healthy;
                row.last_sync = Some(now_utc());
                row.records_synced += records_synced;
            }
            SyncOutcome::Error { message } => {
                row.status = SyncState::Error;
                row.last_errors.insert(0, message);
                row.last_errors.truncate(STATUS_ERROR_HISTORY);
            }
        }
        row.version += 1;
        Ok(())
    }

    async fn type_status(&self, sync_type: SyncType) -> Result<SyncTypeStatus, StorageError> {
        let statuses = self.statuses.read().await;
        Ok(statuses
            .get(&sync_type)
            .cloned()
            .unwrap_or_else(|| SyncTypeStatus::new(sync_type)))
    }

    async fn all_type_statuses(&self) -> Result<Vec<SyncTypeStatus>, StorageError> {
        let statuses = self.statuses.read().await;
        Ok(SyncType::ALL
            .iter()
            .map(|sync_type| {
                statuses
                    .get(sync_type)
                    .cloned()
                    .unwrap_or_else(|| SyncTypeStatus::new(*sync_type))
            })
            .collect())
    }
}

impl InMemoryStore {
    /// Applies terminal state to a job exactly once; jobs are append-only
    /// after completion.
    fn finalize_job(
        &self,
        id: &str,
        status: JobStatus,
        counters: JobCounters,
        error_message: Option<String>,
        registry_response: Option<Value>,
    ) -> Result<(), StorageError> {
        let guard = self.jobs.pin();
        let existing = guard
            .get(id)
            .ok_or_else(|| StorageError::not_found(TABLE_JOBS, id))?;
        if existing.is_terminal() {
            return Err(StorageError::internal(format!(
                "job {id} is already terminal ({})",
                existing.status
            )));
        }
        let mut job = existing.clone();
        job.status = status;
        job.records_processed = counters.processed;
        job.records_success = counters.success;
        job.records_failed = counters.failed;
        job.error_message = error_message;
        job.registry_response = registry_response;
        job.completed_at = Some(now_utc());
        guard.insert(id.to_string(), job);
        Ok(())
    }
}
