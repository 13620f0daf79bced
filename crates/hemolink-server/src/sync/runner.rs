//! Sync job runner: the explicit task abstraction behind the
//! fire-background-task / return-job-id / poll-status pattern.
//!
//! Terminal-state contract: every job started through [`JobRunner::start`]
//! ends in exactly one of `SUCCESS` or `FAILED`, with
//! `records_success + records_failed == records_processed`, and the
//! per-type status row released back to a resting state (`healthy` or
//! `error`). The start path performs the mutual-exclusion transition and
//! job insertion synchronously; all registry I/O happens on the spawned
//! task.

use std::sync::Arc;

use hemolink_core::{SyncType, now_utc};
use hemolink_registry::RegistryClient;
use hemolink_storage::{
    DynBloodBankStore, DynSyncLogStore, JobCounters, StorageError, SyncJob, SyncOutcome,
};
use serde_json::{Value, json};

use crate::config::SyncSettings;
use crate::sync::dedup::{DedupCache, fingerprint};

/// Terminal result of a job body: counters plus the raw remote response.
#[derive(Debug)]
struct JobCompletion {
    counters: JobCounters,
    response: Option<Value>,
}

/// Unrecoverable job failure; counters keep whatever the remote already
/// accepted before things went wrong.
#[derive(Debug)]
struct JobFailure {
    counters: JobCounters,
    message: String,
    response: Option<Value>,
}

impl JobFailure {
    fn from_storage(err: StorageError) -> Self {
        Self {
            counters: JobCounters::default(),
            message: err.to_string(),
            response: None,
        }
    }
}

#[derive(Clone)]
pub struct JobRunner {
    store: DynBloodBankStore,
    sync_log: DynSyncLogStore,
    registry: Arc<RegistryClient>,
    dedup: Arc<DedupCache>,
    settings: SyncSettings,
}

impl JobRunner {
    pub fn new(
        store: DynBloodBankStore,
        sync_log: DynSyncLogStore,
        registry: Arc<RegistryClient>,
        dedup: Arc<DedupCache>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            store,
            sync_log,
            registry,
            dedup,
            settings,
        }
    }

    /// Starts a sync job for the given type.
    ///
    /// Fast synchronous part: takes the per-type lock (CAS on the status
    /// row) and inserts the job record, then hands execution to a spawned
    /// task and returns the job id. A type already in `syncing` yields
    /// [`StorageError::SyncInProgress`] and no job.
    pub async fn start(
        &self,
        sync_type: SyncType,
        days_back: Option<i64>,
    ) -> Result<String, StorageError> {
        self.sync_log.begin_sync(sync_type).await?;

        let job = SyncJob::new(sync_type);
        if let Err(err) = self.sync_log.insert_job(&job).await {
            // Release the lock we just took
            let _ = self
                .sync_log
                .finish_sync(
                    sync_type,
                    SyncOutcome::Error {
                        message: format!("failed to create sync job: {err}"),
                    },
                )
                .await;
            return Err(err);
        }

        let job_id = job.id.clone();
        tracing::info!(job_id = %job_id, sync_type = %sync_type, "Sync job started");

        let runner = self.clone();
        tokio::spawn(async move {
            runner.execute(job, days_back).await;
        });

        Ok(job_id)
    }

    /// Drives a job to its terminal state. The per-type lock is already
    /// held and the job row exists.
    ///
    /// A full sync is not wrapped in the outer timeout: cancelling it
    /// mid-sub-job would leak the sub-type's lock. Instead each leg is
    /// bounded individually in `run_sub_job`, which keeps the composite
    /// bounded by the sum of its legs' timeouts.
    async fn execute(&self, job: SyncJob, days_back: Option<i64>) {
        let timeout = self.settings.job_timeout();
        let outcome = if matches!(job.sync_type, SyncType::Full) {
            Ok(self.dispatch(job.sync_type, days_back).await)
        } else {
            tokio::time::timeout(timeout, self.dispatch(job.sync_type, days_back)).await
        };

        match outcome {
            Ok(Ok(completion)) => {
                let counters = completion.counters;
                if let Err(err) = self
                    .sync_log
                    .complete_job(&job.id, counters, completion.response)
                    .await
                {
                    tracing::error!(job_id = %job.id, error = %err, "Failed to finalize sync job");
                }
                let _ = self
                    .sync_log
                    .finish_sync(
                        job.sync_type,
                        SyncOutcome::Healthy {
                            records_synced: counters.success,
                        },
                    )
                    .await;
                tracing::info!(
                    job_id = %job.id,
                    sync_type = %job.sync_type,
                    processed = counters.processed,
                    success = counters.success,
                    failed = counters.failed,
                    "Sync job completed"
                );
            }
            Ok(Err(failure)) => {
                self.fail(&job, failure).await;
            }
            Err(_elapsed) => {
                let message = format!(
                    "sync job timed out after {}ms and was force-terminated",
                    timeout.as_millis()
                );
                self.fail(
                    &job,
                    JobFailure {
                        counters: JobCounters::default(),
                        message,
                        response: None,
                    },
                )
                .await;
            }
        }
    }

    async fn fail(&self, job: &SyncJob, failure: JobFailure) {
        if let Err(err) = self
            .sync_log
            .fail_job(
                &job.id,
                failure.counters,
                failure.message.clone(),
                failure.response,
            )
            .await
        {
            tracing::error!(job_id = %job.id, error = %err, "Failed to record sync job failure");
        }
        let _ = self
            .sync_log
            .finish_sync(
                job.sync_type,
                SyncOutcome::Error {
                    message: failure.message.clone(),
                },
            )
            .await;
        tracing::error!(
            job_id = %job.id,
            sync_type = %job.sync_type,
            error = %failure.message,
            "Sync job failed"
        );
    }

    async fn dispatch(
        &self,
        sync_type: SyncType,
        days_back: Option<i64>,
    ) -> Result<JobCompletion, JobFailure> {
        match sync_type {
            SyncType::Donations => {
                self.run_donations(days_back.unwrap_or(self.settings.default_days_back))
                    .await
            }
            SyncType::Inventory => self.run_inventory().await,
            SyncType::Donors => self.run_donors().await,
            SyncType::Full => self.run_full().await,
        }
    }

    async fn run_donations(&self, days_back: i64) -> Result<JobCompletion, JobFailure> {
        let cutoff = now_utc().saturating_sub_days(days_back);
        let donations = self
            .store
            .donations_since(cutoff)
            .await
            .map_err(JobFailure::from_storage)?;
        let processed = donations.len() as u64;

        // Partition the window through the dedup cache
        let mut pending = Vec::new();
        let mut fingerprints = Vec::new();
        for donation in &donations {
            let fp = fingerprint(donation);
            if self
                .dedup
                .is_unchanged(SyncType::Donations, &donation.id, fp)
            {
                continue;
            }
            pending.push(donation.clone());
            fingerprints.push((donation.id.clone(), fp));
        }
        let skipped = processed - pending.len() as u64;

        if pending.is_empty() {
            tracing::debug!(window = processed, "All donations in window unchanged, nothing to submit");
            return Ok(JobCompletion {
                counters: JobCounters::new(processed, processed, 0),
                response: None,
            });
        }

        match self.registry.export_donations(&pending).await {
            Ok(summary) => {
                let submitted = pending.len() as u64;
                let accepted = summary.accepted().min(submitted);
                for (id, fp) in &fingerprints {
                    self.dedup.record_submission(SyncType::Donations, id, *fp);
                }
                let success = skipped + accepted;
                Ok(JobCompletion {
                    counters: JobCounters::new(processed, success, processed - success),
                    response: Some(summary.raw),
                })
            }
            Err(err) => Err(JobFailure {
                counters: JobCounters::new(processed, skipped, processed - skipped),
                message: err.to_string(),
                response: None,
            }),
        }
    }

    async fn run_inventory(&self) -> Result<JobCompletion, JobFailure> {
        let snapshot = self
            .store
            .current_inventory()
            .await
            .map_err(JobFailure::from_storage)?;
        let processed = snapshot.len() as u64;

        // Inventory exports aggregate counts, so a partial snapshot would
        // underreport: submit either the full snapshot or nothing.
        let fingerprints: Vec<(String, u64)> = snapshot
            .iter()
            .map(|product| (product.id.clone(), fingerprint(product)))
            .collect();
        let any_changed = fingerprints
            .iter()
            .any(|(id, fp)| !self.dedup.is_unchanged(SyncType::Inventory, id, *fp));

        if !any_changed {
            tracing::debug!(snapshot = processed, "Inventory snapshot unchanged, nothing to submit");
            return Ok(JobCompletion {
                counters: JobCounters::new(processed, processed, 0),
                response: None,
            });
        }

        match self.registry.export_inventory(&snapshot).await {
            Ok(summary) => {
                for (id, fp) in &fingerprints {
                    self.dedup.record_submission(SyncType::Inventory, id, *fp);
                }
                Ok(JobCompletion {
                    counters: JobCounters::new(processed, processed, 0),
                    response: Some(summary.raw),
                })
            }
            Err(err) => Err(JobFailure {
                counters: JobCounters::new(processed, 0, processed),
                message: err.to_string(),
                response: None,
            }),
        }
    }

    async fn run_donors(&self) -> Result<JobCompletion, JobFailure> {
        let donors = self
            .store
            .list_donors()
            .await
            .map_err(JobFailure::from_storage)?;
        let processed = donors.len() as u64;

        let mut pending = Vec::new();
        for donor in &donors {
            let fp = fingerprint(donor);
            if self.dedup.is_unchanged(SyncType::Donors, &donor.id, fp) {
                continue;
            }
            pending.push((donor.clone(), fp));
        }
        let skipped = processed - pending.len() as u64;

        // One registry call per donor so partial acceptance stays counted
        let mut accepted: u64 = 0;
        let mut responses = Vec::new();
        for (donor, fp) in &pending {
            match self.registry.create_tracked_entity(donor).await {
                Ok(raw) => {
                    accepted += 1;
                    responses.push(raw);
                    self.dedup.record_submission(SyncType::Donors, &donor.id, *fp);
                }
                Err(err) => {
                    return Err(JobFailure {
                        counters: JobCounters::new(
                            processed,
                            skipped + accepted,
                            processed - skipped - accepted,
                        ),
                        message: err.to_string(),
                        response: Some(Value::Array(responses)),
                    });
                }
            }
        }

        let response = if responses.is_empty() {
            None
        } else {
            Some(json!({ "registered": accepted, "responses": responses }))
        };
        Ok(JobCompletion {
            counters: JobCounters::new(processed, processed, 0),
            response,
        })
    }

    /// Composite sync: donations, inventory, donors run sequentially as
    /// sub-jobs with their own job rows and type locks. The composite
    /// fails on the first failing sub-job; earlier sub-jobs' results are
    /// preserved in the composite counters and response.
    async fn run_full(&self) -> Result<JobCompletion, JobFailure> {
        let legs: [(&str, SyncType, Option<i64>); 3] = [
            (
                "donations",
                SyncType::Donations,
                Some(self.settings.full_sync_days_back),
            ),
            ("inventory", SyncType::Inventory, None),
            ("donors", SyncType::Donors, None),
        ];

        let mut total = JobCounters::default();
        let mut parts = serde_json::Map::new();

        for (label, sync_type, days_back) in legs {
            let (sub_id, result) = self.run_sub_job(sync_type, days_back).await;
            match result {
                Ok(completion) => {
                    total.processed += completion.counters.processed;
                    total.success += completion.counters.success;
                    total.failed += completion.counters.failed;
                    parts.insert(
                        label.to_string(),
                        json!({
                            "sync_id": sub_id,
                            "status": "SUCCESS",
                            "records_processed": completion.counters.processed,
                        }),
                    );
                }
                Err(failure) => {
                    total.processed += failure.counters.processed;
                    total.success += failure.counters.success;
                    total.failed += failure.counters.failed;
                    parts.insert(
                        label.to_string(),
                        json!({
                            "sync_id": sub_id,
                            "status": "FAILED",
                            "error": failure.message,
                        }),
                    );
                    return Err(JobFailure {
                        counters: total,
                        message: format!("{label} sub-job failed: {}", failure.message),
                        response: Some(Value::Object(parts)),
                    });
                }
            }
        }

        Ok(JobCompletion {
            counters: total,
            response: Some(Value::Object(parts)),
        })
    }

    /// Runs one leg of a full sync with its own complete job lifecycle.
    /// Returns the sub-job id (empty if the leg's lock could not be taken)
    /// alongside the result.
    async fn run_sub_job(
        &self,
        sync_type: SyncType,
        days_back: Option<i64>,
    ) -> (String, Result<JobCompletion, JobFailure>) {
        if let Err(err) = self.sync_log.begin_sync(sync_type).await {
            return (String::new(), Err(JobFailure::from_storage(err)));
        }

        let job = SyncJob::new(sync_type);
        if let Err(err) = self.sync_log.insert_job(&job).await {
            let _ = self
                .sync_log
                .finish_sync(
                    sync_type,
                    SyncOutcome::Error {
                        message: format!("failed to create sync job: {err}"),
                    },
                )
                .await;
            return (String::new(), Err(JobFailure::from_storage(err)));
        }

        let timeout = self.settings.job_timeout();
        let result = match tokio::time::timeout(timeout, Box::pin(self.dispatch(sync_type, days_back))).await
        {
            Ok(result) => result,
            Err(_elapsed) => Err(JobFailure {
                counters: JobCounters::default(),
                message: format!(
                    "sync job timed out after {}ms and was force-terminated",
                    timeout.as_millis()
                ),
                response: None,
            }),
        };
        match &result {
            Ok(completion) => {
                let _ = self
                    .sync_log
                    .complete_job(&job.id, completion.counters, completion.response.clone())
                    .await;
                let _ = self
                    .sync_log
                    .finish_sync(
                        sync_type,
                        SyncOutcome::Healthy {
                            records_synced: completion.counters.success,
                        },
                    )
                    .await;
            }
            Err(failure) => {
                let _ = self
                    .sync_log
                    .fail_job(
                        &job.id,
                        failure.counters,
                        failure.message.clone(),
                        failure.response.clone(),
                    )
                    .await;
                let _ = self
                    .sync_log
                    .finish_sync(
                        sync_type,
                        SyncOutcome::Error {
                            message: failure.message.clone(),
                        },
                    )
                    .await;
            }
        }
        (job.id, result)
    }
}
