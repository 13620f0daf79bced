//! Sync endpoints.
//!
//! Start endpoints return `{status: "started", sync_id}` immediately;
//! all outcome detail is pushed into the pollable `sync/logs/{id}`
//! resource. A start on a type already syncing is surfaced as 409, not
//! as a job.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::state::AppState;
use hemolink_api::ApiError;
use hemolink_core::{SyncState, SyncType, Timestamp};
use hemolink_storage::{StorageError, SyncJob};

#[derive(Debug, Deserialize)]
pub struct DonationsSyncParams {
    pub days_back: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SyncStatusResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<Timestamp>,
    pub sync_status: String,
    pub records_synced: u64,
    pub errors: Vec<String>,
}

fn start_error(err: StorageError) -> ApiError {
    if err.is_sync_in_progress() {
        ApiError::conflict(err.to_string())
    } else {
        ApiError::internal(err.to_string())
    }
}

pub async fn start_donations_sync(
    State(state): State<AppState>,
    Query(params): Query<DonationsSyncParams>,
) -> Result<impl IntoResponse, ApiError> {
    let days_back = params
        .days_back
        .unwrap_or(state.config.sync.default_days_back);
    if days_back <= 0 {
        return Err(ApiError::bad_request("days_back must be > 0"));
    }

    let sync_id = state
        .runner
        .start(SyncType::Donations, Some(days_back))
        .await
        .map_err(start_error)?;
    Ok(Json(json!({
        "status": "started",
        "sync_id": sync_id,
        "message": format!("Donation sync initiated for last {days_back} days"),
    })))
}

pub async fn start_inventory_sync(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let sync_id = state
        .runner
        .start(SyncType::Inventory, None)
        .await
        .map_err(start_error)?;
    Ok(Json(json!({
        "status": "started",
        "sync_id": sync_id,
        "message": "Inventory sync initiated",
    })))
}

pub async fn start_full_sync(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let sync_id = state
        .runner
        .start(SyncType::Full, None)
        .await
        .map_err(start_error)?;
    Ok(Json(json!({
        "status": "started",
        "sync_id": sync_id,
        "message": "Full sync initiated",
    })))
}

pub async fn sync_status(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let statuses = state
        .sync_log
        .all_type_statuses()
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?;

    let last_sync = statuses.iter().filter_map(|row| row.last_sync).max();
    let records_synced = statuses.iter().map(|row| row.records_synced).sum();
    let errors: Vec<String> = statuses
        .iter()
        .flat_map(|row| row.last_errors.iter().cloned())
        .take(5)
        .collect();

    let sync_status = if statuses.iter().any(|row| row.status == SyncState::Syncing) {
        "syncing"
    } else if statuses.iter().any(|row| row.status == SyncState::Error) {
        "error"
    } else if statuses.iter().any(|row| row.status == SyncState::Healthy) {
        "healthy"
    } else {
        "idle"
    };

    Ok(Json(SyncStatusResponse {
        last_sync,
        sync_status: sync_status.to_string(),
        records_synced,
        errors,
    }))
}

pub async fn get_sync_log(
    State(state): State<AppState>,
    Path(sync_id): Path<String>,
) -> Result<Json<SyncJob>, ApiError> {
    let job = state
        .sync_log
        .get_job(&sync_id)
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?
        .ok_or_else(|| ApiError::not_found(format!("Sync log {sync_id} not found")))?;
    Ok(Json(job))
}

pub async fn clear_sync_cache(State(state): State<AppState>) -> impl IntoResponse {
    let cleared = state.dedup.clear();
    tracing::info!(cleared, "Sync cache cleared");
    Json(json!({
        "status": "success",
        "message": "Sync cache cleared",
    }))
}
