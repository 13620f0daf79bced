//! Health and status aggregation endpoints.
//!
//! Read-only composition of store reachability, registry reachability
//! (bounded ping), and service metadata. None of these handlers mutate
//! state, and the registry probe carries its own short timeout so a
//! hanging dependency cannot stall the check.

use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

use crate::state::AppState;
use hemolink_api::ApiError;
use hemolink_core::now_utc;

#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub database_status: String,
    pub registry_status: String,
    /// Latest status per sync type, straight from the status rows.
    pub sync_statuses: BTreeMap<String, String>,
    pub uptime_seconds: f64,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let database_status = match state.store.ping().await {
        Ok(()) => "healthy".to_string(),
        Err(err) => {
            tracing::error!(error = %err, "Database health check failed");
            format!("unhealthy: {err}")
        }
    };

    let registry_status = match state.registry.ping().await {
        Ok(()) => "healthy".to_string(),
        Err(err) => {
            tracing::error!(error = %err, "Registry health check failed");
            format!("unhealthy: {err}")
        }
    };

    let sync_statuses = match state.sync_log.all_type_statuses().await {
        Ok(rows) => rows
            .into_iter()
            .map(|row| (row.sync_type.to_string(), row.status.to_string()))
            .collect(),
        Err(_) => BTreeMap::new(),
    };

    let overall = if database_status == "healthy" && registry_status == "healthy" {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthCheckResponse {
        status: overall.to_string(),
        timestamp: now_utc().to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database_status,
        registry_status,
        sync_statuses,
        uptime_seconds: state.started_at.elapsed().as_secs_f64(),
    })
}

pub async fn live() -> impl IntoResponse {
    Json(json!({ "status": "alive", "timestamp": now_utc().to_string() }))
}

pub async fn ready(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state
        .store
        .ping()
        .await
        .map_err(|err| ApiError::service_unavailable(format!("store not ready: {err}")))?;
    Ok(Json(
        json!({ "status": "ready", "timestamp": now_utc().to_string() }),
    ))
}

pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let metrics = state
        .store
        .metrics()
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?;
    Ok(Json(json!({
        "total_donations": metrics.total_donations,
        "total_products": metrics.total_products,
        "available_products": metrics.available_products,
        "expired_products": metrics.expired_products,
        "blood_type_distribution": metrics.blood_type_distribution,
        "last_updated": now_utc().to_string(),
    })))
}

pub async fn version() -> impl IntoResponse {
    Json(json!({
        "service": "Hemolink DHIS2 Blood Bank Service",
        "version": env!("CARGO_PKG_VERSION"),
        "api_version": crate::API_PREFIX,
    }))
}

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "service": "Hemolink DHIS2 Blood Bank Service",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "health": format!("{}/health", crate::API_PREFIX),
        "timestamp": now_utc().to_string(),
    }))
}

pub async fn api_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "name": "Hemolink DHIS2 Blood Bank Service",
        "version": env!("CARGO_PKG_VERSION"),
        "api_version": crate::API_PREFIX,
        "registry_base_url": state.config.registry.base_url,
        "features": {
            "health_checks": true,
            "data_import": true,
            "registry_sync": true,
        },
        "endpoints": {
            "health": format!("{}/health", crate::API_PREFIX),
            "import": format!("{}/import", crate::API_PREFIX),
            "sync": format!("{}/sync", crate::API_PREFIX),
        },
    }))
}
