//! Import endpoints.
//!
//! Each endpoint takes a JSON array of entity objects and always answers
//! with HTTP 200 and embedded per-record errors; partial data problems
//! never produce a hard failure. Only malformed requests or exhausted
//! rate limits yield 4xx.

use axum::{Json, extract::State, extract::rejection::JsonRejection, response::IntoResponse};
use serde_json::{Value, json};

use crate::importer::ImportOutcome;
use crate::state::AppState;
use hemolink_api::ApiError;

fn import_response(outcome: ImportOutcome, noun: &str) -> Value {
    json!({
        "status": "completed",
        "imported_count": outcome.imported_count,
        "failed_count": outcome.failed_count,
        "errors": outcome.errors,
        "message": format!("Successfully imported {} {noun}", outcome.imported_count),
    })
}

// Malformed request bodies get the standard error shape, not the
// extractor's default plain-text rejection.
fn records_or_reject(
    payload: Result<Json<Vec<Value>>, JsonRejection>,
) -> Result<Vec<Value>, ApiError> {
    match payload {
        Ok(Json(records)) => Ok(records),
        Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
    }
}

pub async fn import_donors(
    State(state): State<AppState>,
    payload: Result<Json<Vec<Value>>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let records = records_or_reject(payload)?;
    let outcome = state.importer.import_donors(records).await;
    Ok(Json(import_response(outcome, "donors")))
}

pub async fn import_donations(
    State(state): State<AppState>,
    payload: Result<Json<Vec<Value>>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let records = records_or_reject(payload)?;
    let outcome = state.importer.import_donations(records).await;
    Ok(Json(import_response(outcome, "donations")))
}

pub async fn import_blood_products(
    State(state): State<AppState>,
    payload: Result<Json<Vec<Value>>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let records = records_or_reject(payload)?;
    let outcome = state.importer.import_products(records).await;
    Ok(Json(import_response(outcome, "blood products")))
}

pub async fn import_screening_results(
    State(state): State<AppState>,
    payload: Result<Json<Vec<Value>>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let records = records_or_reject(payload)?;
    let outcome = state.importer.import_screenings(records).await;
    Ok(Json(import_response(outcome, "screening results")))
}
