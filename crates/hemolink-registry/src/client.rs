use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::payload::{
    DataValue, donation_data_values, donor_tracked_entity, inventory_data_values,
};
use hemolink_core::{BloodProduct, Donation, Donor, now_utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::future::Future;
use std::time::Duration;

/// Parsed DHIS2 import summary, with the raw response kept verbatim for
/// the sync log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub status: String,
    pub imported: u64,
    pub updated: u64,
    pub ignored: u64,
    pub deleted: u64,
    #[serde(default)]
    pub conflicts: Vec<Value>,
    pub raw: Value,
}

impl ImportSummary {
    /// Records the remote accepted, either as new or as updates.
    pub fn accepted(&self) -> u64 {
        self.imported + self.updated
    }

    fn from_response(raw: Value) -> Self {
        let summary = raw.get("importSummary").cloned().unwrap_or_default();
        let count = |key: &str| summary.get(key).and_then(Value::as_u64).unwrap_or(0);
        Self {
            status: summary
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("ERROR")
                .to_string(),
            imported: count("importCount"),
            updated: count("updateCount"),
            ignored: count("ignoreCount"),
            deleted: count("deleteCount"),
            conflicts: summary
                .get("conflicts")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            raw,
        }
    }
}

/// HTTP adapter for the DHIS2 registry.
///
/// This is the single point of network failure in the system: every
/// remote call is classified transient or fatal, and transient calls are
/// retried with exponential backoff up to the configured attempt bound.
pub struct RegistryClient {
    http: reqwest::Client,
    cfg: RegistryConfig,
}

impl RegistryClient {
    pub fn new(cfg: RegistryConfig) -> Result<Self, RegistryError> {
        cfg.validate().map_err(RegistryError::Configuration)?;
        let http = reqwest::Client::builder()
            .timeout(cfg.timeout())
            .build()
            .map_err(|e| RegistryError::Configuration(e.to_string()))?;
        Ok(Self { http, cfg })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.cfg
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/api/{}{path}",
            self.cfg.base_url.trim_end_matches('/'),
            self.cfg.api_version
        )
    }

    /// Lightweight authenticated reachability probe (`GET /me`).
    ///
    /// Bounded by its own short timeout and never retried; health checks
    /// must not hang behind a slow registry.
    pub async fn ping(&self) -> Result<(), RegistryError> {
        let response = self
            .http
            .get(self.api_url("/me"))
            .basic_auth(&self.cfg.username, Some(&self.cfg.password))
            .timeout(self.cfg.ping_timeout())
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(RegistryError::from_status(status.as_u16(), body))
        }
    }

    /// Posts a data value set with CREATE_AND_UPDATE semantics.
    pub async fn import_data_values(
        &self,
        data_values: &[DataValue],
    ) -> Result<ImportSummary, RegistryError> {
        let body = json!({ "dataValues": data_values });
        let summary = self
            .with_retry("dataValueSets", || async {
                let response = self
                    .http
                    .post(self.api_url("/dataValueSets"))
                    .query(&[("importStrategy", "CREATE_AND_UPDATE")])
                    .basic_auth(&self.cfg.username, Some(&self.cfg.password))
                    .json(&body)
                    .send()
                    .await?;
                let status = response.status();
                if !status.is_success() {
                    let text = response.text().await.unwrap_or_default();
                    return Err(RegistryError::from_status(status.as_u16(), text));
                }
                let raw: Value = response.json().await?;
                Ok(ImportSummary::from_response(raw))
            })
            .await?;
        tracing::debug!(
            imported = summary.imported,
            updated = summary.updated,
            ignored = summary.ignored,
            "Data values submitted"
        );
        Ok(summary)
    }

    /// Exports donations as per-donation data values.
    pub async fn export_donations(
        &self,
        donations: &[Donation],
    ) -> Result<ImportSummary, RegistryError> {
        let data_values: Vec<DataValue> = donations
            .iter()
            .flat_map(|donation| donation_data_values(donation, &self.cfg))
            .collect();
        self.import_data_values(&data_values).await
    }

    /// Exports the inventory snapshot as aggregate counts.
    pub async fn export_inventory(
        &self,
        products: &[BloodProduct],
    ) -> Result<ImportSummary, RegistryError> {
        let now = now_utc();
        let data_values = inventory_data_values(products, &now, &self.cfg);
        self.import_data_values(&data_values).await
    }

    /// Registers a single donor as a tracked entity instance.
    ///
    /// Donor export is one call per donor so the caller can count exactly
    /// how many registrations the remote accepted before a failure.
    pub async fn create_tracked_entity(&self, donor: &Donor) -> Result<Value, RegistryError> {
        let payload = donor_tracked_entity(donor, &self.cfg);
        self.with_retry("trackedEntityInstances", || async {
            let response = self
                .http
                .post(self.api_url("/trackedEntityInstances"))
                .basic_auth(&self.cfg.username, Some(&self.cfg.password))
                .json(&payload)
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(RegistryError::from_status(status.as_u16(), text));
            }
            let raw: Value = response.json().await?;
            Ok(raw)
        })
        .await
    }

    /// Runs an operation with bounded retries on transient failures.
    async fn with_retry<T, F, Fut>(&self, operation: &str, f: F) -> Result<T, RegistryError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, RegistryError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt + 1 < self.cfg.max_retry_attempts => {
                    let delay =
                        Duration::from_millis(self.cfg.retry_base_delay_ms << attempt.min(6));
                    tracing::warn!(
                        operation,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient registry failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::error!(operation, attempts = attempt + 1, error = %err, "Registry call failed");
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_summary_parsing() {
        let raw = json!({
            "importSummary": {
                "status": "SUCCESS",
                "importCount": 3,
                "updateCount": 1,
                "ignoreCount": 0,
                "deleteCount": 0,
                "conflicts": []
            }
        });
        let summary = ImportSummary::from_response(raw.clone());
        assert_eq!(summary.status, "SUCCESS");
        assert_eq!(summary.imported, 3);
        assert_eq!(summary.accepted(), 4);
        assert_eq!(summary.raw, raw);
    }

    #[test]
    fn test_import_summary_missing_fields_default() {
        let summary = ImportSummary::from_response(json!({}));
        assert_eq!(summary.status, "ERROR");
        assert_eq!(summary.accepted(), 0);
    }

    #[test]
    fn test_api_url_joins_version() {
        let cfg = RegistryConfig {
            base_url: "https://dhis2.example.org/".into(),
            ..RegistryConfig::default()
        };
        let client = RegistryClient::new(cfg).unwrap();
        assert_eq!(
            client.api_url("/dataValueSets"),
            "https://dhis2.example.org/api/40/dataValueSets"
        );
    }
}
