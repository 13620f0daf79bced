//! Batch importer: per-record validation, referential checks, idempotent
//! persistence, partial-failure accounting.
//!
//! A bad record never aborts the batch. Every record is parsed, validated,
//! and persisted individually; failures land in the outcome's ordered
//! `errors` list and the batch finishes with status `completed` either way.

use hemolink_core::{
    BloodProduct, Donation, Donor, ScreeningResult, ValidationError, generate_id, now_utc,
    validate::{validate_donation, validate_donor, validate_product, validate_screening},
};
use hemolink_storage::DynBloodBankStore;
use serde_json::Value;

const ACTOR: &str = "import";

/// Result of one import batch. `imported_count + failed_count` always
/// equals the input length, and every failure's reason appears in
/// `errors` in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportOutcome {
    pub imported_count: usize,
    pub failed_count: usize,
    pub errors: Vec<String>,
}

impl ImportOutcome {
    fn absorb(&mut self, result: Result<(), String>) {
        match result {
            Ok(()) => self.imported_count += 1,
            Err(message) => {
                self.failed_count += 1;
                self.errors.push(message);
            }
        }
    }
}

pub struct BatchImporter {
    store: DynBloodBankStore,
}

impl BatchImporter {
    pub fn new(store: DynBloodBankStore) -> Self {
        Self { store }
    }

    pub async fn import_donors(&self, records: Vec<Value>) -> ImportOutcome {
        let mut outcome = ImportOutcome::default();
        for raw in &records {
            outcome.absorb(self.import_one_donor(raw).await);
        }
        tracing::info!(
            imported = outcome.imported_count,
            failed = outcome.failed_count,
            "Donors import completed"
        );
        outcome
    }

    pub async fn import_donations(&self, records: Vec<Value>) -> ImportOutcome {
        let mut outcome = ImportOutcome::default();
        for raw in &records {
            outcome.absorb(self.import_one_donation(raw).await);
        }
        tracing::info!(
            imported = outcome.imported_count,
            failed = outcome.failed_count,
            "Donations import completed"
        );
        outcome
    }

    pub async fn import_products(&self, records: Vec<Value>) -> ImportOutcome {
        let mut outcome = ImportOutcome::default();
        for raw in &records {
            outcome.absorb(self.import_one_product(raw).await);
        }
        tracing::info!(
            imported = outcome.imported_count,
            failed = outcome.failed_count,
            "Blood products import completed"
        );
        outcome
    }

    pub async fn import_screenings(&self, records: Vec<Value>) -> ImportOutcome {
        let mut outcome = ImportOutcome::default();
        for raw in &records {
            outcome.absorb(self.import_one_screening(raw).await);
        }
        tracing::info!(
            imported = outcome.imported_count,
            failed = outcome.failed_count,
            "Screening results import completed"
        );
        outcome
    }

    async fn import_one_donor(&self, raw: &Value) -> Result<(), String> {
        let donor: Donor = parse_record("Donor", raw)?;
        validate_donor(&donor).map_err(|e| e.to_string())?;
        self.store
            .put_donor(&donor, ACTOR)
            .await
            .map_err(|e| format!("Donor {}: {e}", donor.id))?;
        Ok(())
    }

    async fn import_one_donation(&self, raw: &Value) -> Result<(), String> {
        let donation: Donation = parse_record("Donation", raw)?;
        validate_donation(&donation, now_utc()).map_err(|e| e.to_string())?;

        let donor = self
            .store
            .get_donor(&donation.donor_id)
            .await
            .map_err(|e| format!("Donation {}: {e}", donation.id))?;
        if donor.is_none() {
            return Err(ValidationError::DonorNotFound {
                id: donation.id.clone(),
                donor_id: donation.donor_id.clone(),
            }
            .to_string());
        }

        let duplicate = self
            .store
            .donation_exists_for_day(
                &donation.donor_id,
                donation.donation_date.date(),
                &donation.id,
            )
            .await
            .map_err(|e| format!("Donation {}: {e}", donation.id))?;
        if duplicate {
            return Err(ValidationError::DuplicateDonation {
                id: donation.id.clone(),
                donor_id: donation.donor_id.clone(),
                date: donation.donation_date.date().to_string(),
            }
            .to_string());
        }

        self.store
            .put_donation(&donation, ACTOR)
            .await
            .map_err(|e| format!("Donation {}: {e}", donation.id))?;
        Ok(())
    }

    async fn import_one_product(&self, raw: &Value) -> Result<(), String> {
        let product: BloodProduct = parse_record("Product", raw)?;

        let source = self
            .store
            .get_donation(&product.donation_id)
            .await
            .map_err(|e| format!("Product {}: {e}", product.id))?;
        let Some(source) = source else {
            return Err(ValidationError::DonationNotFound {
                id: product.id.clone(),
                donation_id: product.donation_id.clone(),
            }
            .to_string());
        };

        validate_product(&product, &source).map_err(|e| e.to_string())?;
        self.store
            .put_product(&product, ACTOR)
            .await
            .map_err(|e| format!("Product {}: {e}", product.id))?;
        Ok(())
    }

    async fn import_one_screening(&self, raw: &Value) -> Result<(), String> {
        let result: ScreeningResult = parse_screening(raw)?;
        validate_screening(&result).map_err(|e| e.to_string())?;

        let donor = self
            .store
            .get_donor(&result.donor_id)
            .await
            .map_err(|e| format!("Screening result for donor {}: {e}", result.donor_id))?;
        if donor.is_none() {
            return Err(ValidationError::ScreeningDonorNotFound {
                donor_id: result.donor_id.clone(),
            }
            .to_string());
        }

        // Screening results get a server-assigned identity
        self.store
            .insert_screening(&generate_id(), &result, ACTOR)
            .await
            .map_err(|e| format!("Screening result for donor {}: {e}", result.donor_id))?;
        Ok(())
    }
}

fn parse_record<T: serde::de::DeserializeOwned>(kind: &str, raw: &Value) -> Result<T, String> {
    serde_json::from_value(raw.clone()).map_err(|e| {
        let label = raw
            .get("id")
            .and_then(Value::as_str)
            .map(|id| format!("{kind} {id}"))
            .unwrap_or_else(|| kind.to_string());
        format!("{label}: invalid payload: {e}")
    })
}

fn parse_screening(raw: &Value) -> Result<ScreeningResult, String> {
    serde_json::from_value(raw.clone()).map_err(|e| {
        let label = raw
            .get("donor_id")
            .and_then(Value::as_str)
            .map(|id| format!("Screening result for donor {id}"))
            .unwrap_or_else(|| "Screening result".to_string());
        format!("{label}: invalid payload: {e}")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hemolink_db_memory::InMemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn importer() -> (BatchImporter, DynBloodBankStore) {
        let store: DynBloodBankStore = Arc::new(InMemoryStore::new());
        (BatchImporter::new(store.clone()), store)
    }

    fn donor_json(id: &str, age: u32) -> Value {
        json!({"id": id, "age": age, "gender": "MALE"})
    }

    fn donation_json(id: &str, donor_id: &str, volume: f64) -> Value {
        let date = hemolink_core::now_utc().saturating_sub_days(1).to_string();
        json!({
            "id": id,
            "donor_id": donor_id,
            "donation_date": date,
            "blood_type": "A+",
            "volume_collected": volume,
            "collection_site": "Central",
            "staff_id": "S1"
        })
    }

    #[tokio::test]
    async fn test_partial_failure_accounting() {
        let (importer, _) = importer();
        let batch = vec![
            donor_json("D001", 30),
            donor_json("D002", 17), // under age
            donor_json("D003", 65),
            json!({"id": "D004"}), // missing fields
        ];
        let len = batch.len();
        let outcome = importer.import_donors(batch).await;

        assert_eq!(outcome.imported_count, 2);
        assert_eq!(outcome.failed_count, 2);
        assert_eq!(outcome.imported_count + outcome.failed_count, len);
        assert_eq!(outcome.errors.len(), 2);
        assert!(outcome.errors[0].contains("D002"));
        assert!(outcome.errors[1].contains("D004"));
    }

    #[tokio::test]
    async fn test_reimport_identical_donor_is_idempotent() {
        let (importer, store) = importer();
        importer.import_donors(vec![donor_json("D001", 30)]).await;
        let outcome = importer.import_donors(vec![donor_json("D001", 30)]).await;
        assert_eq!(outcome.imported_count, 1);
        assert_eq!(outcome.failed_count, 0);

        // No duplicate audit entry for the unchanged re-import
        assert_eq!(store.audit_entries(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_conflicting_payload_rejected_with_error() {
        let (importer, store) = importer();
        importer.import_donors(vec![donor_json("D001", 30)]).await;
        let outcome = importer.import_donors(vec![donor_json("D001", 45)]).await;
        assert_eq!(outcome.imported_count, 0);
        assert_eq!(outcome.failed_count, 1);
        assert!(outcome.errors[0].contains("D001"));
        assert!(outcome.errors[0].contains("conflict"));

        // Not overwritten
        assert_eq!(store.get_donor("D001").await.unwrap().unwrap().age, 30);
    }

    #[tokio::test]
    async fn test_donation_with_missing_donor_fails_without_row() {
        let (importer, store) = importer();
        let outcome = importer
            .import_donations(vec![donation_json("DON001", "D404", 450.0)])
            .await;
        assert_eq!(outcome.failed_count, 1);
        assert!(outcome.errors[0].contains("Donor D404 not found"));
        assert!(store.get_donation("DON001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_donation_volume_boundaries_through_import() {
        let (importer, _) = importer();
        importer.import_donors(vec![donor_json("D001", 30)]).await;

        let outcome = importer
            .import_donations(vec![
                donation_json("DON299", "D001", 299.0),
                donation_json("DON300", "D001", 300.0),
            ])
            .await;
        assert_eq!(outcome.imported_count, 1);
        assert_eq!(outcome.failed_count, 1);
        assert!(outcome.errors[0].contains("DON299"));
    }

    #[tokio::test]
    async fn test_same_day_duplicate_donation_rejected() {
        let (importer, _) = importer();
        importer.import_donors(vec![donor_json("D001", 30)]).await;
        importer
            .import_donations(vec![donation_json("DON001", "D001", 450.0)])
            .await;

        let outcome = importer
            .import_donations(vec![donation_json("DON002", "D001", 420.0)])
            .await;
        assert_eq!(outcome.failed_count, 1);
        assert!(outcome.errors[0].contains("duplicate donation"));
    }

    #[tokio::test]
    async fn test_screening_requires_existing_donor() {
        let (importer, _) = importer();
        let screening = json!({
            "donor_id": "D404",
            "blood_type": "A+",
            "hemoglobin_level": 14.5,
            "hiv_test": true,
            "hepatitis_b_test": true,
            "hepatitis_c_test": true,
            "syphilis_test": true,
            "screening_date": "2024-05-01T10:00:00Z"
        });
        let outcome = importer.import_screenings(vec![screening]).await;
        assert_eq!(outcome.failed_count, 1);
        assert!(outcome.errors[0].contains("donor not found"));
    }

    #[tokio::test]
    async fn test_product_import_checks_source_donation() {
        let (importer, _) = importer();
        importer.import_donors(vec![donor_json("D001", 30)]).await;
        importer
            .import_donations(vec![donation_json("DON001", "D001", 450.0)])
            .await;

        let good = json!({
            "id": "P001",
            "donation_id": "DON001",
            "blood_type": "A+",
            "product_type": "Plasma",
            "volume": 200.0,
            "collection_date": "2024-05-01T10:00:00Z",
            "expiry_date": "2025-05-01T10:00:00Z",
            "location": "Freezer 2"
        });
        let dangling = json!({
            "id": "P002",
            "donation_id": "DON404",
            "blood_type": "A+",
            "product_type": "Plasma",
            "volume": 200.0,
            "collection_date": "2024-05-01T10:00:00Z",
            "expiry_date": "2025-05-01T10:00:00Z",
            "location": "Freezer 2"
        });
        let outcome = importer.import_products(vec![good, dangling]).await;
        assert_eq!(outcome.imported_count, 1);
        assert_eq!(outcome.failed_count, 1);
        assert!(outcome.errors[0].contains("DON404"));
    }
}
