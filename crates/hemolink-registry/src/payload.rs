//! Mapping of blood bank records to DHIS2 wire payloads.

use crate::config::RegistryConfig;
use hemolink_core::{BloodProduct, Donation, Donor, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use time::macros::format_description;

/// One DHIS2 data value, keyed by data element / period / org unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataValue {
    #[serde(rename = "dataElement")]
    pub data_element: String,
    pub period: String,
    #[serde(rename = "orgUnit")]
    pub org_unit: String,
    pub value: Value,
    #[serde(
        rename = "attributeOptionCombo",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub attribute_option_combo: Option<String>,
}

/// Daily period (`YYYYMMDD`) for event-level values.
pub fn period_day(ts: &Timestamp) -> String {
    ts.inner()
        .format(format_description!("[year][month][day]"))
        .unwrap_or_default()
}

/// Monthly period (`YYYYMM`) for aggregate inventory values.
pub fn period_month(ts: &Timestamp) -> String {
    ts.inner()
        .format(format_description!("[year][month]"))
        .unwrap_or_default()
}

/// Maps a donation to its data values: blood type and collected volume,
/// dated by the donation day.
pub fn donation_data_values(donation: &Donation, cfg: &RegistryConfig) -> Vec<DataValue> {
    let period = period_day(&donation.donation_date);
    vec![
        DataValue {
            data_element: cfg.elements.blood_type.clone(),
            period: period.clone(),
            org_unit: cfg.org_unit.clone(),
            value: json!(donation.blood_type.as_str()),
            attribute_option_combo: None,
        },
        DataValue {
            data_element: cfg.elements.volume_collected.clone(),
            period,
            org_unit: cfg.org_unit.clone(),
            value: json!(donation.volume_collected),
            attribute_option_combo: None,
        },
    ]
}

/// Maps an inventory snapshot to per-(blood type, status) counts for the
/// current month.
pub fn inventory_data_values(
    products: &[BloodProduct],
    now: &Timestamp,
    cfg: &RegistryConfig,
) -> Vec<DataValue> {
    let mut counts: BTreeMap<(String, String), u64> = BTreeMap::new();
    for product in products {
        let key = (
            product.blood_type.as_str().to_string(),
            product.status.to_string(),
        );
        *counts.entry(key).or_insert(0) += 1;
    }

    let period = period_month(now);
    counts
        .into_iter()
        .map(|((blood_type, status), count)| DataValue {
            data_element: cfg.elements.inventory_count.clone(),
            period: period.clone(),
            org_unit: cfg.org_unit.clone(),
            value: json!(count),
            attribute_option_combo: Some(format!("{blood_type}_{status}")),
        })
        .collect()
}

/// Maps a donor to a tracked entity instance payload.
pub fn donor_tracked_entity(donor: &Donor, cfg: &RegistryConfig) -> Value {
    json!({
        "trackedEntityType": cfg.donor_tracked_entity_type,
        "orgUnit": cfg.org_unit,
        "attributes": [
            { "attribute": cfg.elements.donor_id, "value": donor.id },
            { "attribute": cfg.elements.donor_age, "value": donor.age },
            { "attribute": cfg.elements.donor_gender, "value": donor.gender.to_string() },
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hemolink_core::{BloodType, Gender, ProductStatus};

    fn cfg() -> RegistryConfig {
        RegistryConfig::default()
    }

    fn donation() -> Donation {
        Donation {
            id: "DON001".into(),
            donor_id: "D001".into(),
            donation_date: "2024-05-01T10:00:00Z".parse().unwrap(),
            blood_type: BloodType::APositive,
            volume_collected: 450.0,
            collection_site: "Central".into(),
            staff_id: "S1".into(),
        }
    }

    fn product(blood_type: BloodType, status: ProductStatus) -> BloodProduct {
        BloodProduct {
            id: "P1".into(),
            donation_id: "DON001".into(),
            blood_type,
            product_type: "Whole Blood".into(),
            volume: 200.0,
            collection_date: "2024-05-01T10:00:00Z".parse().unwrap(),
            expiry_date: "2024-06-12T10:00:00Z".parse().unwrap(),
            status,
            location: "Fridge 1".into(),
            temperature: None,
        }
    }

    #[test]
    fn test_period_formats() {
        let ts: Timestamp = "2024-05-01T10:00:00Z".parse().unwrap();
        assert_eq!(period_day(&ts), "20240501");
        assert_eq!(period_month(&ts), "202405");
    }

    #[test]
    fn test_donation_maps_to_two_data_values() {
        let values = donation_data_values(&donation(), &cfg());
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].period, "20240501");
        assert_eq!(values[0].value, serde_json::json!("A+"));
        assert_eq!(values[1].value, serde_json::json!(450.0));

        let wire = serde_json::to_value(&values[0]).unwrap();
        assert!(wire.get("dataElement").is_some());
        assert!(wire.get("orgUnit").is_some());
        assert!(wire.get("attributeOptionCombo").is_none());
    }

    #[test]
    fn test_inventory_groups_by_type_and_status() {
        let products = vec![
            product(BloodType::APositive, ProductStatus::Available),
            product(BloodType::APositive, ProductStatus::Available),
            product(BloodType::ONegative, ProductStatus::Reserved),
        ];
        let now: Timestamp = "2024-05-15T00:00:00Z".parse().unwrap();
        let values = inventory_data_values(&products, &now, &cfg());

        assert_eq!(values.len(), 2);
        let a_pos = values
            .iter()
            .find(|v| v.attribute_option_combo.as_deref() == Some("A+_AVAILABLE"))
            .unwrap();
        assert_eq!(a_pos.value, serde_json::json!(2));
        assert_eq!(a_pos.period, "202405");
        let o_neg = values
            .iter()
            .find(|v| v.attribute_option_combo.as_deref() == Some("O-_RESERVED"))
            .unwrap();
        assert_eq!(o_neg.value, serde_json::json!(1));
    }

    #[test]
    fn test_donor_tracked_entity_shape() {
        let donor = Donor {
            id: "D001".into(),
            age: 30,
            gender: Gender::Male,
            occupation: None,
            location: None,
            contact_info: None,
        };
        let payload = donor_tracked_entity(&donor, &cfg());
        assert_eq!(payload["attributes"][0]["value"], "D001");
        assert_eq!(payload["attributes"][1]["value"], 30);
        assert_eq!(payload["attributes"][2]["value"], "MALE");
        assert!(payload.get("trackedEntityType").is_some());
    }
}
