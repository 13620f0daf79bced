use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// ABO/Rh blood type. Serialized in symbol form ("A+", "O-", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BloodType {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
}

impl BloodType {
    pub const ALL: [BloodType; 8] = [
        BloodType::APositive,
        BloodType::ANegative,
        BloodType::BPositive,
        BloodType::BNegative,
        BloodType::AbPositive,
        BloodType::AbNegative,
        BloodType::OPositive,
        BloodType::ONegative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::APositive => "A+",
            Self::ANegative => "A-",
            Self::BPositive => "B+",
            Self::BNegative => "B-",
            Self::AbPositive => "AB+",
            Self::AbNegative => "AB-",
            Self::OPositive => "O+",
            Self::ONegative => "O-",
        }
    }
}

impl fmt::Display for BloodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BloodType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A+" => Ok(Self::APositive),
            "A-" => Ok(Self::ANegative),
            "B+" => Ok(Self::BPositive),
            "B-" => Ok(Self::BNegative),
            "AB+" => Ok(Self::AbPositive),
            "AB-" => Ok(Self::AbNegative),
            "O+" => Ok(Self::OPositive),
            "O-" => Ok(Self::ONegative),
            other => Err(format!("unknown blood type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Male => write!(f, "MALE"),
            Self::Female => write!(f, "FEMALE"),
            Self::Other => write!(f, "OTHER"),
        }
    }
}

/// Blood product inventory status with a closed transition set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    Available,
    Reserved,
    Expired,
    Used,
    Quarantine,
}

impl ProductStatus {
    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Expired | Self::Used | Self::Quarantine)
    }

    pub fn can_transition_to(&self, next: ProductStatus) -> bool {
        match self {
            Self::Available => matches!(
                next,
                Self::Reserved | Self::Expired | Self::Used | Self::Quarantine
            ),
            Self::Reserved => matches!(
                next,
                Self::Available | Self::Used | Self::Expired | Self::Quarantine
            ),
            Self::Expired | Self::Used | Self::Quarantine => false,
        }
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available => write!(f, "AVAILABLE"),
            Self::Reserved => write!(f, "RESERVED"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::Used => write!(f, "USED"),
            Self::Quarantine => write!(f, "QUARANTINE"),
        }
    }
}

/// Export sync categories, each independently locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncType {
    Donations,
    Inventory,
    Donors,
    Full,
}

impl SyncType {
    pub const ALL: [SyncType; 4] = [
        SyncType::Donations,
        SyncType::Inventory,
        SyncType::Donors,
        SyncType::Full,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Donations => "DONATIONS",
            Self::Inventory => "INVENTORY",
            Self::Donors => "DONORS",
            Self::Full => "FULL",
        }
    }
}

impl fmt::Display for SyncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-sync-type state machine: `idle → syncing → {healthy, error}`.
///
/// `healthy` and `error` are resting states: they behave like `idle` for
/// the purposes of starting a new sync but retain the last outcome until
/// the next sync begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Idle,
    Syncing,
    Healthy,
    Error,
}

impl SyncState {
    /// A new sync may start from any state except `syncing`.
    pub fn can_start(&self) -> bool {
        !matches!(self, Self::Syncing)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Syncing => write!(f, "syncing"),
            Self::Healthy => write!(f, "healthy"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Lifecycle status of a single sync job.
///
/// `Success` and `Failed` are terminal; once reached, only completion
/// fields may have been written and the record never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Started,
    Success,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => write!(f, "STARTED"),
            Self::Success => write!(f, "SUCCESS"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Donor demographics. Created by import; immutable once donations or
/// screening results reference it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Donor {
    pub id: String,
    pub age: u32,
    pub gender: Gender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<String>,
}

/// A single blood donation event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Donation {
    pub id: String,
    pub donor_id: String,
    pub donation_date: Timestamp,
    pub blood_type: BloodType,
    pub volume_collected: f64,
    pub collection_site: String,
    pub staff_id: String,
}

/// Processed blood product derived from a donation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BloodProduct {
    pub id: String,
    pub donation_id: String,
    pub blood_type: BloodType,
    pub product_type: String,
    pub volume: f64,
    pub collection_date: Timestamp,
    pub expiry_date: Timestamp,
    #[serde(default = "default_product_status")]
    pub status: ProductStatus,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

fn default_product_status() -> ProductStatus {
    ProductStatus::Available
}

/// Blood screening test results. Pathogen test booleans are true when
/// the test came back negative (safe).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningResult {
    pub donor_id: String,
    pub blood_type: BloodType,
    pub hemoglobin_level: f64,
    pub hiv_test: bool,
    pub hepatitis_b_test: bool,
    pub hepatitis_c_test: bool,
    pub syphilis_test: bool,
    pub screening_date: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blood_type_symbol_serialization() {
        assert_eq!(
            serde_json::to_string(&BloodType::AbNegative).unwrap(),
            "\"AB-\""
        );
        let parsed: BloodType = serde_json::from_str("\"O+\"").unwrap();
        assert_eq!(parsed, BloodType::OPositive);
    }

    #[test]
    fn test_blood_type_rejects_unknown() {
        assert!(serde_json::from_str::<BloodType>("\"C+\"").is_err());
        assert!(BloodType::from_str("C+").is_err());
    }

    #[test]
    fn test_blood_type_from_str_covers_all() {
        for bt in BloodType::ALL {
            assert_eq!(BloodType::from_str(bt.as_str()).unwrap(), bt);
        }
    }

    #[test]
    fn test_gender_serialization() {
        assert_eq!(serde_json::to_string(&Gender::Male).unwrap(), "\"MALE\"");
        assert!(serde_json::from_str::<Gender>("\"male\"").is_err());
    }

    #[test]
    fn test_product_status_transitions() {
        let available = ProductStatus::Available;
        assert!(available.can_transition_to(ProductStatus::Reserved));
        assert!(available.can_transition_to(ProductStatus::Quarantine));
        assert!(!available.can_transition_to(ProductStatus::Available));

        assert!(ProductStatus::Reserved.can_transition_to(ProductStatus::Available));

        for terminal in [
            ProductStatus::Expired,
            ProductStatus::Used,
            ProductStatus::Quarantine,
        ] {
            assert!(terminal.is_terminal());
            for next in [
                ProductStatus::Available,
                ProductStatus::Reserved,
                ProductStatus::Expired,
                ProductStatus::Used,
                ProductStatus::Quarantine,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_sync_type_serialization() {
        assert_eq!(
            serde_json::to_string(&SyncType::Donations).unwrap(),
            "\"DONATIONS\""
        );
        assert_eq!(SyncType::Full.to_string(), "FULL");
    }

    #[test]
    fn test_sync_state_can_start() {
        assert!(SyncState::Idle.can_start());
        assert!(SyncState::Healthy.can_start());
        assert!(SyncState::Error.can_start());
        assert!(!SyncState::Syncing.can_start());
        assert_eq!(
            serde_json::to_string(&SyncState::Syncing).unwrap(),
            "\"syncing\""
        );
    }

    #[test]
    fn test_job_status_terminality() {
        assert!(!JobStatus::Started.is_terminal());
        assert!(JobStatus::Success.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert_eq!(
            serde_json::to_string(&JobStatus::Success).unwrap(),
            "\"SUCCESS\""
        );
    }

    #[test]
    fn test_donor_deserialization_defaults() {
        let donor: Donor = serde_json::from_value(json!({
            "id": "D001",
            "age": 30,
            "gender": "MALE"
        }))
        .unwrap();
        assert_eq!(donor.id, "D001");
        assert!(donor.occupation.is_none());
    }

    #[test]
    fn test_product_defaults_to_available() {
        let product: BloodProduct = serde_json::from_value(json!({
            "id": "P001",
            "donation_id": "DON001",
            "blood_type": "A+",
            "product_type": "Whole Blood",
            "volume": 450.0,
            "collection_date": "2024-05-01T10:00:00Z",
            "expiry_date": "2024-06-12T10:00:00Z",
            "location": "Fridge 1"
        }))
        .unwrap();
        assert_eq!(product.status, ProductStatus::Available);
    }

    #[test]
    fn test_donation_roundtrip() {
        let donation = Donation {
            id: "DON001".into(),
            donor_id: "D001".into(),
            donation_date: "2024-05-01T10:00:00Z".parse().unwrap(),
            blood_type: BloodType::APositive,
            volume_collected: 450.0,
            collection_site: "Central".into(),
            staff_id: "S1".into(),
        };
        let value = serde_json::to_value(&donation).unwrap();
        assert_eq!(value["blood_type"], "A+");
        let back: Donation = serde_json::from_value(value).unwrap();
        assert_eq!(back, donation);
    }
}
