use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection and mapping configuration for the external DHIS2 registry.
///
/// Org unit, data element, and tracked-entity-type identifiers are
/// assigned by the remote instance and configured out-of-band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Organisation unit all exported values are reported under.
    #[serde(default = "default_org_unit")]
    pub org_unit: String,
    /// Tracked entity type id used for donor registration.
    #[serde(default = "default_tracked_entity_type")]
    pub donor_tracked_entity_type: String,
    #[serde(default)]
    pub elements: DataElementMap,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Ping timeout in milliseconds; health probes must stay bounded.
    #[serde(default = "default_ping_timeout_ms")]
    pub ping_timeout_ms: u64,
    /// Maximum attempts per remote call (first try included).
    #[serde(default = "default_max_attempts")]
    pub max_retry_attempts: u32,
    /// Base backoff delay in milliseconds, doubled per retry.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

/// DHIS2 data element and attribute identifiers, mapped per deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataElementMap {
    #[serde(default = "default_element_blood_type")]
    pub blood_type: String,
    #[serde(default = "default_element_volume")]
    pub volume_collected: String,
    #[serde(default = "default_element_inventory")]
    pub inventory_count: String,
    #[serde(default = "default_attr_donor_id")]
    pub donor_id: String,
    #[serde(default = "default_attr_donor_age")]
    pub donor_age: String,
    #[serde(default = "default_attr_donor_gender")]
    pub donor_gender: String,
}

fn default_base_url() -> String {
    "https://play.dhis2.org/dev".into()
}
fn default_username() -> String {
    "admin".into()
}
fn default_password() -> String {
    "district".into()
}
fn default_api_version() -> String {
    "40".into()
}
fn default_org_unit() -> String {
    "BLOOD_BANK_ORG_UNIT".into()
}
fn default_tracked_entity_type() -> String {
    "DONOR_TRACKED_ENTITY_TYPE".into()
}
fn default_timeout_ms() -> u64 {
    30_000
}
fn default_ping_timeout_ms() -> u64 {
    5_000
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    1_000
}
fn default_element_blood_type() -> String {
    "BLOOD_TYPE_ELEMENT".into()
}
fn default_element_volume() -> String {
    "VOLUME_COLLECTED_ELEMENT".into()
}
fn default_element_inventory() -> String {
    "BLOOD_INVENTORY_ELEMENT".into()
}
fn default_attr_donor_id() -> String {
    "DONOR_ID_ATTRIBUTE".into()
}
fn default_attr_donor_age() -> String {
    "DONOR_AGE_ATTRIBUTE".into()
}
fn default_attr_donor_gender() -> String {
    "DONOR_GENDER_ATTRIBUTE".into()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            username: default_username(),
            password: default_password(),
            api_version: default_api_version(),
            org_unit: default_org_unit(),
            donor_tracked_entity_type: default_tracked_entity_type(),
            elements: DataElementMap::default(),
            timeout_ms: default_timeout_ms(),
            ping_timeout_ms: default_ping_timeout_ms(),
            max_retry_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl Default for DataElementMap {
    fn default() -> Self {
        Self {
            blood_type: default_element_blood_type(),
            volume_collected: default_element_volume(),
            inventory_count: default_element_inventory(),
            donor_id: default_attr_donor_id(),
            donor_age: default_attr_donor_age(),
            donor_gender: default_attr_donor_gender(),
        }
    }
}

impl RegistryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("registry.base_url must not be empty".into());
        }
        if self.max_retry_attempts == 0 {
            return Err("registry.max_retry_attempts must be > 0".into());
        }
        Ok(())
    }
}
