//! Integration tests for the registry client against a mock DHIS2 server.

use hemolink_core::{BloodType, Donation, Donor, Gender};
use hemolink_registry::{RegistryClient, RegistryConfig, RegistryError};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(base_url: String) -> RegistryConfig {
    RegistryConfig {
        base_url,
        max_retry_attempts: 3,
        retry_base_delay_ms: 10,
        ping_timeout_ms: 2_000,
        ..RegistryConfig::default()
    }
}

fn donation(id: &str) -> Donation {
    Donation {
        id: id.into(),
        donor_id: "D001".into(),
        donation_date: "2024-05-01T10:00:00Z".parse().unwrap(),
        blood_type: BloodType::APositive,
        volume_collected: 450.0,
        collection_site: "Central".into(),
        staff_id: "S1".into(),
    }
}

fn import_summary_body(imported: u64) -> serde_json::Value {
    json!({
        "importSummary": {
            "status": "SUCCESS",
            "importCount": imported,
            "updateCount": 0,
            "ignoreCount": 0,
            "deleteCount": 0,
            "conflicts": []
        }
    })
}

#[tokio::test]
async fn ping_succeeds_against_reachable_registry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/40/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "admin"})))
        .mount(&server)
        .await;

    let client = RegistryClient::new(test_config(server.uri())).unwrap();
    assert!(client.ping().await.is_ok());
}

#[tokio::test]
async fn ping_maps_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/40/me"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let client = RegistryClient::new(test_config(server.uri())).unwrap();
    let err = client.ping().await.unwrap_err();
    assert!(matches!(err, RegistryError::Auth { status: 401, .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn export_donations_posts_data_value_set() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/40/dataValueSets"))
        .and(query_param("importStrategy", "CREATE_AND_UPDATE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(import_summary_body(2)))
        .expect(1)
        .mount(&server)
        .await;

    let client = RegistryClient::new(test_config(server.uri())).unwrap();
    let summary = client.export_donations(&[donation("DON001")]).await.unwrap();
    assert_eq!(summary.status, "SUCCESS");
    assert_eq!(summary.accepted(), 2);
}

#[tokio::test]
async fn transient_server_error_is_retried_until_success() {
    let server = MockServer::start().await;
    // First attempt gets a 503, the retry succeeds
    Mock::given(method("POST"))
        .and(path("/api/40/dataValueSets"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/40/dataValueSets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(import_summary_body(1)))
        .expect(1)
        .mount(&server)
        .await;

    let client = RegistryClient::new(test_config(server.uri())).unwrap();
    let summary = client.export_donations(&[donation("DON001")]).await.unwrap();
    assert_eq!(summary.imported, 1);
}

#[tokio::test]
async fn exhausted_retries_surface_last_transient_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/40/dataValueSets"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(3)
        .mount(&server)
        .await;

    let client = RegistryClient::new(test_config(server.uri())).unwrap();
    let err = client
        .export_donations(&[donation("DON001")])
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Server { status: 500, .. }));
}

#[tokio::test]
async fn fatal_rejection_is_not_retried_and_kept_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/40/dataValueSets"))
        .respond_with(
            ResponseTemplate::new(409).set_body_string("Conflict: data element mismatch"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = RegistryClient::new(test_config(server.uri())).unwrap();
    let err = client
        .export_donations(&[donation("DON001")])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Conflict: data element mismatch"));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn create_tracked_entity_registers_donor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/40/trackedEntityInstances"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "OK"})))
        .expect(1)
        .mount(&server)
        .await;

    let donor = Donor {
        id: "D001".into(),
        age: 30,
        gender: Gender::Male,
        occupation: None,
        location: None,
        contact_info: None,
    };

    let client = RegistryClient::new(test_config(server.uri())).unwrap();
    let raw = client.create_tracked_entity(&donor).await.unwrap();
    assert_eq!(raw["status"], "OK");
}
