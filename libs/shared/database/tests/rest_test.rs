use assert_matches::assert_matches;
use reqwest::Method;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_config::AppConfig;
use shared_database::rest::{RestStore, StoreError};

fn config_for(server: &MockServer) -> AppConfig {
    AppConfig {
        storage_url: server.uri(),
        storage_service_key: "test-service-key".to_string(),
        slot_granularity_minutes: 15,
        confirmation_expiry_hours: 24,
        sweep_interval_seconds: 300,
    }
}

#[tokio::test]
async fn successful_request_decodes_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1 }])))
        .mount(&server)
        .await;

    let store = RestStore::new(&config_for(&server));
    let rows: Vec<Value> = store
        .request(Method::GET, "/rest/v1/appointments", None)
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], 1);
}

#[tokio::test]
async fn conflict_status_maps_to_row_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_string("conflicting key value violates exclusion constraint"),
        )
        .mount(&server)
        .await;

    let store = RestStore::new(&config_for(&server));
    let result: Result<Vec<Value>, StoreError> = store
        .request(Method::POST, "/rest/v1/appointments", Some(json!({})))
        .await;

    assert_matches!(result, Err(StoreError::RowConflict(_)));
}

#[tokio::test]
async fn missing_resource_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/nope"))
        .respond_with(ResponseTemplate::new(404).set_body_string("relation does not exist"))
        .mount(&server)
        .await;

    let store = RestStore::new(&config_for(&server));
    let result: Result<Vec<Value>, StoreError> =
        store.request(Method::GET, "/rest/v1/nope", None).await;

    assert_matches!(result, Err(StoreError::NotFound(_)));
}

#[tokio::test]
async fn other_errors_carry_the_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let store = RestStore::new(&config_for(&server));
    let result: Result<Vec<Value>, StoreError> = store
        .request(Method::GET, "/rest/v1/appointments", None)
        .await;

    match result {
        Err(StoreError::Api { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn insert_returning_yields_the_stored_row() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/charges"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{ "id": 7, "status": "pending" }])))
        .mount(&server)
        .await;

    let store = RestStore::new(&config_for(&server));
    let row: Value = store
        .insert_returning("charges", json!({ "status": "pending" }))
        .await
        .unwrap();

    assert_eq!(row["id"], 7);
}
