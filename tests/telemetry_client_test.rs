//! Wire-level tests for the telemetry HTTP client against a mock server.

mod common;

use installtrack::domain::models::TelemetryConfig;
use installtrack::domain::ports::{TelemetryClient, TelemetryError};
use installtrack::infrastructure::telemetry::HttpTelemetryClient;
use mockito::Server;

fn client_for(server: &Server, api_key: Option<&str>) -> HttpTelemetryClient {
    let config = TelemetryConfig {
        base_url: server.url(),
        api_key: api_key.map(str::to_string),
        timeout_secs: 5,
        requests_per_second: 100,
        burst_size: 100,
    };
    HttpTelemetryClient::new(&config).expect("Failed to create client")
}

#[tokio::test]
async fn test_latest_record_returned_with_api_key_and_upper_cased_id() {
    let mut server = Server::new_async().await;
    let body = serde_json::json!({
        "records": [
            { "dis_cm": 101.5, "timestamp": "2024-06-01T08:00:00Z" },
            { "dis_cm": 97.0, "timestamp": "2024-05-31T08:00:00Z" }
        ]
    })
    .to_string();
    let mock = server
        .mock("GET", "/device/AB12CD")
        .match_header("X-API-KEY", "secret-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await;

    let client = client_for(&server, Some("secret-key"));
    let reading = client
        .fetch_latest("ab12cd")
        .await
        .expect("fetch succeeds")
        .expect("reading present");

    assert!((reading.dis_cm - 101.5).abs() < f64::EPSILON);
    assert_eq!(reading.timestamp, "2024-06-01T08:00:00Z");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_not_found_means_no_data() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/device/DEV-404")
        .with_status(404)
        .create_async()
        .await;

    let client = client_for(&server, None);
    assert!(client.fetch_latest("dev-404").await.unwrap().is_none());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_empty_records_mean_no_data() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/device/DEV-1")
        .with_status(200)
        .with_body(r#"{"records":[]}"#)
        .create_async()
        .await;

    let client = client_for(&server, None);
    assert!(client.fetch_latest("DEV-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_null_records_mean_no_data() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/device/DEV-2")
        .with_status(200)
        .with_body(r#"{"records":null}"#)
        .create_async()
        .await;

    let client = client_for(&server, None);
    assert!(client.fetch_latest("DEV-2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_server_error_is_reported() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/device/DEV-1")
        .with_status(503)
        .with_body("maintenance")
        .create_async()
        .await;

    let client = client_for(&server, None);
    match client.fetch_latest("DEV-1").await {
        Err(TelemetryError::UnexpectedStatus { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "maintenance");
        }
        other => panic!("expected UnexpectedStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_reported() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/device/DEV-1")
        .with_status(200)
        .with_body("not json")
        .create_async()
        .await;

    let client = client_for(&server, None);
    assert!(matches!(
        client.fetch_latest("DEV-1").await,
        Err(TelemetryError::Malformed(_))
    ));
}

#[tokio::test]
async fn test_body_helper_matches_wire_format() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/device/DEV-7")
        .with_status(200)
        .with_body(common::telemetry_body(88.0))
        .create_async()
        .await;

    let client = client_for(&server, None);
    let reading = client.fetch_latest("DEV-7").await.unwrap().unwrap();
    assert!((reading.dis_cm - 88.0).abs() < f64::EPSILON);
}
