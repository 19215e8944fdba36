//! Integration tests for the booking API client.
//!
//! These tests use wiremock to simulate the booking service responses
//! and verify correct parsing and error handling.

use chrono::NaiveDate;
use kite_scheduler::{
    EventStatus, Location, api::BookingApiClient, billboard::load_billboard,
    config::NetworkConfig, error::SchedulerError,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

fn network_config() -> NetworkConfig {
    NetworkConfig {
        request_timeout_secs: 10,
        connect_timeout_secs: 5,
    }
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, 10).unwrap()
}

const ANA_DAY: &str = r#"[
    {
        "id": 1,
        "students": [{"id": 11, "name": "Marta"}],
        "package": {"duration_minutes": 600, "price_per_student": 300.0, "capacity_students": 1},
        "lessons": [{
            "id": 100,
            "teacher": {"id": 1, "name": "Ana"},
            "commission": {"price_per_hour": 20.0},
            "events": [
                {"id": 1001, "starts_at": "2024-07-10T10:00:00", "duration_minutes": 120,
                 "location": "Los Lances", "status": "completed"}
            ]
        }]
    },
    {
        "id": 2,
        "students": [{"id": 21, "name": "Jonas"}, {"id": 22, "name": "Lea"}],
        "package": {"duration_minutes": 360, "price_per_student": 200.0, "capacity_students": 2},
        "lessons": [{
            "id": 200,
            "teacher": {"id": 1, "name": "Ana"},
            "events": [
                {"id": 2001, "starts_at": "2024-07-10T14:00:00", "duration_minutes": 90,
                 "location": "Valdevaqueros", "status": "planned"}
            ]
        }]
    }
]"#;

/// Test successful API response parsing.
#[tokio::test]
async fn test_fetch_bookings_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bookings"))
        .and(query_param("date", "2024-07-10"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ANA_DAY))
        .mount(&mock_server)
        .await;

    let client = BookingApiClient::new(mock_server.uri(), &network_config())
        .expect("Client creation should succeed");

    let bookings = client.fetch_bookings(day()).await.expect("Fetch should succeed");
    assert_eq!(bookings.len(), 2);
    assert_eq!(bookings[1].students.len(), 2);

    let event = &bookings[0].lessons[0].events[0];
    assert_eq!(event.location, Some(Location::LosLances));
    assert_eq!(event.status, EventStatus::Completed);
}

/// Test building a billboard straight from the API.
#[tokio::test]
async fn test_load_billboard_through_client() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bookings"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ANA_DAY))
        .mount(&mock_server)
        .await;

    let client = BookingApiClient::new(mock_server.uri(), &network_config()).unwrap();
    let billboard = load_billboard(&client, day(), &[]).await.unwrap();

    let queue = billboard.queue(1).expect("Ana should have a queue");
    let starts: Vec<_> = queue.entries().iter().map(|e| e.start_time()).collect();
    assert_eq!(starts, vec!["10:00", "14:00"]);
    assert!(queue.entries()[1].initial_gap);
}

/// Test an empty day.
#[tokio::test]
async fn test_fetch_bookings_empty_day() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bookings"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&mock_server)
        .await;

    let client = BookingApiClient::new(mock_server.uri(), &network_config()).unwrap();
    let bookings = client.fetch_bookings(day()).await.unwrap();
    assert!(bookings.is_empty());
}

/// Test handling of HTTP 500 errors.
#[tokio::test]
async fn test_fetch_bookings_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bookings"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let client = BookingApiClient::new(mock_server.uri(), &network_config()).unwrap();
    let result = client.fetch_bookings(day()).await;

    assert!(result.is_err(), "Should fail on 500 error");
    let err = result.unwrap_err();
    assert!(
        err.to_string().contains("500"),
        "Error should mention status code"
    );
}

/// Test that a failed fetch surfaces as a scheduler fetch error.
#[tokio::test]
async fn test_load_billboard_maps_failure_to_fetch_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bookings"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let client = BookingApiClient::new(mock_server.uri(), &network_config()).unwrap();
    let err = load_billboard(&client, day(), &[]).await.unwrap_err();

    match err {
        SchedulerError::Fetch(message) => assert!(message.contains("503")),
        other => panic!("Expected fetch error, got {:?}", other),
    }
}

/// Test handling of malformed JSON.
#[tokio::test]
async fn test_fetch_bookings_malformed_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bookings"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"bookings": "#))
        .mount(&mock_server)
        .await;

    let client = BookingApiClient::new(mock_server.uri(), &network_config()).unwrap();
    let result = client.fetch_bookings(day()).await;
    assert!(result.is_err(), "Should fail on malformed JSON");
}

/// Test handling of a missing required field.
#[tokio::test]
async fn test_fetch_bookings_missing_package() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bookings"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"id": 1}]"#))
        .mount(&mock_server)
        .await;

    let client = BookingApiClient::new(mock_server.uri(), &network_config()).unwrap();
    let result = client.fetch_bookings(day()).await;
    assert!(result.is_err(), "Should fail without a package");
}

/// Test timeout handling.
#[tokio::test]
async fn test_fetch_bookings_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bookings"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("[]")
                .set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;

    let config = NetworkConfig {
        request_timeout_secs: 1,
        connect_timeout_secs: 1,
    };

    let client = BookingApiClient::new(mock_server.uri(), &config).unwrap();
    let result = client.fetch_bookings(day()).await;
    assert!(result.is_err(), "Should time out");
}
