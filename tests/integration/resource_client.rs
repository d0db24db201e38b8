//! Typed OpenF1 resource access over HTTP

use openf1_features::fetcher::http::ResilientFetcher;
use openf1_features::fetcher::openf1::ResourceClient;
use openf1_features::fetcher::parser::RawPosition;
use openf1_features::fetcher::{FetcherError, RaceDataSource};
use openf1_features::pipeline::{FetchConfig, RateLimiter, RetryPolicy};
use openf1_features::SessionType;
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::support::mock_openf1::{MockOpenF1, Scripted};

fn client_for(server: &MockOpenF1) -> ResourceClient {
    let limiter = Arc::new(RateLimiter::new(100, Duration::from_secs(60)).unwrap());
    let policy = RetryPolicy {
        max_retries: 1,
        backoff_factor: 2.0,
        max_backoff: Duration::from_millis(10),
    };
    ResourceClient::new(
        ResilientFetcher::new(Client::new(), limiter, policy),
        server.base_url.clone(),
    )
}

#[tokio::test]
async fn test_sessions_are_decoded_and_filtered_by_meeting() {
    let server = MockOpenF1::start().await;
    server.set_json(
        "sessions?meeting_key=1229",
        json!([
            {"session_key": 9001, "meeting_key": 1229, "session_type": "Qualifying",
             "session_name": "Qualifying", "date_start": "2024-08-31T14:00:00+00:00"},
            {"session_key": 9002, "meeting_key": 1229, "session_type": "Race",
             "session_name": "Race", "date_start": "2024-09-01T13:00:00+00:00",
             "circuit_key": 39}
        ]),
    );
    let client = client_for(&server);

    let sessions = client.sessions(1229).await.unwrap();

    assert_eq!(sessions.len(), 2);
    assert!(sessions[0].is_qualifying());
    assert_eq!(sessions[1].session_type, SessionType::Race);
    assert_eq!(
        sessions[1].date_start.as_deref(),
        Some("2024-09-01T13:00:00+00:00")
    );
}

#[tokio::test]
async fn test_empty_array_is_an_empty_result() {
    let server = MockOpenF1::start().await;
    let client = client_for(&server);

    let grid = client.starting_grid(9001).await.unwrap();

    assert!(grid.is_empty());
    assert_eq!(server.hits("starting_grid?session_key=9001"), 1);
}

#[tokio::test]
async fn test_results_tolerate_status_strings_and_nulls() {
    let server = MockOpenF1::start().await;
    server.set_json(
        "session_result?session_key=9002",
        json!([
            {"driver_number": 16, "position": 1, "dnf": false, "dns": false, "dsq": false},
            {"driver_number": 81, "position": "DQ", "dsq": true},
            {"driver_number": 1, "position": null, "dnf": true}
        ]),
    );
    let client = client_for(&server);

    let results = client.results(9002).await.unwrap();

    assert_eq!(results[0].position, RawPosition::Numeric(1));
    assert_eq!(results[0].outcome().finishing_position, 1);
    assert!(results[1].outcome().dnf);
    assert_eq!(results[2].outcome().finishing_position, 31);
}

#[tokio::test]
async fn test_driver_lookup_sends_both_filters() {
    let server = MockOpenF1::start().await;
    server.set_json(
        "drivers?driver_number=16&session_key=9002",
        json!([{"driver_number": 16, "full_name": "Charles LECLERC",
                "team_name": "Ferrari", "name_acronym": "LEC"}]),
    );
    let client = client_for(&server);

    let drivers = client.driver(16, 9002).await.unwrap();

    assert_eq!(drivers.len(), 1);
    assert_eq!(drivers[0].full_name.as_deref(), Some("Charles LECLERC"));
    assert_eq!(drivers[0].team_name.as_deref(), Some("Ferrari"));
}

#[tokio::test]
async fn test_latest_meeting_uses_latest_keyword() {
    let server = MockOpenF1::start().await;
    server.set_json(
        "meetings?meeting_key=latest",
        json!([{"meeting_key": 1270, "year": 2025,
                "meeting_name": "Mexico City Grand Prix", "location": "Mexico City"}]),
    );
    let client = client_for(&server);

    let meetings = client.latest_meeting().await.unwrap();

    assert_eq!(meetings[0].meeting_key, 1270);
    assert_eq!(server.all_hits(), vec!["meetings?meeting_key=latest".to_string()]);
}

#[tokio::test]
async fn test_http_error_carries_status_and_url() {
    let server = MockOpenF1::start().await;
    server.set("weather?meeting_key=1229&session_key=9002", Scripted::status(503));
    let client = client_for(&server);

    let err = client.weather(1229, 9002).await.unwrap_err();

    match err {
        FetcherError::Http { status, url, body } => {
            assert_eq!(status, 503);
            assert!(url.ends_with("/v1/weather"));
            assert!(body.contains("503"));
        }
        other => panic!("expected HTTP error, got {other:?}"),
    }
    // 5xx is not retried
    assert_eq!(server.hits("weather?meeting_key=1229&session_key=9002"), 1);
}

#[tokio::test]
async fn test_malformed_body_is_a_parse_error() {
    let server = MockOpenF1::start().await;
    server.set("meetings", Scripted::raw("{\"detail\": \"not a list\"}"));
    let client = client_for(&server);

    let err = client.meetings().await.unwrap_err();

    assert!(matches!(err, FetcherError::Parse(ref msg) if msg.starts_with("meetings")));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_stints_and_laps_filter_by_session_then_driver() {
    let server = MockOpenF1::start().await;
    server.set_json(
        "stints?session_key=9002&driver_number=16",
        json!([{"stint_number": 1, "lap_start": 1, "lap_end": 20, "compound": "MEDIUM"}]),
    );
    server.set_json(
        "laps?session_key=9002&driver_number=16",
        json!([{"lap_number": 2, "lap_duration": 84.1, "is_pit_out_lap": false}]),
    );
    let client = client_for(&server);

    let stints = client.stints(9002, 16).await.unwrap();
    let laps = client.laps(9002, 16).await.unwrap();

    assert_eq!(stints[0].compound.as_deref(), Some("MEDIUM"));
    assert_eq!(laps[0].lap_duration, Some(84.1));
}

#[tokio::test]
async fn test_meeting_list_survives_one_stalled_body() {
    let server = MockOpenF1::start().await;
    server.script(
        "meetings",
        vec![Scripted::raw("[]").stalled(Duration::from_millis(1500))],
    );
    server.set_json(
        "meetings",
        json!([{"meeting_key": 1229, "year": 2024,
                "meeting_name": "Italian Grand Prix", "location": "Monza"}]),
    );
    let config = FetchConfig {
        base_url: server.base_url.clone(),
        request_timeout: Duration::from_millis(300),
        max_backoff: Duration::from_millis(10),
        ..FetchConfig::default()
    };
    let limiter = Arc::new(RateLimiter::new(100, Duration::from_secs(60)).unwrap());
    let client = ResourceClient::from_config(&config, limiter).unwrap();

    let meetings = client.meetings().await.unwrap();

    assert_eq!(meetings.len(), 1);
    assert_eq!(meetings[0].meeting_key, 1229);
    assert_eq!(server.hits("meetings"), 2);
}
