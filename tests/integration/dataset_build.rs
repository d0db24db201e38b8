//! End-to-end builds: mock OpenF1 over HTTP through to the CSV artifacts

use openf1_features::fetcher::http::ResilientFetcher;
use openf1_features::fetcher::openf1::ResourceClient;
use openf1_features::output::store::{ArtifactStatus, ArtifactStore};
use openf1_features::output::{ArtifactError, ArtifactKind};
use openf1_features::pipeline::{FeaturePipeline, LatestOutcome, RateLimiter, RetryPolicy};
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::support::mock_openf1::{MockOpenF1, Scripted};

fn pipeline_for(server: &MockOpenF1, dir: &std::path::Path) -> FeaturePipeline {
    let limiter = Arc::new(RateLimiter::new(100, Duration::from_secs(60)).unwrap());
    let policy = RetryPolicy {
        max_retries: 2,
        backoff_factor: 2.0,
        max_backoff: Duration::from_millis(10),
    };
    let client = ResourceClient::new(
        ResilientFetcher::new(Client::new(), limiter, policy),
        server.base_url.clone(),
    );
    FeaturePipeline::new(Arc::new(client), ArtifactStore::new(dir))
}

/// Monza 2024 fully served, Zandvoort 2024 broken, one 2022 meeting filtered out
fn serve_season(server: &MockOpenF1) {
    server.set_json(
        "meetings",
        json!([
            {"meeting_key": 1140, "year": 2022, "meeting_name": "Bahrain Grand Prix", "location": "Sakhir"},
            {"meeting_key": 1229, "year": 2024, "meeting_name": "Italian Grand Prix", "location": "Monza"},
            {"meeting_key": 1230, "year": 2024, "meeting_name": "Dutch Grand Prix", "location": "Zandvoort"}
        ]),
    );
    server.set_json(
        "sessions?meeting_key=1229",
        json!([
            {"session_key": 9000, "meeting_key": 1229, "session_type": "Practice", "session_name": "Practice 3"},
            {"session_key": 9001, "meeting_key": 1229, "session_type": "Qualifying", "session_name": "Qualifying",
             "date_start": "2024-08-31T14:00:00+00:00"},
            {"session_key": 9002, "meeting_key": 1229, "session_type": "Race", "session_name": "Race",
             "date_start": "2024-09-01T13:00:00+00:00"}
        ]),
    );
    server.set("sessions?meeting_key=1230", Scripted::status(500));
    server.set_json(
        "starting_grid?session_key=9001",
        json!([
            {"driver_number": 4, "position": 1},
            {"driver_number": 16, "position": 4},
            {"driver_number": 81, "position": null}
        ]),
    );
    server.set_json(
        "session_result?session_key=9002",
        json!([
            {"driver_number": 16, "position": 1},
            {"driver_number": 4, "position": "DNF", "dnf": true},
            {"driver_number": 81, "position": 2}
        ]),
    );
    server.set_json(
        "drivers?driver_number=4&session_key=9002",
        json!([{"driver_number": 4, "full_name": "Lando NORRIS", "team_name": "McLaren"}]),
    );
    server.set_json(
        "drivers?driver_number=16&session_key=9002",
        json!([{"driver_number": 16, "full_name": "Charles LECLERC", "team_name": "Ferrari"}]),
    );
    server.set_json(
        "drivers?driver_number=81&session_key=9002",
        json!([{"driver_number": 81, "full_name": "Oscar PIASTRI", "team_name": "McLaren"}]),
    );
    server.set_json(
        "weather?meeting_key=1229&session_key=9002",
        json!([
            {"track_temperature": 40.0, "air_temperature": 28.0, "humidity": 40.0,
             "pressure": 1000.0, "rainfall": 0, "wind_speed": 1.0, "wind_direction": 180},
            {"track_temperature": 44.0, "air_temperature": 30.0, "humidity": 44.0,
             "pressure": 1002.0, "rainfall": 1, "wind_speed": 3.0, "wind_direction": 180}
        ]),
    );
}

#[tokio::test]
async fn test_historical_build_writes_features_csv() {
    let server = MockOpenF1::start().await;
    serve_season(&server);
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_for(&server, dir.path());

    let report = pipeline.run_historical(2023).await.unwrap();

    assert_eq!(report.rows, 3);
    assert_eq!(report.meetings_seen, 2);
    assert_eq!(report.meetings_built, 1);
    assert_eq!(report.meetings_failed.len(), 1);
    assert_eq!(report.meetings_failed[0].meeting_key, 1230);
    // The 2022 meeting is never expanded
    assert_eq!(server.hits("sessions?meeting_key=1140"), 0);

    let records = pipeline.store().load_historical().unwrap();
    let by_driver = |n: i64| records.iter().find(|r| r.driver_number == n).unwrap();

    let norris = by_driver(4);
    assert_eq!(norris.race_id, "2024_1229");
    assert_eq!(norris.date, "2024-09-01T13:00:00+00:00");
    assert_eq!(norris.starting_position, 1);
    assert_eq!(norris.finishing_position, 31);
    assert_eq!(norris.dnf, 1);
    assert_eq!(norris.avg_track_temp, Some(42.0));
    assert_eq!(norris.max_track_temp, Some(44.0));
    assert_eq!(norris.rain_occurrence, 1);
    assert_eq!(norris.dominant_wind_dir, Some(180));

    let leclerc = by_driver(16);
    assert_eq!(leclerc.finishing_position, 1);
    assert_eq!(leclerc.dnf, 0);
    assert_eq!(leclerc.constructor, "Ferrari");

    let piastri = by_driver(81);
    assert_eq!(piastri.starting_position, 0);
    assert_eq!(piastri.finishing_position, 2);

    // Weather is identical across the race's rows
    assert!(records.iter().all(|r| r.avg_air_temp == Some(29.0)));
}

#[tokio::test]
async fn test_historical_rebuild_is_byte_identical() {
    let server = MockOpenF1::start().await;
    serve_season(&server);
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_for(&server, dir.path());
    let path = pipeline.store().path(ArtifactKind::Historical);

    pipeline.run_historical(2023).await.unwrap();
    let first = std::fs::read(&path).unwrap();
    pipeline.run_historical(2023).await.unwrap();
    let second = std::fs::read(&path).unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_latest_build_writes_latest_csv_without_outcome() {
    let server = MockOpenF1::start().await;
    server.set_json(
        "meetings?meeting_key=latest",
        json!([{"meeting_key": 1270, "year": 2025,
                "meeting_name": "Mexico City Grand Prix", "location": "Mexico City"}]),
    );
    server.set_json(
        "sessions?meeting_key=1270",
        json!([{"session_key": 9501, "meeting_key": 1270, "session_type": "Qualifying",
                "session_name": "Qualifying", "date_start": "2025-10-25T21:00:00+00:00"}]),
    );
    server.set_json(
        "starting_grid?session_key=9501",
        json!([{"driver_number": 4, "position": 1}, {"driver_number": 16, "position": 2}]),
    );
    server.set_json(
        "drivers?driver_number=4&session_key=9501",
        json!([{"driver_number": 4, "full_name": "Lando NORRIS", "team_name": "McLaren"}]),
    );
    // Driver 16 unresolvable: dropped, not fatal
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_for(&server, dir.path());

    let outcome = pipeline.run_latest().await.unwrap();

    let LatestOutcome::Built(report) = outcome else {
        panic!("expected a latest build, got {outcome:?}");
    };
    assert_eq!(report.rows, 1);
    assert_eq!(report.drivers_skipped, 1);
    assert_eq!(server.hits("weather?meeting_key=1270&session_key=9501"), 1);

    let records = pipeline.store().load_latest().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].race_id, "2025_1270");
    assert_eq!(records[0].date, "2025-10-25T21:00:00+00:00");
    assert_eq!(records[0].avg_track_temp, None);
    assert_eq!(records[0].rain_occurrence, 0);

    let header = std::fs::read_to_string(pipeline.store().path(ArtifactKind::Latest)).unwrap();
    assert!(!header.lines().next().unwrap().contains("finishing_position"));
}

#[tokio::test]
async fn test_latest_without_qualifying_leaves_artifact_absent() {
    let server = MockOpenF1::start().await;
    server.set_json(
        "meetings?meeting_key=latest",
        json!([{"meeting_key": 1271, "year": 2025,
                "meeting_name": "Sao Paulo Grand Prix", "location": "Sao Paulo"}]),
    );
    server.set_json(
        "sessions?meeting_key=1271",
        json!([{"session_key": 9600, "meeting_key": 1271, "session_type": "Practice",
                "session_name": "Practice 1"}]),
    );
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_for(&server, dir.path());

    let outcome = pipeline.run_latest().await.unwrap();

    assert_eq!(outcome, LatestOutcome::NoQualifyingSession { meeting_key: 1271 });
    assert!(matches!(
        pipeline.artifact_status(ArtifactKind::Latest).unwrap(),
        ArtifactStatus::Missing { .. }
    ));
    assert!(matches!(
        pipeline.store().load_latest(),
        Err(ArtifactError::NotYetAvailable { kind: ArtifactKind::Latest, .. })
    ));
}

#[tokio::test]
async fn test_meeting_list_failure_fails_the_build_and_keeps_previous_table() {
    let server = MockOpenF1::start().await;
    serve_season(&server);
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_for(&server, dir.path());
    pipeline.run_historical(2023).await.unwrap();
    let before = std::fs::read(pipeline.store().path(ArtifactKind::Historical)).unwrap();

    server.set("meetings", Scripted::status(502));
    assert!(pipeline.run_historical(2023).await.is_err());

    let after = std::fs::read(pipeline.store().path(ArtifactKind::Historical)).unwrap();
    assert_eq!(before, after);
}
