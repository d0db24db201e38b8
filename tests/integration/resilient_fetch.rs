//! Retry, throttling and rate budget behavior of the resilient fetcher
//! against a live local server

use openf1_features::fetcher::http::ResilientFetcher;
use openf1_features::fetcher::FetcherError;
use openf1_features::pipeline::{FetchConfig, RateLimiter, RetryPolicy};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::support::mock_openf1::{closed_port_url, MockOpenF1, Scripted};

/// Generous limiter and millisecond backoff so real-clock tests stay fast
fn fetcher(max_retries: u32) -> (ResilientFetcher, Arc<RateLimiter>) {
    let limiter = Arc::new(RateLimiter::new(100, Duration::from_secs(60)).unwrap());
    let policy = RetryPolicy {
        max_retries,
        backoff_factor: 2.0,
        max_backoff: Duration::from_millis(10),
    };
    (
        ResilientFetcher::new(Client::new(), limiter.clone(), policy),
        limiter,
    )
}

/// Same retry budget, but a client that gives up on a request after `timeout`
fn impatient_fetcher(max_retries: u32, timeout: Duration) -> ResilientFetcher {
    let config = FetchConfig {
        request_timeout: timeout,
        ..FetchConfig::default()
    };
    let limiter = Arc::new(RateLimiter::new(100, Duration::from_secs(60)).unwrap());
    let policy = RetryPolicy {
        max_retries,
        backoff_factor: 2.0,
        max_backoff: Duration::from_millis(10),
    };
    ResilientFetcher::new(config.build_http_client().unwrap(), limiter, policy)
}

#[tokio::test]
async fn test_throttled_twice_then_success_takes_three_attempts() {
    let server = MockOpenF1::start().await;
    server.script(
        "meetings",
        vec![
            Scripted::throttled(Some("0")),
            Scripted::throttled(None),
            Scripted::raw("[]"),
        ],
    );
    let (fetcher, limiter) = fetcher(3);

    let response = fetcher
        .get(&format!("{}/meetings", server.base_url), &[])
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(server.hits("meetings"), 3);
    // Retries draw from the same budget as first attempts
    assert_eq!(limiter.calls_in_window().await, 3);
}

#[tokio::test]
async fn test_retry_after_is_honored() {
    let server = MockOpenF1::start().await;
    server.script(
        "meetings",
        vec![Scripted::throttled(Some("0.3")), Scripted::raw("[]")],
    );
    let (fetcher, _) = fetcher(3);

    let started = Instant::now();
    let response = fetcher
        .get(&format!("{}/meetings", server.base_url), &[])
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    // Retry-After wins over the 10ms backoff cap
    assert!(started.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn test_throttled_on_every_attempt_is_rate_limited() {
    let server = MockOpenF1::start().await;
    server.set("meetings", Scripted::throttled(Some("0")));
    let (fetcher, _) = fetcher(2);

    let err = fetcher
        .get(&format!("{}/meetings", server.base_url), &[])
        .await
        .unwrap_err();

    assert!(matches!(err, FetcherError::RateLimited { attempts: 3 }));
    assert_eq!(server.hits("meetings"), 3);
}

#[tokio::test]
async fn test_server_error_is_returned_without_retry() {
    let server = MockOpenF1::start().await;
    server.set("meetings", Scripted::status(500));
    let (fetcher, _) = fetcher(3);

    let response = fetcher
        .get(&format!("{}/meetings", server.base_url), &[])
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(server.hits("meetings"), 1);
}

#[tokio::test]
async fn test_not_found_is_returned_without_retry() {
    let server = MockOpenF1::start().await;
    server.set("drivers?driver_number=1&session_key=9002", Scripted::status(404));
    let (fetcher, _) = fetcher(3);

    let response = fetcher
        .get(
            &format!("{}/drivers", server.base_url),
            &[
                ("driver_number", "1".to_string()),
                ("session_key", "9002".to_string()),
            ],
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(server.hits("drivers?driver_number=1&session_key=9002"), 1);
}

#[tokio::test]
async fn test_unreachable_host_exhausts_attempts_as_transport_error() {
    let base_url = closed_port_url().await;
    let (fetcher, limiter) = fetcher(2);

    let err = fetcher
        .get(&format!("{base_url}/meetings"), &[])
        .await
        .unwrap_err();

    assert!(err.is_transient());
    match err {
        FetcherError::Transport { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected transport error, got {other:?}"),
    }
    assert_eq!(limiter.calls_in_window().await, 3);
}

#[tokio::test]
async fn test_zero_retries_means_one_attempt() {
    let server = MockOpenF1::start().await;
    server.set("meetings", Scripted::throttled(Some("0")));
    let (fetcher, _) = fetcher(0);

    let err = fetcher
        .get(&format!("{}/meetings", server.base_url), &[])
        .await
        .unwrap_err();

    assert!(matches!(err, FetcherError::RateLimited { attempts: 1 }));
    assert_eq!(server.hits("meetings"), 1);
}

#[tokio::test]
async fn test_shared_limiter_paces_requests() {
    let server = MockOpenF1::start().await;
    let limiter = Arc::new(RateLimiter::new(2, Duration::from_millis(200)).unwrap());
    let fetcher = ResilientFetcher::new(Client::new(), limiter, RetryPolicy::default());
    let url = format!("{}/meetings", server.base_url);

    let started = Instant::now();
    for _ in 0..5 {
        fetcher.get(&url, &[]).await.unwrap();
    }

    // 5 calls at 2 per 200ms: the 3rd waits one window, the 5th two
    assert!(started.elapsed() >= Duration::from_millis(400));
    assert_eq!(server.hits("meetings"), 5);
}

#[tokio::test]
async fn test_stalled_body_is_retried() {
    let server = MockOpenF1::start().await;
    server.script(
        "meetings",
        vec![Scripted::raw("[]").stalled(Duration::from_millis(1500))],
    );
    server.set("meetings", Scripted::raw("[]"));
    let fetcher = impatient_fetcher(3, Duration::from_millis(300));

    let response = fetcher
        .get(&format!("{}/meetings", server.base_url), &[])
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body(), b"[]");
    assert_eq!(server.hits("meetings"), 2);
}

#[tokio::test]
async fn test_stalled_body_on_every_attempt_is_transport_error() {
    let server = MockOpenF1::start().await;
    server.set(
        "meetings",
        Scripted::raw("[]").stalled(Duration::from_millis(1500)),
    );
    let fetcher = impatient_fetcher(1, Duration::from_millis(200));

    let err = fetcher
        .get(&format!("{}/meetings", server.base_url), &[])
        .await
        .unwrap_err();

    assert!(matches!(err, FetcherError::Transport { attempts: 2, .. }));
    assert_eq!(server.hits("meetings"), 2);
}

#[tokio::test]
async fn test_slow_headers_time_out_and_exhaust_the_budget() {
    let server = MockOpenF1::start().await;
    server.set(
        "meetings",
        Scripted::raw("[]").after(Duration::from_millis(1500)),
    );
    let fetcher = impatient_fetcher(2, Duration::from_millis(200));

    let err = fetcher
        .get(&format!("{}/meetings", server.base_url), &[])
        .await
        .unwrap_err();

    assert!(err.is_transient());
    match err {
        FetcherError::Transport { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected transport error, got {other:?}"),
    }
    assert_eq!(server.hits("meetings"), 3);
}

#[tokio::test]
async fn test_slow_headers_then_prompt_answer_succeeds() {
    let server = MockOpenF1::start().await;
    server.script(
        "meetings",
        vec![Scripted::raw("[]").after(Duration::from_millis(1500))],
    );
    server.set("meetings", Scripted::raw("[]"));
    let fetcher = impatient_fetcher(3, Duration::from_millis(200));

    let response = fetcher
        .get(&format!("{}/meetings", server.base_url), &[])
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(server.hits("meetings"), 2);
}
