use clap::Parser;
use openf1_features::cli::{Cli, CliError};
use openf1_features::pipeline::config::{ConfigError, DEFAULT_BASE_URL};
use openf1_features::pipeline::FetchConfig;
use std::collections::HashMap;
use std::time::Duration;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| map.get(name).cloned()
}

#[test]
fn retry_policy_follows_configured_values() {
    let config = FetchConfig::from_lookup(env(&[
        ("OPENF1_MAX_RETRIES", "5"),
        ("OPENF1_BACKOFF_FACTOR", "3"),
        ("OPENF1_MAX_BACKOFF_SECS", "20"),
    ]))
    .unwrap();

    let policy = config.retry_policy();
    assert_eq!(policy.max_attempts(), 6);
    assert_eq!(policy.backoff(0), Duration::from_secs(1));
    assert_eq!(policy.backoff(2), Duration::from_secs(9));
    assert_eq!(policy.backoff(3), Duration::from_secs(20));
}

#[test]
fn request_timeout_is_configurable() {
    let config =
        FetchConfig::from_lookup(env(&[("OPENF1_REQUEST_TIMEOUT_SECS", "2.5")])).unwrap();
    assert_eq!(config.request_timeout, Duration::from_millis(2500));
    assert!(config.build_http_client().is_ok());
}

#[test]
fn zero_timeout_is_rejected() {
    let err = FetchConfig::from_lookup(env(&[("OPENF1_REQUEST_TIMEOUT_SECS", "0")])).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn cli_flags_override_defaults() {
    let cli = Cli::try_parse_from([
        "openf1-features",
        "--base-url",
        "http://127.0.0.1:8080/v1/",
        "--max-retries",
        "1",
        "--max-backoff-secs",
        "0.25",
        "latest",
    ])
    .unwrap();

    let config = cli.fetch_config_with(|_| None).unwrap();
    assert_eq!(config.base_url, "http://127.0.0.1:8080/v1");
    assert_eq!(config.max_retries, 1);
    assert_eq!(config.max_backoff, Duration::from_millis(250));
}

#[test]
fn cli_without_flags_or_env_keeps_public_endpoint() {
    let cli = Cli::try_parse_from(["openf1-features", "results"]).unwrap();
    let config = cli.fetch_config_with(|_| None).unwrap();
    assert_eq!(config.base_url, DEFAULT_BASE_URL);
    assert_eq!(config, FetchConfig::default());
}

#[test]
fn cli_and_env_share_the_retry_ceiling() {
    let cli = Cli::try_parse_from(["openf1-features", "--max-retries", "50", "latest"]).unwrap();
    assert!(matches!(
        cli.fetch_config_with(|_| None),
        Err(CliError::Config(ConfigError::Invalid(_)))
    ));
    assert!(FetchConfig::from_lookup(env(&[("OPENF1_MAX_RETRIES", "50")])).is_err());
}

#[test]
fn env_fills_in_what_flags_leave_unset() {
    let cli = Cli::try_parse_from(["openf1-features", "--backoff-factor", "1.5", "latest"]).unwrap();
    let config = cli
        .fetch_config_with(env(&[
            ("OPENF1_BACKOFF_FACTOR", "4"),
            ("OPENF1_REQUEST_TIMEOUT_SECS", "3"),
        ]))
        .unwrap();
    assert_eq!(config.backoff_factor, 1.5);
    assert_eq!(config.request_timeout, Duration::from_secs(3));
}

#[test]
fn negative_period_flag_is_rejected() {
    let cli =
        Cli::try_parse_from(["openf1-features", "--rate-period-secs=-1", "latest"]).unwrap();
    assert!(cli.fetch_config_with(|_| None).is_err());
}
