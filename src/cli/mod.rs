//! Command-line interface

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::output::ArtifactKind;
use crate::pipeline::config::{FetchConfig, DEFAULT_MIN_SEASON};
use crate::pipeline::Job;

pub mod commands;
pub mod error;

pub use commands::{execute, Outcome};
pub use error::CliError;

/// OpenF1 feature table builder
#[derive(Parser, Debug)]
#[command(name = "openf1-features")]
#[command(about = "Build per-driver race feature tables from the OpenF1 API", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, value_enum, default_value = "human")]
    pub output_format: OutputFormat,

    /// Directory holding features.csv and latest.csv
    #[arg(long, global = true, env = "OPENF1_DATA_DIR", default_value = "data/processed")]
    pub data_dir: PathBuf,

    /// OpenF1 API root [env: OPENF1_BASE_URL]
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Requests allowed per rate window [env: OPENF1_MAX_CALLS]
    #[arg(long, global = true)]
    pub max_calls: Option<usize>,

    /// Rate window length in seconds [env: OPENF1_RATE_PERIOD_SECS]
    #[arg(long, global = true, allow_negative_numbers = true)]
    pub rate_period_secs: Option<f64>,

    /// Retries after the first attempt, at most 20 [env: OPENF1_MAX_RETRIES]
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// Base of the exponential backoff, seconds = factor ^ attempt [env: OPENF1_BACKOFF_FACTOR]
    #[arg(long, global = true, allow_negative_numbers = true)]
    pub backoff_factor: Option<f64>,

    /// Upper bound on a computed backoff, in seconds [env: OPENF1_MAX_BACKOFF_SECS]
    #[arg(long, global = true)]
    pub max_backoff_secs: Option<f64>,

    /// Per-request timeout in seconds [env: OPENF1_REQUEST_TIMEOUT_SECS]
    #[arg(long, global = true)]
    pub request_timeout_secs: Option<f64>,

    /// Serve Prometheus metrics on this address (e.g. 0.0.0.0:9090)
    #[arg(long, global = true, env = "OPENF1_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rebuild the historical training table
    Historical(HistoricalArgs),

    /// Rebuild the latest-race inference table
    Latest,

    /// Report whether the feature tables exist
    Status(StatusArgs),

    /// Repeat a build on an interval until Ctrl+C
    Watch(WatchArgs),

    /// Print stint and lap summaries for one driver in one session
    Pace(PaceArgs),

    /// Print the classification of the most recent session
    Results,
}

/// Historical build arguments
#[derive(Args, Debug)]
pub struct HistoricalArgs {
    /// First season to include
    #[arg(long, default_value_t = DEFAULT_MIN_SEASON)]
    pub min_season: i32,
}

/// Status arguments
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Artifact to check (historical or latest); both when omitted
    pub artifact: Option<ArtifactKind>,
}

/// Watch arguments
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Seconds between runs
    #[arg(long, default_value_t = 3600, value_parser = clap::value_parser!(u64).range(1..))]
    pub every_secs: u64,

    /// Build to repeat
    #[arg(long, value_enum, default_value = "latest")]
    pub job: JobKind,

    /// First season for historical runs
    #[arg(long, default_value_t = DEFAULT_MIN_SEASON)]
    pub min_season: i32,
}

impl WatchArgs {
    /// The job to schedule
    pub fn job(&self) -> Job {
        match self.job {
            JobKind::Historical => Job::Historical {
                min_season: self.min_season,
            },
            JobKind::Latest => Job::Latest,
        }
    }

    /// Interval between runs
    pub fn every(&self) -> Duration {
        Duration::from_secs(self.every_secs)
    }
}

/// Pace arguments
#[derive(Args, Debug)]
pub struct PaceArgs {
    /// Session key
    #[arg(long)]
    pub session_key: i64,

    /// Car number
    #[arg(long)]
    pub driver_number: i64,
}

/// Schedulable builds
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum JobKind {
    /// Historical training table
    Historical,
    /// Latest-race inference table
    Latest,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

impl Cli {
    /// Fetch configuration from flags, then the process environment, then defaults
    pub fn fetch_config(&self) -> Result<FetchConfig, CliError> {
        self.fetch_config_with(|name| std::env::var(name).ok())
    }

    /// Fetch configuration with flags layered over `env`
    ///
    /// Flags are handed to [`FetchConfig::from_lookup`] under their
    /// environment variable names, so parsing and validation happen in one
    /// place for both sources.
    pub fn fetch_config_with<F>(&self, env: F) -> Result<FetchConfig, CliError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let flags = [
            ("OPENF1_BASE_URL", self.base_url.clone()),
            ("OPENF1_MAX_CALLS", self.max_calls.map(|v| v.to_string())),
            (
                "OPENF1_RATE_PERIOD_SECS",
                self.rate_period_secs.map(|v| v.to_string()),
            ),
            ("OPENF1_MAX_RETRIES", self.max_retries.map(|v| v.to_string())),
            (
                "OPENF1_BACKOFF_FACTOR",
                self.backoff_factor.map(|v| v.to_string()),
            ),
            (
                "OPENF1_MAX_BACKOFF_SECS",
                self.max_backoff_secs.map(|v| v.to_string()),
            ),
            (
                "OPENF1_REQUEST_TIMEOUT_SECS",
                self.request_timeout_secs.map(|v| v.to_string()),
            ),
        ];

        let config = FetchConfig::from_lookup(|name| {
            flags
                .iter()
                .find(|(var, _)| *var == name)
                .and_then(|(_, value)| value.clone())
                .or_else(|| env(name))
        })?;
        Ok(config)
    }
}
