//! # OpenF1 Features Library
//!
//! Builds per-driver, per-race feature tables from the public
//! [OpenF1](https://openf1.org) REST API. The tables feed a downstream
//! ranking model: one row per driver per race, with the grid slot, the
//! classified result (historical builds only) and a session-level weather
//! summary.
//!
//! ## Features
//!
//! - **Shared Rate Budget**: a rolling-window [`pipeline::RateLimiter`] shared by every request
//! - **Resilient Fetching**: bounded retries with exponential backoff and `Retry-After` support
//! - **Typed Records**: every upstream resource decodes into an explicit struct
//! - **Failure Isolation**: one broken meeting never aborts a historical build
//! - **Atomic Artifacts**: CSV tables are written to a temp file and then persisted
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use openf1_features::fetcher::openf1::ResourceClient;
//! use openf1_features::output::store::ArtifactStore;
//! use openf1_features::pipeline::{FeaturePipeline, FetchConfig, RateLimiter};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FetchConfig::from_env()?;
//! let limiter = Arc::new(RateLimiter::new(config.max_calls, config.period)?);
//! let client = ResourceClient::from_config(&config, limiter)?;
//!
//! let pipeline = FeaturePipeline::new(Arc::new(client), ArtifactStore::new("data/processed"));
//! let report = pipeline.run_historical(2023).await?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`pipeline`] - rate limiting, configuration, dataset builds and the background worker
//! - [`fetcher`] - the resilient HTTP layer and the typed OpenF1 resource client
//! - [`features`] - pure summarizers for weather, stint and lap samples
//! - [`output`] - CSV records and the artifact store
//! - [`shutdown`] - cooperative cancellation shared by builds and workers
//! - [`metrics`] - Prometheus counters for requests, retries and build health

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::features::WeatherSummary;
use crate::fetcher::parser::{lenient_f64, lenient_flag, lenient_i64, RawPosition};

/// CLI command implementations
pub mod cli;

/// Session-level feature summarizers
pub mod features;

/// Upstream access: resilient HTTP and the OpenF1 resource client
pub mod fetcher;

/// Observability counters
pub mod metrics;

/// Feature table writers and artifact storage
pub mod output;

/// Dataset builds, rate limiting and scheduling
pub mod pipeline;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// Finishing position assigned to every result that is not a clean classification.
///
/// Worse than any real grid slot so non-finishers still rank last.
pub const UNCLASSIFIED_POSITION: i64 = 31;

/// Starting position used when the grid entry carries no position.
pub const UNRANKED_GRID_POSITION: i64 = 0;

/// Stable row identity shared by historical and latest builds.
pub fn race_id(season: i32, meeting_key: i64) -> String {
    format!("{season}_{meeting_key}")
}

/// One race weekend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Meeting {
    /// Unique meeting key
    pub meeting_key: i64,
    /// Championship season
    pub year: i32,
    /// Official meeting name (e.g., "Italian Grand Prix")
    #[serde(default)]
    pub meeting_name: String,
    /// Venue location (e.g., "Monza")
    #[serde(default)]
    pub location: String,
    /// Host country
    #[serde(default)]
    pub country_name: Option<String>,
    /// Short circuit name
    #[serde(default)]
    pub circuit_short_name: Option<String>,
    /// Meeting start (ISO 8601)
    #[serde(default)]
    pub date_start: Option<String>,
}

/// Kind of on-track session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SessionType {
    /// Free practice
    Practice,
    /// Qualifying (including sprint qualifying, told apart by name)
    Qualifying,
    /// Race (including sprint, told apart by name)
    Race,
    /// Anything the API adds later
    Other(String),
}

impl std::fmt::Display for SessionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionType::Practice => "Practice",
            SessionType::Qualifying => "Qualifying",
            SessionType::Race => "Race",
            SessionType::Other(other) => other.as_str(),
        };
        write!(f, "{s}")
    }
}

impl FromStr for SessionType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Practice" => SessionType::Practice,
            "Qualifying" => SessionType::Qualifying,
            "Race" => SessionType::Race,
            other => SessionType::Other(other.to_string()),
        })
    }
}

impl From<String> for SessionType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Practice" => SessionType::Practice,
            "Qualifying" => SessionType::Qualifying,
            "Race" => SessionType::Race,
            _ => SessionType::Other(value),
        }
    }
}

impl From<SessionType> for String {
    fn from(value: SessionType) -> Self {
        value.to_string()
    }
}

/// One on-track session within a meeting
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// Unique session key
    pub session_key: i64,
    /// Owning meeting
    pub meeting_key: i64,
    /// Session kind
    pub session_type: SessionType,
    /// Session name (e.g., "Qualifying", "Sprint Qualifying")
    #[serde(default)]
    pub session_name: String,
    /// Session start (ISO 8601)
    #[serde(default)]
    pub date_start: Option<String>,
}

impl Session {
    /// Grand prix qualifying, not sprint qualifying
    pub fn is_qualifying(&self) -> bool {
        self.session_type == SessionType::Qualifying && self.session_name == "Qualifying"
    }

    /// Grand prix race, not the sprint
    pub fn is_race(&self) -> bool {
        self.session_type == SessionType::Race && self.session_name == "Race"
    }
}

/// One driver's slot on the starting grid
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridEntry {
    /// Qualifying session the grid comes from
    #[serde(default, deserialize_with = "lenient_i64")]
    pub session_key: Option<i64>,
    /// Owning meeting
    #[serde(default, deserialize_with = "lenient_i64")]
    pub meeting_key: Option<i64>,
    /// Car number
    pub driver_number: i64,
    /// Grid slot; `None` when the upstream value is absent or not numeric
    #[serde(default, deserialize_with = "lenient_i64")]
    pub position: Option<i64>,
    /// Qualifying lap time in seconds
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lap_duration: Option<f64>,
}

impl GridEntry {
    /// Grid slot with the unranked sentinel for missing positions
    pub fn starting_position(&self) -> i64 {
        self.position.unwrap_or(UNRANKED_GRID_POSITION)
    }
}

/// One driver's classification in a session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionResult {
    /// Session the result belongs to
    #[serde(default, deserialize_with = "lenient_i64")]
    pub session_key: Option<i64>,
    /// Owning meeting
    #[serde(default, deserialize_with = "lenient_i64")]
    pub meeting_key: Option<i64>,
    /// Car number
    pub driver_number: i64,
    /// Raw classified position; may be null or a status string
    #[serde(default)]
    pub position: RawPosition,
    /// Did not finish
    #[serde(default, deserialize_with = "lenient_flag")]
    pub dnf: bool,
    /// Did not start
    #[serde(default, deserialize_with = "lenient_flag")]
    pub dns: bool,
    /// Disqualified
    #[serde(default, deserialize_with = "lenient_flag")]
    pub dsq: bool,
    /// Laps completed
    #[serde(default, deserialize_with = "lenient_i64")]
    pub number_of_laps: Option<i64>,
}

impl SessionResult {
    /// Reduce the raw result to a bounded finishing position
    pub fn outcome(&self) -> RaceOutcome {
        if self.dnf || self.dns || self.dsq {
            return RaceOutcome::unclassified();
        }

        match &self.position {
            RawPosition::Numeric(position) if (1..UNCLASSIFIED_POSITION).contains(position) => {
                RaceOutcome {
                    finishing_position: *position,
                    dnf: false,
                }
            }
            _ => RaceOutcome::unclassified(),
        }
    }
}

/// Supervised target of a historical row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceOutcome {
    /// Classified position, or [`UNCLASSIFIED_POSITION`]
    pub finishing_position: i64,
    /// Non-completion flag (DNF, DNS, DSQ or unparseable position)
    pub dnf: bool,
}

impl RaceOutcome {
    /// Outcome for any non-classified result
    pub fn unclassified() -> Self {
        Self {
            finishing_position: UNCLASSIFIED_POSITION,
            dnf: true,
        }
    }
}

/// Driver identity within one session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Driver {
    /// Car number
    pub driver_number: i64,
    /// Session the record was looked up for
    #[serde(default, deserialize_with = "lenient_i64")]
    pub session_key: Option<i64>,
    /// Full name (e.g., "Max VERSTAPPEN")
    #[serde(default)]
    pub full_name: Option<String>,
    /// Team name
    #[serde(default)]
    pub team_name: Option<String>,
    /// Three-letter acronym
    #[serde(default)]
    pub name_acronym: Option<String>,
}

/// One weather reading; sampling cadence is irregular
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WeatherSample {
    /// Owning meeting
    #[serde(default, deserialize_with = "lenient_i64")]
    pub meeting_key: Option<i64>,
    /// Owning session
    #[serde(default, deserialize_with = "lenient_i64")]
    pub session_key: Option<i64>,
    /// Sample time (ISO 8601)
    #[serde(default)]
    pub date: Option<String>,
    /// Track temperature (°C)
    #[serde(default, deserialize_with = "lenient_f64")]
    pub track_temperature: Option<f64>,
    /// Air temperature (°C)
    #[serde(default, deserialize_with = "lenient_f64")]
    pub air_temperature: Option<f64>,
    /// Relative humidity (%)
    #[serde(default, deserialize_with = "lenient_f64")]
    pub humidity: Option<f64>,
    /// Air pressure (mbar)
    #[serde(default, deserialize_with = "lenient_f64")]
    pub pressure: Option<f64>,
    /// Whether rain was falling
    #[serde(default, deserialize_with = "lenient_flag")]
    pub rainfall: bool,
    /// Wind speed (m/s)
    #[serde(default, deserialize_with = "lenient_f64")]
    pub wind_speed: Option<f64>,
    /// Wind direction (degrees)
    #[serde(default, deserialize_with = "lenient_i64")]
    pub wind_direction: Option<i64>,
}

/// One tyre stint
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Stint {
    /// Car number
    #[serde(default, deserialize_with = "lenient_i64")]
    pub driver_number: Option<i64>,
    /// Owning session
    #[serde(default, deserialize_with = "lenient_i64")]
    pub session_key: Option<i64>,
    /// Stint index within the session
    #[serde(default, deserialize_with = "lenient_i64")]
    pub stint_number: Option<i64>,
    /// First lap of the stint
    #[serde(default, deserialize_with = "lenient_i64")]
    pub lap_start: Option<i64>,
    /// Last lap of the stint
    #[serde(default, deserialize_with = "lenient_i64")]
    pub lap_end: Option<i64>,
    /// Tyre compound (e.g., "SOFT")
    #[serde(default)]
    pub compound: Option<String>,
    /// Tyre age in laps when the stint began
    #[serde(default, deserialize_with = "lenient_f64")]
    pub tyre_age_at_start: Option<f64>,
}

/// One timed lap
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Lap {
    /// Car number
    #[serde(default, deserialize_with = "lenient_i64")]
    pub driver_number: Option<i64>,
    /// Owning session
    #[serde(default, deserialize_with = "lenient_i64")]
    pub session_key: Option<i64>,
    /// Lap number
    #[serde(default, deserialize_with = "lenient_i64")]
    pub lap_number: Option<i64>,
    /// Lap time in seconds
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lap_duration: Option<f64>,
    /// Out-lap after a pit stop
    #[serde(default, deserialize_with = "lenient_flag")]
    pub is_pit_out_lap: bool,
    /// Sector 1 time in seconds
    #[serde(default, deserialize_with = "lenient_f64")]
    pub duration_sector_1: Option<f64>,
    /// Sector 2 time in seconds
    #[serde(default, deserialize_with = "lenient_f64")]
    pub duration_sector_2: Option<f64>,
    /// Sector 3 time in seconds
    #[serde(default, deserialize_with = "lenient_f64")]
    pub duration_sector_3: Option<f64>,
    /// Speed trap (km/h)
    #[serde(default, deserialize_with = "lenient_f64")]
    pub st_speed: Option<f64>,
    /// Intermediate 1 speed (km/h)
    #[serde(default, deserialize_with = "lenient_f64")]
    pub i1_speed: Option<f64>,
    /// Intermediate 2 speed (km/h)
    #[serde(default, deserialize_with = "lenient_f64")]
    pub i2_speed: Option<f64>,
}

/// One driver's aggregated record for one race
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    /// `{season}_{meeting_key}`, see [`race_id`]
    pub race_id: String,
    /// Championship season
    pub season: i32,
    /// Meeting name
    pub race: String,
    /// Venue location
    pub circuit: String,
    /// Session start of the session the row is anchored on
    pub date: String,
    /// Car number
    pub driver_number: i64,
    /// Driver full name
    pub driver_name: String,
    /// Team name
    pub constructor: String,
    /// Grid slot, or [`UNRANKED_GRID_POSITION`]
    pub starting_position: i64,
    /// Race outcome; `None` for latest-race rows
    pub outcome: Option<RaceOutcome>,
    /// Session-level weather, identical for every row of a session
    pub weather: WeatherSummary,
}
