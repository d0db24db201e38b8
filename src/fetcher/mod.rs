//! Upstream data access
//!
//! [`http::ResilientFetcher`] is the only network egress point: it applies the
//! shared rate limit, retries transient failures and hands back raw
//! responses. [`openf1::ResourceClient`] builds on it with one typed read per
//! OpenF1 resource and implements [`RaceDataSource`], the seam the dataset
//! builder is written against.

use crate::{Driver, GridEntry, Lap, Meeting, Session, SessionResult, Stint, WeatherSample};
use async_trait::async_trait;

pub mod endpoints;
pub mod http;
pub mod openf1;
pub mod parser;
pub mod retry_formatter;

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Every attempt failed at the transport level (timeout, connection error, broken body)
    #[error("network error after {attempts} attempts: {message}")]
    Transport {
        /// Attempts made
        attempts: u32,
        /// Last transport error
        message: String,
    },

    /// Every attempt was throttled with HTTP 429
    #[error("rate limit exceeded after {attempts} attempts")]
    RateLimited {
        /// Attempts made
        attempts: u32,
    },

    /// Final response carried an error status
    #[error("HTTP error {status} from {url}: {body}")]
    Http {
        /// Status code
        status: u16,
        /// Requested URL
        url: String,
        /// Response body (truncated)
        body: String,
    },

    /// Response did not match the expected schema
    #[error("parse error: {0}")]
    Parse(String),

    /// The request could not be built (malformed base URL)
    #[error("invalid request URL {url}: {message}")]
    InvalidUrl {
        /// Offending URL
        url: String,
        /// Builder error
        message: String,
    },
}

impl FetcherError {
    /// Whether the failure came from the network rather than the payload
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetcherError::Transport { .. } | FetcherError::RateLimited { .. }
        )
    }
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Typed read access to race data (one operation per upstream resource)
///
/// An empty vector is a valid answer and never an error.
#[async_trait]
pub trait RaceDataSource: Send + Sync {
    /// All meetings, in upstream order
    async fn meetings(&self) -> FetcherResult<Vec<Meeting>>;

    /// Sessions of one meeting
    async fn sessions(&self, meeting_key: i64) -> FetcherResult<Vec<Session>>;

    /// Starting grid derived from a qualifying session
    async fn starting_grid(&self, session_key: i64) -> FetcherResult<Vec<GridEntry>>;

    /// Classification of a session
    async fn results(&self, session_key: i64) -> FetcherResult<Vec<SessionResult>>;

    /// Driver identity for one car number in one session
    async fn driver(&self, driver_number: i64, session_key: i64) -> FetcherResult<Vec<Driver>>;

    /// Weather samples of one session
    async fn weather(&self, meeting_key: i64, session_key: i64)
        -> FetcherResult<Vec<WeatherSample>>;

    /// The most recent meeting (zero or one element)
    async fn latest_meeting(&self) -> FetcherResult<Vec<Meeting>>;

    /// Classification of the most recent session
    async fn latest_results(&self) -> FetcherResult<Vec<SessionResult>>;

    /// Tyre stints of one driver in one session
    async fn stints(&self, session_key: i64, driver_number: i64) -> FetcherResult<Vec<Stint>>;

    /// Laps of one driver in one session
    async fn laps(&self, session_key: i64, driver_number: i64) -> FetcherResult<Vec<Lap>>;
}
