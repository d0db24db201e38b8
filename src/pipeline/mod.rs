//! Dataset builds and their supporting machinery
//!
//! # Overview
//!
//! 1. **Configuration**: [`config::FetchConfig`] carries the rate and retry knobs
//! 2. **Rate limiting**: one [`rate_limit::RateLimiter`] per process, shared by `Arc`
//! 3. **Builds**: [`builder::DatasetBuilder`] joins upstream resources into feature rows
//! 4. **Persistence**: [`runner::FeaturePipeline`] builds and writes the artifacts
//! 5. **Scheduling**: [`worker::Worker`] repeats a build on an interval until shutdown
//!
//! # Error Handling
//!
//! Failures inside one meeting are recorded in the [`report::BuildReport`] and
//! never escape a historical build. Failures of the whole build (meeting list
//! unreachable, artifact not writable, cancellation) surface as [`BuildError`].

pub mod builder;
pub mod config;
pub mod rate_limit;
pub mod report;
pub mod runner;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use builder::{Build, DatasetBuilder, DriverPace, LatestBuild};
pub use config::{ConfigError, FetchConfig, RetryPolicy};
pub use rate_limit::{RateLimitError, RateLimiter};
pub use report::{BuildReport, LatestOutcome, MeetingFailure, SkipReason};
pub use runner::FeaturePipeline;
pub use worker::{Job, Worker, WorkerHandle};

use crate::fetcher::FetcherError;
use crate::output::OutputError;

/// Build errors
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// An upstream fetch the whole build depends on failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetcherError),

    /// The artifact could not be written
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// Upstream reported no latest meeting
    #[error("upstream returned no latest meeting")]
    NoLatestMeeting,

    /// Shutdown was requested mid-build
    #[error("build cancelled by shutdown request")]
    Cancelled,
}
