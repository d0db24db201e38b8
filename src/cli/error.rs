//! CLI error types and conversions

use crate::metrics::MetricsError;
use crate::output::ArtifactError;
use crate::pipeline::{BuildError, ConfigError, RateLimitError};

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Rate limiter error
    #[error("rate limiter error: {0}")]
    RateLimit(#[from] RateLimitError),

    /// Build error
    #[error("build error: {0}")]
    Build(#[from] BuildError),

    /// Artifact error
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    /// Metrics exporter error
    #[error("metrics error: {0}")]
    Metrics(#[from] MetricsError),
}
