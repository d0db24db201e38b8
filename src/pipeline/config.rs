//! Fetch configuration and backoff calculation
//!
//! Every knob is tunable through the environment without a rebuild:
//!
//! | Variable | Default |
//! |---|---|
//! | `OPENF1_BASE_URL` | `https://api.openf1.org/v1` |
//! | `OPENF1_MAX_CALLS` | 3 |
//! | `OPENF1_RATE_PERIOD_SECS` | 1.0 |
//! | `OPENF1_MAX_RETRIES` | 3 (at most 20) |
//! | `OPENF1_BACKOFF_FACTOR` | 2.0 |
//! | `OPENF1_MAX_BACKOFF_SECS` | 60 |
//! | `OPENF1_REQUEST_TIMEOUT_SECS` | 10 |

use reqwest::Client;
use std::str::FromStr;
use std::time::Duration;

/// Public OpenF1 endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.openf1.org/v1";

/// Calls allowed per rate window.
/// OpenF1's anonymous tier tolerates a few requests per second.
pub const DEFAULT_MAX_CALLS: usize = 3;

/// Rate window length in seconds
pub const DEFAULT_PERIOD_SECS: f64 = 1.0;

/// Retries after the first attempt (4 attempts total)
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Highest accepted retry budget
pub const MAX_RETRIES_CEILING: u32 = 20;

/// Base of the exponential backoff: attempt `n` sleeps `factor^n` seconds
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Cap applied to computed backoff (not to `Retry-After`)
pub const DEFAULT_MAX_BACKOFF_SECS: u64 = 60;

/// Per-request timeout; independent of the retry budget
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// TCP connect timeout
pub const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Earliest season included in the historical build by default
pub const DEFAULT_MIN_SEASON: i32 = 2023;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable held an unparseable value
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidVar {
        /// Variable name
        var: String,
        /// Raw value
        value: String,
        /// Parser message
        reason: String,
    },

    /// The combination of values is unusable
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Retry budget handed to the resilient fetcher
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Base of the exponential backoff
    pub backoff_factor: f64,
    /// Upper bound on a computed backoff
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Total attempts including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Backoff before retrying after `attempt` (0-based) failed
    pub fn backoff(&self, attempt: u32) -> Duration {
        calculate_backoff(self.backoff_factor, attempt, self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            max_backoff: Duration::from_secs(DEFAULT_MAX_BACKOFF_SECS),
        }
    }
}

/// Everything needed to talk to OpenF1
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    /// API root, without trailing slash
    pub base_url: String,
    /// Calls allowed per rate window
    pub max_calls: usize,
    /// Rate window length
    pub period: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Base of the exponential backoff
    pub backoff_factor: f64,
    /// Cap on a computed backoff
    pub max_backoff: Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// TCP connect timeout
    pub connect_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_calls: DEFAULT_MAX_CALLS,
            period: Duration::from_secs_f64(DEFAULT_PERIOD_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            max_backoff: Duration::from_secs(DEFAULT_MAX_BACKOFF_SECS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
        }
    }
}

impl FetchConfig {
    /// Load from the process environment, keeping defaults for unset variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("OPENF1_BASE_URL") {
            config.base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(calls) = parse_var::<usize, _>(&lookup, "OPENF1_MAX_CALLS")? {
            config.max_calls = calls;
        }
        if let Some(secs) = parse_var::<f64, _>(&lookup, "OPENF1_RATE_PERIOD_SECS")? {
            config.period = seconds("OPENF1_RATE_PERIOD_SECS", secs)?;
        }
        if let Some(retries) = parse_var::<u32, _>(&lookup, "OPENF1_MAX_RETRIES")? {
            config.max_retries = retries;
        }
        if let Some(factor) = parse_var::<f64, _>(&lookup, "OPENF1_BACKOFF_FACTOR")? {
            config.backoff_factor = factor;
        }
        if let Some(secs) = parse_var::<f64, _>(&lookup, "OPENF1_MAX_BACKOFF_SECS")? {
            config.max_backoff = seconds("OPENF1_MAX_BACKOFF_SECS", secs)?;
        }
        if let Some(secs) = parse_var::<f64, _>(&lookup, "OPENF1_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = seconds("OPENF1_REQUEST_TIMEOUT_SECS", secs)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the limiter or fetcher cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::Invalid("base URL cannot be empty".to_string()));
        }
        if self.max_calls == 0 {
            return Err(ConfigError::Invalid(
                "max calls per window must be at least 1".to_string(),
            ));
        }
        if self.period.is_zero() {
            return Err(ConfigError::Invalid(
                "rate window must be longer than zero".to_string(),
            ));
        }
        if self.max_retries > MAX_RETRIES_CEILING {
            return Err(ConfigError::Invalid(format!(
                "max retries must be at most {MAX_RETRIES_CEILING}, got {}",
                self.max_retries
            )));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "backoff factor must be a non-negative number, got {}",
                self.backoff_factor
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "request timeout must be longer than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Retry budget derived from this configuration
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff_factor: self.backoff_factor,
            max_backoff: self.max_backoff,
        }
    }

    /// Build the shared HTTP client (one connection pool per process)
    pub fn build_http_client(&self) -> Result<Client, ConfigError> {
        Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .user_agent(concat!("openf1-features/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))
    }
}

fn parse_var<T, F>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidVar {
                var: var.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

fn seconds(var: &str, secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::InvalidVar {
        var: var.to_string(),
        value: secs.to_string(),
        reason: e.to_string(),
    })
}

/// Exponential backoff: `factor^attempt` seconds, capped at `cap`
pub fn calculate_backoff(factor: f64, attempt: u32, cap: Duration) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let secs = factor.powi(exponent);
    if !secs.is_finite() || secs >= cap.as_secs_f64() {
        return cap;
    }
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(cap)
}
