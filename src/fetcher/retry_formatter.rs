//! Retry message formatting for the resilient fetcher
//!
//! Classifies failures and renders the one-line retry notices and the
//! multi-line failure summary that end up in the logs.

use reqwest::{Error as ReqwestError, StatusCode};
use std::time::Duration;

/// Classification of a failed attempt for user messaging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryErrorType {
    /// Request timed out
    NetworkTimeout,
    /// Connection refused, DNS failure or similar
    NetworkOffline,
    /// HTTP 429
    RateLimit,
    /// HTTP 5xx
    ServerError(u16),
    /// HTTP 404
    NotFound,
    /// Other 4xx
    ClientError(u16),
    /// Anything else at the transport level
    NetworkGeneric,
}

impl RetryErrorType {
    /// Short description used inside retry log messages
    pub fn description(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "network timeout",
            Self::NetworkOffline => "connection failed",
            Self::RateLimit => "rate limit exceeded",
            Self::ServerError(code) => match code {
                500 => "internal server error",
                502 => "bad gateway",
                503 => "service unavailable",
                504 => "gateway timeout",
                _ => "server error",
            },
            Self::NotFound => "resource not found",
            Self::ClientError(_) => "client error",
            Self::NetworkGeneric => "network error",
        }
    }

    /// Remediation hint shown after the final failure
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::NetworkTimeout => "Raise OPENF1_REQUEST_TIMEOUT_SECS or check the network path",
            Self::NetworkOffline => "Verify connectivity and DNS resolution for the OpenF1 host",
            Self::RateLimit => "Lower OPENF1_MAX_CALLS or widen OPENF1_RATE_PERIOD_SECS",
            Self::ServerError(_) => "OpenF1 may be degraded, try again later",
            Self::NotFound => "Check OPENF1_BASE_URL points at the /v1 API root",
            Self::ClientError(_) => "Review the request filters for this resource",
            Self::NetworkGeneric => "Check network connectivity and try again",
        }
    }

    /// Label used for the `reason` metric dimension
    pub fn metric_reason(&self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limited",
            Self::NetworkTimeout | Self::NetworkOffline | Self::NetworkGeneric => "transport",
            Self::ServerError(_) => "server_error",
            Self::NotFound | Self::ClientError(_) => "client_error",
        }
    }

    /// Whether the fetcher retries this kind of failure
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::NetworkTimeout | Self::NetworkOffline | Self::NetworkGeneric
        )
    }
}

/// Context for formatting retry messages
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Current attempt number (1-based)
    pub attempt: u32,
    /// Attempts allowed in total
    pub max_attempts: u32,
    /// What went wrong on this attempt
    pub error_type: RetryErrorType,
    /// Wait before the next attempt
    pub backoff_duration: Duration,
    /// Resource being fetched (e.g. "session_result")
    pub resource: String,
    /// Query filters, rendered `k=v`
    pub filters: Vec<String>,
    /// Underlying error message
    pub error_message: String,
}

impl RetryContext {
    /// Build a context for one failed attempt
    pub fn new(
        attempt: u32,
        max_attempts: u32,
        error_type: RetryErrorType,
        backoff_duration: Duration,
        resource: impl Into<String>,
        params: &[(&str, String)],
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            attempt,
            max_attempts,
            error_type,
            backoff_duration,
            resource: resource.into(),
            filters: params.iter().map(|(k, v)| format!("{k}={v}")).collect(),
            error_message: error_message.into(),
        }
    }

    /// One-line notice emitted before sleeping
    pub fn format_retry(&self) -> String {
        let mut message = format!(
            "Retrying (attempt {}/{}) after {} - waiting {:.1} seconds...",
            self.attempt,
            self.max_attempts,
            self.error_type.description(),
            self.backoff_duration.as_secs_f64()
        );
        self.append_target(&mut message);
        message
    }

    /// Notice emitted when an attempt after a failure succeeds
    pub fn format_success(&self) -> String {
        let mut message = format!(
            "Retry attempt {}/{} succeeded",
            self.attempt, self.max_attempts
        );
        self.append_target(&mut message);
        message
    }

    /// Final failure summary with suggestions
    pub fn format_failure(&self) -> String {
        let mut lines = vec![
            format!("[FAILED] Request failed after {} attempts", self.attempt),
            format!("  Last error: {}", self.error_message),
            format!("  Resource: {}", self.resource),
        ];
        if !self.filters.is_empty() {
            lines.push(format!("  Filters: {}", self.filters.join("&")));
        }
        lines.push("  Suggestions:".to_string());
        for suggestion in self.format_suggestions() {
            lines.push(format!("    - {suggestion}"));
        }
        lines.join("\n")
    }

    /// Suggestions tailored to this failure
    pub fn format_suggestions(&self) -> Vec<String> {
        vec![
            self.error_type.suggestion().to_string(),
            format!(
                "Try increasing OPENF1_MAX_RETRIES (current: {})",
                self.max_attempts.saturating_sub(1)
            ),
        ]
    }

    fn append_target(&self, buffer: &mut String) {
        buffer.push_str(" (");
        buffer.push_str(&self.resource);
        if !self.filters.is_empty() {
            buffer.push('?');
            buffer.push_str(&self.filters.join("&"));
        }
        buffer.push(')');
    }
}

/// Classify a failed attempt from its status or transport error
pub fn extract_error_type(
    status: Option<StatusCode>,
    err: Option<&ReqwestError>,
) -> RetryErrorType {
    if let Some(status) = status {
        match status.as_u16() {
            404 => return RetryErrorType::NotFound,
            429 => return RetryErrorType::RateLimit,
            _ => {}
        }
        if status.is_server_error() {
            return RetryErrorType::ServerError(status.as_u16());
        }
        if status.is_client_error() {
            return RetryErrorType::ClientError(status.as_u16());
        }
    }

    if let Some(err) = err {
        if err.is_timeout() {
            return RetryErrorType::NetworkTimeout;
        }
        if err.is_connect() {
            return RetryErrorType::NetworkOffline;
        }
    }

    RetryErrorType::NetworkGeneric
}
