//! Rate-limited HTTP GET with bounded retries
//!
//! Per attempt:
//! 1. wait on the shared [`RateLimiter`]
//! 2. send the request and read the whole body (the client's per-request
//!    timeout covers both)
//! 3. transport failure, including a stalled or broken body: back off
//!    `factor^attempt` seconds and retry
//! 4. HTTP 429: sleep `Retry-After` seconds when present, else back off, and retry
//! 5. any other status: hand the buffered response back untouched
//!
//! Every attempt consumes one limiter slot, retries included. No sleep
//! follows the final attempt.

use bytes::Bytes;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::fetcher::retry_formatter::{extract_error_type, RetryContext, RetryErrorType};
use crate::fetcher::{FetcherError, FetcherResult};
use crate::metrics;
use crate::pipeline::config::RetryPolicy;
use crate::pipeline::rate_limit::RateLimiter;

/// A response read to the end
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl FetchedResponse {
    /// HTTP status
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw body
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body as text, invalid UTF-8 replaced
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The single network egress point
#[derive(Debug, Clone)]
pub struct ResilientFetcher {
    client: Client,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl ResilientFetcher {
    /// Create a fetcher over a shared client and limiter
    ///
    /// # Arguments
    /// * `client` - HTTP client (cheap to clone, shares its connection pool)
    /// * `limiter` - Process-wide rate limiter
    /// * `policy` - Retry budget and backoff
    pub fn new(client: Client, limiter: Arc<RateLimiter>, policy: RetryPolicy) -> Self {
        Self {
            client,
            limiter,
            policy,
        }
    }

    /// Retry policy in force
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Shared limiter
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Perform a rate-limited GET and read the body
    ///
    /// Any status other than 429 is returned as-is, errors included; the
    /// caller decides what a 4xx/5xx means for its resource.
    ///
    /// # Errors
    /// - [`FetcherError::Transport`] when every attempt failed before a complete response
    /// - [`FetcherError::RateLimited`] when the final attempt was still throttled
    /// - [`FetcherError::InvalidUrl`] when the request cannot be built
    pub async fn get(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> FetcherResult<FetchedResponse> {
        let max_attempts = self.policy.max_attempts();
        let resource = resource_label(url);
        let mut last_failure: Option<RetryErrorType> = None;

        for attempt in 0..max_attempts {
            let attempt_no = attempt + 1;

            let waited = self.limiter.wait().await;
            metrics::record_rate_limit_wait(waited);

            debug!(
                attempt = attempt_no,
                max_attempts = max_attempts,
                url = url,
                "Sending request"
            );

            let (error_type, backoff, message) = match self.send_once(url, params, resource).await {
                Err(e) if e.is_builder() => {
                    return Err(FetcherError::InvalidUrl {
                        url: url.to_string(),
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    metrics::record_transport_error(resource);
                    (
                        extract_error_type(None, Some(&e)),
                        self.policy.backoff(attempt),
                        e.to_string(),
                    )
                }
                Ok(response) if response.status == StatusCode::TOO_MANY_REQUESTS => {
                    let retry_after = parse_retry_after(&response.headers);
                    (
                        RetryErrorType::RateLimit,
                        retry_after.unwrap_or_else(|| self.policy.backoff(attempt)),
                        "HTTP 429 Too Many Requests".to_string(),
                    )
                }
                Ok(response) => {
                    if let Some(error_type) = last_failure {
                        let ctx = RetryContext::new(
                            attempt_no,
                            max_attempts,
                            error_type,
                            Duration::ZERO,
                            resource,
                            params,
                            "",
                        );
                        info!(
                            url = url,
                            status = response.status.as_u16(),
                            "{}",
                            ctx.format_success()
                        );
                    }
                    debug!(
                        attempt = attempt_no,
                        url = url,
                        status = response.status.as_u16(),
                        bytes = response.body.len(),
                        "Response received"
                    );
                    return Ok(response);
                }
            };

            let ctx = RetryContext::new(
                attempt_no,
                max_attempts,
                error_type,
                backoff,
                resource,
                params,
                message.clone(),
            );

            if error_type.is_retryable() && attempt_no < max_attempts {
                warn!(
                    attempt = attempt_no,
                    max_attempts = max_attempts,
                    url = url,
                    error = %message,
                    "{}",
                    ctx.format_retry()
                );
                metrics::record_retry(resource, error_type.metric_reason(), backoff);
                last_failure = Some(error_type);
                tokio::time::sleep(backoff).await;
                continue;
            }

            error!(url = url, "{}", ctx.format_failure());
            return Err(match error_type {
                RetryErrorType::RateLimit => FetcherError::RateLimited {
                    attempts: attempt_no,
                },
                _ => FetcherError::Transport {
                    attempts: attempt_no,
                    message,
                },
            });
        }

        Err(FetcherError::Transport {
            attempts: 0,
            message: "retry budget allows no attempts".to_string(),
        })
    }

    /// One request, body included. A throttled body is not awaited.
    async fn send_once(
        &self,
        url: &str,
        params: &[(&str, String)],
        resource: &str,
    ) -> Result<FetchedResponse, reqwest::Error> {
        let response = self.client.get(url).query(params).send().await?;
        let status = response.status();
        metrics::record_response(resource, status.as_u16());

        let headers = response.headers().clone();
        let body = if status == StatusCode::TOO_MANY_REQUESTS {
            Bytes::new()
        } else {
            response.bytes().await?
        };

        Ok(FetchedResponse {
            status,
            headers,
            body,
        })
    }
}

/// Read a `Retry-After` header given in (possibly fractional) seconds
///
/// HTTP-date values and negative numbers are ignored.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?;
    let secs = raw.trim().parse::<f64>().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(secs).ok()
}

/// Last path segment of a URL, used as the resource label in logs and metrics
fn resource_label(url: &str) -> &str {
    let path = url.split('?').next().unwrap_or(url);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}
