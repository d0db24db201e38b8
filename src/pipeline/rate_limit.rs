//! Rolling-window rate limiting
//!
//! At most `max_calls` calls are admitted in any window of `period`. The
//! limiter is shared (via `Arc`) by every client in the process so the
//! scheduler, foreground builds and embedding callers draw from one budget.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Rolling-window limiter over recorded call timestamps
#[derive(Debug)]
pub struct RateLimiter {
    max_calls: usize,
    period: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter admitting `max_calls` per `period`
    ///
    /// # Errors
    /// Returns [`RateLimitError::InvalidConfig`] for a zero call budget or zero period
    pub fn new(max_calls: usize, period: Duration) -> Result<Self, RateLimitError> {
        if max_calls == 0 {
            return Err(RateLimitError::InvalidConfig(
                "max_calls must be at least 1".to_string(),
            ));
        }
        if period.is_zero() {
            return Err(RateLimitError::InvalidConfig(
                "period must be longer than zero".to_string(),
            ));
        }

        Ok(Self {
            max_calls,
            period,
            calls: Mutex::new(VecDeque::with_capacity(max_calls.min(1024))),
        })
    }

    /// Calls admitted per window
    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    /// Window length
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Suspend the calling task until one call is permitted, then record it.
    ///
    /// Eviction, the capacity check and the append happen under one lock.
    /// A task woken after sleeping re-runs the check: another waiter may have
    /// taken the freed slot in the meantime.
    ///
    /// # Returns
    /// Total time spent waiting
    pub async fn wait(&self) -> Duration {
        let started = Instant::now();

        loop {
            let wait_for = {
                let mut calls = self.calls.lock().await;
                let now = Instant::now();
                self.evict_expired(&mut calls, now);

                if calls.len() < self.max_calls {
                    calls.push_back(now);
                    return now.saturating_duration_since(started);
                }

                match calls.front() {
                    Some(oldest) => (*oldest + self.period).saturating_duration_since(now),
                    None => Duration::ZERO,
                }
            };

            debug!(
                wait_ms = wait_for.as_millis() as u64,
                max_calls = self.max_calls,
                "Rate window full, waiting"
            );
            sleep(wait_for).await;
        }
    }

    /// Calls recorded in the current window
    pub async fn calls_in_window(&self) -> usize {
        let mut calls = self.calls.lock().await;
        self.evict_expired(&mut calls, Instant::now());
        calls.len()
    }

    fn evict_expired(&self, calls: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = calls.front() {
            if *oldest + self.period <= now {
                calls.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Rate limiter errors
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    /// Limiter parameters are unusable
    #[error("invalid rate limiter configuration: {0}")]
    InvalidConfig(String),
}
