//! Typed OpenF1 resource client
//!
//! One read per resource. Each read builds the resource URL and query,
//! delegates to the [`ResilientFetcher`], treats a final status >= 400 as a
//! hard failure for that resource and decodes the JSON array into typed
//! records. Zero rows is a valid answer.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

use crate::fetcher::endpoints::{params, Resource, LATEST};
use crate::fetcher::http::ResilientFetcher;
use crate::fetcher::{FetcherError, FetcherResult, RaceDataSource};
use crate::pipeline::config::{ConfigError, FetchConfig};
use crate::pipeline::rate_limit::RateLimiter;
use crate::{Driver, GridEntry, Lap, Meeting, Session, SessionResult, Stint, WeatherSample};

/// Longest error body carried into [`FetcherError::Http`]
const MAX_ERROR_BODY: usize = 512;

/// Client for the OpenF1 REST API
#[derive(Debug, Clone)]
pub struct ResourceClient {
    fetcher: ResilientFetcher,
    base_url: String,
}

impl ResourceClient {
    /// Create a client over an existing fetcher
    pub fn new(fetcher: ResilientFetcher, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
        }
    }

    /// Build the HTTP client and fetcher from configuration
    ///
    /// The limiter is passed in rather than built here so every client in the
    /// process can share one rate budget.
    pub fn from_config(config: &FetchConfig, limiter: Arc<RateLimiter>) -> Result<Self, ConfigError> {
        config.validate()?;
        let client = config.build_http_client()?;
        let fetcher = ResilientFetcher::new(client, limiter, config.retry_policy());
        Ok(Self::new(fetcher, config.base_url.clone()))
    }

    /// Base URL requests are issued against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Underlying fetcher
    pub fn fetcher(&self) -> &ResilientFetcher {
        &self.fetcher
    }

    async fn fetch<T>(&self, resource: Resource, query: &[(&str, String)]) -> FetcherResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let url = resource.url(&self.base_url);
        let response = self.fetcher.get(&url, query).await?;
        let status = response.status();

        if status.is_client_error() || status.is_server_error() {
            let mut body = response.text_lossy();
            truncate_at_boundary(&mut body, MAX_ERROR_BODY);
            return Err(FetcherError::Http {
                status: status.as_u16(),
                url,
                body,
            });
        }

        let records: Vec<T> = serde_json::from_slice(response.body())
            .map_err(|e| FetcherError::Parse(format!("{resource}: {e}")))?;

        debug!(resource = %resource, rows = records.len(), "Decoded records");
        Ok(records)
    }
}

fn truncate_at_boundary(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

#[async_trait]
impl RaceDataSource for ResourceClient {
    async fn meetings(&self) -> FetcherResult<Vec<Meeting>> {
        self.fetch(Resource::Meetings, &[]).await
    }

    async fn sessions(&self, meeting_key: i64) -> FetcherResult<Vec<Session>> {
        self.fetch(
            Resource::Sessions,
            &[(params::MEETING_KEY, meeting_key.to_string())],
        )
        .await
    }

    async fn starting_grid(&self, session_key: i64) -> FetcherResult<Vec<GridEntry>> {
        self.fetch(
            Resource::StartingGrid,
            &[(params::SESSION_KEY, session_key.to_string())],
        )
        .await
    }

    async fn results(&self, session_key: i64) -> FetcherResult<Vec<SessionResult>> {
        self.fetch(
            Resource::SessionResult,
            &[(params::SESSION_KEY, session_key.to_string())],
        )
        .await
    }

    async fn driver(&self, driver_number: i64, session_key: i64) -> FetcherResult<Vec<Driver>> {
        self.fetch(
            Resource::Drivers,
            &[
                (params::DRIVER_NUMBER, driver_number.to_string()),
                (params::SESSION_KEY, session_key.to_string()),
            ],
        )
        .await
    }

    async fn weather(
        &self,
        meeting_key: i64,
        session_key: i64,
    ) -> FetcherResult<Vec<WeatherSample>> {
        self.fetch(
            Resource::Weather,
            &[
                (params::MEETING_KEY, meeting_key.to_string()),
                (params::SESSION_KEY, session_key.to_string()),
            ],
        )
        .await
    }

    async fn latest_meeting(&self) -> FetcherResult<Vec<Meeting>> {
        self.fetch(Resource::Meetings, &[(params::MEETING_KEY, LATEST.to_string())])
            .await
    }

    async fn latest_results(&self) -> FetcherResult<Vec<SessionResult>> {
        self.fetch(
            Resource::SessionResult,
            &[(params::SESSION_KEY, LATEST.to_string())],
        )
        .await
    }

    async fn stints(&self, session_key: i64, driver_number: i64) -> FetcherResult<Vec<Stint>> {
        self.fetch(
            Resource::Stints,
            &[
                (params::SESSION_KEY, session_key.to_string()),
                (params::DRIVER_NUMBER, driver_number.to_string()),
            ],
        )
        .await
    }

    async fn laps(&self, session_key: i64, driver_number: i64) -> FetcherResult<Vec<Lap>> {
        self.fetch(
            Resource::Laps,
            &[
                (params::SESSION_KEY, session_key.to_string()),
                (params::DRIVER_NUMBER, driver_number.to_string()),
            ],
        )
        .await
    }
}
