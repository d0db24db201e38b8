//! Dataset builder
//!
//! Joins meetings, sessions, starting grids, results, drivers and weather
//! into [`FeatureRow`]s. Each meeting is processed by one fallible step
//! whose error is recorded and skipped by the orchestrating loop, so a
//! broken meeting only costs its own rows.
//!
//! All intermediate tables live for one build call; nothing is cached
//! across builds.

use futures_util::try_join;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::report::{BuildReport, MeetingFailure, MeetingProgress, SkipReason};
use super::BuildError;
use crate::features::{
    summarize_laps, summarize_stints, summarize_weather, LapSummary, StintSummary, WeatherSummary,
};
use crate::fetcher::{FetcherResult, RaceDataSource};
use crate::metrics;
use crate::shutdown::SharedShutdown;
use crate::{race_id, Driver, FeatureRow, GridEntry, Meeting, RaceOutcome, Session, SessionResult};

/// Rows of one build plus what happened along the way
#[derive(Debug, Clone)]
pub struct Build {
    /// Feature rows in meeting order, then grid order
    pub rows: Vec<FeatureRow>,
    /// Counters
    pub report: BuildReport,
}

/// Result of a latest-race build
#[derive(Debug, Clone)]
pub enum LatestBuild {
    /// Rows for the upcoming race
    Ready(Build),
    /// Qualifying has not happened yet
    NoQualifyingSession {
        /// The latest meeting
        meeting_key: i64,
    },
}

/// Tyre and pace features for one driver in one session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverPace {
    /// Session
    pub session_key: i64,
    /// Car number
    pub driver_number: i64,
    /// Stint summary
    pub stints: StintSummary,
    /// Lap summary
    pub laps: LapSummary,
}

/// Outcome of one meeting's join step
enum MeetingRows {
    Built { rows: Vec<FeatureRow>, drivers_skipped: usize },
    Skipped(SkipReason),
}

/// Meeting-level values shared by every row of a session
struct RaceContext<'a> {
    meeting: &'a Meeting,
    race_id: String,
    date: String,
    weather: WeatherSummary,
}

impl RaceContext<'_> {
    fn row(&self, entry: &GridEntry, driver: &Driver, outcome: Option<RaceOutcome>) -> FeatureRow {
        FeatureRow {
            race_id: self.race_id.clone(),
            season: self.meeting.year,
            race: self.meeting.meeting_name.clone(),
            circuit: self.meeting.location.clone(),
            date: self.date.clone(),
            driver_number: entry.driver_number,
            driver_name: driver
                .full_name
                .clone()
                .or_else(|| driver.name_acronym.clone())
                .unwrap_or_default(),
            constructor: driver.team_name.clone().unwrap_or_default(),
            starting_position: entry.starting_position(),
            outcome,
            weather: self.weather.clone(),
        }
    }
}

/// Builds historical and latest-race feature rows from a [`RaceDataSource`]
#[derive(Clone)]
pub struct DatasetBuilder {
    source: Arc<dyn RaceDataSource>,
    shutdown: Option<SharedShutdown>,
}

impl DatasetBuilder {
    /// Builder over `source`
    pub fn new(source: Arc<dyn RaceDataSource>) -> Self {
        Self {
            source,
            shutdown: None,
        }
    }

    /// Stop between meetings once shutdown is requested
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Build the training rows for every meeting with `year >= min_season`
    ///
    /// Meetings are processed in upstream order. A meeting lacking either
    /// a qualifying or a race session is skipped; a meeting whose fetches
    /// fail is recorded in the report and skipped.
    ///
    /// # Errors
    /// Only whole-build failures: the meeting list itself cannot be fetched,
    /// or shutdown was requested.
    pub async fn build_historical(&self, min_season: i32) -> Result<Build, BuildError> {
        let mut report = BuildReport::start();

        let meetings: Vec<Meeting> = self
            .source
            .meetings()
            .await?
            .into_iter()
            .filter(|m| m.year >= min_season)
            .collect();
        report.meetings_seen = meetings.len();

        info!(
            min_season = min_season,
            meetings = meetings.len(),
            "Starting historical build"
        );

        let progress = MeetingProgress::new(meetings.len());
        let mut rows = Vec::new();
        let mut seen: HashSet<(String, i64)> = HashSet::new();

        for (index, meeting) in meetings.iter().enumerate() {
            self.check_cancelled()?;
            info!("{}", progress.format(index + 1, meeting));

            match self.build_meeting(meeting).await {
                Ok(MeetingRows::Built {
                    rows: meeting_rows,
                    drivers_skipped,
                }) => {
                    report.meetings_built += 1;
                    report.drivers_skipped += drivers_skipped;
                    for row in meeting_rows {
                        if seen.insert((row.race_id.clone(), row.driver_number)) {
                            rows.push(row);
                        } else {
                            report.duplicates_dropped += 1;
                        }
                    }
                }
                Ok(MeetingRows::Skipped(reason)) => {
                    report.meetings_skipped += 1;
                    info!(
                        meeting_key = meeting.meeting_key,
                        meeting_name = %meeting.meeting_name,
                        reason = %reason,
                        "Skipping meeting"
                    );
                }
                Err(e) => {
                    warn!(
                        meeting_key = meeting.meeting_key,
                        meeting_name = %meeting.meeting_name,
                        error = %e,
                        "Failed meeting, continuing with the next one"
                    );
                    metrics::record_meeting_failed();
                    report.meetings_failed.push(MeetingFailure {
                        meeting_key: meeting.meeting_key,
                        meeting_name: meeting.meeting_name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report.finish(rows.len());
        info!(summary = %report.summary(), "Historical build finished");
        Ok(Build { rows, report })
    }

    /// Build the inference rows for the most recent meeting
    ///
    /// Uses the qualifying session only: the race has not run yet, so rows
    /// carry no outcome.
    ///
    /// # Errors
    /// Fetch failures propagate; an empty latest-meeting answer is
    /// [`BuildError::NoLatestMeeting`].
    pub async fn build_latest(&self) -> Result<LatestBuild, BuildError> {
        self.check_cancelled()?;
        let mut report = BuildReport::start();

        let meeting = self
            .source
            .latest_meeting()
            .await?
            .into_iter()
            .next()
            .ok_or(BuildError::NoLatestMeeting)?;
        report.meetings_seen = 1;

        let sessions = self.source.sessions(meeting.meeting_key).await?;
        let Some(qualifying) = sessions.iter().find(|s| s.is_qualifying()) else {
            info!(
                meeting_key = meeting.meeting_key,
                meeting_name = %meeting.meeting_name,
                "No qualifying session found for latest meeting"
            );
            return Ok(LatestBuild::NoQualifyingSession {
                meeting_key: meeting.meeting_key,
            });
        };

        let grid = self.source.starting_grid(qualifying.session_key).await?;
        let weather = self
            .source
            .weather(meeting.meeting_key, qualifying.session_key)
            .await?;
        let context = RaceContext {
            meeting: &meeting,
            race_id: race_id(meeting.year, meeting.meeting_key),
            date: qualifying.date_start.clone().unwrap_or_default(),
            weather: summarize_weather(&weather),
        };

        let mut rows = Vec::with_capacity(grid.len());
        for entry in unique_by_driver(&grid) {
            let Some(driver) = self.resolve_driver(entry, qualifying.session_key).await? else {
                report.drivers_skipped += 1;
                continue;
            };
            rows.push(context.row(entry, &driver, None));
        }

        report.meetings_built = 1;
        report.finish(rows.len());
        info!(
            meeting_key = meeting.meeting_key,
            rows = rows.len(),
            "Latest-race build finished"
        );
        Ok(LatestBuild::Ready(Build { rows, report }))
    }

    /// Stint and lap summaries for one driver
    pub async fn driver_pace(
        &self,
        session_key: i64,
        driver_number: i64,
    ) -> Result<DriverPace, BuildError> {
        let (stints, laps) = try_join!(
            self.source.stints(session_key, driver_number),
            self.source.laps(session_key, driver_number)
        )?;

        debug!(
            session_key = session_key,
            driver_number = driver_number,
            stints = stints.len(),
            laps = laps.len(),
            "Summarizing driver pace"
        );

        Ok(DriverPace {
            session_key,
            driver_number,
            stints: summarize_stints(&stints),
            laps: summarize_laps(&laps),
        })
    }

    /// Classification of the most recent session, as `(driver_number, outcome)`
    pub async fn latest_classification(&self) -> Result<Vec<(i64, RaceOutcome)>, BuildError> {
        let results = self.source.latest_results().await?;
        let mut seen = HashSet::new();
        Ok(results
            .iter()
            .filter(|r| seen.insert(r.driver_number))
            .map(|r| (r.driver_number, r.outcome()))
            .collect())
    }

    async fn build_meeting(&self, meeting: &Meeting) -> FetcherResult<MeetingRows> {
        let sessions = self.source.sessions(meeting.meeting_key).await?;
        let (qualifying, race) = match select_sessions(&sessions) {
            Ok(pair) => pair,
            Err(reason) => return Ok(MeetingRows::Skipped(reason)),
        };

        let grid = self.source.starting_grid(qualifying.session_key).await?;
        let results = self.source.results(race.session_key).await?;
        let weather = self
            .source
            .weather(meeting.meeting_key, race.session_key)
            .await?;

        let context = RaceContext {
            meeting,
            race_id: race_id(meeting.year, meeting.meeting_key),
            date: race.date_start.clone().unwrap_or_default(),
            weather: summarize_weather(&weather),
        };

        let mut rows = Vec::with_capacity(grid.len());
        let mut drivers_skipped = 0;

        for entry in unique_by_driver(&grid) {
            let Some(driver) = self.resolve_driver(entry, race.session_key).await? else {
                drivers_skipped += 1;
                continue;
            };

            let Some(result) = find_result(&results, entry.driver_number) else {
                debug!(
                    meeting_key = meeting.meeting_key,
                    driver_number = entry.driver_number,
                    "No race result for driver, skipping"
                );
                drivers_skipped += 1;
                continue;
            };

            rows.push(context.row(entry, &driver, Some(result.outcome())));
        }

        debug!(
            meeting_key = meeting.meeting_key,
            rows = rows.len(),
            drivers_skipped = drivers_skipped,
            "Meeting joined"
        );
        Ok(MeetingRows::Built {
            rows,
            drivers_skipped,
        })
    }

    async fn resolve_driver(
        &self,
        entry: &GridEntry,
        session_key: i64,
    ) -> FetcherResult<Option<Driver>> {
        let driver = self
            .source
            .driver(entry.driver_number, session_key)
            .await?
            .into_iter()
            .next();

        if driver.is_none() {
            debug!(
                driver_number = entry.driver_number,
                session_key = session_key,
                "Driver not resolvable, skipping"
            );
        }
        Ok(driver)
    }

    fn check_cancelled(&self) -> Result<(), BuildError> {
        match &self.shutdown {
            Some(shutdown) if shutdown.is_shutdown_requested() => Err(BuildError::Cancelled),
            _ => Ok(()),
        }
    }
}

/// First exact "Qualifying" and first exact "Race" session
fn select_sessions(sessions: &[Session]) -> Result<(&Session, &Session), SkipReason> {
    let qualifying = sessions
        .iter()
        .find(|s| s.is_qualifying())
        .ok_or(SkipReason::NoQualifyingSession)?;
    let race = sessions
        .iter()
        .find(|s| s.is_race())
        .ok_or(SkipReason::NoRaceSession)?;
    Ok((qualifying, race))
}

fn find_result(results: &[SessionResult], driver_number: i64) -> Option<&SessionResult> {
    results.iter().find(|r| r.driver_number == driver_number)
}

/// Grid entries in order, keeping the first entry per car number
fn unique_by_driver(grid: &[GridEntry]) -> impl Iterator<Item = &GridEntry> {
    let mut seen = HashSet::new();
    grid.iter().filter(move |e| seen.insert(e.driver_number))
}
