//! In-memory race data for builder and runner tests

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::fetcher::parser::RawPosition;
use crate::fetcher::{FetcherError, FetcherResult, RaceDataSource};
use crate::{
    Driver, GridEntry, Lap, Meeting, Session, SessionResult, SessionType, Stint, WeatherSample,
};

/// Canned upstream. Missing keys answer with an empty array.
#[derive(Debug, Default)]
pub(crate) struct FakeSource {
    pub meetings: Vec<Meeting>,
    pub latest_meeting: Vec<Meeting>,
    pub latest_results: Vec<SessionResult>,
    pub sessions: HashMap<i64, Vec<Session>>,
    pub grids: HashMap<i64, Vec<GridEntry>>,
    pub results: HashMap<i64, Vec<SessionResult>>,
    /// Keyed by (driver_number, session_key)
    pub drivers: HashMap<(i64, i64), Vec<Driver>>,
    /// Keyed by (meeting_key, session_key)
    pub weather: HashMap<(i64, i64), Vec<WeatherSample>>,
    /// Keyed by (session_key, driver_number)
    pub stints: HashMap<(i64, i64), Vec<Stint>>,
    /// Keyed by (session_key, driver_number)
    pub laps: HashMap<(i64, i64), Vec<Lap>>,
    /// Meetings whose session listing fails with HTTP 500
    pub failing_meetings: HashSet<i64>,
    /// Fail the meeting listing itself
    pub fail_meetings_list: bool,
    pub calls: Mutex<Vec<String>>,
}

impl FakeSource {
    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Register a meeting with one qualifying and one race session
    pub fn add_race_weekend(&mut self, meeting: Meeting, qualifying_key: i64, race_key: i64) {
        let key = meeting.meeting_key;
        self.sessions.insert(
            key,
            vec![
                session(qualifying_key - 1, key, SessionType::Practice, "Practice 3"),
                session(qualifying_key, key, SessionType::Qualifying, "Qualifying"),
                session(race_key, key, SessionType::Race, "Race"),
            ],
        );
        self.meetings.push(meeting);
    }

    pub fn add_driver(&mut self, driver_number: i64, session_key: i64, name: &str, team: &str) {
        self.drivers.insert(
            (driver_number, session_key),
            vec![Driver {
                driver_number,
                session_key: Some(session_key),
                full_name: Some(name.to_string()),
                team_name: Some(team.to_string()),
                name_acronym: None,
            }],
        );
    }
}

pub(crate) fn meeting(meeting_key: i64, year: i32, name: &str, location: &str) -> Meeting {
    Meeting {
        meeting_key,
        year,
        meeting_name: name.to_string(),
        location: location.to_string(),
        country_name: None,
        circuit_short_name: None,
        date_start: None,
    }
}

pub(crate) fn session(
    session_key: i64,
    meeting_key: i64,
    session_type: SessionType,
    name: &str,
) -> Session {
    Session {
        session_key,
        meeting_key,
        session_type,
        session_name: name.to_string(),
        date_start: Some(format!("2024-01-01T00:00:{:02}+00:00", session_key % 60)),
    }
}

pub(crate) fn grid(driver_number: i64, position: Option<i64>) -> GridEntry {
    GridEntry {
        session_key: None,
        meeting_key: None,
        driver_number,
        position,
        lap_duration: None,
    }
}

pub(crate) fn result(driver_number: i64, position: RawPosition, dnf: bool) -> SessionResult {
    SessionResult {
        session_key: None,
        meeting_key: None,
        driver_number,
        position,
        dnf,
        dns: false,
        dsq: false,
        number_of_laps: None,
    }
}

#[async_trait]
impl RaceDataSource for FakeSource {
    async fn meetings(&self) -> FetcherResult<Vec<Meeting>> {
        self.record("meetings".to_string());
        if self.fail_meetings_list {
            return Err(FetcherError::Transport {
                attempts: 4,
                message: "connection refused".to_string(),
            });
        }
        Ok(self.meetings.clone())
    }

    async fn sessions(&self, meeting_key: i64) -> FetcherResult<Vec<Session>> {
        self.record(format!("sessions:{meeting_key}"));
        if self.failing_meetings.contains(&meeting_key) {
            return Err(FetcherError::Http {
                status: 500,
                url: format!("fake://sessions?meeting_key={meeting_key}"),
                body: "internal error".to_string(),
            });
        }
        Ok(self.sessions.get(&meeting_key).cloned().unwrap_or_default())
    }

    async fn starting_grid(&self, session_key: i64) -> FetcherResult<Vec<GridEntry>> {
        self.record(format!("starting_grid:{session_key}"));
        Ok(self.grids.get(&session_key).cloned().unwrap_or_default())
    }

    async fn results(&self, session_key: i64) -> FetcherResult<Vec<SessionResult>> {
        self.record(format!("results:{session_key}"));
        Ok(self.results.get(&session_key).cloned().unwrap_or_default())
    }

    async fn driver(&self, driver_number: i64, session_key: i64) -> FetcherResult<Vec<Driver>> {
        self.record(format!("driver:{driver_number}:{session_key}"));
        Ok(self
            .drivers
            .get(&(driver_number, session_key))
            .cloned()
            .unwrap_or_default())
    }

    async fn weather(
        &self,
        meeting_key: i64,
        session_key: i64,
    ) -> FetcherResult<Vec<WeatherSample>> {
        self.record(format!("weather:{meeting_key}:{session_key}"));
        Ok(self
            .weather
            .get(&(meeting_key, session_key))
            .cloned()
            .unwrap_or_default())
    }

    async fn latest_meeting(&self) -> FetcherResult<Vec<Meeting>> {
        self.record("latest_meeting".to_string());
        Ok(self.latest_meeting.clone())
    }

    async fn latest_results(&self) -> FetcherResult<Vec<SessionResult>> {
        self.record("latest_results".to_string());
        Ok(self.latest_results.clone())
    }

    async fn stints(&self, session_key: i64, driver_number: i64) -> FetcherResult<Vec<Stint>> {
        self.record(format!("stints:{session_key}:{driver_number}"));
        Ok(self
            .stints
            .get(&(session_key, driver_number))
            .cloned()
            .unwrap_or_default())
    }

    async fn laps(&self, session_key: i64, driver_number: i64) -> FetcherResult<Vec<Lap>> {
        self.record(format!("laps:{session_key}:{driver_number}"));
        Ok(self
            .laps
            .get(&(session_key, driver_number))
            .cloned()
            .unwrap_or_default())
    }
}
