//! Build reports and progress lines

use chrono::{DateTime, Utc};
use std::time::Instant;

use crate::Meeting;

/// A meeting dropped from a historical build because a fetch failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingFailure {
    /// Meeting key
    pub meeting_key: i64,
    /// Meeting name
    pub meeting_name: String,
    /// Rendered error
    pub error: String,
}

/// Why a meeting produced no rows without failing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No session named exactly "Qualifying"
    NoQualifyingSession,
    /// No session named exactly "Race"
    NoRaceSession,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoQualifyingSession => write!(f, "no qualifying session"),
            SkipReason::NoRaceSession => write!(f, "no race session"),
        }
    }
}

/// What one build did
#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    /// Rows emitted after de-duplication
    pub rows: usize,
    /// Meetings considered (after the season filter)
    pub meetings_seen: usize,
    /// Meetings that contributed rows or an empty grid
    pub meetings_built: usize,
    /// Meetings skipped for a missing session
    pub meetings_skipped: usize,
    /// Meetings dropped on fetch failure
    pub meetings_failed: Vec<MeetingFailure>,
    /// Grid entries without a driver or result record
    pub drivers_skipped: usize,
    /// Rows dropped because `(race_id, driver_number)` repeated
    pub duplicates_dropped: usize,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
    /// Wall-clock end
    pub finished_at: DateTime<Utc>,
}

impl BuildReport {
    /// Empty report stamped with the current time
    pub fn start() -> Self {
        let now = Utc::now();
        Self {
            rows: 0,
            meetings_seen: 0,
            meetings_built: 0,
            meetings_skipped: 0,
            meetings_failed: Vec::new(),
            drivers_skipped: 0,
            duplicates_dropped: 0,
            started_at: now,
            finished_at: now,
        }
    }

    /// Stamp the end time
    pub fn finish(&mut self, rows: usize) {
        self.rows = rows;
        self.finished_at = Utc::now();
    }

    /// Whether every considered meeting was processed without a fetch failure
    pub fn is_clean(&self) -> bool {
        self.meetings_failed.is_empty()
    }

    /// One-line human summary
    pub fn summary(&self) -> String {
        let elapsed = self.finished_at - self.started_at;
        format!(
            "{} rows from {}/{} meetings ({} skipped, {} failed, {} drivers skipped) in {:.1}s",
            self.rows,
            self.meetings_built,
            self.meetings_seen,
            self.meetings_skipped,
            self.meetings_failed.len(),
            self.drivers_skipped,
            elapsed.num_milliseconds() as f64 / 1000.0
        )
    }
}

/// Result of a latest-race build
#[derive(Debug, Clone, PartialEq)]
pub enum LatestOutcome {
    /// The inference table was written
    Built(BuildReport),
    /// The latest meeting has no qualifying session yet; nothing was written
    NoQualifyingSession {
        /// The latest meeting
        meeting_key: i64,
    },
}

/// Formats "meeting i/n" progress lines
#[derive(Debug)]
pub(crate) struct MeetingProgress {
    total: usize,
    started: Instant,
}

impl MeetingProgress {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            total,
            started: Instant::now(),
        }
    }

    pub(crate) fn format(&self, index: usize, meeting: &Meeting) -> String {
        let percentage = if self.total == 0 {
            100.0
        } else {
            index as f64 / self.total as f64 * 100.0
        };
        format!(
            "Processing meeting {}/{} ({:.0}%): {} {} [{:.0}s elapsed]",
            index,
            self.total,
            percentage,
            meeting.year,
            meeting.meeting_name,
            self.started.elapsed().as_secs_f64()
        )
    }
}
