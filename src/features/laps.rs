//! Lap summary

use serde::{Deserialize, Serialize};

use super::{mean, min, sample_std};
use crate::Lap;

/// Pace features for one driver in one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LapSummary {
    /// Highest lap number seen, 0 without laps
    pub total_laps: i64,
    /// Mean lap time
    pub avg_lap_time: Option<f64>,
    /// Fastest lap time
    pub best_lap_time: Option<f64>,
    /// Lap time standard deviation (consistency)
    pub std_lap_time: Option<f64>,
    /// Number of pit out-laps
    pub laps_with_pit: u32,
    /// Mean sector 1 time
    pub avg_sector1: Option<f64>,
    /// Mean sector 2 time
    pub avg_sector2: Option<f64>,
    /// Mean sector 3 time
    pub avg_sector3: Option<f64>,
    /// Mean speed-trap speed
    pub avg_speed_trap: Option<f64>,
    /// Mean intermediate 1 speed
    pub avg_i1_speed: Option<f64>,
    /// Mean intermediate 2 speed
    pub avg_i2_speed: Option<f64>,
}

/// Reduce a driver's laps. Empty input yields zero counts and `None` timings.
pub fn summarize_laps(laps: &[Lap]) -> LapSummary {
    if laps.is_empty() {
        return LapSummary::default();
    }

    let durations = || laps.iter().filter_map(|l| l.lap_duration);

    LapSummary {
        total_laps: laps.iter().filter_map(|l| l.lap_number).max().unwrap_or(0),
        avg_lap_time: mean(durations()),
        best_lap_time: min(durations()),
        std_lap_time: sample_std(durations()),
        laps_with_pit: laps.iter().filter(|l| l.is_pit_out_lap).count() as u32,
        avg_sector1: mean(laps.iter().filter_map(|l| l.duration_sector_1)),
        avg_sector2: mean(laps.iter().filter_map(|l| l.duration_sector_2)),
        avg_sector3: mean(laps.iter().filter_map(|l| l.duration_sector_3)),
        avg_speed_trap: mean(laps.iter().filter_map(|l| l.st_speed)),
        avg_i1_speed: mean(laps.iter().filter_map(|l| l.i1_speed)),
        avg_i2_speed: mean(laps.iter().filter_map(|l| l.i2_speed)),
    }
}
