//! Weather summary

use serde::{Deserialize, Serialize};

use super::{max, mean, min};
use crate::WeatherSample;

/// Session-level weather features
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherSummary {
    /// Mean track temperature
    pub avg_track_temp: Option<f64>,
    /// Highest track temperature
    pub max_track_temp: Option<f64>,
    /// Lowest track temperature
    pub min_track_temp: Option<f64>,
    /// Mean air temperature
    pub avg_air_temp: Option<f64>,
    /// Mean relative humidity
    pub avg_humidity: Option<f64>,
    /// Mean air pressure
    pub avg_pressure: Option<f64>,
    /// 1 if any sample reported rain, else 0
    pub rain_occurrence: u8,
    /// Mean wind speed
    pub avg_wind_speed: Option<f64>,
    /// Most frequent wind direction
    pub dominant_wind_dir: Option<i64>,
}

/// Reduce a session's weather samples.
///
/// Empty input yields every field `None` and `rain_occurrence = 0`.
pub fn summarize_weather(samples: &[WeatherSample]) -> WeatherSummary {
    if samples.is_empty() {
        return WeatherSummary::default();
    }

    let track = || samples.iter().filter_map(|s| s.track_temperature);

    WeatherSummary {
        avg_track_temp: mean(track()),
        max_track_temp: max(track()),
        min_track_temp: min(track()),
        avg_air_temp: mean(samples.iter().filter_map(|s| s.air_temperature)),
        avg_humidity: mean(samples.iter().filter_map(|s| s.humidity)),
        avg_pressure: mean(samples.iter().filter_map(|s| s.pressure)),
        rain_occurrence: u8::from(samples.iter().any(|s| s.rainfall)),
        avg_wind_speed: mean(samples.iter().filter_map(|s| s.wind_speed)),
        dominant_wind_dir: mode_first_seen(samples.iter().filter_map(|s| s.wind_direction)),
    }
}

/// Most frequent value; ties go to the value encountered first.
fn mode_first_seen<I>(values: I) -> Option<i64>
where
    I: IntoIterator<Item = i64>,
{
    // (value, count) in first-seen order
    let mut counts: Vec<(i64, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((value, 1)),
        }
    }

    let mut best: Option<(i64, usize)> = None;
    for (value, count) in counts {
        let better = match best {
            Some((_, best_count)) => count > best_count,
            None => true,
        };
        if better {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value)
}
