//! Tyre stint summary

use serde::{Deserialize, Serialize};

use super::mean;
use crate::Stint;

/// Tyre strategy features for one driver in one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StintSummary {
    /// Number of stints
    pub num_stints: Option<usize>,
    /// Pit stops, `num_stints - 1`
    pub num_pit_stops: Option<usize>,
    /// Mean stint length in laps
    pub avg_stint_length: Option<f64>,
    /// Longest stint in laps
    pub max_stint_length: Option<i64>,
    /// 1 if a soft compound was used
    pub used_soft: u8,
    /// 1 if a medium compound was used
    pub used_medium: u8,
    /// 1 if a hard compound was used
    pub used_hard: u8,
    /// Mean tyre age at stint start
    pub avg_tyre_age_start: Option<f64>,
}

/// Reduce a driver's stints.
///
/// Empty input yields `None` counts and lengths with all compound flags 0.
/// Stints missing either lap bound do not contribute a length.
pub fn summarize_stints(stints: &[Stint]) -> StintSummary {
    if stints.is_empty() {
        return StintSummary::default();
    }

    let lengths: Vec<i64> = stints
        .iter()
        .filter_map(|s| match (s.lap_start, s.lap_end) {
            (Some(start), Some(end)) => Some(end - start + 1),
            _ => None,
        })
        .collect();

    let used = |compound: &str| {
        u8::from(stints.iter().any(|s| {
            s.compound
                .as_deref()
                .is_some_and(|c| c.trim().eq_ignore_ascii_case(compound))
        }))
    };

    StintSummary {
        num_stints: Some(stints.len()),
        num_pit_stops: Some(stints.len() - 1),
        avg_stint_length: mean(lengths.iter().map(|l| *l as f64)),
        max_stint_length: lengths.iter().copied().max(),
        used_soft: used("SOFT"),
        used_medium: used("MEDIUM"),
        used_hard: used("HARD"),
        avg_tyre_age_start: mean(stints.iter().filter_map(|s| s.tyre_age_at_start)),
    }
}
