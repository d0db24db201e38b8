//! Session-level feature summarizers
//!
//! Pure reducers from a variable-length sample set to a fixed-width summary.
//! Empty input is an ordinary case (upstream frequently returns zero rows for
//! a session) and yields documented defaults rather than an error.
//!
//! - [`weather::summarize_weather`] - track/air conditions across a session
//! - [`stints::summarize_stints`] - tyre strategy for one driver
//! - [`laps::summarize_laps`] - pace and sector statistics for one driver

pub mod laps;
pub mod stints;
pub mod weather;

pub use laps::{summarize_laps, LapSummary};
pub use stints::{summarize_stints, StintSummary};
pub use weather::{summarize_weather, WeatherSummary};

/// Arithmetic mean of the present values, `None` when there are none.
pub(crate) fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0.0_f64, 0_usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

pub(crate) fn max<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    values.into_iter().reduce(f64::max)
}

pub(crate) fn min<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    values.into_iter().reduce(f64::min)
}

/// Sample standard deviation (n - 1 denominator); needs two values.
pub(crate) fn sample_std<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let values: Vec<f64> = values.into_iter().collect();
    if values.len() < 2 {
        return None;
    }
    let avg = mean(values.iter().copied())?;
    let squared: f64 = values.iter().map(|v| (v - avg).powi(2)).sum();
    Some((squared / (values.len() - 1) as f64).sqrt())
}
