//! CSV feature table writer
//!
//! Both tables share the identity and weather columns; only the historical
//! table carries the supervised `finishing_position` and `dnf` columns.
//! Missing values render as empty cells. The header is written up front so
//! an empty build still yields a well-formed table.

use csv::{Writer, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use tracing::{debug, info};

use super::{ArtifactKind, FeatureWriter, OutputError, OutputResult, OutputWriter};
use crate::features::WeatherSummary;
use crate::FeatureRow;

const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Historical table column order
pub const HISTORICAL_COLUMNS: &[&str] = &[
    "race_id",
    "season",
    "race",
    "circuit",
    "date",
    "driver_number",
    "driver_name",
    "constructor",
    "starting_position",
    "finishing_position",
    "dnf",
    "avg_track_temp",
    "max_track_temp",
    "min_track_temp",
    "avg_air_temp",
    "avg_humidity",
    "avg_pressure",
    "rain_occurrence",
    "avg_wind_speed",
    "dominant_wind_dir",
];

/// Latest table column order
pub const LATEST_COLUMNS: &[&str] = &[
    "race_id",
    "season",
    "race",
    "circuit",
    "date",
    "driver_number",
    "driver_name",
    "constructor",
    "starting_position",
    "avg_track_temp",
    "max_track_temp",
    "min_track_temp",
    "avg_air_temp",
    "avg_humidity",
    "avg_pressure",
    "rain_occurrence",
    "avg_wind_speed",
    "dominant_wind_dir",
];

/// One row of `features.csv`, fields in [`HISTORICAL_COLUMNS`] order
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub race_id: String,
    pub season: i32,
    pub race: String,
    pub circuit: String,
    pub date: String,
    pub driver_number: i64,
    pub driver_name: String,
    pub constructor: String,
    pub starting_position: i64,
    pub finishing_position: i64,
    pub dnf: u8,
    pub avg_track_temp: Option<f64>,
    pub max_track_temp: Option<f64>,
    pub min_track_temp: Option<f64>,
    pub avg_air_temp: Option<f64>,
    pub avg_humidity: Option<f64>,
    pub avg_pressure: Option<f64>,
    pub rain_occurrence: u8,
    pub avg_wind_speed: Option<f64>,
    pub dominant_wind_dir: Option<i64>,
}

impl From<&FeatureRow> for HistoricalRecord {
    fn from(row: &FeatureRow) -> Self {
        let outcome = row.outcome.unwrap_or_else(crate::RaceOutcome::unclassified);
        let w = &row.weather;
        Self {
            race_id: row.race_id.clone(),
            season: row.season,
            race: row.race.clone(),
            circuit: row.circuit.clone(),
            date: row.date.clone(),
            driver_number: row.driver_number,
            driver_name: row.driver_name.clone(),
            constructor: row.constructor.clone(),
            starting_position: row.starting_position,
            finishing_position: outcome.finishing_position,
            dnf: u8::from(outcome.dnf),
            avg_track_temp: w.avg_track_temp,
            max_track_temp: w.max_track_temp,
            min_track_temp: w.min_track_temp,
            avg_air_temp: w.avg_air_temp,
            avg_humidity: w.avg_humidity,
            avg_pressure: w.avg_pressure,
            rain_occurrence: w.rain_occurrence,
            avg_wind_speed: w.avg_wind_speed,
            dominant_wind_dir: w.dominant_wind_dir,
        }
    }
}

/// One row of `latest.csv`, fields in [`LATEST_COLUMNS`] order
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestRecord {
    pub race_id: String,
    pub season: i32,
    pub race: String,
    pub circuit: String,
    pub date: String,
    pub driver_number: i64,
    pub driver_name: String,
    pub constructor: String,
    pub starting_position: i64,
    pub avg_track_temp: Option<f64>,
    pub max_track_temp: Option<f64>,
    pub min_track_temp: Option<f64>,
    pub avg_air_temp: Option<f64>,
    pub avg_humidity: Option<f64>,
    pub avg_pressure: Option<f64>,
    pub rain_occurrence: u8,
    pub avg_wind_speed: Option<f64>,
    pub dominant_wind_dir: Option<i64>,
}

impl LatestRecord {
    /// Weather columns folded back into a summary
    pub fn weather(&self) -> WeatherSummary {
        WeatherSummary {
            avg_track_temp: self.avg_track_temp,
            max_track_temp: self.max_track_temp,
            min_track_temp: self.min_track_temp,
            avg_air_temp: self.avg_air_temp,
            avg_humidity: self.avg_humidity,
            avg_pressure: self.avg_pressure,
            rain_occurrence: self.rain_occurrence,
            avg_wind_speed: self.avg_wind_speed,
            dominant_wind_dir: self.dominant_wind_dir,
        }
    }
}

impl From<&FeatureRow> for LatestRecord {
    fn from(row: &FeatureRow) -> Self {
        let w = &row.weather;
        Self {
            race_id: row.race_id.clone(),
            season: row.season,
            race: row.race.clone(),
            circuit: row.circuit.clone(),
            date: row.date.clone(),
            driver_number: row.driver_number,
            driver_name: row.driver_name.clone(),
            constructor: row.constructor.clone(),
            starting_position: row.starting_position,
            avg_track_temp: w.avg_track_temp,
            max_track_temp: w.max_track_temp,
            min_track_temp: w.min_track_temp,
            avg_air_temp: w.avg_air_temp,
            avg_humidity: w.avg_humidity,
            avg_pressure: w.avg_pressure,
            rain_occurrence: w.rain_occurrence,
            avg_wind_speed: w.avg_wind_speed,
            dominant_wind_dir: w.dominant_wind_dir,
        }
    }
}

/// Column order for an artifact
pub fn columns(kind: ArtifactKind) -> &'static [&'static str] {
    match kind {
        ArtifactKind::Historical => HISTORICAL_COLUMNS,
        ArtifactKind::Latest => LATEST_COLUMNS,
    }
}

/// CSV writer for feature rows, de-duplicating on `(race_id, driver_number)`
pub struct CsvFeatureWriter {
    writer: Writer<BufWriter<File>>,
    kind: ArtifactKind,
    seen: HashSet<(String, i64)>,
    rows_written: u64,
    duplicates_skipped: u64,
}

impl CsvFeatureWriter {
    /// Wrap an open file and write the header for `kind`
    pub fn from_file(file: File, kind: ArtifactKind) -> OutputResult<Self> {
        let buf_writer = BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file);
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(buf_writer);

        writer
            .write_record(columns(kind))
            .map_err(|e| OutputError::CsvError(format!("Failed to write header: {}", e)))?;

        debug!(artifact = %kind, "CSV feature writer created");

        Ok(Self {
            writer,
            kind,
            seen: HashSet::new(),
            rows_written: 0,
            duplicates_skipped: 0,
        })
    }

    /// Rows written so far
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Rows dropped as duplicates
    pub fn duplicates_skipped(&self) -> u64 {
        self.duplicates_skipped
    }
}

impl FeatureWriter for CsvFeatureWriter {
    fn write_row(&mut self, row: &FeatureRow) -> OutputResult<bool> {
        let key = (row.race_id.clone(), row.driver_number);
        if !self.seen.insert(key) {
            self.duplicates_skipped += 1;
            debug!(
                race_id = %row.race_id,
                driver_number = row.driver_number,
                "Skipping duplicate feature row"
            );
            return Ok(false);
        }

        let result = match self.kind {
            ArtifactKind::Historical => self.writer.serialize(HistoricalRecord::from(row)),
            ArtifactKind::Latest => self.writer.serialize(LatestRecord::from(row)),
        };
        result.map_err(|e| OutputError::CsvError(format!("Failed to write row: {}", e)))?;

        self.rows_written += 1;
        Ok(true)
    }
}

impl OutputWriter for CsvFeatureWriter {
    fn flush(&mut self) -> OutputResult<()> {
        self.writer
            .flush()
            .map_err(|e| OutputError::FlushError(format!("Failed to flush: {}", e)))
    }

    fn close(mut self) -> OutputResult<()> {
        self.flush()?;

        let buf_writer = self.writer.into_inner().map_err(|e| {
            OutputError::IoError(format!("Failed to get inner writer: {}", e))
        })?;

        let file = buf_writer.into_inner().map_err(|e| {
            OutputError::IoError(format!("Failed to get file handle: {}", e))
        })?;

        file.sync_all()
            .map_err(|e| OutputError::IoError(format!("Failed to sync file: {}", e)))?;

        info!(
            artifact = %self.kind,
            rows = self.rows_written,
            duplicates = self.duplicates_skipped,
            "CSV feature writer closed"
        );
        Ok(())
    }
}
