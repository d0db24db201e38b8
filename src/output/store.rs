//! Artifact store
//!
//! Owns the data directory holding `features.csv` and `latest.csv`. Writes
//! go to a temp file in the same directory and are renamed into place, so a
//! reader sees either the previous table or the new one, never a partial
//! file.

use serde::de::DeserializeOwned;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::csv::{CsvFeatureWriter, HistoricalRecord, LatestRecord};
use super::{ArtifactError, ArtifactKind, FeatureWriter, OutputError, OutputResult, OutputWriter};
use crate::metrics;
use crate::FeatureRow;

/// Presence of one artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactStatus {
    /// The table exists
    Present {
        /// Location on disk
        path: PathBuf,
        /// Data rows (header excluded)
        rows: usize,
    },
    /// No build has written the table yet
    Missing {
        /// Where it is expected
        path: PathBuf,
    },
}

impl ArtifactStatus {
    /// Whether the artifact exists
    pub fn is_present(&self) -> bool {
        matches!(self, ArtifactStatus::Present { .. })
    }
}

/// Directory of feature tables
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Store rooted at `dir` (created on first write)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Location of one artifact
    pub fn path(&self, kind: ArtifactKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// Atomically replace an artifact with `rows`
    ///
    /// # Returns
    /// Rows written after de-duplication
    pub fn write(&self, kind: ArtifactKind, rows: &[FeatureRow]) -> OutputResult<usize> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| OutputError::IoError(format!("Failed to create directory: {}", e)))?;

        let temp = NamedTempFile::new_in(&self.dir)
            .map_err(|e| OutputError::IoError(format!("Failed to create temp file: {}", e)))?;
        let file = temp
            .as_file()
            .try_clone()
            .map_err(|e| OutputError::IoError(format!("Failed to clone temp file: {}", e)))?;

        let mut writer = CsvFeatureWriter::from_file(file, kind)?;
        let written = writer.write_rows(rows)?;
        writer.close()?;

        let path = self.path(kind);
        temp.persist(&path).map_err(|e| OutputError::PersistError {
            path: path.clone(),
            reason: e.error.to_string(),
        })?;

        metrics::record_rows_written(kind.label(), written);
        info!(
            artifact = %kind,
            path = %path.display(),
            rows = written,
            "Saved feature table"
        );
        Ok(written)
    }

    /// Whether an artifact exists, and how many rows it holds
    pub fn status(&self, kind: ArtifactKind) -> Result<ArtifactStatus, ArtifactError> {
        let path = self.path(kind);
        let mut reader = match csv::Reader::from_path(&path) {
            Ok(reader) => reader,
            Err(e) if is_not_found(&e) => return Ok(ArtifactStatus::Missing { path }),
            Err(e) => return Err(ArtifactError::Io(e.to_string())),
        };

        let mut rows = 0;
        for record in reader.records() {
            record.map_err(|e| ArtifactError::Csv(e.to_string()))?;
            rows += 1;
        }

        debug!(artifact = %kind, rows = rows, "Artifact present");
        Ok(ArtifactStatus::Present { path, rows })
    }

    /// Read the inference table
    ///
    /// # Errors
    /// [`ArtifactError::NotYetAvailable`] when no latest build has succeeded
    pub fn load_latest(&self) -> Result<Vec<LatestRecord>, ArtifactError> {
        self.load(ArtifactKind::Latest)
    }

    /// Read the training table
    pub fn load_historical(&self) -> Result<Vec<HistoricalRecord>, ArtifactError> {
        self.load(ArtifactKind::Historical)
    }

    fn load<T: DeserializeOwned>(&self, kind: ArtifactKind) -> Result<Vec<T>, ArtifactError> {
        let path = self.path(kind);
        let mut reader = match csv::Reader::from_path(&path) {
            Ok(reader) => reader,
            Err(e) if is_not_found(&e) => {
                return Err(ArtifactError::NotYetAvailable { kind, path });
            }
            Err(e) => return Err(ArtifactError::Io(e.to_string())),
        };

        reader
            .deserialize()
            .collect::<Result<Vec<T>, _>>()
            .map_err(|e| ArtifactError::Csv(e.to_string()))
    }
}

fn is_not_found(err: &csv::Error) -> bool {
    match err.kind() {
        csv::ErrorKind::Io(io) => io.kind() == ErrorKind::NotFound,
        _ => false,
    }
}
