//! Feature table output

use crate::FeatureRow;
use std::path::PathBuf;

pub mod csv;
pub mod store;

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV write error
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Buffer flush error
    #[error("flush error: {0}")]
    FlushError(String),

    /// Temp file could not be moved into place
    #[error("failed to persist {path}: {reason}")]
    PersistError {
        /// Final artifact path
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Reading a persisted artifact failed
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// No build has produced this artifact yet
    #[error("{kind} feature table not yet available at {path}")]
    NotYetAvailable {
        /// Which table
        kind: ArtifactKind,
        /// Where it was looked for
        path: PathBuf,
    },

    /// The file exists but could not be read
    #[error("IO error reading artifact: {0}")]
    Io(String),

    /// The file is not a valid feature table
    #[error("CSV error reading artifact: {0}")]
    Csv(String),
}

/// The two tables this crate produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// Training table: one row per driver per historical race
    Historical,
    /// Inference table: one row per driver for the upcoming race
    Latest,
}

impl ArtifactKind {
    /// File name under the data directory
    pub fn file_name(&self) -> &'static str {
        match self {
            ArtifactKind::Historical => "features.csv",
            ArtifactKind::Latest => "latest.csv",
        }
    }

    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            ArtifactKind::Historical => "historical",
            ArtifactKind::Latest => "latest",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl std::str::FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "historical" | "features" => Ok(ArtifactKind::Historical),
            "latest" => Ok(ArtifactKind::Latest),
            other => Err(format!(
                "unknown artifact '{other}', expected 'historical' or 'latest'"
            )),
        }
    }
}

/// Finalisation shared by all writers
pub trait OutputWriter {
    /// Flush any buffered data
    fn flush(&mut self) -> OutputResult<()>;

    /// Flush and release the underlying sink
    fn close(self) -> OutputResult<()>;
}

/// Sink for feature rows
pub trait FeatureWriter: OutputWriter {
    /// Write one row. Returns `false` when the row was a duplicate and skipped.
    fn write_row(&mut self, row: &FeatureRow) -> OutputResult<bool>;

    /// Write many rows, returning how many were written
    fn write_rows(&mut self, rows: &[FeatureRow]) -> OutputResult<usize> {
        let mut written = 0;
        for row in rows {
            if self.write_row(row)? {
                written += 1;
            }
        }
        Ok(written)
    }
}
