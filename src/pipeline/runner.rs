//! Build-and-persist entry points used by the CLI and the worker

use std::sync::Arc;
use tracing::info;

use super::builder::{DatasetBuilder, LatestBuild};
use super::report::{BuildReport, LatestOutcome};
use super::BuildError;
use crate::fetcher::RaceDataSource;
use crate::output::store::{ArtifactStatus, ArtifactStore};
use crate::output::{ArtifactError, ArtifactKind};
use crate::shutdown::SharedShutdown;

/// The three operations callers need: historical build, latest build and
/// artifact presence
#[derive(Clone)]
pub struct FeaturePipeline {
    builder: DatasetBuilder,
    store: ArtifactStore,
}

impl FeaturePipeline {
    /// Pipeline reading from `source` and writing into `store`
    pub fn new(source: Arc<dyn RaceDataSource>, store: ArtifactStore) -> Self {
        Self {
            builder: DatasetBuilder::new(source),
            store,
        }
    }

    /// Make builds observe a shutdown request
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.builder = self.builder.with_shutdown(shutdown);
        self
    }

    /// Underlying builder
    pub fn builder(&self) -> &DatasetBuilder {
        &self.builder
    }

    /// Artifact store
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Rebuild `features.csv` from every meeting since `min_season`
    pub async fn run_historical(&self, min_season: i32) -> Result<BuildReport, BuildError> {
        let build = self.builder.build_historical(min_season).await?;
        let written = self.store.write(ArtifactKind::Historical, &build.rows)?;

        let mut report = build.report;
        report.duplicates_dropped += build.rows.len().saturating_sub(written);
        report.rows = written;
        Ok(report)
    }

    /// Rebuild `latest.csv` for the upcoming race
    ///
    /// When the latest meeting has no qualifying session yet nothing is
    /// written and any previous `latest.csv` is left in place.
    pub async fn run_latest(&self) -> Result<LatestOutcome, BuildError> {
        match self.builder.build_latest().await? {
            LatestBuild::Ready(build) => {
                let written = self.store.write(ArtifactKind::Latest, &build.rows)?;
                let mut report = build.report;
                report.rows = written;
                Ok(LatestOutcome::Built(report))
            }
            LatestBuild::NoQualifyingSession { meeting_key } => {
                info!(
                    meeting_key = meeting_key,
                    "Latest-race table not written: qualifying has not run yet"
                );
                Ok(LatestOutcome::NoQualifyingSession { meeting_key })
            }
        }
    }

    /// Whether an artifact is present
    pub fn artifact_status(&self, kind: ArtifactKind) -> Result<ArtifactStatus, ArtifactError> {
        self.store.status(kind)
    }
}
