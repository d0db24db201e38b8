//! Background worker
//!
//! Runs one [`Job`] on a fixed interval in a spawned task until shutdown is
//! requested. A run in progress is not interrupted mid-request; builds
//! notice the request between meetings and stop there.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use super::report::LatestOutcome;
use super::runner::FeaturePipeline;
use super::BuildError;
use crate::shutdown::SharedShutdown;

/// Work the scheduler can repeat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    /// Rebuild the training table
    Historical {
        /// First season included
        min_season: i32,
    },
    /// Rebuild the inference table
    Latest,
}

impl Job {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Job::Historical { .. } => "historical",
            Job::Latest => "latest",
        }
    }

    /// Run once, returning a one-line summary
    pub async fn run(&self, pipeline: &FeaturePipeline) -> Result<String, BuildError> {
        match self {
            Job::Historical { min_season } => {
                let report = pipeline.run_historical(*min_season).await?;
                Ok(report.summary())
            }
            Job::Latest => match pipeline.run_latest().await? {
                LatestOutcome::Built(report) => Ok(report.summary()),
                LatestOutcome::NoQualifyingSession { meeting_key } => Ok(format!(
                    "meeting {meeting_key} has no qualifying session yet, nothing written"
                )),
            },
        }
    }
}

/// Shortest interval between runs; shorter requests are raised to it
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Repeats a job on an interval
pub struct Worker {
    pipeline: FeaturePipeline,
    job: Job,
    every: Duration,
}

impl Worker {
    /// Worker running `job` every `every` (first run immediately)
    ///
    /// `every` below [`MIN_INTERVAL`], zero included, is raised to it.
    pub fn new(pipeline: FeaturePipeline, job: Job, every: Duration) -> Self {
        if every < MIN_INTERVAL {
            warn!(
                requested_ms = every.as_millis() as u64,
                min_secs = MIN_INTERVAL.as_secs(),
                "Worker interval too short, using the minimum"
            );
        }
        Self {
            pipeline,
            job,
            every: every.max(MIN_INTERVAL),
        }
    }

    /// Interval between runs
    pub fn every(&self) -> Duration {
        self.every
    }

    /// Spawn onto the current runtime
    pub fn spawn(self, shutdown: SharedShutdown) -> WorkerHandle {
        let task_shutdown = shutdown.clone();
        let task = tokio::spawn(self.run(task_shutdown));
        WorkerHandle { shutdown, task }
    }

    async fn run(self, shutdown: SharedShutdown) -> usize {
        let Worker {
            pipeline,
            job,
            every,
        } = self;
        let pipeline = pipeline.with_shutdown(shutdown.clone());

        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            job = job.name(),
            every_secs = every.as_secs_f64(),
            "Worker started"
        );

        let mut runs = 0;
        loop {
            tokio::select! {
                _ = shutdown.wait_for_shutdown() => break,
                _ = ticker.tick() => {}
            }
            if shutdown.is_shutdown_requested() {
                break;
            }

            runs += 1;
            match job.run(&pipeline).await {
                Ok(summary) => info!(job = job.name(), run = runs, "{}", summary),
                Err(BuildError::Cancelled) => {
                    warn!(job = job.name(), run = runs, "Run cancelled by shutdown");
                    break;
                }
                Err(e) => error!(job = job.name(), run = runs, error = %e, "Run failed"),
            }
        }

        info!(job = job.name(), runs = runs, "Worker stopped");
        runs
    }
}

/// Handle to a spawned worker
pub struct WorkerHandle {
    shutdown: SharedShutdown,
    task: JoinHandle<usize>,
}

impl WorkerHandle {
    /// Shutdown coordinator the worker observes
    pub fn shutdown_handle(&self) -> SharedShutdown {
        self.shutdown.clone()
    }

    /// Wait for the worker to stop on its own (after an external shutdown request)
    pub async fn join(self) -> usize {
        match self.task.await {
            Ok(runs) => runs,
            Err(e) => {
                error!(error = %e, "Worker task panicked or was aborted");
                0
            }
        }
    }

    /// Request shutdown and wait for the worker to stop
    ///
    /// # Returns
    /// Number of runs started
    pub async fn shutdown(self) -> usize {
        self.shutdown.request_shutdown();
        self.join().await
    }
}
