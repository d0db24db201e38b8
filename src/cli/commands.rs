//! Command execution
//!
//! The composition root of the binary: builds the one rate limiter, the
//! HTTP client and the pipeline, then dispatches.

use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use super::{Cli, CliError, Commands, OutputFormat, PaceArgs, StatusArgs, WatchArgs};
use crate::fetcher::openf1::ResourceClient;
use crate::output::store::{ArtifactStatus, ArtifactStore};
use crate::output::ArtifactKind;
use crate::pipeline::{BuildReport, FeaturePipeline, LatestOutcome, RateLimiter, Worker};
use crate::shutdown::SharedShutdown;

/// How a command ended, mapped to the process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Everything requested was done
    Success,
    /// The latest meeting has no qualifying session yet
    LatestNotAvailable,
    /// `status` found a missing artifact
    ArtifactMissing,
}

impl Outcome {
    /// Process exit code
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Success => 0,
            Outcome::LatestNotAvailable => 2,
            Outcome::ArtifactMissing => 3,
        }
    }
}

/// Run the parsed command
pub async fn execute(cli: &Cli, shutdown: SharedShutdown) -> Result<Outcome, CliError> {
    let store = ArtifactStore::new(&cli.data_dir);

    // Status never touches the network
    if let Commands::Status(args) = &cli.command {
        return status(&store, args, cli.output_format);
    }

    if let Some(addr) = cli.metrics_addr {
        crate::metrics::init_metrics(addr)?;
    }

    let config = cli.fetch_config()?;
    let limiter = Arc::new(RateLimiter::new(config.max_calls, config.period)?);
    let client = ResourceClient::from_config(&config, limiter)?;
    info!(
        base_url = %config.base_url,
        max_calls = config.max_calls,
        period_secs = config.period.as_secs_f64(),
        max_retries = config.max_retries,
        "OpenF1 client ready"
    );

    let pipeline = FeaturePipeline::new(Arc::new(client), store).with_shutdown(shutdown.clone());

    match &cli.command {
        Commands::Historical(args) => {
            let report = pipeline.run_historical(args.min_season).await?;
            print_report(ArtifactKind::Historical, &pipeline, &report, cli.output_format);
            Ok(Outcome::Success)
        }
        Commands::Latest => match pipeline.run_latest().await? {
            LatestOutcome::Built(report) => {
                print_report(ArtifactKind::Latest, &pipeline, &report, cli.output_format);
                Ok(Outcome::Success)
            }
            LatestOutcome::NoQualifyingSession { meeting_key } => {
                match cli.output_format {
                    OutputFormat::Json => println!(
                        "{}",
                        json!({
                            "artifact": "latest",
                            "status": "not_available",
                            "meeting_key": meeting_key,
                        })
                    ),
                    OutputFormat::Human => println!(
                        "Latest meeting {meeting_key} has no qualifying session yet; latest.csv not written"
                    ),
                }
                Ok(Outcome::LatestNotAvailable)
            }
        },
        Commands::Watch(args) => watch(pipeline, args, shutdown).await,
        Commands::Pace(args) => pace(&pipeline, args, cli.output_format).await,
        Commands::Results => results(&pipeline, cli.output_format).await,
        Commands::Status(_) => Ok(Outcome::Success),
    }
}

fn print_report(
    kind: ArtifactKind,
    pipeline: &FeaturePipeline,
    report: &BuildReport,
    format: OutputFormat,
) {
    let path = pipeline.store().path(kind);
    match format {
        OutputFormat::Json => {
            let failures: Vec<_> = report
                .meetings_failed
                .iter()
                .map(|f| {
                    json!({
                        "meeting_key": f.meeting_key,
                        "meeting_name": f.meeting_name,
                        "error": f.error,
                    })
                })
                .collect();
            println!(
                "{}",
                json!({
                    "artifact": kind.label(),
                    "path": path.display().to_string(),
                    "rows": report.rows,
                    "meetings_seen": report.meetings_seen,
                    "meetings_built": report.meetings_built,
                    "meetings_skipped": report.meetings_skipped,
                    "meetings_failed": failures,
                    "drivers_skipped": report.drivers_skipped,
                    "started_at": report.started_at.to_rfc3339(),
                    "finished_at": report.finished_at.to_rfc3339(),
                })
            );
        }
        OutputFormat::Human => {
            println!("Saved {} table: {}", kind, path.display());
            println!("{}", report.summary());
            for failure in &report.meetings_failed {
                println!(
                    "  failed: {} ({}): {}",
                    failure.meeting_name, failure.meeting_key, failure.error
                );
            }
        }
    }
}

fn status(
    store: &ArtifactStore,
    args: &StatusArgs,
    format: OutputFormat,
) -> Result<Outcome, CliError> {
    let kinds = match args.artifact {
        Some(kind) => vec![kind],
        None => vec![ArtifactKind::Historical, ArtifactKind::Latest],
    };

    let mut outcome = Outcome::Success;
    let mut entries = Vec::new();
    for kind in kinds {
        let status = store.status(kind)?;
        if !status.is_present() {
            outcome = Outcome::ArtifactMissing;
        }
        match (&status, format) {
            (ArtifactStatus::Present { path, rows }, OutputFormat::Human) => {
                println!("{kind}: present, {rows} rows ({})", path.display());
            }
            (ArtifactStatus::Missing { path }, OutputFormat::Human) => {
                println!("{kind}: not yet available ({})", path.display());
            }
            (ArtifactStatus::Present { path, rows }, OutputFormat::Json) => entries.push(json!({
                "artifact": kind.label(),
                "present": true,
                "rows": rows,
                "path": path.display().to_string(),
            })),
            (ArtifactStatus::Missing { path }, OutputFormat::Json) => entries.push(json!({
                "artifact": kind.label(),
                "present": false,
                "path": path.display().to_string(),
            })),
        }
    }

    if format == OutputFormat::Json {
        println!("{}", json!(entries));
    }
    Ok(outcome)
}

async fn watch(
    pipeline: FeaturePipeline,
    args: &WatchArgs,
    shutdown: SharedShutdown,
) -> Result<Outcome, CliError> {
    let handle = Worker::new(pipeline, args.job(), args.every()).spawn(shutdown);
    let runs = handle.join().await;
    warn!(runs = runs, "Watch stopped");
    Ok(Outcome::Success)
}

async fn pace(
    pipeline: &FeaturePipeline,
    args: &PaceArgs,
    format: OutputFormat,
) -> Result<Outcome, CliError> {
    let pace = pipeline
        .builder()
        .driver_pace(args.session_key, args.driver_number)
        .await?;

    match format {
        OutputFormat::Json => println!("{}", json!(pace)),
        OutputFormat::Human => {
            println!(
                "Driver {} in session {}",
                pace.driver_number, pace.session_key
            );
            println!(
                "  stints: {} (pit stops: {}), compounds S/M/H: {}/{}/{}",
                display(pace.stints.num_stints),
                display(pace.stints.num_pit_stops),
                pace.stints.used_soft,
                pace.stints.used_medium,
                pace.stints.used_hard
            );
            println!(
                "  laps: {}, best: {}, mean: {}, std: {}, pit out-laps: {}",
                pace.laps.total_laps,
                display(pace.laps.best_lap_time),
                display(pace.laps.avg_lap_time),
                display(pace.laps.std_lap_time),
                pace.laps.laps_with_pit
            );
        }
    }
    Ok(Outcome::Success)
}

async fn results(pipeline: &FeaturePipeline, format: OutputFormat) -> Result<Outcome, CliError> {
    let classification = pipeline.builder().latest_classification().await?;

    match format {
        OutputFormat::Json => {
            let rows: Vec<_> = classification
                .iter()
                .map(|(driver_number, outcome)| {
                    json!({
                        "driver_number": driver_number,
                        "finishing_position": outcome.finishing_position,
                        "dnf": outcome.dnf,
                    })
                })
                .collect();
            println!("{}", json!(rows));
        }
        OutputFormat::Human => {
            for (driver_number, outcome) in &classification {
                let flag = if outcome.dnf { " (not classified)" } else { "" };
                println!(
                    "P{:<3} #{}{}",
                    outcome.finishing_position, driver_number, flag
                );
            }
        }
    }
    Ok(Outcome::Success)
}

fn display<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
