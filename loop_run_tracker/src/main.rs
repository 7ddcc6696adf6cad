use std::{
    fs::OpenOptions,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use loop_run_lib::{
    format_elapsed, haversine_distance, loop_id, Coordinate, DistanceAccumulator, PositionSample, StopReport,
};
use loop_run_tracker::{
    gpx_util, Clock, ContestLedger, IntervalTicker, ManualClock, ReplaySource, SystemClock, TrackerConfig,
    TrackerService, DEFAULT_CONFIG_PATH,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "loop_run", version, about = "Track, validate and submit loop runs")]
struct Cli {
    /// Configuration file. Defaults to config/loop_run.conf when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also append logs to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a GPX track through the tracker, then validate and submit it.
    Replay {
        gpx: PathBuf,
        /// Submitter identity, overrides the configured one.
        #[arg(long)]
        address: Option<String>,
        /// Delay between replayed fixes.
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Write the bincode encoded record here.
        #[arg(long)]
        payload: Option<PathBuf>,
        /// Write the recorded path as GPX here.
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Check whether a GPX track closes into a loop.
    Validate {
        gpx: PathBuf,
        /// Closure threshold in meters, overrides the configured one.
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Great-circle distance in meters between two points.
    #[command(allow_negative_numbers = true)]
    Distance { lat1: f64, lon1: f64, lat2: f64, lon2: f64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_deref())?;

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Replay {
            gpx,
            address,
            interval_ms,
            payload,
            export,
        } => {
            let address = address.unwrap_or_else(|| config.submitter_address.clone());
            let interval = interval_ms.map(Duration::from_millis).unwrap_or(config.replay_interval);
            replay(&config, &gpx, &address, interval, payload.as_deref(), export.as_deref()).await
        }
        Command::Validate { gpx, threshold } => {
            let mut config = config;
            if let Some(threshold) = threshold {
                config.closure_threshold_meters = threshold;
            }
            validate(&config, &gpx)
        }
        Command::Distance { lat1, lon1, lat2, lon2 } => {
            let meters = haversine_distance(Coordinate::new(lat1, lon1), Coordinate::new(lat2, lon2));
            println!("{meters:.1}m");
            Ok(())
        }
    }
}

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info,loop_run_tracker=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<TrackerConfig> {
    let path = match path {
        Some(path) => path,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Path::new(DEFAULT_CONFIG_PATH),
        None => return Ok(TrackerConfig::default()),
    };

    let config = TrackerConfig::load(path)?;
    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}

async fn replay(
    config: &TrackerConfig,
    gpx: &Path,
    address: &str,
    interval: Duration,
    payload: Option<&Path>,
    export: Option<&Path>,
) -> Result<()> {
    let source = ReplaySource::from_gpx(gpx, interval).with_context(|| format!("read {}", gpx.display()))?;
    if source.is_empty() {
        bail!("{} has no track points", gpx.display());
    }
    let points = source.len();

    // Timestamped tracks are timed by their own clock instead of the wall.
    let span = recorded_span(source.samples());
    let manual_clock = span.map(|(first, _)| ManualClock::new(first));
    let clock: Arc<dyn Clock> = match &manual_clock {
        Some(clock) => Arc::new(clock.clone()),
        None => Arc::new(SystemClock),
    };

    let handle = TrackerService::spawn(
        clock.clone(),
        Arc::new(source),
        Arc::new(IntervalTicker::new(config.tick_interval)),
        config.validator(),
    );

    let started = handle.start_run().await?;
    if let Some(status) = &started.status {
        println!("{status}");
    }

    let snapshot = handle
        .snapshots()
        .wait_for(|snapshot| snapshot.path.len() >= points)
        .await
        .context("tracker stopped during replay")?
        .clone();
    tracing::info!(
        "Replayed {points} points, {:.0}m so far",
        snapshot.total_distance_meters
    );

    if let (Some(clock), Some((_, last))) = (&manual_clock, span) {
        clock.set(last);
    }

    let Some(report) = handle.stop_run().await? else {
        bail!("run was not tracking");
    };
    print_report(&report);

    if let Some(export) = export {
        let name = gpx
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "loop run".into());
        let snapshot = handle.snapshot();
        gpx_util::write_gpx_file(&name, snapshot.start_time, &snapshot.path, export)?;
        println!("Path written to {}", export.display());
    }

    if !report.outcome.is_valid() {
        return Ok(());
    }

    let ledger = ContestLedger::new(clock, config.contest_duration);
    let (record, receipt) = handle.submit(address, &ledger).await?;
    println!("{receipt}");
    println!("{}", record.to_json()?);

    if let Some(payload) = payload {
        std::fs::write(payload, record.to_bytes()?).with_context(|| format!("write {}", payload.display()))?;
        println!("Payload written to {}", payload.display());
    }

    Ok(())
}

fn validate(config: &TrackerConfig, gpx: &Path) -> Result<()> {
    let samples = gpx_util::read_gpx_file(gpx).with_context(|| format!("read {}", gpx.display()))?;
    let path: Vec<Coordinate> = samples.iter().map(|sample| sample.coordinate).collect();

    let mut accumulator = DistanceAccumulator::new();
    for coordinate in &path {
        accumulator.update(*coordinate);
    }

    let validator = config.validator();
    let elapsed_seconds = recorded_span(&samples)
        .map(|(first, last)| (last - first).num_seconds().max(0) as u64)
        .unwrap_or(0);

    let report = StopReport {
        outcome: validator.evaluate(&path),
        elapsed_seconds,
        total_distance_meters: accumulator.total_meters(),
        threshold_meters: validator.threshold_meters(),
    };
    print_report(&report);

    if let Some(start) = path.first() {
        println!("Loop: {}", loop_id(*start));
    }

    Ok(())
}

fn print_report(report: &StopReport) {
    println!("{report}");
    println!(
        "Elapsed {}, distance {:.0}m",
        format_elapsed(report.elapsed_seconds),
        report.total_distance_meters
    );
}

/// First and last timestamp, when the track carries both.
fn recorded_span(samples: &[PositionSample]) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let first = samples.first()?.timestamp?;
    let last = samples.last()?.timestamp?;
    Some((first, last))
}
