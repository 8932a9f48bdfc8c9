//! CLI entry point for the arrival estimator.
//!
//! Provides subcommands for inferring actual arrival times from a forecast
//! log, preparing schedule deviation tables, and inspecting single
//! stop/route selections.

use anyhow::{Context, Result};
use arrival_estimator::config::InferenceConfig;
use arrival_estimator::deviation::{busiest_stop, case_deviations, deviation_rows, for_stop};
use arrival_estimator::explore::{Selection, collapse_per_vehicle, desired_item};
use arrival_estimator::inference::driver::run_batch;
use arrival_estimator::output::{print_pretty, write_table};
use arrival_estimator::parser::{load_arrivals, load_observations};
use arrival_estimator::stops::StopDirectory;
use chrono::FixedOffset;
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "arrival_estimator")]
#[command(about = "Infer actual transit arrival times from forecast logs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assign an actual arrival time to every resolvable waiting case
    Assign {
        /// Forecast log CSV (.gz accepted)
        #[arg(short, long, default_value = "pred_data.csv")]
        input: String,

        /// CSV file to write resolved arrivals to
        #[arg(short, long, default_value = "actual_vs_forecasted.csv")]
        output: String,

        /// Optional stop repository CSV used to attach coordinates
        #[arg(short, long)]
        stops: Option<String>,

        /// Optional JSON file with inference parameters
        #[arg(short, long)]
        config: Option<String>,

        /// Max gap in seconds between scheduled forecasts of one case
        #[arg(long)]
        case_window: Option<u64>,

        /// Max forecast distance in seconds for attaching telemetry to a case
        #[arg(long)]
        telemetry_window: Option<u64>,

        /// Telemetry horizon in seconds below which a forecast is trusted
        #[arg(long)]
        min_horizon: Option<i64>,

        /// Worker threads (defaults to one per core)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Gzip compress the output
        #[arg(long, default_value_t = false)]
        gzip: bool,

        /// Input has no header row (fields: id, vehicle, route direction,
        /// stop, request time, forecast time, source; id optional)
        #[arg(long, default_value_t = false)]
        no_headers: bool,
    },
    /// Build a schedule deviation table for one stop
    Deviation {
        /// Resolved arrivals CSV produced by `assign`
        #[arg(short, long, default_value = "actual_vs_forecasted.csv")]
        input: String,

        /// CSV file to write the deviation table to
        #[arg(short, long, default_value = "deviation.csv")]
        output: String,

        /// Route direction to show (defaults to the busiest stop)
        #[arg(long, requires = "stop")]
        route: Option<String>,

        /// Stop to show (defaults to the busiest stop)
        #[arg(long, requires = "route")]
        stop: Option<String>,

        /// One row per case with the mean deviation
        #[arg(long, default_value_t = false)]
        aggregate: bool,

        /// Local time offset from UTC, in hours
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        utc_offset: i32,
    },
    /// Per-case deviations of every stop, labelled by transport kind
    ByTransport {
        /// Resolved arrivals CSV produced by `assign`
        #[arg(short, long, default_value = "actual_vs_forecasted.csv")]
        input: String,

        /// CSV file to write the table to
        #[arg(short, long, default_value = "deviation_by_transport.csv")]
        output: String,

        /// Stop repository CSV with route descriptions
        #[arg(short, long)]
        stops: String,

        /// Local time offset from UTC, in hours
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        utc_offset: i32,
    },
    /// Log the raw rows of one stop and route direction
    Explore {
        /// Forecast log CSV (.gz accepted)
        #[arg(short, long, default_value = "pred_data.csv")]
        input: String,

        #[arg(long)]
        stop: String,

        #[arg(long)]
        route: String,

        #[arg(long)]
        vehicle: Option<i64>,

        /// Also log the scheduled rows collapsed to one row per case
        #[arg(long, default_value_t = false)]
        collapse: bool,

        /// Input has no header row
        #[arg(long, default_value_t = false)]
        no_headers: bool,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/arrival_estimator.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("arrival_estimator.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Assign {
            input,
            output,
            stops,
            config,
            case_window,
            telemetry_window,
            min_horizon,
            workers,
            gzip,
            no_headers,
        } => {
            let mut config = match config {
                Some(path) => InferenceConfig::load(&path)
                    .with_context(|| format!("failed to load config {path}"))?,
                None => InferenceConfig::default(),
            };
            if let Some(secs) = case_window {
                config.case_continuity_window_secs = secs;
            }
            if let Some(secs) = telemetry_window {
                config.telemetry_assignment_window_secs = secs;
            }
            if let Some(secs) = min_horizon {
                config.min_forecast_horizon_secs = secs;
            }
            if workers.is_some() {
                config.workers = workers;
            }

            assign(&input, !no_headers, &output, stops.as_deref(), &config, gzip)?;
        }
        Commands::Deviation {
            input,
            output,
            route,
            stop,
            aggregate,
            utc_offset,
        } => {
            let offset = utc_offset_from_hours(utc_offset)?;
            let records = load_arrivals(&input)?;

            let (route, stop) = match (route, stop) {
                (Some(route), Some(stop)) => (route, stop),
                _ => busiest_stop(&records).context("no scheduled arrivals to show")?,
            };
            info!(route = %route, stop = %stop, "Building deviation table");

            let rows = for_stop(&deviation_rows(&records, offset), &route, &stop);
            if aggregate {
                write_table(&output, &case_deviations(&rows, None), false)?;
            } else {
                write_table(&output, &rows, false)?;
            }
        }
        Commands::ByTransport {
            input,
            output,
            stops,
            utc_offset,
        } => {
            let offset = utc_offset_from_hours(utc_offset)?;
            let records = load_arrivals(&input)?;
            let directory = StopDirectory::load(&stops)?;

            let cases = case_deviations(&deviation_rows(&records, offset), Some(&directory));
            let unlabelled = cases.iter().filter(|c| c.transport.is_none()).count();
            if unlabelled > 0 {
                warn!(unlabelled, "Cases on routes missing from the stop directory");
            }
            write_table(&output, &cases, false)?;
        }
        Commands::Explore {
            input,
            stop,
            route,
            vehicle,
            collapse,
            no_headers,
        } => {
            let rows = load_observations(&input, !no_headers)?;
            let selection = Selection {
                stop_id: stop,
                route_direction_id: route,
                vehicle_id: vehicle,
            };
            let selected = desired_item(&rows, &selection);
            info!(rows = selected.len(), "Selection loaded");
            print_pretty(&selected);

            if collapse {
                let config = InferenceConfig::default();
                let collapsed = collapse_per_vehicle(&selected, &config);
                info!(cases = collapsed.len(), "Scheduled rows collapsed per case");
                print_pretty(&collapsed);
            }
        }
    }

    Ok(())
}

/// Runs the full inference over the log at `input` and writes the resolved
/// arrivals. Nothing is written when no arrival could be resolved.
#[tracing::instrument(skip(config))]
fn assign(
    input: &str,
    has_headers: bool,
    output: &str,
    stops: Option<&str>,
    config: &InferenceConfig,
    gzip: bool,
) -> Result<()> {
    let directory = stops.map(StopDirectory::load).transpose()?;
    let rows = load_observations(input, has_headers)?;
    info!(rows = rows.len(), ?config, "Starting arrival inference");

    let report = run_batch(rows, config, directory.as_ref())?;

    write_table(output, &report.records, gzip)?;

    info!(
        records = report.records.len(),
        resolved_triples = report.resolved_triples,
        failed_triples = report.failures.len(),
        triples = report.triples,
        "Arrival inference complete"
    );
    Ok(())
}

fn utc_offset_from_hours(hours: i32) -> Result<FixedOffset> {
    hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .with_context(|| format!("invalid UTC offset {hours}h"))
}
