//! CLI entry point for covid_trends.
//!
//! Provides subcommands for downloading the CSSE time series, reshaping and
//! merging them into one table, and querying the merged table.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use covid_trends::analyzers::types::Measure;
use covid_trends::analyzers::{Analyzer, derive_growth};
use covid_trends::error::PipelineError;
use covid_trends::fetch::{BasicClient, DEFAULT_BASE_URL, download_all};
use covid_trends::merge::{MergedRecord, merge_processed, read_merged, write_merged};
use covid_trends::output::{append_records, print_json, print_pretty};
use covid_trends::parser::load_data;
use covid_trends::reshape::preprocess;
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const DEFAULT_RAW_DIR: &str = "data/raw";
const DEFAULT_PROCESSED_DIR: &str = "data/processed";
const DEFAULT_MERGED: &str = "data/processed/merged_covid_data.csv";

#[derive(Parser)]
#[command(name = "covid_trends")]
#[command(about = "Reshape and analyze the CSSE COVID-19 time series", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the confirmed, deaths and recovered series
    Fetch {
        /// Directory to save the raw CSV files
        #[arg(short = 'd', long, default_value = DEFAULT_RAW_DIR)]
        raw_dir: PathBuf,

        /// Base URL of the time-series directory
        #[arg(long, default_value = DEFAULT_BASE_URL)]
        base_url: String,
    },
    /// Reshape and merge the raw series into the merged table
    Process {
        #[arg(short = 'd', long, default_value = DEFAULT_RAW_DIR)]
        raw_dir: PathBuf,

        /// Directory for the per-metric processed CSVs
        #[arg(long, default_value = DEFAULT_PROCESSED_DIR)]
        processed_dir: PathBuf,

        /// Path of the merged table
        #[arg(short, long, default_value = DEFAULT_MERGED)]
        merged: PathBuf,

        /// Skip writing the per-metric processed CSVs
        #[arg(long, default_value_t = false)]
        no_save_processed: bool,

        /// Gzip compress the merged table
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
    /// Fetch, process, and print the global summary
    Run {
        #[arg(short = 'd', long, default_value = DEFAULT_RAW_DIR)]
        raw_dir: PathBuf,

        #[arg(long, default_value = DEFAULT_PROCESSED_DIR)]
        processed_dir: PathBuf,

        #[arg(short, long, default_value = DEFAULT_MERGED)]
        merged: PathBuf,

        #[arg(long, default_value = DEFAULT_BASE_URL)]
        base_url: String,

        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
    /// Countries with the most confirmed cases
    Top {
        #[arg(short, long, default_value = DEFAULT_MERGED)]
        merged: PathBuf,

        /// Number of countries to list
        #[arg(short, default_value_t = 10)]
        n: usize,

        /// Snapshot date (YYYY-MM-DD); defaults to the latest date in the data
        #[arg(long)]
        date: Option<NaiveDate>,

        /// CSV file to append results to
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Countries with the highest death rate above a case threshold
    DeathRate {
        #[arg(short, long, default_value = DEFAULT_MERGED)]
        merged: PathBuf,

        #[arg(short, default_value_t = 10)]
        n: usize,

        /// Minimum confirmed cases for a country to be ranked
        #[arg(long, default_value_t = 1000)]
        min_cases: i64,

        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Time series for one country
    Country {
        /// Country name as spelled in the source data
        name: String,

        #[arg(short, long, default_value = DEFAULT_MERGED)]
        merged: PathBuf,

        /// Add daily deltas, growth rates and 7-day moving averages
        #[arg(long, default_value_t = false)]
        growth: bool,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Worldwide totals on one date
    Summary {
        #[arg(short, long, default_value = DEFAULT_MERGED)]
        merged: PathBuf,

        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Every country's record on one date, with coordinates for map plots
    Snapshot {
        #[arg(short, long, default_value = DEFAULT_MERGED)]
        merged: PathBuf,

        #[arg(long)]
        date: Option<NaiveDate>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Confirmed counts per country and date, for heatmaps
    Heatmap {
        #[arg(short, long, default_value = DEFAULT_MERGED)]
        merged: PathBuf,

        /// Comma-separated country names
        #[arg(short, long, value_delimiter = ',', required = true)]
        countries: Vec<String>,

        /// First date; defaults to 30 days before the latest date in the data
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last date; defaults to the latest date in the data
        #[arg(long)]
        end: Option<NaiveDate>,
    },
    /// One measure over time for several countries
    Compare {
        #[arg(short, long, default_value = DEFAULT_MERGED)]
        merged: PathBuf,

        #[arg(short, long, value_delimiter = ',', required = true)]
        countries: Vec<String>,

        /// confirmed, deaths, recovered, active, death_rate or recovery_rate
        #[arg(short = 'x', long, default_value = "confirmed")]
        measure: Measure,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/covid_trends.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("covid_trends.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch { raw_dir, base_url } => {
            fetch(&raw_dir, &base_url).await?;
        }
        Commands::Process {
            raw_dir,
            processed_dir,
            merged,
            no_save_processed,
            gzip,
        } => {
            process(&raw_dir, &processed_dir, &merged, !no_save_processed, gzip)?;
        }
        Commands::Run {
            raw_dir,
            processed_dir,
            merged,
            base_url,
            gzip,
        } => {
            fetch(&raw_dir, &base_url).await?;
            let records = process(&raw_dir, &processed_dir, &merged, true, gzip)?;
            print_json(&Analyzer::new(records).global_summary(None))?;
        }
        Commands::Top {
            merged,
            n,
            date,
            output,
        } => {
            let analyzer = load_analyzer(&merged)?;
            emit(&analyzer.top_by_confirmed(n, date), output.as_deref())?;
        }
        Commands::DeathRate {
            merged,
            n,
            min_cases,
            date,
            output,
        } => {
            let analyzer = load_analyzer(&merged)?;
            emit(
                &analyzer.top_by_death_rate(n, min_cases, date),
                output.as_deref(),
            )?;
        }
        Commands::Country {
            name,
            merged,
            growth,
            output,
        } => {
            let analyzer = load_analyzer(&merged)?;
            let series = analyzer.country_time_series(&name);
            if series.is_empty() {
                warn!(country = %name, "Country not found in merged table");
            }

            if growth {
                emit(&derive_growth(&series), output.as_deref())?;
            } else {
                emit(&series.records, output.as_deref())?;
            }
        }
        Commands::Summary {
            merged,
            date,
            output,
        } => {
            let analyzer = load_analyzer(&merged)?;
            let summary = analyzer.global_summary(date);
            print_pretty(&summary);
            emit(&[summary], output.as_deref())?;
        }
        Commands::Snapshot {
            merged,
            date,
            output,
        } => {
            let analyzer = load_analyzer(&merged)?;
            emit(&analyzer.snapshot(date), output.as_deref())?;
        }
        Commands::Heatmap {
            merged,
            countries,
            start,
            end,
        } => {
            let analyzer = load_analyzer(&merged)?;
            print_json(&analyzer.heatmap(&countries, start, end))?;
        }
        Commands::Compare {
            merged,
            countries,
            measure,
        } => {
            let analyzer = load_analyzer(&merged)?;
            print_json(&analyzer.compare(&countries, measure))?;
        }
    }

    Ok(())
}

/// Downloads every series; individual failures are logged, not fatal.
#[tracing::instrument]
async fn fetch(raw_dir: &Path, base_url: &str) -> Result<()> {
    let client = BasicClient::new()?;

    let results = download_all(&client, base_url, raw_dir).await;
    let failed = results.iter().filter(|(_, r)| r.is_err()).count();

    info!(
        downloaded = results.len() - failed,
        failed, "Fetch finished"
    );
    Ok(())
}

/// Loads, reshapes and merges the raw series, then writes the merged table.
///
/// A missing metric file is skipped. Any other load failure (for example an
/// unparseable date header) aborts the run.
#[tracing::instrument]
fn process(
    raw_dir: &Path,
    processed_dir: &Path,
    merged: &Path,
    save_processed: bool,
    gzip: bool,
) -> Result<Vec<MergedRecord>> {
    let mut tables = BTreeMap::new();

    for (metric, result) in load_data(raw_dir) {
        match result {
            Ok(table) => {
                tables.insert(metric, table);
            }
            Err(e @ PipelineError::MissingInput { .. }) => {
                warn!(%metric, error = %e, "Skipping metric");
            }
            Err(e) => {
                error!(%metric, error = %e, "Raw series rejected");
                return Err(e).with_context(|| format!("loading the {metric} series"));
            }
        }
    }

    if tables.is_empty() {
        bail!("no raw series found in {}", raw_dir.display());
    }

    let processed = preprocess(&tables, save_processed, processed_dir)?;
    let records = merge_processed(&processed)?;

    let merged = if gzip { gz_path(merged) } else { merged.to_path_buf() };
    write_merged(&merged, &records, gzip)?;

    info!(
        records = records.len(),
        path = %merged.display(),
        "Merged table ready"
    );
    Ok(records)
}

fn gz_path(path: &Path) -> PathBuf {
    if path.extension() == Some(OsStr::new("gz")) {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_owned();
        name.push(".gz");
        PathBuf::from(name)
    }
}

fn load_analyzer(merged: &Path) -> Result<Analyzer> {
    let records = read_merged(merged)
        .with_context(|| format!("reading merged table {}", merged.display()))?;
    info!(records = records.len(), path = %merged.display(), "Merged table loaded");
    Ok(Analyzer::new(records))
}

/// Prints query rows as JSON and optionally appends them to a CSV file.
fn emit<T: Serialize>(rows: &[T], output: Option<&Path>) -> Result<()> {
    print_json(&rows)?;
    if let Some(path) = output {
        append_records(path, rows)?;
        info!(path = %path.display(), rows = rows.len(), "Results appended");
    }
    Ok(())
}
