//! repscore - reputation scoring and industry benchmarks
//!
//! Imports raw business, review and response events, recomputes the derived
//! tables, and answers analytics queries over them.

mod output;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use repscore_core::analytics::RecomputeEngine;
use repscore_core::{Config, Database, QueryService, RawEvents};
use serde::Serialize;

/// Exit code for "requested business or benchmark does not exist"
const EXIT_NOT_FOUND: i32 = 2;

#[derive(Parser)]
#[command(name = "repscore")]
#[command(about = "Reputation scoring and industry benchmarks for businesses")]
#[command(version)]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/repscore/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file (default: $XDG_DATA_HOME/repscore/reputation.db)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Import raw events from a JSON file, then recompute
    Import {
        #[arg(short = 'i', long)]
        file: PathBuf,
    },
    /// Recompute every derived table
    Recompute,
    /// Show recent recompute runs
    Runs {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    #[command(flatten)]
    Query(QueryCommand),
}

#[derive(Subcommand)]
enum QueryCommand {
    /// List businesses
    Businesses {
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
    /// Business overview with trust score and industry benchmark
    Overview { business_id: i64 },
    /// Daily review stats with running average rating
    Trend { business_id: i64 },
    /// Average rating per calendar month
    RatingTrend { business_id: i64 },
    /// Industry benchmark for the business's industry
    Benchmark { business_id: i64 },
    /// Sentiment distribution over a trailing window
    Sentiment {
        business_id: i64,
        /// Window length in days (default from config)
        #[arg(short, long)]
        days: Option<u32>,
    },
    /// Change between the current and previous trailing windows
    Deltas { business_id: i64 },
    /// Per-location aggregates
    Geo,
    /// Compare sentiment of high- and low-volume locations
    GeoInsight,
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        let not_found = err
            .downcast_ref::<repscore_core::Error>()
            .is_some_and(repscore_core::Error::is_not_found);

        eprintln!("Error: {:#}", err);
        std::process::exit(if not_found { EXIT_NOT_FOUND } else { 1 });
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Config::load().context("failed to load configuration")?,
    };

    let _log_guard =
        repscore_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let db_path = cli.database.clone().unwrap_or_else(Config::database_path);
    tracing::info!(path = %db_path.display(), "Opening database");

    let format = cli.format;
    match cli.command {
        Command::Import { file } => {
            let db = open_writable(&db_path)?;
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let events: RawEvents = serde_json::from_str(&content)
                .with_context(|| format!("failed to parse events in {}", file.display()))?;

            let inserted = db
                .import_events(&events)
                .context("failed to import events")?;
            if format == Format::Text {
                println!("Imported {} rows from {}", inserted, file.display());
            }

            let report = RecomputeEngine::new(config)
                .recompute(&db)
                .context("recompute after import failed")?;
            emit(format, &report, output::print_report)
        }
        Command::Recompute => {
            let db = open_writable(&db_path)?;
            let report = RecomputeEngine::new(config)
                .recompute(&db)
                .context("recompute failed")?;
            emit(format, &report, output::print_report)
        }
        Command::Runs { limit } => {
            let db = open_for_queries(&db_path)?;
            let runs = db.list_recompute_runs(limit)?;
            emit(format, &runs, |r| output::print_runs(r))
        }
        Command::Query(command) => {
            let db = open_for_queries(&db_path)?;
            let service = QueryService::new(&db, &config);
            query(command, &service, &config, format)
        }
    }
}

fn query(
    command: QueryCommand,
    service: &QueryService<'_>,
    config: &Config,
    format: Format,
) -> Result<()> {
    match command {
        QueryCommand::Businesses { limit } => {
            let businesses = service.list_businesses(limit)?;
            emit(format, &businesses, |b| output::print_businesses(b))
        }
        QueryCommand::Overview { business_id } => {
            emit(format, &service.overview(business_id)?, output::print_overview)
        }
        QueryCommand::Trend { business_id } => {
            let stats = service.trend(business_id)?;
            emit(format, &stats, |s| output::print_trend(s))
        }
        QueryCommand::RatingTrend { business_id } => {
            let months = service.rating_trend_monthly(business_id)?;
            emit(format, &months, |m| output::print_monthly(m))
        }
        QueryCommand::Benchmark { business_id } => {
            emit(format, &service.benchmark(business_id)?, output::print_benchmark)
        }
        QueryCommand::Sentiment { business_id, days } => {
            let window_days = days.unwrap_or(config.sentiment.window_days);
            let dist = service.sentiment_distribution(business_id, window_days)?;
            emit(format, &dist, |d| output::print_sentiment(d, window_days))
        }
        QueryCommand::Deltas { business_id } => {
            emit(format, &service.performance_deltas(business_id)?, output::print_deltas)
        }
        QueryCommand::Geo => {
            let locations = service.geo_overview()?;
            emit(format, &locations, |l| output::print_locations(l))
        }
        QueryCommand::GeoInsight => {
            emit(format, &service.geo_insight()?, output::print_geo_insight)
        }
    }
}

/// Print `value` as pretty JSON or through its text renderer.
fn emit<T: Serialize + ?Sized>(format: Format, value: &T, text: impl FnOnce(&T)) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(value)?),
        Format::Text => text(value),
    }
    Ok(())
}

fn open_writable(path: &Path) -> Result<Database> {
    let db = Database::open(path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;
    Ok(db)
}

/// Queries use a read-only handle once the database exists.
fn open_for_queries(path: &Path) -> Result<Database> {
    if path.exists() {
        Database::open_read_only(path).context("failed to open database")
    } else {
        open_writable(path)
    }
}
