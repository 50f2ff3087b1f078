use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand};

mod coerce;
mod config;
mod db;
mod error;
mod filters;
mod import;
mod logging;
mod models;
mod monthly;
mod parse;
mod period;
mod report;
mod stats;
mod store;
mod summary;
mod zone;

use config::{AnalyticsConfig, Settings};
use db::PgStore;
use filters::ReportArgs;
use import::{EntityKind, IngestionOrchestrator};
use zone::ZoneClassifier;

#[derive(Parser)]
#[command(name = "faculty-risk")]
#[command(about = "Faculty failure-rate zoning from roster and grade data", long_about = None)]
struct Cli {
    /// JSON file overriding zone thresholds and header synonyms
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import students, teachers or subjects from a CSV export
    Import {
        #[arg(long, value_enum)]
        kind: EntityKind,
        #[arg(long)]
        file: PathBuf,
    },
    /// Live enrolled/failed snapshot for one teacher, as JSON
    TeacherStats {
        #[arg(long)]
        faculty_no: String,
        #[command(flatten)]
        filters: ReportArgs,
    },
    /// Zone counts per period plus per-teacher snapshots, as JSON
    TeacherSummary {
        #[command(flatten)]
        filters: ReportArgs,
    },
    /// Zone counts per month with representative departments, as JSON
    MonthlySummary {
        #[command(flatten)]
        filters: ReportArgs,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        filters: ReportArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let cli = Cli::parse();
    let config = AnalyticsConfig::load(cli.config.as_deref())?;
    let classifier = ZoneClassifier::new(config.thresholds);
    let settings = Settings::from_env()?;

    let pool = db::connect(&settings).await?;
    let store = PgStore::new(pool);

    match cli.command {
        Commands::InitDb => {
            db::init_db(store.pool()).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(store.pool()).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { kind, file } => {
            let response = IngestionOrchestrator::new(&store, &config)
                .import_file(kind, &file)
                .await;
            print_json(&response)?;
        }
        Commands::TeacherStats {
            faculty_no,
            filters,
        } => {
            let resolved = filters.resolve(&store).await?;
            let response =
                summary::teacher_stats(&store, &classifier, &faculty_no, resolved).await?;
            print_json(&response)?;
        }
        Commands::TeacherSummary { filters } => {
            let resolved = filters.resolve(&store).await?;
            let response =
                summary::teacher_summary(&store, &classifier, resolved, filters.debug).await?;
            print_json(&response)?;
        }
        Commands::MonthlySummary { filters } => {
            let resolved = filters.resolve(&store).await?;
            let today = Utc::now().date_naive();
            let response =
                summary::monthly_summary(&store, &classifier, resolved, today, filters.debug)
                    .await?;
            print_json(&response)?;
        }
        Commands::Report { filters, out } => {
            let resolved = filters.resolve(&store).await?;
            let today = Utc::now().date_naive();
            let teachers =
                summary::teacher_summary(&store, &classifier, resolved.clone(), false).await?;
            let monthly =
                summary::monthly_summary(&store, &classifier, resolved, today, false).await?;
            std::fs::write(&out, report::build_report(&teachers, &monthly))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
