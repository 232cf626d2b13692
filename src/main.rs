use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};

use voter_contact_analytics::aggregator::{aggregate, Aggregator};
use voter_contact_analytics::chart::{chart_bundle, timeline};
use voter_contact_analytics::csv_parser;
use voter_contact_analytics::config::{self, DatabaseArgs, DiagnosticsArgs, LlmArgs};
use voter_contact_analytics::db::{self, PgContactStore};
use voter_contact_analytics::diagnostics::ErrorReporter;
use voter_contact_analytics::llm::QueryInterpreter;
use voter_contact_analytics::models::{Owner, QueryParams};
use voter_contact_analytics::palette::Theme;
use voter_contact_analytics::pipeline::{self, CsvUpload, ImportReport};
use voter_contact_analytics::report;
use voter_contact_analytics::seed;
use voter_contact_analytics::store::{ContactStore, MemoryStore};
use voter_contact_analytics::uploader::BatchUploader;

#[derive(Parser)]
#[command(name = "voter-contact")]
#[command(about = "Voter-contact campaign analytics: CSV ingestion, metrics and charts", long_about = None)]
struct Cli {
    #[command(flatten)]
    database: DatabaseArgs,

    #[command(flatten)]
    llm: LlmArgs,

    #[command(flatten)]
    diagnostics: DiagnosticsArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Default, Args)]
struct FilterArgs {
    #[arg(long)]
    tactic: Option<String>,
    /// Display name, e.g. "Ann Lee"
    #[arg(long)]
    person: Option<String>,
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    team: Option<String>,
    /// attempts, contacts, support, oppose, undecided, not_home, refusal, bad_data, not_reached
    #[arg(long)]
    result_type: Option<String>,
    /// Free-text search over names, team, tactic, date and label
    #[arg(long = "search")]
    search_query: Option<String>,
}

impl From<FilterArgs> for QueryParams {
    fn from(args: FilterArgs) -> Self {
        QueryParams {
            tactic: args.tactic,
            person: args.person,
            date: args.date,
            result_type: args.result_type,
            team: args.team,
            search_query: args.search_query,
        }
        .normalized()
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Import voter-contact rows from a CSV file, replacing the user's previous upload
    Import {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        email: String,
        /// Validate and aggregate in memory without touching the database
        #[arg(long)]
        dry_run: bool,
        /// Write rejected rows and their reasons to this CSV file
        #[arg(long)]
        rejected: Option<PathBuf>,
    },
    /// Upload a generated contact history for a user
    Seed {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
    /// Delete every record a user has uploaded
    Clear {
        #[arg(long)]
        user_id: String,
    },
    /// Total a metric over filtered records
    Query {
        #[arg(long)]
        user_id: Option<String>,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Print pie and timeline chart data as JSON
    Chart {
        #[arg(long)]
        user_id: Option<String>,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, value_enum, default_value_t = Theme::Light)]
        theme: Theme,
    },
    /// Answer a natural-language question through the LLM endpoint
    Ask {
        question: String,
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Generate a markdown campaign report
    Report {
        #[arg(long)]
        user_id: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn print_import(report: &ImportReport) {
    println!(
        "Imported {} of {} rows ({} rejected) as upload {}.",
        report.valid_rows,
        report.total_rows,
        report.invalid_rows.len(),
        report.upload.upload_id
    );
    if !report.unmapped_headers.is_empty() {
        println!("Ignored columns: {}", report.unmapped_headers.join(", "));
    }
    for invalid in report.invalid_rows.iter().take(10) {
        println!("- row {}: {}", invalid.row, invalid.reason);
    }
    if report.invalid_rows.len() > 10 {
        println!("- ... and {} more", report.invalid_rows.len() - 10);
    }
}

fn write_rejected(path: Option<&Path>, report: &ImportReport) -> anyhow::Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    csv_parser::write_rejected(&report.invalid_rows, file)?;
    println!("Rejected rows written to {}.", path.display());
    Ok(())
}

async fn import_into(
    store: &dyn ContactStore,
    reporter: &ErrorReporter,
    upload: &CsvUpload<'_>,
    owner: &Owner,
) -> anyhow::Result<ImportReport> {
    let report = pipeline::import(store, reporter, upload, owner, |percent| {
        println!("Uploading... {percent}%");
    })
    .await?;
    Ok(report)
}

async fn run(cli: Cli, reporter: &ErrorReporter) -> anyhow::Result<()> {
    match cli.command {
        Commands::InitDb => {
            let pool = cli.database.connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Import {
            csv,
            user_id,
            email,
            dry_run,
            rejected,
        } => {
            let bytes =
                std::fs::read(&csv).with_context(|| format!("failed to read {}", csv.display()))?;
            let file_name = csv
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_default();
            let upload = CsvUpload {
                file_name,
                mime: None,
                bytes: &bytes,
            };
            let owner = Owner::new(user_id, email);

            if dry_run {
                let store = MemoryStore::new();
                let report = import_into(&store, reporter, &upload, &owner).await?;
                print_import(&report);
                write_rejected(rejected.as_deref(), &report)?;

                let aggregator = Aggregator::new(&store, reporter);
                let metrics = aggregator.fetch_metrics(Some(&owner.user_id), None).await?;
                println!("{}", serde_json::to_string_pretty(&metrics)?);
            } else {
                let store = PgContactStore::new(cli.database.connect().await?);
                let report = import_into(&store, reporter, &upload, &owner).await?;
                print_import(&report);
                write_rejected(rejected.as_deref(), &report)?;
            }
        }
        Commands::Seed {
            user_id,
            email,
            days,
        } => {
            let store = PgContactStore::new(cli.database.connect().await?);
            let owner = Owner::new(user_id, email);
            let records = seed::synthetic_records(days.max(1), Utc::now().date_naive());
            let summary = BatchUploader::new(&store)
                .upload(records, &owner, |percent| println!("Uploading... {percent}%"))
                .await?;
            println!(
                "Seeded {} records for {} in {} batches.",
                summary.records, owner.user_id, summary.batches
            );
        }
        Commands::Clear { user_id } => {
            let store = PgContactStore::new(cli.database.connect().await?);
            let removed = store.clear_user(&user_id).await?;
            println!("Removed {removed} records for {user_id}.");
        }
        Commands::Query { user_id, filter } => {
            let store = PgContactStore::new(cli.database.connect().await?);
            let aggregator = Aggregator::new(&store, reporter);
            let outcome = aggregator
                .query(user_id.as_deref(), &QueryParams::from(filter))
                .await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Chart {
            user_id,
            filter,
            theme,
        } => {
            let store = PgContactStore::new(cli.database.connect().await?);
            let aggregator = Aggregator::new(&store, reporter);
            let params = QueryParams::from(filter);
            let params = (!params.is_empty()).then_some(params);

            let metrics = aggregator
                .fetch_metrics(user_id.as_deref(), params.as_ref())
                .await?;
            if !metrics.has_data() {
                tracing::info!("no data for the selected filters");
            }
            let bundle = chart_bundle(&metrics, theme, Utc::now().date_naive());
            println!("{}", serde_json::to_string_pretty(&bundle)?);
        }
        Commands::Ask { question, user_id } => {
            let interpreter = cli.llm.interpreter()?;
            let params = match interpreter.interpret(&question).await {
                Ok(params) => params,
                Err(err) => {
                    reporter.report("ask", &err);
                    return Err(err).context("could not interpret the question");
                }
            };
            println!("Filters: {}", serde_json::to_string(&params)?);

            let store = PgContactStore::new(cli.database.connect().await?);
            let aggregator = Aggregator::new(&store, reporter);
            let outcome = aggregator.query(user_id.as_deref(), &params).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Report { user_id, out } => {
            let store = PgContactStore::new(cli.database.connect().await?);
            let aggregator = Aggregator::new(&store, reporter);
            let records = aggregator.fetch_records(user_id.as_deref(), None).await?;

            let today = Utc::now().date_naive();
            let metrics = aggregate(&records);
            let report = report::build_report(
                user_id.as_deref(),
                today,
                &metrics,
                &report::summarize_by_team(&records),
                &timeline(&metrics, today),
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init_tracing();
    let cli = Cli::parse();
    let reporter = ErrorReporter::new(cli.diagnostics.dedup_window());

    let result = run(cli, &reporter).await;
    if let Err(err) = &result {
        reporter.report("command", err);
    }
    result
}
