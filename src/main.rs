use std::path::PathBuf;

use clap::Parser;

mod config;
mod db;
mod engine;
mod ident;
mod models;
mod store;

#[cfg(test)]
mod tests;

use config::AppConfig;
use db::CatalogDb;
use engine::RunOptions;
use ident::SqlIdent;
use models::{JobAction, NewJobDefinition};
use store::StoreRegistry;

/// CLI arguments for coldsweep.
#[derive(Parser, Debug)]
#[command(version, about = "Metadata-driven data lifecycle engine", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to the config file
    #[arg(short, long, global = true, default_value = "coldsweep.toml")]
    config: PathBuf,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Execute one retirement run (default)
    Run {
        /// Force dry-run for every job in this invocation
        #[arg(long)]
        dry_run: bool,
    },
    /// Create or update the engine's catalog and log tables
    Migrate,
    /// List the job catalog
    Jobs,
    /// Add a job definition to the catalog
    AddJob(AddJobArgs),
    /// Show the execution log for a run (defaults to the latest)
    History {
        #[arg(long)]
        run: Option<i64>,
    },
}

#[derive(clap::Args, Debug)]
struct AddJobArgs {
    #[arg(long, default_value = "main")]
    source_schema: String,
    #[arg(long)]
    source_table: String,
    #[arg(long)]
    date_column: String,
    /// Linked-store alias from [stores.<alias>] config; omit for same-store
    #[arg(long)]
    target_store: Option<String>,
    #[arg(long)]
    target_schema: Option<String>,
    #[arg(long)]
    target_table: Option<String>,
    #[arg(long)]
    retention_days: i64,
    #[arg(long, default_value_t = 1000)]
    batch_size: i64,
    /// ARCHIVE or DELETE
    #[arg(long)]
    action: String,
    #[arg(long)]
    dry_run: bool,
    /// Jobs run ascending by this key; ties break on id
    #[arg(long, default_value_t = 100)]
    processing_order: i64,
    /// Create the job disabled
    #[arg(long)]
    disabled: bool,
    #[arg(long)]
    notes: Option<String>,
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() {
    init_tracing();
    let args = Args::parse();

    let result = match args.command {
        Some(Command::Run { dry_run }) => run_once(&args.config, dry_run).await,
        None => run_once(&args.config, false).await,
        Some(Command::Migrate) => run_migrate(&args.config).await,
        Some(Command::Jobs) => run_jobs(&args.config).await,
        Some(Command::AddJob(job)) => run_add_job(&args.config, job).await,
        Some(Command::History { run }) => run_history(&args.config, run).await,
    };

    // Nonzero exit means the orchestrator itself failed; individual job
    // outcomes are visible only through the execution log.
    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

async fn open_db(config: &AppConfig) -> Result<CatalogDb, Box<dyn std::error::Error>> {
    let db = CatalogDb::from_config(&config.database).await?;
    // Unreachable catalog is fatal before anything touches the stores.
    db.health_check().await?;
    if config.database.run_migrations {
        db.run_migrations().await?;
    }
    Ok(db)
}

/// One orchestrator invocation, the scheduler-facing entry point.
async fn run_once(config_path: &PathBuf, force_dry_run: bool) -> CliResult {
    let config = AppConfig::load(config_path)?;
    let db = open_db(&config).await?;
    let stores = StoreRegistry::from_config(&config.database, &config.stores)?;
    let opts = RunOptions::from_config(&config.engine, force_dry_run);

    let summary = engine::run_all(&db, &stores, &opts, chrono::Utc::now()).await?;
    if summary.has_failures() {
        tracing::warn!(
            run_number = summary.run_number,
            failed = summary.jobs_failed,
            "Run finished with failed jobs; see the execution log"
        );
    }
    Ok(())
}

async fn run_migrate(config_path: &PathBuf) -> CliResult {
    let config = AppConfig::load(config_path)?;
    let db = CatalogDb::from_config(&config.database).await?;
    db.run_migrations().await?;
    Ok(())
}

async fn run_jobs(config_path: &PathBuf) -> CliResult {
    let config = AppConfig::load(config_path)?;
    let db = open_db(&config).await?;

    for job in db.jobs().list_all().await? {
        let target = match (&job.target_store, &job.target_table) {
            (Some(store), Some(table)) => format!("{store}:{table}"),
            (None, Some(table)) => table.clone(),
            _ => "-".to_string(),
        };
        println!(
            "{:>4}  {:<7} order={:<4} {}.{} -> {}  keep {}d, batch {}, {}{}",
            job.id,
            job.action,
            job.processing_order,
            job.source_schema,
            job.source_table,
            target,
            job.retention_days,
            job.batch_size,
            if job.enabled { "enabled" } else { "disabled" },
            if job.dry_run { ", dry-run" } else { "" },
        );
    }
    Ok(())
}

async fn run_add_job(config_path: &PathBuf, args: AddJobArgs) -> CliResult {
    let config = AppConfig::load(config_path)?;
    let db = open_db(&config).await?;

    // Reject malformed identifiers at catalog-write time; the executor
    // re-validates defensively at run time.
    SqlIdent::new(&args.source_schema)?;
    SqlIdent::new(&args.source_table)?;
    SqlIdent::new(&args.date_column)?;
    for ident in [&args.target_store, &args.target_schema, &args.target_table]
        .into_iter()
        .flatten()
    {
        SqlIdent::new(ident)?;
    }
    let action: JobAction = args.action.parse()?;

    let job = db
        .jobs()
        .create(NewJobDefinition {
            source_schema: args.source_schema,
            source_table: args.source_table,
            date_column: args.date_column,
            target_store: args.target_store,
            target_schema: args.target_schema,
            target_table: args.target_table,
            retention_days: args.retention_days,
            batch_size: args.batch_size,
            action,
            dry_run: args.dry_run,
            processing_order: args.processing_order,
            enabled: !args.disabled,
            notes: args.notes,
        })
        .await?;
    println!("Created job {}", job.id);
    Ok(())
}

async fn run_history(config_path: &PathBuf, run: Option<i64>) -> CliResult {
    let config = AppConfig::load(config_path)?;
    let db = open_db(&config).await?;
    let run_log = db.run_log();

    let run_number = match run {
        Some(n) => n,
        None => run_log.max_run_number().await?,
    };
    if run_number == 0 {
        println!("No runs recorded");
        return Ok(());
    }

    for entry in run_log.list_run(run_number).await? {
        println!(
            "run {:>4}  job {:>4}  {:<13} {:<24} rows={:<8} {}ms{}",
            entry.run_number,
            entry.job_id,
            entry.action,
            entry.source_table,
            entry.rows_affected,
            entry.duration_ms,
            entry
                .error
                .map(|e| format!("  error: {e}"))
                .unwrap_or_default(),
        );
    }
    Ok(())
}
