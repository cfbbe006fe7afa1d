//! Meal benefit engine binary.
//!
//! `serve` exposes the pipeline over HTTP; `run` processes one JSON file of
//! source tables and writes the validated output file. Both use the HTTP
//! oracle endpoints named in `run.yaml`.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use meal_benefit_engine::api::{AppState, create_router};
use meal_benefit_engine::config::{ConfigLoader, OracleSettings};
use meal_benefit_engine::error::EngineError;
use meal_benefit_engine::logging::init_tracing;
use meal_benefit_engine::models::SourceTables;
use meal_benefit_engine::oracle::http::{HttpCalendarResolver, HttpClassificationOracle};
use meal_benefit_engine::oracle::{CalendarResolver, ClassificationOracle};
use meal_benefit_engine::pipeline::{
    FileSnapshotStore, MemorySnapshotStore, RunContext, SnapshotStore, cancel_pair, run_pipeline,
};

#[derive(Parser)]
#[command(name = "meal-benefit-engine")]
#[command(about = "Meal benefit eligibility, proration and audit pipeline", long_about = None)]
struct Cli {
    /// Run configuration directory
    #[arg(short, long, global = true, default_value = "./config/vr_2025_05")]
    config: PathBuf,

    /// Log level for this crate when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Persist stage snapshots under this directory instead of in memory
    #[arg(long, global = true)]
    snapshot_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:8080")]
        bind: String,
    },

    /// Run the pipeline once over a JSON file of source tables
    Run {
        /// Source tables (JSON)
        #[arg(short, long)]
        tables: PathBuf,

        /// Where to write the output file
        #[arg(short, long)]
        output: PathBuf,
    },
}

type Oracles = (Arc<dyn ClassificationOracle>, Arc<dyn CalendarResolver>);

fn http_oracles(settings: &OracleSettings) -> Result<Oracles, Box<dyn Error>> {
    let timeout = Duration::from_millis(settings.timeout_ms);
    let missing = |field: &str| EngineError::InvalidConfig {
        field: format!("oracle.{}", field),
        message: "endpoint is required by the binary".to_string(),
    };
    let classification_url = settings
        .classification_url
        .clone()
        .ok_or_else(|| missing("classification_url"))?;
    let calendar_url = settings
        .calendar_url
        .clone()
        .ok_or_else(|| missing("calendar_url"))?;

    let oracle: Arc<dyn ClassificationOracle> =
        Arc::new(HttpClassificationOracle::new(classification_url, timeout)?);
    let resolver: Arc<dyn CalendarResolver> =
        Arc::new(HttpCalendarResolver::new(calendar_url, timeout)?);
    Ok((oracle, resolver))
}

fn snapshot_store(dir: Option<PathBuf>) -> Arc<dyn SnapshotStore> {
    match dir {
        Some(dir) => Arc::new(FileSnapshotStore::new(dir)),
        None => Arc::new(MemorySnapshotStore::new()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let loader = ConfigLoader::load(&cli.config)?;
    info!(
        config = %cli.config.display(),
        run = %loader.config().settings().name,
        "Configuration loaded"
    );
    let (oracle, resolver) = http_oracles(&loader.config().settings().oracle)?;
    let store = snapshot_store(cli.snapshot_dir);

    match cli.command {
        Commands::Serve { bind } => {
            let router = create_router(AppState::new(loader, oracle, resolver, store));
            let listener = tokio::net::TcpListener::bind(&bind).await?;
            info!(bind = %bind, "Listening");
            axum::serve(listener, router).await?;
        }
        Commands::Run { tables, output } => {
            let raw = std::fs::read_to_string(&tables)?;
            let tables: SourceTables = serde_json::from_str(&raw)?;

            let (handle, signal) = cancel_pair();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, cancelling run");
                    handle.cancel();
                }
            });

            let ctx = RunContext::new(Arc::new(loader.into_config()), oracle, resolver, signal);
            let outcome = run_pipeline(&ctx, &tables, store.as_ref()).await?;
            outcome.output.write_to(&output)?;
            info!(
                run_id = %outcome.run_id,
                output = %output.display(),
                findings = outcome.audit.findings.len(),
                signed_off = outcome.audit.signed_off,
                "Output written"
            );
        }
    }

    Ok(())
}
