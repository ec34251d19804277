//! CLI command definitions for blendforge.
//!
//! Store-backed commands (`migrate`, `enqueue`, `status`, `worker`) need
//! `DATABASE_URL`. `synthesize` runs one request inline against a catalog
//! file and never touches the database.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::{CatalogSource, StaticCatalog};
use crate::generator::{LlmRecipeGenerator, RecipeGenerator};
use crate::llm::LiteLlmClient;
use crate::metrics;
use crate::pipeline::{AppConfig, BlendRequest, SynthesisOrchestrator};
use crate::recipe::Objective;
use crate::scheduler::{enqueue_blend, poll_job, JobStore, Worker};
use crate::storage::Database;

/// Coffee blend recipe synthesizer.
#[derive(Parser)]
#[command(name = "blendforge")]
#[command(about = "Synthesize constraint-satisfying coffee blend recipes")]
#[command(version)]
#[command(
    long_about = "blendforge turns blend requests into valid, priced recipes.\n\nAn LLM proposes candidates; a validator, scorer and repair engine guarantee the result.\nRequests are queued in Postgres and executed by polling workers.\n\nExample usage:\n  blendforge migrate\n  blendforge enqueue --total 250 --objective bright --pref acidity=high\n  blendforge worker"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Create or update the database schema.
    Migrate,

    /// Queue a blend request and print the job receipt.
    Enqueue(EnqueueArgs),

    /// Print the current state of a job.
    Status(StatusArgs),

    /// Run a polling worker until interrupted.
    Worker(WorkerArgs),

    /// Run one request inline against a catalog file and print the result.
    #[command(alias = "synth")]
    Synthesize(SynthesizeArgs),
}

/// Request fields shared by `enqueue` and `synthesize`.
#[derive(clap::Args, Debug)]
pub struct BlendArgs {
    /// Exact total quantity in grams.
    #[arg(short = 't', long)]
    pub total: u32,

    /// Optimization objective (balanced, best_taste, lowest_cost, bright, bold).
    #[arg(short = 'o', long, default_value = "balanced")]
    pub objective: Objective,

    /// Sensory preference as dimension=level, e.g. acidity=high or body=7.
    #[arg(short = 'p', long = "pref", value_parser = parse_preference)]
    pub preferences: Vec<(String, serde_json::Value)>,
}

impl BlendArgs {
    fn to_request(&self) -> BlendRequest {
        self.preferences.iter().fold(
            BlendRequest::new(self.total).with_objective(self.objective),
            |request, (key, value)| request.with_preference(key.clone(), value.clone()),
        )
    }
}

/// Arguments for `blendforge enqueue`.
#[derive(Parser, Debug)]
pub struct EnqueueArgs {
    #[command(flatten)]
    pub blend: BlendArgs,
}

/// Arguments for `blendforge status`.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Job id returned by `enqueue`.
    pub job_id: Uuid,
}

/// Arguments for `blendforge worker`.
#[derive(Parser, Debug)]
pub struct WorkerArgs {
    /// Run a single tick, print its outcome and exit.
    #[arg(long)]
    pub once: bool,

    /// Lease owner id (overrides BLENDFORGE_WORKER_ID).
    #[arg(long)]
    pub worker_id: Option<String>,

    /// Job attempts before a failing job is marked failed.
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Print Prometheus metrics to stdout on exit.
    #[arg(long)]
    pub print_metrics: bool,
}

/// Arguments for `blendforge synthesize`.
#[derive(Parser, Debug)]
pub struct SynthesizeArgs {
    #[command(flatten)]
    pub blend: BlendArgs,

    /// JSON file holding an array of ingredients.
    #[arg(short = 'c', long)]
    pub catalog: PathBuf,

    /// LLM model (overrides BLENDFORGE_MODEL).
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// Generator calls before falling back to repair.
    #[arg(long)]
    pub max_attempts: Option<u32>,
}

/// Parses `key=value`. Numeric values become JSON numbers, anything else a string.
fn parse_preference(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected dimension=level, got '{}'", raw))?;
    let key = key.trim();
    let value = value.trim();
    if key.is_empty() || value.is_empty() {
        return Err(format!("expected dimension=level, got '{}'", raw));
    }

    let value = value
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(serde_json::Value::Number)
        .unwrap_or_else(|| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("Failed to load configuration")?;

    match cli.command {
        Commands::Migrate => run_migrate_command(&config).await,
        Commands::Enqueue(args) => run_enqueue_command(&config, args).await,
        Commands::Status(args) => run_status_command(&config, args).await,
        Commands::Worker(args) => run_worker_command(config, args).await,
        Commands::Synthesize(args) => run_synthesize_command(config, args).await,
    }
}

async fn connect(config: &AppConfig) -> anyhow::Result<Database> {
    let url = config.require_database_url()?;
    Database::connect(url)
        .await
        .context("Failed to connect to database")
}

fn build_generator(config: &AppConfig) -> anyhow::Result<Arc<dyn RecipeGenerator>> {
    let api_base = config.llm_api_base.clone().ok_or_else(|| {
        anyhow::anyhow!("LITELLM_API_BASE is not set. Point it at an OpenAI-compatible endpoint.")
    })?;
    let client = LiteLlmClient::new(api_base, config.llm_api_key.clone(), config.model.clone())
        .context("Failed to initialize LLM client")?;

    info!(model = %config.model, "Using LiteLLM-compatible generator");
    Ok(Arc::new(
        LlmRecipeGenerator::new(Arc::new(client))
            .with_model(config.model.clone())
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens),
    ))
}

async fn run_migrate_command(config: &AppConfig) -> anyhow::Result<()> {
    let db = connect(config).await?;
    let applied = db.run_migrations().await?;
    info!(applied, "Migrations complete");

    for migration in db.applied_migrations().await? {
        println!("{}  {}", migration.applied_at.to_rfc3339(), migration.name);
    }
    Ok(())
}

async fn run_enqueue_command(config: &AppConfig, args: EnqueueArgs) -> anyhow::Result<()> {
    let db = connect(config).await?;
    let receipt = enqueue_blend(&db, &args.blend.to_request()).await?;
    println!("{}", serde_json::to_string_pretty(&receipt)?);
    Ok(())
}

async fn run_status_command(config: &AppConfig, args: StatusArgs) -> anyhow::Result<()> {
    let db = connect(config).await?;
    let snapshot = poll_job(&db, args.job_id).await?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

async fn run_worker_command(mut config: AppConfig, args: WorkerArgs) -> anyhow::Result<()> {
    if let Some(worker_id) = args.worker_id {
        config.worker_id = worker_id;
    }
    if let Some(max_attempts) = args.max_attempts {
        config.max_job_attempts = max_attempts;
    }
    config.validate()?;

    if let Err(e) = metrics::init_metrics() {
        warn!(error = %e, "Metrics disabled");
    }

    let db = Arc::new(connect(&config).await?);
    let store: Arc<dyn JobStore> = db.clone();
    let catalog: Arc<dyn CatalogSource> = db;
    let orchestrator = Arc::new(SynthesisOrchestrator::new(
        build_generator(&config)?,
        catalog,
        config.synthesis(),
    ));
    let worker = Worker::new(config.worker(), store, orchestrator);

    if args.once {
        let outcome = worker.tick().await?;
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, stopping worker");
            }
            let _ = shutdown_tx.send(());
        });
        worker.run(shutdown_rx).await;

        let stats = worker.stats();
        info!(
            ticks = stats.ticks,
            succeeded = stats.jobs_succeeded,
            requeued = stats.jobs_requeued,
            failed = stats.jobs_failed,
            fallback_repairs = stats.fallback_repairs,
            "Worker summary"
        );
    }

    if args.print_metrics {
        print!("{}", metrics::export_metrics());
    }
    Ok(())
}

async fn run_synthesize_command(mut config: AppConfig, args: SynthesizeArgs) -> anyhow::Result<()> {
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(max_attempts) = args.max_attempts {
        config.max_generation_attempts = max_attempts;
    }
    config.validate()?;

    let catalog = StaticCatalog::from_json_file(&args.catalog)
        .with_context(|| format!("Failed to read catalog {}", args.catalog.display()))?;
    let orchestrator =
        SynthesisOrchestrator::new(build_generator(&config)?, Arc::new(catalog), config.synthesis());

    let result = orchestrator.run(&args.blend.to_request()).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
