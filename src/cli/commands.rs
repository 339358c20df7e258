//! CLI command definitions for dialogue-forge.
//!
//! Running without a subcommand is the same as `generate`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::config::GenerationConfig;
use crate::conversation::ConversationSimulator;
use crate::error::SchedulerError;
use crate::export::{FineTuneExporter, DEFAULT_OUTPUT_FILE};
use crate::llm::gemini::GEMINI_BASE_URL;
use crate::llm::{GeminiTransport, ModelRegistry, ModelRole, RateLimitedClient};
use crate::scheduler::{BatchScheduler, ProgressAccounting, RunSummary};
use crate::storage::{ConversationStore, RecordQuery, SortOrder, SqliteStore, StoredConversation};

/// Characters of each turn shown by `inspect`.
const PREVIEW_CHARS: usize = 100;

/// Turns shown per record by `inspect`.
const PREVIEW_TURNS: usize = 4;

/// Synthetic coaching-dialogue generator.
#[derive(Parser)]
#[command(name = "dialogue-forge")]
#[command(about = "Generate synthetic persona coaching dialogues with Gemini")]
#[command(version)]
#[command(
    long_about = "dialogue-forge simulates conversations between a user persona and a coach persona about a personal goal, persists them to a document store, and exports them as fine-tuning JSONL.\n\nConfiguration comes from GEMINI_* and FORGE_* environment variables; flags override them.\n\nExample usage:\n  dialogue-forge generate --target 1000 --concurrency 5\n  dialogue-forge export --output ./training_data.jsonl"
)]
pub struct Cli {
    /// The subcommand to execute (defaults to `generate`).
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Document store URL (overrides FORGE_DATABASE_URL).
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Collection name (overrides FORGE_COLLECTION).
    #[arg(long, global = true)]
    pub collection: Option<String>,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Generate conversations until the collection reaches the target count.
    #[command(alias = "gen")]
    Generate(GenerateArgs),

    /// Print the number of stored records and the latest entries.
    Count(CountArgs),

    /// Print sample records for a manual quality check.
    Inspect(InspectArgs),

    /// Write stored conversations as fine-tuning JSONL.
    Export(ExportArgs),

    /// Print the role to model table of the active environment.
    Models(ModelsArgs),
}

/// Arguments for `dialogue-forge generate`.
#[derive(Parser, Debug, Default)]
pub struct GenerateArgs {
    /// Target number of records in the collection.
    #[arg(short, long)]
    pub target: Option<u64>,

    /// Simulations run concurrently per batch.
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Coach replies per conversation.
    #[arg(short, long)]
    pub rounds: Option<usize>,

    /// Progress accounting: optimistic or persisted.
    #[arg(long)]
    pub accounting: Option<ProgressAccounting>,

    /// Model to generate with (overrides the model table).
    #[arg(short, long)]
    pub model: Option<String>,
}

/// Arguments for `dialogue-forge count`.
#[derive(Parser, Debug)]
pub struct CountArgs {
    /// Number of latest entries to list.
    #[arg(long, default_value = "3")]
    pub latest: usize,
}

/// Arguments for `dialogue-forge inspect`.
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Number of records to show.
    #[arg(short = 'n', long, default_value = "3")]
    pub limit: usize,
}

/// Arguments for `dialogue-forge export`.
#[derive(Parser, Debug)]
pub struct ExportArgs {
    /// Output JSONL path.
    #[arg(short, long, default_value = DEFAULT_OUTPUT_FILE)]
    pub output: PathBuf,
}

/// Arguments for `dialogue-forge models`.
#[derive(Parser, Debug)]
pub struct ModelsArgs {
    /// Environment to show (overrides FORGE_ENV).
    #[arg(short, long)]
    pub env: Option<String>,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let mut config = GenerationConfig::from_env().context("Invalid configuration")?;
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }
    if let Some(collection) = cli.collection {
        config.collection = collection;
    }

    match cli.command.unwrap_or(Commands::Generate(GenerateArgs::default())) {
        Commands::Generate(args) => run_generate_command(config, args).await,
        Commands::Count(args) => run_count_command(config, args).await,
        Commands::Inspect(args) => run_inspect_command(config, args).await,
        Commands::Export(args) => run_export_command(config, args).await,
        Commands::Models(args) => run_models_command(config, args),
    }
}

// ============================================================================
// Generate
// ============================================================================

async fn run_generate_command(config: GenerationConfig, args: GenerateArgs) -> anyhow::Result<()> {
    let mut config = config;
    if let Some(target) = args.target {
        config = config.with_target(target);
    }
    if let Some(concurrency) = args.concurrency {
        config = config.with_concurrency(concurrency);
    }
    if let Some(rounds) = args.rounds {
        config = config.with_rounds(rounds);
    }
    if let Some(accounting) = args.accounting {
        config = config.with_accounting(accounting);
    }
    if let Some(model) = args.model {
        config = config.with_model(model);
    }
    config.validate()?;

    let api_key = config.require_api_key()?.to_string();
    let model = match &config.model {
        Some(model) => model.clone(),
        None => ModelRegistry::load(&config.model_config_path, &config.environment)
            .model_for(ModelRole::DataGenerator)
            .to_string(),
    };
    let api_base = config
        .api_base
        .clone()
        .unwrap_or_else(|| GEMINI_BASE_URL.to_string());

    let transport = GeminiTransport::with_base_url(api_key, api_base, model.clone())?;
    let client = RateLimitedClient::new(Arc::new(transport))
        .with_policy(config.retry_policy())
        .with_attempt_timeout(config.request_timeout);
    let simulator = ConversationSimulator::new(Arc::new(client))
        .with_turn_pause(config.turn_pause)
        .with_language(config.language.clone());

    let store = SqliteStore::open(&config.database_url)
        .await
        .map_err(SchedulerError::StoreUnreachable)?;
    let store: Arc<dyn ConversationStore> = Arc::new(store);

    info!(
        model = %model,
        collection = %config.collection,
        target = config.target,
        concurrency = config.concurrency,
        rounds = config.rounds,
        "Generation configured"
    );

    let scheduler = BatchScheduler::new(simulator, store).with_config(config.scheduler_config());
    let summary = scheduler
        .run_to_target(config.target, config.concurrency)
        .await?;

    print_run_summary(&summary, config.target);
    Ok(())
}

fn print_run_summary(summary: &RunSummary, target: u64) {
    println!("\n=== Generation Summary ===");
    println!("Target:            {}", target);
    println!("Already persisted: {}", summary.already_persisted);
    println!("Batches:           {}", summary.batch_sizes.len());
    println!("Launched:          {}", summary.launched);
    println!("Persisted:         {}", summary.persisted);
    println!("Failed:            {}", summary.failed);
    println!("Final pointer:     {}", summary.final_pointer);
}

// ============================================================================
// Count / Inspect
// ============================================================================

async fn open_store(config: &GenerationConfig) -> anyhow::Result<SqliteStore> {
    SqliteStore::open(&config.database_url)
        .await
        .with_context(|| format!("Could not open document store at {}", config.database_url))
}

async fn run_count_command(config: GenerationConfig, args: CountArgs) -> anyhow::Result<()> {
    let store = open_store(&config).await?;
    let total = store.count(&config.collection).await?;
    println!("Total records in '{}': {}", config.collection, total);

    if args.latest > 0 {
        let latest = store
            .query(
                &config.collection,
                &RecordQuery::new()
                    .with_order(SortOrder::NewestFirst)
                    .with_limit(args.latest),
            )
            .await?;
        if !latest.is_empty() {
            println!("\nLatest {} entries:", latest.len());
            for doc in &latest {
                let created = doc
                    .created_at
                    .map(|ts| ts.to_rfc3339())
                    .unwrap_or_else(|| "N/A".to_string());
                println!(
                    "- [{}] {} | Goal: {} | {} vs {}",
                    created,
                    doc.id,
                    doc.goal.as_deref().unwrap_or("N/A"),
                    doc.user_persona,
                    doc.admin_persona
                );
            }
        }
    }
    Ok(())
}

async fn run_inspect_command(config: GenerationConfig, args: InspectArgs) -> anyhow::Result<()> {
    let store = open_store(&config).await?;
    let docs = store
        .query(
            &config.collection,
            &RecordQuery::training().with_limit(args.limit),
        )
        .await?;

    if docs.is_empty() {
        println!("No records with a goal found in '{}'.", config.collection);
        return Ok(());
    }

    for doc in &docs {
        println!("{}", render_preview(doc));
        println!("------------------------------------------------");
    }
    Ok(())
}

/// Human-readable preview of a record's first turns.
pub fn render_preview(doc: &StoredConversation) -> String {
    let mut lines = vec![
        format!("[ID: {}]", doc.id),
        format!("Personas: {} (user) vs {} (coach)", doc.user_persona, doc.admin_persona),
        format!("Goal: {}", doc.goal.as_deref().unwrap_or("N/A")),
    ];
    for turn in doc.conversation.iter().take(PREVIEW_TURNS) {
        lines.push(format!("{}: {}", turn.sender, truncate_chars(&turn.text, PREVIEW_CHARS)));
    }
    lines.join("\n")
}

/// Cut `text` to at most `max` characters, marking the cut with `...`.
fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

// ============================================================================
// Export
// ============================================================================

async fn run_export_command(config: GenerationConfig, args: ExportArgs) -> anyhow::Result<()> {
    let store: Arc<dyn ConversationStore> = Arc::new(open_store(&config).await?);
    let exporter = FineTuneExporter::new(store, config.collection.clone());
    let summary = exporter.export_to(&args.output).await?;

    println!("Exported {} examples to {}", summary.written, summary.path.display());
    println!(
        "Skipped: {} too short, {} ending with a user turn",
        summary.skipped_too_short, summary.skipped_ends_with_user
    );
    Ok(())
}

// ============================================================================
// Models
// ============================================================================

fn run_models_command(config: GenerationConfig, args: ModelsArgs) -> anyhow::Result<()> {
    let env = args.env.unwrap_or(config.environment);
    let registry = ModelRegistry::load(&config.model_config_path, &env);

    println!("Environment: {}", registry.environment());
    for (role, model) in registry.assignments() {
        println!("  {:<16} {}", role, model);
    }
    Ok(())
}
