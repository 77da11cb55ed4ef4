use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use petchart_core::error::AppError;

mod commands;
mod settings;

use settings::{Overrides, Settings};

#[derive(Parser)]
#[command(name = "petchart")]
#[command(about = "Ask questions about a pet's visit transcripts and lab results", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON file with agent settings (model, top_k, max_tool_calls, ...)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ollama base URL; only http://127.0.0.1[:port] is accepted
    #[arg(long, global = true)]
    ollama_url: Option<String>,

    /// Diagnostics SQLite database
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Retrieval store file
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Chat model used for reasoning and answers
    #[arg(long, global = true)]
    model: Option<String>,

    /// Embedding model used for indexing and search
    #[arg(long, global = true)]
    embed_model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the diagnostics database and apply migrations
    InitDb,

    /// Insert the demo patient (Daisy) with one visit and lab results
    SeedDemo,

    /// Delete all diagnostics rows, keeping the schema
    ClearDemo,

    /// Chunk, embed and add transcript files to the retrieval store
    Index {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Remove every indexed chunk
    ClearStore,

    /// Show retrieval store size and sources
    Stats,

    /// List recent visits
    Visits {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },

    /// Show lab results for a visit
    Results {
        visit_id: String,

        /// Only this test (e.g. CBC)
        #[arg(long)]
        test: Option<String>,

        /// Only results flagged H or L
        #[arg(long)]
        abnormal: bool,
    },

    /// Answer a question from transcripts and diagnostics
    Ask {
        question: String,

        /// Print the full response (evidence, trace, confidence) as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that Ollama is reachable
    Health,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            config: self.config.clone(),
            ollama_url: self.ollama_url.clone(),
            db_path: self.db.clone(),
            store_path: self.store.clone(),
            model: self.model.clone(),
            embed_model: self.embed_model.clone(),
        }
    }
}

fn run(cli: Cli) -> Result<String, AppError> {
    let settings = Settings::resolve(&cli.overrides())?;
    tracing::debug!(
        db = %settings.db_path.display(),
        store = %settings.store_path.display(),
        model = %settings.agent.model,
        "resolved settings"
    );

    match cli.command {
        Commands::InitDb => commands::init_db(&settings),
        Commands::SeedDemo => commands::seed_demo(&settings),
        Commands::ClearDemo => commands::clear_demo(&settings),
        Commands::Index { files } => commands::index(&settings, &files),
        Commands::ClearStore => commands::clear_store(&settings),
        Commands::Stats => commands::stats(&settings),
        Commands::Visits { limit } => commands::visits(&settings, limit),
        Commands::Results {
            visit_id,
            test,
            abnormal,
        } => commands::results(&settings, &visit_id, test.as_deref(), abnormal),
        Commands::Ask { question, json } => commands::ask(&settings, &question, json),
        Commands::Health => commands::health(&settings),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(code = %e.code, retryable = e.retryable, "command failed");
            eprintln!("{}", e.describe());
            ExitCode::FAILURE
        }
    }
}
