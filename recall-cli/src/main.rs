//! # Recall CLI
//!
//! Command-line interface for the recall agent.
//!
//! Usage:
//!   recall                      interactive session (same as `recall chat`)
//!   recall seed                 store the demo documents
//!   recall list                 show everything in long-term memory
//!   recall search <query> [-k]  one-shot memory search
//!
//! Examples:
//!   recall --simulate
//!   recall --provider openai --model gpt-4o-mini
//!   recall --memory-dir /tmp/mem search "project summary" -k 3

use clap::{Parser, Subcommand};
use recall_agent::{Agent, AgentConfig, Planner};
use recall_core::{ProviderType, Result, Settings, VectorMemory};
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser)]
#[command(name = "recall")]
#[command(author, version, about = "Recall - a planning agent with long-term memory")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Directory holding index.json and meta.json [env: RECALL_MEMORY_DIR]
    #[arg(long, global = true)]
    memory_dir: Option<PathBuf>,

    /// Model to request [env: GEMINI_MODEL or OPENAI_MODEL]
    #[arg(long, global = true)]
    model: Option<String>,

    /// Backend: gemini or openai [env: RECALL_PROVIDER]
    #[arg(long, global = true)]
    provider: Option<ProviderType>,

    /// Never call the backend, even with an API key
    #[arg(long, global = true)]
    simulate: bool,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive plan / confirm / execute loop
    Chat,
    /// Store the demo documents in long-term memory
    Seed,
    /// List every stored document
    List,
    /// Search long-term memory
    Search {
        /// Text to search for
        #[arg(required = true)]
        query: Vec<String>,

        /// Number of hits to show
        #[arg(short, long, default_value = "5")]
        k: usize,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "recall=debug,recall_core=debug,recall_agent=debug,warn"
    } else {
        "warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Environment first, then explicit flags on top
fn load_settings(cli: &Cli) -> Result<Settings> {
    // --provider stands in for RECALL_PROVIDER so the matching key is picked up
    let provider = cli.provider.map(|p| p.as_str().to_string());
    let mut settings = Settings::from_lookup(|key| match key {
        "RECALL_PROVIDER" if provider.is_some() => provider.clone(),
        _ => std::env::var(key).ok(),
    })?;

    if let Some(model) = &cli.model {
        settings.model = Some(model.clone());
    }
    if let Some(dir) = &cli.memory_dir {
        settings.memory_dir = dir.clone();
    }
    settings.simulate |= cli.simulate;
    Ok(settings)
}

async fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(&cli)?;
    debug!(
        provider = settings.provider.as_str(),
        model = settings.model(),
        memory_dir = %settings.memory_dir.display(),
        simulated = settings.is_simulated(),
        "settings loaded"
    );

    let embedder = settings.build_embedder()?;
    let memory = VectorMemory::open(&settings.memory_dir, embedder)?;

    let command = cli.command.unwrap_or(Commands::Chat);
    let provider = match &command {
        Commands::Chat => {
            if settings.simulate {
                println!("Note: --simulate given -> running in SIMULATION mode.");
            } else if settings.api_key.is_none() {
                println!(
                    "Note: no {} API key set -> running in SIMULATION mode.",
                    settings.provider.as_str()
                );
            }
            settings.build_provider()?
        }
        // Memory-only commands never call the backend
        _ => None,
    };

    let config = match &command {
        Commands::Search { k, .. } => AgentConfig {
            retrieve_top_k: *k,
            ..AgentConfig::default()
        },
        _ => AgentConfig::default(),
    };
    let mut agent = Agent::with_config(Planner::new(provider), memory, config);
    let mut stdout = std::io::stdout().lock();

    match command {
        Commands::Chat => {
            let mut stdin = std::io::stdin().lock();
            agent.run(&mut stdin, &mut stdout).await
        }
        Commands::Seed => agent.seed(&mut stdout).await,
        Commands::List => agent.list(&mut stdout),
        Commands::Search { query, .. } => agent.retrieve(&query.join(" "), &mut stdout).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
