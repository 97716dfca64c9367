//! Keepers - local runner
//!
//! - `keepers list` shows every keeper function
//! - `keepers check --config keepers.toml` validates a configuration
//! - `keepers run --config keepers.toml --task <name>` evaluates one task
//!   once against live RPCs and prints the result and the store

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result, WrapErr};
use console::style;
use keepers::chain::{ChainReader, RpcChainReader};
use keepers::config::RunnerConfig;
use keepers::context::KeeperContext;
use keepers::functions::{run_keeper, KINDS};
use keepers::store::{EnvSecrets, MemoryStore};
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Keeper functions for an automation network")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the available keeper functions
    List,

    /// Validate a configuration file
    Check {
        #[arg(long)]
        config: PathBuf,
    },

    /// Evaluate one task once
    Run {
        #[arg(long)]
        config: PathBuf,

        /// Task name from the configuration
        #[arg(long)]
        task: String,

        /// Initial store as a JSON object, e.g. '{"lastTimestamp":"0"}'
        #[arg(long)]
        storage: Option<String>,

        /// Run on another chain than the task's own
        #[arg(long)]
        chain_id: Option<u64>,
    },
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!("{}", style(" KEEPERS - harvest, rebalance, distribute, bridge").cyan().bold());
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

fn list() {
    println!("{}", style("═══ KEEPER FUNCTIONS ═══").blue().bold());
    for (kind, description) in KINDS {
        println!("  {:<22} {}", style(kind).green(), description);
    }
}

fn check(path: &PathBuf) -> Result<()> {
    let config = RunnerConfig::from_file(path)?;
    config.validate()?;
    config.print_summary();

    for task in &config.tasks {
        task.build(config.http_timeout())?;
        info!("✓ {} ({})", task.name, task.spec.kind());
    }
    Ok(())
}

fn parse_storage(raw: Option<&str>) -> Result<HashMap<String, String>> {
    match raw {
        Some(json) => serde_json::from_str(json).wrap_err("--storage must be a JSON object of strings"),
        None => Ok(HashMap::new()),
    }
}

async fn run(path: &PathBuf, task_name: &str, storage: Option<&str>, chain_id: Option<u64>) -> Result<()> {
    let config = RunnerConfig::from_file(path)?;
    config.validate()?;
    let task = config.task(task_name)?;
    let chain_id = chain_id.unwrap_or(task.chain_id);

    // Every configured chain is reachable, some keepers read several
    let mut chains: BTreeSet<u64> = config.rpc.keys().filter_map(|k| k.parse().ok()).collect();
    chains.insert(chain_id);
    chains.extend(task.relay_to);

    let store = Arc::new(MemoryStore::with_entries(parse_storage(storage)?));
    let mut readers: HashMap<u64, Arc<dyn ChainReader>> = HashMap::new();
    for chain in chains {
        let reader = RpcChainReader::connect(&config.rpc_url(chain)?)?;
        readers.insert(chain, Arc::new(reader));
    }

    let reader = readers
        .get(&chain_id)
        .cloned()
        .ok_or_else(|| eyre!("no reader for chain {}", chain_id))?;
    let block_timestamp = reader.latest_timestamp().await?;
    info!("{} on chain {} at block timestamp {}", task.name, chain_id, block_timestamp);

    let mut ctx = KeeperContext::new(chain_id, block_timestamp, Arc::new(EnvSecrets), store.clone());
    for (chain, reader) in readers {
        ctx = ctx.with_chain(chain, reader);
    }

    let keeper = task.build(config.http_timeout())?;
    let result = run_keeper(keeper.as_ref(), &ctx).await;

    println!();
    println!("{}", style("═══ RESULT ═══").blue().bold());
    println!("{}", serde_json::to_string_pretty(&result)?);
    println!("{}", style("═══ STORAGE ═══").blue().bold());
    println!("{}", serde_json::to_string_pretty(&store.snapshot())?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("keepers=info".parse()?))
        .init();

    let cli = Cli::parse();
    print_banner();

    let outcome = match &cli.command {
        Command::List => {
            list();
            Ok(())
        }
        Command::Check { config } => check(config),
        Command::Run { config, task, storage, chain_id } => run(config, task, storage.as_deref(), *chain_id).await,
    };

    if let Err(e) = &outcome {
        error!("{:#}", e);
    }
    outcome
}
