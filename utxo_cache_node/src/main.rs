// UTXO Cache Node
//
// Loads configuration, opens the token store and serves the cache API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use utxo_cache_node::{
    api::{ApiServer, AppState},
    config::NodeConfig,
    storage::{create_token_store, read_seed_file, seed_token_store},
};
use utxo_token_cache::TokenCacheService;

/// Command line interface for the UTXO cache node
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// The subcommand to execute; defaults to `run`
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the configuration file. Defaults and `UTXO_CACHE__*`
    /// environment variables apply when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the cache API
    Run,

    /// Load tokens from a JSON file into the SQLite token store
    Seed {
        /// JSON array of `{ "pool_key": {..}, "tokens": [..] }` objects
        #[arg(short, long, value_name = "TOKENS.json")]
        file: PathBuf,
    },

    /// Write the default configuration as TOML
    InitConfig {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    if let Some(Commands::InitConfig { output }) = &cli.command {
        NodeConfig::default()
            .to_file(output)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!("Wrote default configuration to {}", output.display());
        return Ok(());
    }

    let config = NodeConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Some(Commands::Seed { file }) => {
            let seeds = read_seed_file(&file)
                .with_context(|| format!("Failed to read seed file {}", file.display()))?;
            let written = seed_token_store(&config.storage, seeds).await?;
            info!("Seeded {} tokens into {}", written, config.storage.database_path.display());
            Ok(())
        }
        Some(Commands::Run) | None => run(config).await,
        Some(Commands::InitConfig { .. }) => Ok(()),
    }
}

async fn run(config: NodeConfig) -> Result<(), anyhow::Error> {
    let store = create_token_store(&config.storage).context("Failed to open token store")?;
    let service = TokenCacheService::new(store, config.selection.cache_settings());
    info!(
        "Default selection strategy: {}",
        config.selection.default_strategy
    );

    let addr = config.api.socket_addr()?;
    let server = ApiServer::new(Arc::new(AppState::new(service)), addr);

    info!("UTXO cache node running. Press Ctrl+C to stop.");
    server
        .start(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
            }
        })
        .await?;

    Ok(())
}
