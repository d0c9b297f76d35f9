//! Lumenchain node: restores the chain from disk, audits it and serves the
//! JSON RPC API.

use clap::Parser;
use lumenchain::api::{serve, AppState};
use lumenchain::chain::Blockchain;
use lumenchain::config::load_config;
use lumenchain::persistence::Database;
use tracing::info;

#[derive(Parser)]
#[command(name = "lumen-node", about = "Run a lumenchain ledger node")]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Override the API port from the config
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = load_config(&args.config)?;
    let port = args.port.unwrap_or(config.network.api_port);

    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let database = Database::open(&config.database.path)?;
    let chain = Blockchain::load(Box::new(database))?;
    info!(
        "Chain restored: {} blocks, head {}",
        chain.blocks.len(),
        chain.latest_blockhash()?
    );

    let state = AppState::new(chain, config.fees.clone());
    serve(state, port).await?;
    Ok(())
}
