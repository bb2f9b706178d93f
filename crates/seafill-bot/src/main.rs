//! seafill - Entry Point

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, info};

/// Order fulfillment engine for Seaport-compatible exchanges
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via SEAFILL_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Grant permissions, fund, sign and fulfill the configured trade
    Fulfill,
    /// Print multi-asset holdings of the buyer and seller
    CheckTransfer,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    seafill_telemetry::init_logging()?;

    info!("Starting seafill v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > SEAFILL_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("SEAFILL_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = seafill_bot::AppConfig::from_file(&config_path)?;
    info!(rpc_url = %config.rpc_url, hash_check = ?config.hash_check, "Configuration loaded");

    let app = seafill_bot::Application::connect(config)?;

    match args.command {
        Command::Fulfill => {
            let report = app.fulfill().await?;
            println!("{}", serde_json::to_string_pretty(&report.to_json())?);
            debug!(metrics = %seafill_telemetry::Metrics::render()?, "Run metrics");
        }
        Command::CheckTransfer => {
            let report = app.check_transfer().await?;
            println!("{}", serde_json::to_string_pretty(&report.to_json())?);
        }
    }

    Ok(())
}
