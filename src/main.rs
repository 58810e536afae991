//! sagad - story combat & progression daemon

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use sagad::{Config, Server};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Saga combat and progression server
#[derive(Parser, Debug)]
#[command(name = "sagad", version, about)]
struct Args {
    /// TOML config file (SAGAD_* environment variables override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sagad=info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    if args.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let config = Config::load(args.config.as_deref())?;
    info!(
        db = config.db_path.as_deref().unwrap_or(":memory:"),
        "Configuration loaded"
    );

    // Create and run server
    let server = Server::new(config).await?;
    server.run().await?;

    Ok(())
}
