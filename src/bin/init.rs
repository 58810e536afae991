//! sagad_init - One-time database initialization tool
//!
//! Creates a fresh game database and loads an authored content bundle.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sagad::init::{init_database, ContentBundle};
use sagad::progression::ProgressionManager;
use sagad::Config;

/// Saga database initialization tool
#[derive(Parser, Debug)]
#[command(
    name = "sagad_init",
    version,
    about = "Initialize a new saga database from a content bundle"
)]
struct Args {
    /// Path to SQLite database file to create (must not exist)
    #[arg(short, long)]
    database: PathBuf,

    /// Content bundle (JSON) to load
    #[arg(long)]
    content: Option<PathBuf>,

    /// Server config file; its progression rules set starting XP thresholds
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only validate the content bundle, do not create a database
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sagad=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse CLI arguments
    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;

    let bundle = match &args.content {
        Some(path) => {
            if !path.exists() {
                bail!("Content file not found: {}", path.display());
            }
            ContentBundle::from_file(path)?
        }
        None => ContentBundle::default(),
    };

    if args.check {
        let problems = bundle.validate();
        if !problems.is_empty() {
            for problem in &problems {
                eprintln!("{}", problem);
            }
            bail!("{} problem(s) found", problems.len());
        }
        println!("Content bundle is valid");
        return Ok(());
    }

    let progression = ProgressionManager::new(config.progression);
    init_database(&args.database, &bundle, &progression).await?;

    Ok(())
}
