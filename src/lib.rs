//! sagad - story combat & progression daemon
//!
//! Turn-based combat against authored enemies, effect-string driven items
//! and abilities, and XP/talent progression for a branching-narrative RPG.

pub mod api;
pub mod combat;
pub mod db;
pub mod error;
pub mod init;
pub mod locks;
pub mod models;
pub mod progression;
pub mod story;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use combat::CombatConfig;
use db::Database;
use progression::ProgressionConfig;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// None = in-memory
    pub db_path: Option<String>,
    /// Fixed seed for the combat dice; None seeds from the OS
    pub rng_seed: Option<u64>,
    pub combat: CombatConfig,
    pub progression: ProgressionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            db_path: None,
            rng_seed: None,
            combat: CombatConfig::default(),
            progression: ProgressionConfig::default(),
        }
    }
}

impl Config {
    /// Defaults, then the TOML file (if any), then `SAGAD_*` environment
    /// variables (`__` separates nested keys)
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed("SAGAD_").split("__"))
    }
}

/// The sagad server instance
pub struct Server {
    config: Config,
    db: Arc<Database>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Create a new server instance
    pub async fn new(config: Config) -> Result<Self> {
        let db = Database::new(config.db_path.as_deref()).await?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            db: Arc::new(db),
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Get the database handle
    pub fn db(&self) -> Arc<Database> {
        self.db.clone()
    }

    /// Build the router
    fn router(&self) -> Router {
        api::router(self.db.clone(), &self.config)
    }

    /// Run the server until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("sagad listening on {}", local_addr);

        let router = self.router();
        let mut shutdown_rx = self.shutdown_rx.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            })
            .await?;

        info!("sagad shutdown complete");
        Ok(())
    }

    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
