//! Common test utilities - SagaTest harness for end-to-end testing

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, StatusCode};
use sagad::init::{load_content, ContentBundle};
use sagad::progression::ProgressionManager;
use sagad::{Config, Server};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

/// Story node holding the training dummy
pub const DUMMY_NODE: i64 = 90;

/// The sample content plus a training dummy that cannot be killed quickly
pub fn bundle() -> ContentBundle {
    let mut bundle = ContentBundle::from_json(include_str!("../../content/sample.json"))
        .expect("sample content parses");
    let extra: ContentBundle = serde_json::from_value(json!({
        "enemies": [
            { "id": 90, "name": "Training Dummy", "health": 100000, "skill": 1, "damage": 0 }
        ],
        "nodes": [
            { "id": DUMMY_NODE, "title": "The practice yard", "enemyId": 90 }
        ]
    }))
    .expect("dummy content parses");
    bundle.enemies.extend(extra.enemies);
    bundle.nodes.extend(extra.nodes);
    bundle
}

/// Test harness that spawns a real sagad server on a random port
pub struct SagaTest {
    pub addr: SocketAddr,
    pub client: Client,
    server: Arc<Server>,
    _handle: JoinHandle<()>,
}

impl SagaTest {
    /// Start a new test server instance with the sample content loaded
    pub async fn start() -> Result<Self> {
        // Find a random available port
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        let config = Config {
            bind_addr: addr,
            db_path: None, // In-memory for tests
            rng_seed: Some(42),
            ..Config::default()
        };

        let server = Arc::new(Server::new(config).await?);
        load_content(server.db().pool(), &bundle(), &ProgressionManager::default()).await?;

        let server_clone = server.clone();

        // Spawn the server in a background task
        let handle = tokio::spawn(async move {
            if let Err(e) = server_clone.run().await {
                eprintln!("Server error: {}", e);
            }
        });

        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;

        // Poll until server is ready (max 2 seconds)
        let mut ready = false;
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if client
                .get(format!("http://{}/health", addr))
                .send()
                .await
                .is_ok()
            {
                ready = true;
                break;
            }
        }

        if !ready {
            panic!("Server failed to start within 2 seconds");
        }

        Ok(Self {
            addr,
            client,
            server,
            _handle: handle,
        })
    }

    /// Get the base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// GET `path`, returning status and JSON body
    pub async fn get(&self, path: &str) -> Result<(StatusCode, Value)> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?;
        let status = response.status();
        Ok((status, response.json().await?))
    }

    /// POST a JSON body to `path`, returning status and JSON body
    pub async fn post(&self, path: &str, body: &Value) -> Result<(StatusCode, Value)> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await?;
        let status = response.status();
        Ok((status, response.json().await?))
    }

    /// Play one combat action for a character
    pub async fn act(&self, character_id: i64, body: Value) -> Result<(StatusCode, Value)> {
        self.post(&format!("/characters/{}/combat/action", character_id), &body)
            .await
    }

    /// Shutdown the server gracefully
    pub fn shutdown(&self) {
        self.server.shutdown();
    }
}

impl Drop for SagaTest {
    fn drop(&mut self) {
        self.shutdown();
    }
}
