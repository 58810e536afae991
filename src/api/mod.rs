//! HTTP API module - REST endpoints

mod characters;
mod combat;

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::combat::{CombatManager, Dice, DieRoller};
use crate::db::Database;
use crate::error::{ErrorKind, GameError};
use crate::locks::CharacterLocks;
use crate::progression::{CharacterService, ProgressionManager};
use crate::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub combat: Arc<CombatManager>,
    pub characters: Arc<CharacterService>,
}

impl AppState {
    /// Wire up the engine with dice seeded from the config
    pub fn new(db: Arc<Database>, config: &Config) -> Self {
        let dice = Dice::new(config.rng_seed);
        match dice.seed() {
            Some(seed) => info!(seed, "Combat dice seeded"),
            None => info!("Combat dice seeded from OS entropy"),
        }
        Self::with_dice(db, config, Box::new(dice))
    }

    /// Wire up the engine with the given dice
    pub fn with_dice(db: Arc<Database>, config: &Config, dice: Box<dyn DieRoller + Send>) -> Self {
        let pool = db.pool().clone();
        let locks = Arc::new(CharacterLocks::new());
        let progression = Arc::new(ProgressionManager::new(config.progression.clone()));

        let combat = Arc::new(CombatManager::new(
            pool.clone(),
            config.combat.clone(),
            progression.clone(),
            locks.clone(),
            dice,
        ));
        let characters = Arc::new(CharacterService::new(pool, progression, locks));

        Self {
            db,
            combat,
            characters,
        }
    }
}

/// Build the API router
pub fn router(db: Arc<Database>, config: &Config) -> Router {
    routes(AppState::new(db, config))
}

/// Build the API router around existing state
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
        .merge(characters::router())
        .merge(combat::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable reason code, e.g. `no_active_combat`
    pub code: &'static str,
}

/// Map an engine error to its HTTP response
pub fn error_response(err: GameError) -> Response {
    let status = match err.kind() {
        ErrorKind::Input => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Precondition => StatusCode::CONFLICT,
        ErrorKind::Content | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };

    match err.kind() {
        ErrorKind::Content => error!(code = err.code(), "Malformed authored content: {}", err),
        ErrorKind::Internal => error!(code = err.code(), "Internal error: {}", err),
        _ => debug!(code = err.code(), "Request rejected: {}", err),
    }

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code: err.code(),
        }),
    )
        .into_response()
}

/// Serialize a successful result with `status`, or map the error
fn respond<T: Serialize>(status: StatusCode, result: Result<T, GameError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Root endpoint
async fn root() -> impl IntoResponse {
    Json(RootResponse {
        name: "sagad",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                database: "ok",
            }),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unhealthy",
                database: "error",
            }),
        ),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::combat::ScriptedDice;
    use crate::db::test_utils::fixture;

    async fn app(dice: Vec<u32>) -> Router {
        let db = Database::new(None).await.unwrap();
        fixture::load(db.pool()).await;
        routes(AppState::with_dice(
            Arc::new(db),
            &Config::default(),
            Box::new(ScriptedDice::new(dice)),
        ))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health_and_root() {
        let app = app(vec![]).await;
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (_, body) = send(&app, Method::GET, "/", None).await;
        assert_eq!(body["name"], "sagad");
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let app = app(vec![]).await;

        let (status, body) = send(&app, Method::GET, "/characters/999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");

        let (status, body) = send(&app, Method::GET, "/characters/1/combat", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "no_active_combat");

        let (status, body) = send(
            &app,
            Method::POST,
            "/characters/1/combat/action",
            Some(json!({ "action": "dance" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_action");
    }

    #[tokio::test]
    async fn test_item_id_only_checked_for_use_item() {
        let app = app(vec![]).await;
        let (status, _) = send(
            &app,
            Method::POST,
            "/characters/1/combat",
            Some(json!({ "nodeId": fixture::OGRE_NODE })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        // a junk itemId is ignored for attack
        let (status, body) = send(
            &app,
            Method::POST,
            "/characters/1/combat/action",
            Some(json!({ "action": "attack", "itemId": "junk" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcomes"].as_array().unwrap().len(), 2);

        let (status, body) = send(
            &app,
            Method::POST,
            "/characters/1/combat/action",
            Some(json!({ "action": "use_item", "itemId": -3 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_item_id");

        let (status, body) = send(
            &app,
            Method::POST,
            "/characters/1/combat/action",
            Some(json!({ "action": "use_item" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_item_id");

        // numeric strings are accepted
        let (status, body) = send(
            &app,
            Method::POST,
            "/characters/1/combat/action",
            Some(json!({ "action": "use_item", "itemId": "2" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcomes"][0]["result"], "item_used");
    }

    #[tokio::test]
    async fn test_malformed_content_is_a_server_error() {
        let app = app(vec![]).await;
        send(
            &app,
            Method::POST,
            "/characters/1/combat",
            Some(json!({ "nodeId": fixture::OGRE_NODE })),
        )
        .await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/characters/1/combat/action",
            Some(json!({ "action": "use_item", "itemId": fixture::CURSED })),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "malformed_effect");
        assert!(body["error"].as_str().unwrap().contains("wisdom+1"));
    }
}
