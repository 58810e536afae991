//! Character and progression API endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use super::{respond, AppState};
use crate::models::{AbilityId, ArchetypeId, CharacterId};

/// Build character router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/characters/{id}", get(get_character))
        .route("/characters/{id}/talents", post(spend_talent))
        .route("/characters/{id}/abilities", post(learn_ability))
        .route("/characters/{id}/archetype", post(select_archetype))
}

/// Character sheet with effective stats
async fn get_character(
    State(state): State<AppState>,
    Path(character_id): Path<CharacterId>,
) -> impl IntoResponse {
    respond(StatusCode::OK, state.characters.sheet(character_id).await)
}

#[derive(Debug, Deserialize)]
pub struct SpendTalentRequest {
    pub stat: String,
}

async fn spend_talent(
    State(state): State<AppState>,
    Path(character_id): Path<CharacterId>,
    Json(req): Json<SpendTalentRequest>,
) -> impl IntoResponse {
    respond(
        StatusCode::OK,
        state
            .characters
            .spend_talent_point(character_id, &req.stat)
            .await,
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnAbilityRequest {
    pub ability_id: AbilityId,
}

async fn learn_ability(
    State(state): State<AppState>,
    Path(character_id): Path<CharacterId>,
    Json(req): Json<LearnAbilityRequest>,
) -> impl IntoResponse {
    respond(
        StatusCode::OK,
        state
            .characters
            .learn_ability(character_id, req.ability_id)
            .await,
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectArchetypeRequest {
    pub archetype_id: ArchetypeId,
}

async fn select_archetype(
    State(state): State<AppState>,
    Path(character_id): Path<CharacterId>,
    Json(req): Json<SelectArchetypeRequest>,
) -> impl IntoResponse {
    respond(
        StatusCode::OK,
        state
            .characters
            .select_archetype(character_id, req.archetype_id)
            .await,
    )
}
