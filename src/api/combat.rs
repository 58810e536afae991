//! Combat API endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use super::{error_response, respond, AppState};
use crate::combat::PlayerAction;
use crate::models::{CharacterId, NodeId};

/// Build combat router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/characters/{id}/combat", get(view_combat).post(start_combat))
        .route("/characters/{id}/combat/action", post(combat_action))
}

/// Start combat request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCombatRequest {
    pub node_id: NodeId,
}

/// Start the fight bound to a story node
async fn start_combat(
    State(state): State<AppState>,
    Path(character_id): Path<CharacterId>,
    Json(req): Json<StartCombatRequest>,
) -> impl IntoResponse {
    match state.combat.start(character_id, req.node_id).await {
        Ok(start) => {
            let status = if start.resumed {
                StatusCode::OK
            } else {
                StatusCode::CREATED
            };
            (status, Json(start)).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// Current combat of a character
async fn view_combat(
    State(state): State<AppState>,
    Path(character_id): Path<CharacterId>,
) -> impl IntoResponse {
    respond(StatusCode::OK, state.combat.view(character_id).await)
}

/// Combat action request
///
/// Ids are taken as raw JSON so that a bad `itemId` only matters for
/// `use_item` and a bad `abilityId` only for `use_ability`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRequest {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub item_id: Option<Value>,
    #[serde(default)]
    pub ability_id: Option<Value>,
}

/// Read an id that may arrive as a number or a numeric string.
/// Anything else becomes 0, which action validation rejects.
fn raw_id(value: Option<&Value>) -> Option<i64> {
    value.map(|v| {
        v.as_i64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
            .unwrap_or(0)
    })
}

/// Play one combat round
async fn combat_action(
    State(state): State<AppState>,
    Path(character_id): Path<CharacterId>,
    Json(req): Json<ActionRequest>,
) -> impl IntoResponse {
    let action = match PlayerAction::parse(
        &req.action,
        raw_id(req.item_id.as_ref()),
        raw_id(req.ability_id.as_ref()),
    ) {
        Ok(action) => action,
        Err(e) => return error_response(e),
    };

    respond(StatusCode::OK, state.combat.act(character_id, action).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_id() {
        assert_eq!(raw_id(None), None);
        assert_eq!(raw_id(Some(&json!(4))), Some(4));
        assert_eq!(raw_id(Some(&json!(" 12 "))), Some(12));
        assert_eq!(raw_id(Some(&json!(2.5))), Some(0));
        assert_eq!(raw_id(Some(&json!("sword"))), Some(0));
    }

    #[test]
    fn test_action_request_shape() {
        let req: ActionRequest =
            serde_json::from_value(json!({ "action": "use_ability", "abilityId": 3 })).unwrap();
        assert_eq!(req.action, "use_ability");
        assert!(req.item_id.is_none());
        assert_eq!(raw_id(req.ability_id.as_ref()), Some(3));
    }
}
