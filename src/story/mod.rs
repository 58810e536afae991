//! Story graph boundary
//!
//! Combat only needs three things from the story: which enemy a node
//! starts a fight with, and where the character goes after winning or
//! losing it. Everything else about nodes belongs to the narrative layer.

use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

use crate::error::GameError;
use crate::models::{CombatOutcome, EnemyId, NodeId};

/// A story node as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StoryNode {
    pub id: NodeId,
    #[serde(default)]
    pub title: String,
    /// Enemy fought at this node, if any
    #[serde(default)]
    pub enemy_id: Option<EnemyId>,
    #[serde(default)]
    pub victory_node_id: Option<NodeId>,
    #[serde(default)]
    pub defeat_node_id: Option<NodeId>,
}

impl StoryNode {
    /// Where the story continues after a fight at this node
    pub fn next_node(&self, outcome: CombatOutcome) -> Option<NodeId> {
        match outcome {
            CombatOutcome::Victory => self.victory_node_id,
            CombatOutcome::Defeat => self.defeat_node_id,
        }
    }
}

pub async fn find_node(
    conn: &mut SqliteConnection,
    id: NodeId,
) -> Result<Option<StoryNode>, GameError> {
    let node = sqlx::query_as(
        r#"
        SELECT id, title, enemy_id, victory_node_id, defeat_node_id
        FROM story_nodes WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(node)
}

/// Look up the enemy a node starts a fight with
pub async fn combat_at(
    conn: &mut SqliteConnection,
    id: NodeId,
) -> Result<(StoryNode, EnemyId), GameError> {
    let node = find_node(conn, id)
        .await?
        .ok_or_else(|| GameError::not_found("story node", id))?;
    match node.enemy_id {
        Some(enemy_id) => Ok((node, enemy_id)),
        None => Err(GameError::NodeHasNoCombat(id)),
    }
}

pub async fn insert_node(conn: &mut SqliteConnection, node: &StoryNode) -> Result<(), GameError> {
    sqlx::query(
        r#"
        INSERT INTO story_nodes (id, title, enemy_id, victory_node_id, defeat_node_id)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(node.id)
    .bind(&node.title)
    .bind(node.enemy_id)
    .bind(node.victory_node_id)
    .bind(node.defeat_node_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
