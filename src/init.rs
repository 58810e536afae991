//! Database initialization module
//!
//! Provides one-time database setup for the sagad_init tool: creates the
//! schema and loads an authored content bundle (archetypes, abilities,
//! items, enemies, story combat nodes and starting characters).

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::combat::{parse_effects, ConsumableEffect};
use crate::db::Database;
use crate::error::ContentRef;
use crate::models::{
    store, Ability, AbilityId, Archetype, ArchetypeId, BaseStats, Character, CharacterId, Enemy,
    Item, ItemId, NodeId,
};
use crate::progression::ProgressionManager;
use crate::story::{self, StoryNode};

/// A starting character as authored
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterSeed {
    pub id: CharacterId,
    pub name: String,
    #[serde(flatten)]
    pub stats: BaseStats,
    #[serde(default)]
    pub talent_points: u32,
    #[serde(default)]
    pub archetype_id: Option<ArchetypeId>,
    #[serde(default)]
    pub weapon_id: Option<ItemId>,
    #[serde(default)]
    pub armor_id: Option<ItemId>,
    #[serde(default)]
    pub learned_abilities: BTreeSet<AbilityId>,
    #[serde(default)]
    pub inventory: BTreeMap<ItemId, u32>,
    #[serde(default)]
    pub current_node_id: Option<NodeId>,
}

impl CharacterSeed {
    /// A level 1 character built from this seed
    pub fn into_character(self, progression: &ProgressionManager) -> Character {
        let mut character = progression.new_character(self.id, &self.name);
        character.stats = self.stats;
        character.stats.health = character.stats.health.clamp(0, character.stats.max_health);
        character.talent_points = self.talent_points;
        character.archetype_id = self.archetype_id;
        character.weapon_id = self.weapon_id;
        character.armor_id = self.armor_id;
        character.learned_abilities = self.learned_abilities;
        character.inventory = self.inventory;
        character.inventory.retain(|_, quantity| *quantity > 0);
        character.current_node_id = self.current_node_id;
        character
    }
}

/// Everything sagad_init loads into a fresh database
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentBundle {
    pub archetypes: Vec<Archetype>,
    pub abilities: Vec<Ability>,
    pub items: Vec<Item>,
    pub enemies: Vec<Enemy>,
    pub nodes: Vec<StoryNode>,
    pub characters: Vec<CharacterSeed>,
}

impl ContentBundle {
    /// Parse a bundle from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("invalid content bundle")
    }

    /// Read a bundle from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_json(&text)
    }

    /// Check every effect string and enemy definition.
    ///
    /// Returns one message per problem; an empty list means the bundle is
    /// safe to load.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for item in &self.items {
            let checked = if item.usable {
                ConsumableEffect::parse(item.effect.as_deref()).map(|_| ())
            } else {
                parse_effects(item.effect.as_deref()).map(|_| ())
            };
            if let Err(e) = checked {
                problems.push(format!("{}: {}", ContentRef::Item(item.id), e));
            }
        }
        for ability in &self.abilities {
            if let Err(e) = parse_effects(ability.effect.as_deref()) {
                problems.push(format!("{}: {}", ContentRef::Ability(ability.id), e));
            }
        }

        for enemy in &self.enemies {
            if enemy.health <= 0 {
                problems.push(format!("enemy {}: health must be positive", enemy.id));
            }
            if let Some(special) = &enemy.special_attack {
                if !special.damage_multiplier.is_finite() || special.damage_multiplier < 0.0 {
                    problems.push(format!(
                        "enemy {}: special attack multiplier must be a non-negative number",
                        enemy.id
                    ));
                }
            }
        }

        let enemy_ids: BTreeSet<_> = self.enemies.iter().map(|e| e.id).collect();
        for node in &self.nodes {
            if let Some(enemy_id) = node.enemy_id {
                if !enemy_ids.contains(&enemy_id) {
                    problems.push(format!("story node {}: unknown enemy {}", node.id, enemy_id));
                }
            }
        }

        problems
    }
}

/// Load a bundle into an existing database in one transaction
pub async fn load_content(
    pool: &SqlitePool,
    bundle: &ContentBundle,
    progression: &ProgressionManager,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    for archetype in &bundle.archetypes {
        store::insert_archetype(&mut tx, archetype).await?;
    }
    for ability in &bundle.abilities {
        store::insert_ability(&mut tx, ability).await?;
    }
    for item in &bundle.items {
        store::insert_item(&mut tx, item).await?;
    }
    for enemy in &bundle.enemies {
        store::insert_enemy(&mut tx, enemy).await?;
    }
    for node in &bundle.nodes {
        story::insert_node(&mut tx, node).await?;
    }
    for seed in &bundle.characters {
        let character = seed.clone().into_character(progression);
        store::insert_character(&mut tx, &character).await?;
    }

    tx.commit().await?;

    info!(
        archetypes = bundle.archetypes.len(),
        abilities = bundle.abilities.len(),
        items = bundle.items.len(),
        enemies = bundle.enemies.len(),
        nodes = bundle.nodes.len(),
        characters = bundle.characters.len(),
        "Content loaded"
    );
    Ok(())
}

/// Initialize a new game server database
///
/// # Arguments
/// * `path` - Path to the SQLite database file (must not exist)
/// * `bundle` - Authored content to load
/// * `progression` - Rules used to set starting XP thresholds
///
/// # Errors
/// * Database file already exists
/// * Bundle contains malformed effect strings or broken references
/// * Database creation fails
pub async fn init_database(
    path: &Path,
    bundle: &ContentBundle,
    progression: &ProgressionManager,
) -> Result<()> {
    // Fail if database already exists
    if path.exists() {
        bail!(
            "Database file already exists: {}. Remove it first or use a different path.",
            path.display()
        );
    }

    let problems = bundle.validate();
    if !problems.is_empty() {
        for problem in &problems {
            warn!("{}", problem);
        }
        bail!("Content bundle has {} problem(s): {}", problems.len(), problems.join("; "));
    }

    info!("Creating new database at {}", path.display());

    let path_str = path
        .to_str()
        .with_context(|| format!("Database path is not valid UTF-8: {}", path.display()))?;
    let db = Database::new(Some(path_str)).await?;

    load_content(db.pool(), bundle, progression).await?;

    info!("Database initialization complete");
    Ok(())
}
