//! Persistence for content, characters and active combats
//!
//! Every function takes a plain connection so callers can run several of
//! them inside one transaction (`&mut *tx`).

use std::collections::{BTreeMap, BTreeSet};

use sqlx::SqliteConnection;

use super::{
    Ability, AbilityId, ActiveCombat, Archetype, ArchetypeId, Character, CharacterId, Enemy,
    EnemyId, Item, ItemId,
};
use crate::combat::Loadout;
use crate::error::GameError;

fn decode_error(message: String) -> GameError {
    GameError::Database(sqlx::Error::Decode(message.into()))
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct ArchetypeRow {
    id: i64,
    name: String,
    bonuses: String,
    starting_ability_ids: String,
    learnable_ability_ids: String,
}

impl ArchetypeRow {
    fn into_archetype(self) -> Result<Archetype, GameError> {
        Ok(Archetype {
            id: self.id,
            name: self.name,
            bonuses: serde_json::from_str(&self.bonuses)?,
            starting_ability_ids: serde_json::from_str(&self.starting_ability_ids)?,
            learnable_ability_ids: serde_json::from_str(&self.learnable_ability_ids)?,
        })
    }
}

pub async fn load_archetype(
    conn: &mut SqliteConnection,
    id: ArchetypeId,
) -> Result<Archetype, GameError> {
    let row: Option<ArchetypeRow> = sqlx::query_as(
        r#"
        SELECT id, name, bonuses, starting_ability_ids, learnable_ability_ids
        FROM archetypes WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.ok_or_else(|| GameError::not_found("archetype", id))?
        .into_archetype()
}

pub async fn insert_archetype(
    conn: &mut SqliteConnection,
    archetype: &Archetype,
) -> Result<(), GameError> {
    sqlx::query(
        r#"
        INSERT INTO archetypes (id, name, bonuses, starting_ability_ids, learnable_ability_ids)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(archetype.id)
    .bind(&archetype.name)
    .bind(serde_json::to_string(&archetype.bonuses)?)
    .bind(serde_json::to_string(&archetype.starting_ability_ids)?)
    .bind(serde_json::to_string(&archetype.learnable_ability_ids)?)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[derive(sqlx::FromRow)]
struct AbilityRow {
    id: i64,
    name: String,
    kind: String,
    effect: Option<String>,
    talent_point_cost: u32,
    level_requirement: u32,
    prerequisites: String,
    allowed_archetype_ids: Option<String>,
}

impl AbilityRow {
    fn into_ability(self) -> Result<Ability, GameError> {
        let allowed_archetype_ids = match self.allowed_archetype_ids {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        };
        Ok(Ability {
            id: self.id,
            name: self.name,
            kind: self.kind.parse().map_err(decode_error)?,
            effect: self.effect,
            talent_point_cost: self.talent_point_cost,
            level_requirement: self.level_requirement,
            prerequisites: serde_json::from_str(&self.prerequisites)?,
            allowed_archetype_ids,
        })
    }
}

pub async fn load_ability(conn: &mut SqliteConnection, id: AbilityId) -> Result<Ability, GameError> {
    let row: Option<AbilityRow> = sqlx::query_as(
        r#"
        SELECT id, name, kind, effect, talent_point_cost, level_requirement,
               prerequisites, allowed_archetype_ids
        FROM abilities WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.ok_or_else(|| GameError::not_found("ability", id))?
        .into_ability()
}

/// Load several abilities, ordered by id
pub async fn load_abilities(
    conn: &mut SqliteConnection,
    ids: impl IntoIterator<Item = AbilityId>,
) -> Result<Vec<Ability>, GameError> {
    let ids: BTreeSet<AbilityId> = ids.into_iter().collect();
    let mut abilities = Vec::with_capacity(ids.len());
    for id in ids {
        abilities.push(load_ability(&mut *conn, id).await?);
    }
    Ok(abilities)
}

pub async fn insert_ability(conn: &mut SqliteConnection, ability: &Ability) -> Result<(), GameError> {
    let allowed = match &ability.allowed_archetype_ids {
        Some(ids) => Some(serde_json::to_string(ids)?),
        None => None,
    };

    sqlx::query(
        r#"
        INSERT INTO abilities (id, name, kind, effect, talent_point_cost, level_requirement,
                               prerequisites, allowed_archetype_ids)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(ability.id)
    .bind(&ability.name)
    .bind(ability.kind.as_str())
    .bind(&ability.effect)
    .bind(ability.talent_point_cost)
    .bind(ability.level_requirement)
    .bind(serde_json::to_string(&ability.prerequisites)?)
    .bind(allowed)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: i64,
    name: String,
    kind: String,
    effect: Option<String>,
    usable: bool,
}

impl ItemRow {
    fn into_item(self) -> Result<Item, GameError> {
        Ok(Item {
            id: self.id,
            name: self.name,
            kind: self.kind.parse().map_err(decode_error)?,
            effect: self.effect,
            usable: self.usable,
        })
    }
}

pub async fn load_item(conn: &mut SqliteConnection, id: ItemId) -> Result<Item, GameError> {
    let row: Option<ItemRow> =
        sqlx::query_as("SELECT id, name, kind, effect, usable FROM items WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    row.ok_or_else(|| GameError::not_found("item", id))?
        .into_item()
}

pub async fn insert_item(conn: &mut SqliteConnection, item: &Item) -> Result<(), GameError> {
    sqlx::query("INSERT INTO items (id, name, kind, effect, usable) VALUES (?, ?, ?, ?, ?)")
        .bind(item.id)
        .bind(&item.name)
        .bind(item.kind.to_string())
        .bind(&item.effect)
        .bind(item.usable)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

#[derive(sqlx::FromRow)]
struct EnemyRow {
    id: i64,
    name: String,
    health: i32,
    skill: i32,
    damage: i32,
    xp_reward: u32,
    special_attack: Option<String>,
}

impl EnemyRow {
    fn into_enemy(self) -> Result<Enemy, GameError> {
        let special_attack = match self.special_attack {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        };
        Ok(Enemy {
            id: self.id,
            name: self.name,
            health: self.health,
            skill: self.skill,
            damage: self.damage,
            xp_reward: self.xp_reward,
            special_attack,
        })
    }
}

pub async fn load_enemy(conn: &mut SqliteConnection, id: EnemyId) -> Result<Enemy, GameError> {
    let row: Option<EnemyRow> = sqlx::query_as(
        "SELECT id, name, health, skill, damage, xp_reward, special_attack FROM enemies WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.ok_or_else(|| GameError::not_found("enemy", id))?
        .into_enemy()
}

pub async fn insert_enemy(conn: &mut SqliteConnection, enemy: &Enemy) -> Result<(), GameError> {
    let special = match &enemy.special_attack {
        Some(special) => Some(serde_json::to_string(special)?),
        None => None,
    };

    sqlx::query(
        r#"
        INSERT INTO enemies (id, name, health, skill, damage, xp_reward, special_attack)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(enemy.id)
    .bind(&enemy.name)
    .bind(enemy.health)
    .bind(enemy.skill)
    .bind(enemy.damage)
    .bind(enemy.xp_reward)
    .bind(special)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Characters
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct CharacterRow {
    id: i64,
    name: String,
    health: i32,
    max_health: i32,
    skill: i32,
    luck: i32,
    stamina: i32,
    defense: i32,
    level: u32,
    xp: u32,
    xp_to_next_level: u32,
    talent_points: u32,
    archetype_id: Option<i64>,
    weapon_id: Option<i64>,
    armor_id: Option<i64>,
    current_node_id: Option<i64>,
}

impl CharacterRow {
    fn into_character(
        self,
        learned_abilities: BTreeSet<AbilityId>,
        inventory: BTreeMap<ItemId, u32>,
    ) -> Character {
        Character {
            id: self.id,
            name: self.name,
            stats: super::BaseStats {
                health: self.health,
                max_health: self.max_health,
                skill: self.skill,
                luck: self.luck,
                stamina: self.stamina,
                defense: self.defense,
            },
            level: self.level,
            xp: self.xp,
            xp_to_next_level: self.xp_to_next_level,
            talent_points: self.talent_points,
            archetype_id: self.archetype_id,
            weapon_id: self.weapon_id,
            armor_id: self.armor_id,
            learned_abilities,
            inventory,
            current_node_id: self.current_node_id,
        }
    }
}

/// Load a character with learned abilities and inventory
pub async fn load_character(
    conn: &mut SqliteConnection,
    id: CharacterId,
) -> Result<Character, GameError> {
    let row: Option<CharacterRow> = sqlx::query_as(
        r#"
        SELECT id, name, health, max_health, skill, luck, stamina, defense, level, xp,
               xp_to_next_level, talent_points, archetype_id, weapon_id, armor_id, current_node_id
        FROM characters WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    let row = row.ok_or_else(|| GameError::not_found("character", id))?;

    let abilities: Vec<(i64,)> = sqlx::query_as(
        "SELECT ability_id FROM character_abilities WHERE character_id = ? ORDER BY ability_id",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let items: Vec<(i64, u32)> = sqlx::query_as(
        "SELECT item_id, quantity FROM character_items WHERE character_id = ? ORDER BY item_id",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(row.into_character(
        abilities.into_iter().map(|(a,)| a).collect(),
        items.into_iter().collect(),
    ))
}

pub async fn insert_character(
    conn: &mut SqliteConnection,
    character: &Character,
) -> Result<(), GameError> {
    sqlx::query(
        r#"
        INSERT INTO characters (id, name, health, max_health, skill, luck, stamina, defense,
                                level, xp, xp_to_next_level, talent_points, archetype_id,
                                weapon_id, armor_id, current_node_id)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(character.id)
    .bind(&character.name)
    .bind(character.stats.health)
    .bind(character.stats.max_health)
    .bind(character.stats.skill)
    .bind(character.stats.luck)
    .bind(character.stats.stamina)
    .bind(character.stats.defense)
    .bind(character.level)
    .bind(character.xp)
    .bind(character.xp_to_next_level)
    .bind(character.talent_points)
    .bind(character.archetype_id)
    .bind(character.weapon_id)
    .bind(character.armor_id)
    .bind(character.current_node_id)
    .execute(&mut *conn)
    .await?;

    save_abilities_and_items(conn, character).await
}

/// Write back every mutable part of a character
pub async fn save_character(
    conn: &mut SqliteConnection,
    character: &Character,
) -> Result<(), GameError> {
    let updated_at = chrono::Utc::now().to_rfc3339();

    let result = sqlx::query(
        r#"
        UPDATE characters
        SET health = ?, max_health = ?, skill = ?, luck = ?, stamina = ?, defense = ?,
            level = ?, xp = ?, xp_to_next_level = ?, talent_points = ?, archetype_id = ?,
            weapon_id = ?, armor_id = ?, current_node_id = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(character.stats.health)
    .bind(character.stats.max_health)
    .bind(character.stats.skill)
    .bind(character.stats.luck)
    .bind(character.stats.stamina)
    .bind(character.stats.defense)
    .bind(character.level)
    .bind(character.xp)
    .bind(character.xp_to_next_level)
    .bind(character.talent_points)
    .bind(character.archetype_id)
    .bind(character.weapon_id)
    .bind(character.armor_id)
    .bind(character.current_node_id)
    .bind(&updated_at)
    .bind(character.id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(GameError::not_found("character", character.id));
    }

    save_abilities_and_items(conn, character).await
}

async fn save_abilities_and_items(
    conn: &mut SqliteConnection,
    character: &Character,
) -> Result<(), GameError> {
    // Abilities are never unlearned
    for ability_id in &character.learned_abilities {
        sqlx::query(
            "INSERT OR IGNORE INTO character_abilities (character_id, ability_id) VALUES (?, ?)",
        )
        .bind(character.id)
        .bind(ability_id)
        .execute(&mut *conn)
        .await?;
    }

    sqlx::query("DELETE FROM character_items WHERE character_id = ?")
        .bind(character.id)
        .execute(&mut *conn)
        .await?;
    for (item_id, quantity) in character.inventory.iter().filter(|(_, q)| **q > 0) {
        sqlx::query("INSERT INTO character_items (character_id, item_id, quantity) VALUES (?, ?, ?)")
            .bind(character.id)
            .bind(item_id)
            .bind(quantity)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

/// Load everything that feeds a character's effective stats
pub async fn load_loadout(
    conn: &mut SqliteConnection,
    character: &Character,
) -> Result<Loadout, GameError> {
    let archetype = match character.archetype_id {
        Some(id) => Some(load_archetype(&mut *conn, id).await?),
        None => None,
    };
    let weapon = match character.weapon_id {
        Some(id) => Some(load_item(&mut *conn, id).await?),
        None => None,
    };
    let armor = match character.armor_id {
        Some(id) => Some(load_item(&mut *conn, id).await?),
        None => None,
    };
    let abilities = load_abilities(&mut *conn, character.learned_abilities.iter().copied()).await?;

    Ok(Loadout {
        archetype,
        weapon,
        armor,
        abilities,
    })
}

// ---------------------------------------------------------------------------
// Active combats
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct ActiveCombatRow {
    character_id: i64,
    enemy_id: i64,
    node_id: Option<i64>,
    enemy_health: i32,
    enemy_charge_turns: u32,
    defended_while_charging: bool,
    player_stamina: i32,
    buffs: String,
    round: u32,
    started_at: String,
    last_action_at: String,
}

impl ActiveCombatRow {
    fn into_combat(self) -> Result<ActiveCombat, GameError> {
        Ok(ActiveCombat {
            character_id: self.character_id,
            enemy_id: self.enemy_id,
            node_id: self.node_id,
            enemy_health: self.enemy_health,
            enemy_charge_turns: self.enemy_charge_turns,
            defended_while_charging: self.defended_while_charging,
            player_stamina: self.player_stamina,
            buffs: serde_json::from_str(&self.buffs)?,
            round: self.round,
            started_at: self.started_at,
            last_action_at: self.last_action_at,
        })
    }
}

pub async fn load_active_combat(
    conn: &mut SqliteConnection,
    character_id: CharacterId,
) -> Result<Option<ActiveCombat>, GameError> {
    let row: Option<ActiveCombatRow> = sqlx::query_as(
        r#"
        SELECT character_id, enemy_id, node_id, enemy_health, enemy_charge_turns,
               defended_while_charging, player_stamina, buffs, round, started_at,
               last_action_at
        FROM active_combats WHERE character_id = ?
        "#,
    )
    .bind(character_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|r| r.into_combat()).transpose()
}

/// Insert a new combat. Returns false when the character already has one.
pub async fn insert_active_combat(
    conn: &mut SqliteConnection,
    combat: &ActiveCombat,
) -> Result<bool, GameError> {
    let result = sqlx::query(
        r#"
        INSERT INTO active_combats (character_id, enemy_id, node_id, enemy_health,
                                    enemy_charge_turns, defended_while_charging,
                                    player_stamina, buffs, round, started_at,
                                    last_action_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (character_id) DO NOTHING
        "#,
    )
    .bind(combat.character_id)
    .bind(combat.enemy_id)
    .bind(combat.node_id)
    .bind(combat.enemy_health)
    .bind(combat.enemy_charge_turns)
    .bind(combat.defended_while_charging)
    .bind(combat.player_stamina)
    .bind(serde_json::to_string(&combat.buffs)?)
    .bind(combat.round)
    .bind(&combat.started_at)
    .bind(&combat.last_action_at)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn update_active_combat(
    conn: &mut SqliteConnection,
    combat: &ActiveCombat,
) -> Result<(), GameError> {
    sqlx::query(
        r#"
        UPDATE active_combats
        SET enemy_health = ?, enemy_charge_turns = ?, defended_while_charging = ?,
            player_stamina = ?, buffs = ?, round = ?, last_action_at = ?
        WHERE character_id = ?
        "#,
    )
    .bind(combat.enemy_health)
    .bind(combat.enemy_charge_turns)
    .bind(combat.defended_while_charging)
    .bind(combat.player_stamina)
    .bind(serde_json::to_string(&combat.buffs)?)
    .bind(combat.round)
    .bind(&combat.last_action_at)
    .bind(combat.character_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Stamp the last action time. Returns false when no combat exists.
///
/// Used as the first statement of a round so the transaction takes the
/// write lock before reading anything.
pub async fn touch_active_combat(
    conn: &mut SqliteConnection,
    character_id: CharacterId,
    now: &str,
) -> Result<bool, GameError> {
    let result =
        sqlx::query("UPDATE active_combats SET last_action_at = ? WHERE character_id = ?")
            .bind(now)
            .bind(character_id)
            .execute(&mut *conn)
            .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_active_combat(
    conn: &mut SqliteConnection,
    character_id: CharacterId,
) -> Result<bool, GameError> {
    let result = sqlx::query("DELETE FROM active_combats WHERE character_id = ?")
        .bind(character_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}
