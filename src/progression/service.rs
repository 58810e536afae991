//! Transactional progression operations

use std::sync::Arc;

use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use super::ProgressionManager;
use crate::combat::EffectiveStats;
use crate::error::GameError;
use crate::locks::CharacterLocks;
use crate::models::{store, AbilityId, ArchetypeId, Character, CharacterId, CombatPhase};

/// A character together with the stats combat would use right now
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterSheet {
    pub character: Character,
    pub effective_stats: EffectiveStats,
    /// `not_in_combat`, `in_combat` or `enemy_charging`
    pub combat_phase: CombatPhase,
}

/// Runs progression rules against stored characters
pub struct CharacterService {
    pool: SqlitePool,
    progression: Arc<ProgressionManager>,
    locks: Arc<CharacterLocks>,
}

impl CharacterService {
    pub fn new(
        pool: SqlitePool,
        progression: Arc<ProgressionManager>,
        locks: Arc<CharacterLocks>,
    ) -> Self {
        Self {
            pool,
            progression,
            locks,
        }
    }

    pub async fn sheet(&self, character_id: CharacterId) -> Result<CharacterSheet, GameError> {
        let mut conn = self.pool.acquire().await?;
        let character = store::load_character(&mut conn, character_id).await?;
        build_sheet(&mut conn, character).await
    }

    /// Spend one talent point on a base stat
    pub async fn spend_talent_point(
        &self,
        character_id: CharacterId,
        stat: &str,
    ) -> Result<CharacterSheet, GameError> {
        let _guard = self.locks.lock(character_id).await;
        let mut tx = self.pool.begin().await?;

        let mut character = store::load_character(&mut tx, character_id).await?;
        let value = self.progression.spend_talent_point(&mut character, stat)?;
        store::save_character(&mut tx, &character).await?;
        let sheet = build_sheet(&mut tx, character).await?;
        tx.commit().await?;

        info!(character_id, stat, value, "Talent point spent");
        Ok(sheet)
    }

    pub async fn learn_ability(
        &self,
        character_id: CharacterId,
        ability_id: AbilityId,
    ) -> Result<CharacterSheet, GameError> {
        let _guard = self.locks.lock(character_id).await;
        let mut tx = self.pool.begin().await?;

        let mut character = store::load_character(&mut tx, character_id).await?;
        let ability = store::load_ability(&mut tx, ability_id).await?;
        self.progression.learn_ability(&mut character, &ability)?;
        store::save_character(&mut tx, &character).await?;
        // A broken passive effect must not be learned
        let sheet = build_sheet(&mut tx, character).await?;
        tx.commit().await?;

        info!(character_id, ability_id, ability = %ability.name, "Ability learned");
        Ok(sheet)
    }

    pub async fn select_archetype(
        &self,
        character_id: CharacterId,
        archetype_id: ArchetypeId,
    ) -> Result<CharacterSheet, GameError> {
        let _guard = self.locks.lock(character_id).await;
        let mut tx = self.pool.begin().await?;

        let mut character = store::load_character(&mut tx, character_id).await?;
        let archetype = store::load_archetype(&mut tx, archetype_id).await?;
        self.progression.select_archetype(&mut character, &archetype)?;
        store::save_character(&mut tx, &character).await?;
        let sheet = build_sheet(&mut tx, character).await?;
        tx.commit().await?;

        info!(character_id, archetype = %archetype.name, "Archetype selected");
        Ok(sheet)
    }
}

async fn build_sheet(
    conn: &mut SqliteConnection,
    character: Character,
) -> Result<CharacterSheet, GameError> {
    let loadout = store::load_loadout(&mut *conn, &character).await?;
    let effective_stats = loadout.effective_stats(&character)?;
    let combat_phase = match store::load_active_combat(&mut *conn, character.id).await? {
        Some(combat) => combat.phase(),
        None => CombatPhase::NotInCombat,
    };
    Ok(CharacterSheet {
        character,
        effective_stats,
        combat_phase,
    })
}
