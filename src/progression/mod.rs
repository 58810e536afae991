//! Character progression
//!
//! XP and leveling, talent points, ability learning and archetype choice.
//! The rules here operate on an in-memory [`Character`]; [`CharacterService`]
//! wraps them in per-character locking and a database transaction.

mod service;

pub use service::{CharacterService, CharacterSheet};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::combat::Stat;
use crate::error::GameError;
use crate::models::{Ability, Archetype, Character, Enemy};

/// Progression tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    /// XP needed to go from level 1 to level 2
    pub base_xp_to_next_level: u32,
    /// Each level needs this many times the XP of the previous one
    pub xp_growth: f64,
    pub talent_points_per_level: u32,
    /// Stats a talent point can raise
    pub trainable_stats: Vec<Stat>,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            base_xp_to_next_level: 100,
            xp_growth: 1.5,
            talent_points_per_level: 1,
            trainable_stats: vec![Stat::Skill, Stat::Luck, Stat::Defense, Stat::Stamina],
        }
    }
}

/// What an XP award did to a character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XpAward {
    pub xp_gained: u32,
    pub levels_gained: u32,
    pub talent_points_gained: u32,
    pub level: u32,
    pub xp: u32,
    pub xp_to_next_level: u32,
}

/// Applies progression rules to characters
#[derive(Debug, Clone, Default)]
pub struct ProgressionManager {
    config: ProgressionConfig,
}

impl ProgressionManager {
    pub fn new(config: ProgressionConfig) -> Self {
        Self { config }
    }

    /// XP needed to advance from `level` to the next one
    pub fn xp_threshold(&self, level: u32) -> u32 {
        let exponent = level.saturating_sub(1) as i32;
        let threshold =
            (self.config.base_xp_to_next_level as f64 * self.config.xp_growth.powi(exponent)).round();
        if threshold >= u32::MAX as f64 {
            u32::MAX
        } else {
            (threshold as u32).max(1)
        }
    }

    /// Create a fresh level 1 character
    pub fn new_character(&self, id: i64, name: &str) -> Character {
        Character::new(id, name, self.xp_threshold(1))
    }

    /// Grant a defeated enemy's XP reward
    pub fn award_victory(&self, character: &mut Character, enemy: &Enemy) -> XpAward {
        self.award_xp(character, enemy.xp_reward)
    }

    /// Add XP and level up as many times as it allows.
    ///
    /// Each level up subtracts the current threshold, raises the level,
    /// recomputes the threshold and grants talent points.
    pub fn award_xp(&self, character: &mut Character, amount: u32) -> XpAward {
        character.xp = character.xp.saturating_add(amount);
        if character.xp_to_next_level == 0 {
            character.xp_to_next_level = self.xp_threshold(character.level);
        }

        let mut levels_gained = 0;
        while character.xp >= character.xp_to_next_level {
            character.xp -= character.xp_to_next_level;
            character.level += 1;
            character.xp_to_next_level = self.xp_threshold(character.level);
            character.talent_points += self.config.talent_points_per_level;
            levels_gained += 1;
        }

        if levels_gained > 0 {
            info!(
                character_id = character.id,
                level = character.level,
                talent_points = character.talent_points,
                "Character leveled up"
            );
        }

        XpAward {
            xp_gained: amount,
            levels_gained,
            talent_points_gained: levels_gained * self.config.talent_points_per_level,
            level: character.level,
            xp: character.xp,
            xp_to_next_level: character.xp_to_next_level,
        }
    }

    /// Spend one talent point on a trainable stat. Returns the new base value.
    pub fn spend_talent_point(&self, character: &mut Character, stat: &str) -> Result<i32, GameError> {
        let parsed: Stat = stat
            .trim()
            .to_lowercase()
            .parse()
            .map_err(|_| GameError::StatNotTrainable(stat.to_string()))?;
        if !self.config.trainable_stats.contains(&parsed) {
            return Err(GameError::StatNotTrainable(stat.to_string()));
        }
        if character.talent_points == 0 {
            return Err(GameError::NoTalentPoints);
        }

        let stats = &mut character.stats;
        let value = match parsed {
            Stat::Skill => {
                stats.skill += 1;
                stats.skill
            }
            Stat::Luck => {
                stats.luck += 1;
                stats.luck
            }
            Stat::Stamina => {
                stats.stamina += 1;
                stats.stamina
            }
            Stat::Defense => {
                stats.defense += 1;
                stats.defense
            }
            Stat::Health => {
                stats.max_health += 1;
                stats.health += 1;
                stats.max_health
            }
            Stat::Damage => return Err(GameError::StatNotTrainable(stat.to_string())),
        };
        character.talent_points -= 1;
        Ok(value)
    }

    /// Learn an ability, paying its talent point cost.
    ///
    /// Checks run in a fixed order so the first failing rule is the one
    /// reported: level, prerequisites, talent points, already learned,
    /// archetype.
    pub fn learn_ability(&self, character: &mut Character, ability: &Ability) -> Result<(), GameError> {
        if character.level < ability.level_requirement {
            return Err(GameError::LevelTooLow {
                required: ability.level_requirement,
                level: character.level,
            });
        }

        let missing: Vec<i64> = ability
            .prerequisites
            .iter()
            .copied()
            .filter(|id| !character.knows(*id))
            .collect();
        if !missing.is_empty() {
            return Err(GameError::PrerequisitesNotMet(missing));
        }

        if character.talent_points < ability.talent_point_cost {
            return Err(GameError::InsufficientTalentPoints {
                cost: ability.talent_point_cost,
                available: character.talent_points,
            });
        }

        if character.knows(ability.id) {
            return Err(GameError::AlreadyLearned(ability.id));
        }

        if let Some(allowed) = &ability.allowed_archetype_ids {
            let permitted = character
                .archetype_id
                .map(|id| allowed.contains(&id))
                .unwrap_or(false);
            if !permitted {
                return Err(GameError::ArchetypeNotAllowed(ability.id));
            }
        }

        character.talent_points -= ability.talent_point_cost;
        character.learned_abilities.insert(ability.id);
        Ok(())
    }

    /// Choose an archetype once: raises max health by its health bonus and
    /// grants its starting abilities for free
    pub fn select_archetype(
        &self,
        character: &mut Character,
        archetype: &Archetype,
    ) -> Result<(), GameError> {
        if character.archetype_id.is_some() {
            return Err(GameError::ArchetypeAlreadySelected);
        }

        character.archetype_id = Some(archetype.id);
        let bonus = archetype.bonuses.health;
        character.stats.max_health = (character.stats.max_health + bonus).max(1);
        character.stats.health = (character.stats.health + bonus).clamp(0, character.stats.max_health);
        character
            .learned_abilities
            .extend(archetype.starting_ability_ids.iter().copied());
        Ok(())
    }
}
