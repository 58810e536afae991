//! Game entities
//!
//! Authored content (archetypes, abilities, items, enemies) is immutable.
//! Characters and active combats are the only mutable records.

pub mod store;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::combat::Modifier;

pub type CharacterId = i64;
pub type AbilityId = i64;
pub type ArchetypeId = i64;
pub type ItemId = i64;
pub type EnemyId = i64;
pub type NodeId = i64;

/// A character's own stats before any bonuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BaseStats {
    pub health: i32,
    pub max_health: i32,
    pub skill: i32,
    pub luck: i32,
    pub stamina: i32,
    pub defense: i32,
}

impl Default for BaseStats {
    fn default() -> Self {
        Self {
            health: 100,
            max_health: 100,
            skill: 10,
            luck: 5,
            stamina: 20,
            defense: 0,
        }
    }
}

/// Flat bonuses granted by an archetype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatBonuses {
    pub health: i32,
    pub skill: i32,
    pub luck: i32,
    pub stamina: i32,
    pub defense: i32,
}

/// A player character
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    #[serde(flatten)]
    pub stats: BaseStats,
    pub level: u32,
    pub xp: u32,
    pub xp_to_next_level: u32,
    pub talent_points: u32,
    pub archetype_id: Option<ArchetypeId>,
    pub weapon_id: Option<ItemId>,
    pub armor_id: Option<ItemId>,
    #[serde(default)]
    pub learned_abilities: BTreeSet<AbilityId>,
    /// item id -> quantity held
    #[serde(default)]
    pub inventory: BTreeMap<ItemId, u32>,
    pub current_node_id: Option<NodeId>,
}

impl Character {
    /// Create a level 1 character with default stats
    pub fn new(id: CharacterId, name: &str, xp_to_next_level: u32) -> Self {
        Self {
            id,
            name: name.to_string(),
            stats: BaseStats::default(),
            level: 1,
            xp: 0,
            xp_to_next_level,
            talent_points: 0,
            archetype_id: None,
            weapon_id: None,
            armor_id: None,
            learned_abilities: BTreeSet::new(),
            inventory: BTreeMap::new(),
            current_node_id: None,
        }
    }

    pub fn is_defeated(&self) -> bool {
        self.stats.health <= 0
    }

    /// Take damage, clamping health at 0. Returns the damage actually taken.
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        let actual = amount.max(0).min(self.stats.health.max(0));
        self.stats.health -= actual;
        actual
    }

    /// Heal (cannot exceed max health). Returns the amount actually healed.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let actual = amount.max(0).min(self.stats.max_health - self.stats.health).max(0);
        self.stats.health += actual;
        actual
    }

    pub fn knows(&self, ability_id: AbilityId) -> bool {
        self.learned_abilities.contains(&ability_id)
    }

    pub fn quantity_of(&self, item_id: ItemId) -> u32 {
        self.inventory.get(&item_id).copied().unwrap_or(0)
    }
}

/// Authored character class template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Archetype {
    pub id: ArchetypeId,
    pub name: String,
    #[serde(default)]
    pub bonuses: StatBonuses,
    #[serde(default)]
    pub starting_ability_ids: Vec<AbilityId>,
    /// Abilities the story layer offers this archetype. Informational only:
    /// learning is gated by each ability's `allowed_archetype_ids`.
    #[serde(default)]
    pub learnable_ability_ids: Vec<AbilityId>,
}

/// How an ability takes effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AbilityKind {
    /// Always-on change to effective stats
    PassiveStat,
    /// Used explicitly in combat
    ActiveCombatAction,
    /// Always-on change to how attacks resolve
    PassiveCombatModifier,
}

impl AbilityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbilityKind::PassiveStat => "PASSIVE_STAT",
            AbilityKind::ActiveCombatAction => "ACTIVE_COMBAT_ACTION",
            AbilityKind::PassiveCombatModifier => "PASSIVE_COMBAT_MODIFIER",
        }
    }
}

impl FromStr for AbilityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PASSIVE_STAT" => Ok(AbilityKind::PassiveStat),
            "ACTIVE_COMBAT_ACTION" => Ok(AbilityKind::ActiveCombatAction),
            "PASSIVE_COMBAT_MODIFIER" => Ok(AbilityKind::PassiveCombatModifier),
            other => Err(format!("unknown ability type: {}", other)),
        }
    }
}

/// A learnable ability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ability {
    pub id: AbilityId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AbilityKind,
    pub effect: Option<String>,
    #[serde(default)]
    pub talent_point_cost: u32,
    #[serde(default = "default_level_requirement")]
    pub level_requirement: u32,
    #[serde(default)]
    pub prerequisites: Vec<AbilityId>,
    /// None means every archetype may learn it
    #[serde(default)]
    pub allowed_archetype_ids: Option<Vec<ArchetypeId>>,
}

fn default_level_requirement() -> u32 {
    1
}

/// Item categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Weapon,
    Armor,
    Potion,
    Key,
    Misc,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemKind::Weapon => "weapon",
            ItemKind::Armor => "armor",
            ItemKind::Potion => "potion",
            ItemKind::Key => "key",
            ItemKind::Misc => "misc",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weapon" => Ok(ItemKind::Weapon),
            "armor" | "armour" => Ok(ItemKind::Armor),
            "potion" | "consumable" => Ok(ItemKind::Potion),
            "key" => Ok(ItemKind::Key),
            "misc" => Ok(ItemKind::Misc),
            other => Err(format!("unknown item type: {}", other)),
        }
    }
}

/// An authored item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub effect: Option<String>,
    /// Consumable (true) or equip-only (false)
    #[serde(default)]
    pub usable: bool,
}

/// A telegraphed attack that charges for some rounds before landing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialAttack {
    pub name: String,
    pub damage_multiplier: f64,
    pub charge_turns: u32,
    pub telegraph_text: String,
    pub execute_text: String,
}

/// An enemy template; each combat copies its health into the active record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enemy {
    pub id: EnemyId,
    pub name: String,
    pub health: i32,
    pub skill: i32,
    /// Base damage of the standard attack
    #[serde(default = "default_enemy_damage")]
    pub damage: i32,
    #[serde(default)]
    pub xp_reward: u32,
    #[serde(default)]
    pub special_attack: Option<SpecialAttack>,
}

fn default_enemy_damage() -> i32 {
    5
}

/// The one in-progress fight of a character
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveCombat {
    pub character_id: CharacterId,
    pub enemy_id: EnemyId,
    /// Story node that started the fight
    pub node_id: Option<NodeId>,
    pub enemy_health: i32,
    /// 0 while the enemy is not charging
    pub enemy_charge_turns: u32,
    /// The player defended during the current charge; the special attack
    /// lands as if they were defending
    pub defended_while_charging: bool,
    /// Stamina pool for ability costs, filled at combat start
    pub player_stamina: i32,
    /// One-shot item effects that last until the fight ends
    pub buffs: Vec<Modifier>,
    pub round: u32,
    pub started_at: String,
    pub last_action_at: String,
}

impl ActiveCombat {
    pub fn new(
        character_id: CharacterId,
        enemy: &Enemy,
        node_id: Option<NodeId>,
        player_stamina: i32,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            character_id,
            enemy_id: enemy.id,
            node_id,
            enemy_health: enemy.health,
            enemy_charge_turns: 0,
            defended_while_charging: false,
            player_stamina,
            buffs: Vec::new(),
            round: 0,
            started_at: now.clone(),
            last_action_at: now,
        }
    }

    pub fn is_enemy_charging(&self) -> bool {
        self.enemy_charge_turns > 0
    }

    /// Apply damage to the enemy, clamping at 0. Returns the damage dealt.
    pub fn damage_enemy(&mut self, amount: i32) -> i32 {
        let actual = amount.max(0).min(self.enemy_health);
        self.enemy_health -= actual;
        actual
    }

    pub fn phase(&self) -> CombatPhase {
        if self.enemy_health <= 0 {
            CombatPhase::Victory
        } else if self.is_enemy_charging() {
            CombatPhase::EnemyCharging
        } else {
            CombatPhase::InCombat
        }
    }
}

/// Where a character stands in the combat lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatPhase {
    NotInCombat,
    InCombat,
    EnemyCharging,
    Victory,
    Defeat,
}

/// How a combat ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatOutcome {
    Victory,
    Defeat,
}

impl From<CombatOutcome> for CombatPhase {
    fn from(outcome: CombatOutcome) -> Self {
        match outcome {
            CombatOutcome::Victory => CombatPhase::Victory,
            CombatOutcome::Defeat => CombatPhase::Defeat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ogre() -> Enemy {
        Enemy {
            id: 1,
            name: "Morcos Ogre".to_string(),
            health: 60,
            skill: 12,
            damage: 6,
            xp_reward: 50,
            special_attack: None,
        }
    }

    #[test]
    fn test_character_health_clamps() {
        let mut c = Character::new(1, "Ada", 100);
        assert_eq!(c.take_damage(30), 30);
        assert_eq!(c.stats.health, 70);
        assert_eq!(c.heal(50), 30);
        assert_eq!(c.stats.health, 100);
        assert_eq!(c.take_damage(500), 100);
        assert_eq!(c.stats.health, 0);
        assert!(c.is_defeated());
        assert_eq!(c.take_damage(-5), 0);
    }

    #[test]
    fn test_enemy_health_never_negative() {
        let mut combat = ActiveCombat::new(1, &ogre(), None, 20);
        assert_eq!(combat.damage_enemy(45), 45);
        assert_eq!(combat.damage_enemy(45), 15);
        assert_eq!(combat.enemy_health, 0);
        assert_eq!(combat.phase(), CombatPhase::Victory);
    }

    #[test]
    fn test_phase_tracks_charging() {
        let mut combat = ActiveCombat::new(1, &ogre(), None, 20);
        assert_eq!(combat.phase(), CombatPhase::InCombat);
        combat.enemy_charge_turns = 2;
        assert_eq!(combat.phase(), CombatPhase::EnemyCharging);
    }

    #[test]
    fn test_ability_kind_round_trip() {
        for kind in [
            AbilityKind::PassiveStat,
            AbilityKind::ActiveCombatAction,
            AbilityKind::PassiveCombatModifier,
        ] {
            assert_eq!(kind.as_str().parse::<AbilityKind>().unwrap(), kind);
        }
        assert!("ULTIMATE".parse::<AbilityKind>().is_err());
    }

    #[test]
    fn test_enemy_json_shape() {
        let enemy: Enemy = serde_json::from_value(serde_json::json!({
            "id": 3,
            "name": "Morcos Ogre",
            "health": 60,
            "skill": 12,
            "specialAttack": {
                "name": "Crushing Blow",
                "damageMultiplier": 2.5,
                "chargeTurns": 1,
                "telegraphText": "The ogre raises its club high...",
                "executeText": "The club comes crashing down!"
            }
        }))
        .unwrap();
        assert_eq!(enemy.damage, 5);
        assert_eq!(enemy.special_attack.unwrap().charge_turns, 1);
    }
}
