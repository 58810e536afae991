//! Action resolution
//!
//! Turns a single player or enemy action into an [`ActionOutcome`] using
//! opposed checks: each side rolls one die and adds its skill, and the
//! attacker lands a hit only when its total is strictly higher. Nothing here
//! touches storage; the caller applies the returned numbers.

use serde::{Deserialize, Serialize};

use super::damage::{CombatModifiers, Hit};
use super::dice::{DieRoller, OpposedCheck, RollDetail};
use super::effects::{parse_effects, MalformedEffectError, Modifier, Resource, Stat};
use super::stats::EffectiveStats;
use crate::error::{ContentRef, GameError};
use crate::models::{Ability, AbilityId, AbilityKind, Enemy, Item, ItemId};

/// Combat rule tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Faces on the die used for opposed checks
    pub die_sides: u32,
    /// Margin at which a hit becomes a critical hit
    pub critical_margin: i32,
    pub critical_multiplier: f64,
    /// Base damage of a player attack without a weapon
    pub unarmed_damage: i32,
    /// Base damage of a player attack with a weapon equipped
    pub weapon_damage: i32,
    /// Smallest damage a landed hit can deal
    pub min_hit_damage: i32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            die_sides: 20,
            critical_margin: 10,
            critical_multiplier: 2.0,
            unarmed_damage: 2,
            weapon_damage: 5,
            min_hit_damage: 1,
        }
    }
}

/// A validated player action request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerAction {
    Attack,
    Defend,
    UseItem(ItemId),
    UseAbility(AbilityId),
}

impl PlayerAction {
    /// Validate a raw action request.
    ///
    /// `item_id` is only checked (present and positive) for `use_item`, and
    /// `ability_id` only for `use_ability`.
    pub fn parse(
        action: &str,
        item_id: Option<i64>,
        ability_id: Option<i64>,
    ) -> Result<Self, GameError> {
        match action.trim().to_lowercase().as_str() {
            "attack" => Ok(PlayerAction::Attack),
            "defend" => Ok(PlayerAction::Defend),
            "use_item" => match item_id {
                Some(id) if id > 0 => Ok(PlayerAction::UseItem(id)),
                Some(id) => Err(GameError::InvalidItemId(format!(
                    "{} is not a positive integer",
                    id
                ))),
                None => Err(GameError::InvalidItemId(
                    "itemId is required for use_item".to_string(),
                )),
            },
            "use_ability" => match ability_id {
                Some(id) if id > 0 => Ok(PlayerAction::UseAbility(id)),
                Some(id) => Err(GameError::InvalidAbilityId(format!(
                    "{} is not a positive integer",
                    id
                ))),
                None => Err(GameError::InvalidAbilityId(
                    "abilityId is required for use_ability".to_string(),
                )),
            },
            other => Err(GameError::InvalidAction(format!(
                "unsupported action '{}'",
                other
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PlayerAction::Attack => "attack",
            PlayerAction::Defend => "defend",
            PlayerAction::UseItem(_) => "use_item",
            PlayerAction::UseAbility(_) => "use_ability",
        }
    }
}

/// Who acted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    Player,
    Enemy,
}

/// What an action achieved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeTag {
    Hit,
    Miss,
    CriticalHit,
    Evaded,
    Defended,
    ItemUsed,
    Charging,
    NoEffect,
}

/// One resolved action, as reported to the player
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub actor: Actor,
    pub action_type: &'static str,
    pub description: String,
    pub attacker_roll: Option<RollDetail>,
    pub defender_roll: Option<RollDetail>,
    pub result: OutcomeTag,
    /// Damage that landed on the target
    pub damage: i32,
    /// Health restored to the actor
    pub healed: i32,
    /// Target health after the action
    pub target_health: i32,
}

/// The player's side of the fight at the moment an action resolves
#[derive(Debug, Clone, Copy)]
pub struct PlayerState {
    pub stats: EffectiveStats,
    pub health: i32,
    pub stamina: i32,
    pub modifiers: CombatModifiers,
    /// Whether a weapon is equipped
    pub armed: bool,
}

/// The enemy's side of the fight
#[derive(Debug, Clone, Copy)]
pub struct EnemyState<'a> {
    pub template: &'a Enemy,
    pub health: i32,
    /// 0 while not charging
    pub charge_turns: u32,
}

/// A player action with the content it refers to already loaded
#[derive(Debug, Clone, Copy)]
pub enum PlayerMove<'a> {
    Attack,
    Defend,
    UseItem { item: &'a Item, held: u32 },
    UseAbility(&'a Ability),
}

impl PlayerMove<'_> {
    pub fn is_defend(&self) -> bool {
        matches!(self, PlayerMove::Defend)
    }
}

/// Everything a player action changes
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerResolution {
    pub outcome: ActionOutcome,
    pub enemy_damage: i32,
    pub healed: i32,
    /// Negative when an item restores stamina
    pub stamina_spent: i32,
    pub health_spent: i32,
    /// Item effects that last until the fight ends
    pub buffs: Vec<Modifier>,
    pub consumed_item: Option<ItemId>,
}

impl PlayerResolution {
    fn new(outcome: ActionOutcome) -> Self {
        Self {
            outcome,
            enemy_damage: 0,
            healed: 0,
            stamina_spent: 0,
            health_spent: 0,
            buffs: Vec::new(),
            consumed_item: None,
        }
    }
}

/// What using a consumable item does
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsumableEffect {
    /// Health change before the cap; negative hurts
    pub health: i32,
    /// Stamina pool change; negative drains
    pub stamina: i32,
    /// Effects that last until the fight ends
    pub buffs: Vec<Modifier>,
}

impl ConsumableEffect {
    /// Sort an item's effect string into instant and lasting effects.
    ///
    /// `heal+N` and `health±N` change health now and `stamina±N` changes the
    /// combat stamina pool now. Assigning health or stamina is rejected since
    /// neither has a meaning as a buff. Cost clauses are ignored.
    pub fn parse(effect: Option<&str>) -> Result<Self, MalformedEffectError> {
        let mut parsed = Self::default();
        for modifier in parse_effects(effect)? {
            match modifier {
                Modifier::Heal { amount }
                | Modifier::StatDelta {
                    stat: Stat::Health,
                    amount,
                } => parsed.health = parsed.health.saturating_add(amount),
                Modifier::StatDelta {
                    stat: Stat::Stamina,
                    amount,
                } => parsed.stamina = parsed.stamina.saturating_add(amount),
                Modifier::StatSet {
                    stat: Stat::Health | Stat::Stamina,
                    ..
                } => {
                    return Err(MalformedEffectError::new(
                        &modifier.to_string(),
                        "consumables cannot assign health or stamina",
                    ))
                }
                Modifier::FlatCost { .. } => {}
                _ => parsed.buffs.push(modifier),
            }
        }
        Ok(parsed)
    }
}

/// Everything an enemy action changes
#[derive(Debug, Clone, PartialEq)]
pub struct EnemyResolution {
    pub outcome: ActionOutcome,
    pub player_damage: i32,
    /// Charge counter after this action
    pub charge_turns: u32,
}

/// Outcome of one opposed attack
struct Strike {
    check: OpposedCheck,
    result: OutcomeTag,
    damage: i32,
}

/// Resolves single actions under a rule set
#[derive(Debug, Clone, Default)]
pub struct ActionResolver {
    config: CombatConfig,
}

impl ActionResolver {
    pub fn new(config: CombatConfig) -> Self {
        Self { config }
    }

    /// Resolve the player's action against the enemy
    pub fn resolve_player_action(
        &self,
        action: PlayerMove<'_>,
        player: &PlayerState,
        enemy: &EnemyState<'_>,
        dice: &mut dyn DieRoller,
    ) -> Result<PlayerResolution, GameError> {
        match action {
            PlayerMove::Attack => Ok(self.player_attack(
                player,
                enemy,
                player.modifiers,
                player.stats.skill,
                dice,
                None,
            )),
            PlayerMove::Defend => Ok(PlayerResolution::new(ActionOutcome {
                actor: Actor::Player,
                action_type: "defend",
                description: "You raise your guard against the next blow.".to_string(),
                attacker_roll: None,
                defender_roll: None,
                result: OutcomeTag::NoEffect,
                damage: 0,
                healed: 0,
                target_health: player.health,
            })),
            PlayerMove::UseItem { item, held } => self.use_item(item, held, player),
            PlayerMove::UseAbility(ability) => self.use_ability(ability, player, enemy, dice),
        }
    }

    /// Resolve the enemy's automatic action for this round.
    ///
    /// Enemies with a charging special attack telegraph it first, count the
    /// counter down on each later turn, and strike when it reaches 0.
    pub fn resolve_enemy_action(
        &self,
        enemy: &EnemyState<'_>,
        player: &PlayerState,
        defending: bool,
        dice: &mut dyn DieRoller,
    ) -> EnemyResolution {
        let template = enemy.template;
        let special = template
            .special_attack
            .as_ref()
            .filter(|special| special.charge_turns > 0);

        let Some(special) = special else {
            return self.enemy_attack(enemy, player, defending, dice);
        };

        if enemy.charge_turns == 0 {
            return EnemyResolution {
                outcome: ActionOutcome {
                    actor: Actor::Enemy,
                    action_type: "charge",
                    description: special.telegraph_text.clone(),
                    attacker_roll: None,
                    defender_roll: None,
                    result: OutcomeTag::Charging,
                    damage: 0,
                    healed: 0,
                    target_health: player.health,
                },
                player_damage: 0,
                charge_turns: special.charge_turns,
            };
        }

        let remaining = enemy.charge_turns - 1;
        if remaining > 0 {
            return EnemyResolution {
                outcome: ActionOutcome {
                    actor: Actor::Enemy,
                    action_type: "charge",
                    description: format!(
                        "The {} gathers its strength for {} ({} more turn{}).",
                        template.name,
                        special.name,
                        remaining,
                        if remaining == 1 { "" } else { "s" }
                    ),
                    attacker_roll: None,
                    defender_roll: None,
                    result: OutcomeTag::Charging,
                    damage: 0,
                    healed: 0,
                    target_health: player.health,
                },
                player_damage: 0,
                charge_turns: remaining,
            };
        }

        let strike = self.strike(
            dice,
            template.skill,
            player.stats.skill,
            template.damage,
            CombatModifiers::new(),
            special.damage_multiplier,
            player.modifiers.scaled_defense(player.stats.defense),
            defending,
        );
        let damage = strike.damage.min(player.health.max(0));

        EnemyResolution {
            outcome: ActionOutcome {
                actor: Actor::Enemy,
                action_type: "special_attack",
                description: special.execute_text.clone(),
                attacker_roll: Some(strike.check.attacker),
                defender_roll: Some(strike.check.defender),
                result: strike.result,
                damage,
                healed: 0,
                target_health: player.health - damage,
            },
            player_damage: damage,
            charge_turns: 0,
        }
    }

    fn player_attack(
        &self,
        player: &PlayerState,
        enemy: &EnemyState<'_>,
        modifiers: CombatModifiers,
        skill: i32,
        dice: &mut dyn DieRoller,
        ability: Option<&Ability>,
    ) -> PlayerResolution {
        let base = if player.armed {
            self.config.weapon_damage
        } else {
            self.config.unarmed_damage
        };
        let strike = self.strike(
            dice,
            skill,
            enemy.template.skill,
            base,
            modifiers,
            1.0,
            0,
            false,
        );
        let damage = strike.damage.min(enemy.health.max(0));
        let name = &enemy.template.name;

        let opener = match ability {
            Some(ability) => format!("You use {}. ", ability.name),
            None => String::new(),
        };
        let description = match strike.result {
            OutcomeTag::CriticalHit => format!(
                "{}A critical strike! You hit the {} for {} damage.",
                opener, name, damage
            ),
            OutcomeTag::Hit => format!("{}You hit the {} for {} damage.", opener, name, damage),
            _ => format!("{}You attack the {} but miss.", opener, name),
        };

        let mut resolution = PlayerResolution::new(ActionOutcome {
            actor: Actor::Player,
            action_type: if ability.is_some() { "use_ability" } else { "attack" },
            description,
            attacker_roll: Some(strike.check.attacker),
            defender_roll: Some(strike.check.defender),
            result: strike.result,
            damage,
            healed: 0,
            target_health: enemy.health - damage,
        });
        resolution.enemy_damage = damage;
        resolution
    }

    fn enemy_attack(
        &self,
        enemy: &EnemyState<'_>,
        player: &PlayerState,
        defending: bool,
        dice: &mut dyn DieRoller,
    ) -> EnemyResolution {
        let template = enemy.template;
        let strike = self.strike(
            dice,
            template.skill,
            player.stats.skill,
            template.damage,
            CombatModifiers::new(),
            1.0,
            player.modifiers.scaled_defense(player.stats.defense),
            defending,
        );
        let damage = strike.damage.min(player.health.max(0));
        let name = &template.name;

        let description = match strike.result {
            OutcomeTag::CriticalHit => {
                format!("The {} lands a crushing blow for {} damage.", name, damage)
            }
            OutcomeTag::Hit => format!("The {} hits you for {} damage.", name, damage),
            OutcomeTag::Defended => format!(
                "You block the {}'s attack, taking only {} damage.",
                name, damage
            ),
            OutcomeTag::Evaded => format!("You evade the {}'s attack.", name),
            _ => format!("The {} attacks but misses.", name),
        };

        EnemyResolution {
            outcome: ActionOutcome {
                actor: Actor::Enemy,
                action_type: "attack",
                description,
                attacker_roll: Some(strike.check.attacker),
                defender_roll: Some(strike.check.defender),
                result: strike.result,
                damage,
                healed: 0,
                target_health: player.health - damage,
            },
            player_damage: damage,
            charge_turns: enemy.charge_turns,
        }
    }

    fn use_item(
        &self,
        item: &Item,
        held: u32,
        player: &PlayerState,
    ) -> Result<PlayerResolution, GameError> {
        if held == 0 || !item.usable {
            return Err(GameError::ItemNotAvailable(item.id));
        }
        let effect = ConsumableEffect::parse(item.effect.as_deref())
            .map_err(|e| GameError::malformed(ContentRef::Item(item.id), e))?;

        let (healed, health_spent) = if effect.health >= 0 {
            (effect.health.min(player.stats.max_health - player.health).max(0), 0)
        } else {
            (0, effect.health.saturating_neg().min(player.health.max(0)))
        };
        let stamina_cap = player.stats.stamina.max(player.stamina);
        let stamina_change = player
            .stamina
            .saturating_add(effect.stamina)
            .clamp(0, stamina_cap)
            - player.stamina;

        let mut description = format!("You use the {}", item.name);
        if healed > 0 {
            description.push_str(&format!(" and recover {} health", healed));
        }
        if health_spent > 0 {
            description.push_str(&format!(" and lose {} health", health_spent));
        }
        if stamina_change > 0 {
            description.push_str(&format!(" and recover {} stamina", stamina_change));
        }
        if stamina_change < 0 {
            description.push_str(&format!(" and lose {} stamina", -stamina_change));
        }
        if !effect.buffs.is_empty() {
            description.push_str("; its effects will last until the fight ends");
        }
        description.push('.');

        let mut resolution = PlayerResolution::new(ActionOutcome {
            actor: Actor::Player,
            action_type: "use_item",
            description,
            attacker_roll: None,
            defender_roll: None,
            result: OutcomeTag::ItemUsed,
            damage: 0,
            healed,
            target_health: player.health + healed - health_spent,
        });
        resolution.healed = healed;
        resolution.health_spent = health_spent;
        resolution.stamina_spent = -stamina_change;
        resolution.buffs = effect.buffs;
        resolution.consumed_item = Some(item.id);
        Ok(resolution)
    }

    fn use_ability(
        &self,
        ability: &Ability,
        player: &PlayerState,
        enemy: &EnemyState<'_>,
        dice: &mut dyn DieRoller,
    ) -> Result<PlayerResolution, GameError> {
        if ability.kind != AbilityKind::ActiveCombatAction {
            return Err(GameError::AbilityNotUsable(ability.id));
        }
        let modifiers = parse_effects(ability.effect.as_deref())
            .map_err(|e| GameError::malformed(ContentRef::Ability(ability.id), e))?;

        let mut stamina_cost = 0;
        let mut health_cost = 0;
        let mut heal = 0;
        for modifier in &modifiers {
            match *modifier {
                Modifier::FlatCost {
                    resource: Resource::Stamina,
                    amount,
                } => stamina_cost += amount,
                Modifier::FlatCost {
                    resource: Resource::Health,
                    amount,
                } => health_cost += amount,
                Modifier::Heal { amount } => heal += amount,
                _ => {}
            }
        }
        if stamina_cost > player.stamina {
            return Err(GameError::InsufficientStamina {
                needed: stamina_cost,
                available: player.stamina,
            });
        }
        if health_cost > 0 && health_cost >= player.health {
            return Err(GameError::InsufficientHealth {
                needed: health_cost,
                available: player.health,
            });
        }

        let mut stats = player.stats;
        stats.apply_all(&modifiers);
        let mut offense = player.modifiers;
        offense.apply_all(&modifiers);

        let mut resolution =
            self.player_attack(player, enemy, offense, stats.skill, dice, Some(ability));

        let health_after_cost = player.health - health_cost;
        let healed = heal
            .min(player.stats.max_health - health_after_cost)
            .max(0);
        resolution.stamina_spent = stamina_cost;
        resolution.health_spent = health_cost;
        resolution.healed = healed;
        resolution.outcome.healed = healed;
        Ok(resolution)
    }

    #[allow(clippy::too_many_arguments)]
    fn strike(
        &self,
        dice: &mut dyn DieRoller,
        attacker_skill: i32,
        defender_skill: i32,
        base_damage: i32,
        modifiers: CombatModifiers,
        special_multiplier: f64,
        defense: i32,
        defending: bool,
    ) -> Strike {
        let check = OpposedCheck::roll(dice, self.config.die_sides, attacker_skill, defender_skill);

        if !check.hit() {
            let result = if defending {
                OutcomeTag::Evaded
            } else {
                OutcomeTag::Miss
            };
            return Strike {
                check,
                result,
                damage: 0,
            };
        }

        let critical = check.critical(self.config.critical_margin);
        let damage = Hit {
            base_damage,
            modifiers,
            special_multiplier,
            critical_multiplier: critical.then_some(self.config.critical_multiplier),
            defense,
            defending,
        }
        .resolve(self.config.min_hit_damage);

        let result = if defending {
            OutcomeTag::Defended
        } else if critical {
            OutcomeTag::CriticalHit
        } else {
            OutcomeTag::Hit
        };

        Strike {
            check,
            result,
            damage: damage.final_damage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::dice::ScriptedDice;
    use crate::models::{ItemKind, SpecialAttack};

    fn player() -> PlayerState {
        PlayerState {
            stats: EffectiveStats {
                max_health: 100,
                skill: 10,
                luck: 5,
                stamina: 20,
                defense: 0,
            },
            health: 80,
            stamina: 20,
            modifiers: CombatModifiers::new(),
            armed: true,
        }
    }

    fn ogre() -> Enemy {
        Enemy {
            id: 1,
            name: "Morcos Ogre".to_string(),
            health: 60,
            skill: 12,
            damage: 6,
            xp_reward: 50,
            special_attack: Some(SpecialAttack {
                name: "Crushing Blow".to_string(),
                damage_multiplier: 2.5,
                charge_turns: 1,
                telegraph_text: "The ogre raises its club high above its head.".to_string(),
                execute_text: "The club comes crashing down!".to_string(),
            }),
        }
    }

    fn goblin() -> Enemy {
        Enemy {
            id: 2,
            name: "Goblin".to_string(),
            health: 10,
            skill: 5,
            damage: 3,
            xp_reward: 10,
            special_attack: None,
        }
    }

    fn potion(effect: &str) -> Item {
        Item {
            id: 7,
            name: "Healing Draught".to_string(),
            kind: ItemKind::Potion,
            effect: Some(effect.to_string()),
            usable: true,
        }
    }

    #[test]
    fn test_parse_actions() {
        assert_eq!(
            PlayerAction::parse("attack", None, None).unwrap(),
            PlayerAction::Attack
        );
        assert_eq!(
            PlayerAction::parse("DEFEND", Some(-3), None).unwrap(),
            PlayerAction::Defend
        );
        assert_eq!(
            PlayerAction::parse("use_item", Some(4), None).unwrap(),
            PlayerAction::UseItem(4)
        );
        assert!(matches!(
            PlayerAction::parse("use_item", None, None),
            Err(GameError::InvalidItemId(_))
        ));
        assert!(matches!(
            PlayerAction::parse("use_item", Some(0), None),
            Err(GameError::InvalidItemId(_))
        ));
        assert!(matches!(
            PlayerAction::parse("flee", None, None),
            Err(GameError::InvalidAction(_))
        ));
    }

    #[test]
    fn test_player_hit() {
        let resolver = ActionResolver::default();
        let enemy = goblin();
        let state = EnemyState {
            template: &enemy,
            health: 10,
            charge_turns: 0,
        };
        // 12 + 10 = 22 vs 8 + 5 = 13
        let mut dice = ScriptedDice::new([12, 8]);
        let r = resolver
            .resolve_player_action(PlayerMove::Attack, &player(), &state, &mut dice)
            .unwrap();
        assert_eq!(r.outcome.result, OutcomeTag::Hit);
        assert_eq!(r.enemy_damage, 5);
        assert_eq!(r.outcome.target_health, 5);
        assert_eq!(r.outcome.attacker_roll.unwrap().total, 22);
    }

    #[test]
    fn test_player_critical() {
        let resolver = ActionResolver::default();
        let enemy = ogre();
        let state = EnemyState {
            template: &enemy,
            health: 60,
            charge_turns: 0,
        };
        // 20 + 10 = 30 vs 1 + 12 = 13, margin 17
        let mut dice = ScriptedDice::new([20, 1]);
        let r = resolver
            .resolve_player_action(PlayerMove::Attack, &player(), &state, &mut dice)
            .unwrap();
        assert_eq!(r.outcome.result, OutcomeTag::CriticalHit);
        assert_eq!(r.enemy_damage, 10);
    }

    #[test]
    fn test_player_miss_on_tie() {
        let resolver = ActionResolver::default();
        let enemy = ogre();
        let state = EnemyState {
            template: &enemy,
            health: 60,
            charge_turns: 0,
        };
        // 12 + 10 = 22 vs 10 + 12 = 22
        let mut dice = ScriptedDice::new([12, 10]);
        let r = resolver
            .resolve_player_action(PlayerMove::Attack, &player(), &state, &mut dice)
            .unwrap();
        assert_eq!(r.outcome.result, OutcomeTag::Miss);
        assert_eq!(r.enemy_damage, 0);
    }

    #[test]
    fn test_damage_never_exceeds_enemy_health() {
        let resolver = ActionResolver::default();
        let enemy = goblin();
        let state = EnemyState {
            template: &enemy,
            health: 2,
            charge_turns: 0,
        };
        let mut dice = ScriptedDice::new([15, 1]);
        let r = resolver
            .resolve_player_action(PlayerMove::Attack, &player(), &state, &mut dice)
            .unwrap();
        assert_eq!(r.enemy_damage, 2);
        assert_eq!(r.outcome.target_health, 0);
    }

    #[test]
    fn test_hit_deals_minimum_through_heavy_defense() {
        let resolver = ActionResolver::default();
        let enemy = goblin();
        let state = EnemyState {
            template: &enemy,
            health: 10,
            charge_turns: 0,
        };
        let mut armored = player();
        armored.stats.defense = 50;
        // goblin 15 + 5 = 20 vs 5 + 10 = 15
        let mut dice = ScriptedDice::new([15, 5]);
        let r = resolver.resolve_enemy_action(&state, &armored, false, &mut dice);
        assert_eq!(r.outcome.result, OutcomeTag::Hit);
        assert_eq!(r.player_damage, 1);
    }

    #[test]
    fn test_enemy_vs_defending_player() {
        let resolver = ActionResolver::default();
        let enemy = goblin();
        let state = EnemyState {
            template: &enemy,
            health: 10,
            charge_turns: 0,
        };

        let mut dice = ScriptedDice::new([2, 15]);
        let r = resolver.resolve_enemy_action(&state, &player(), true, &mut dice);
        assert_eq!(r.outcome.result, OutcomeTag::Evaded);
        assert_eq!(r.player_damage, 0);

        let mut dice = ScriptedDice::new([20, 1]);
        let r = resolver.resolve_enemy_action(&state, &player(), true, &mut dice);
        assert_eq!(r.outcome.result, OutcomeTag::Defended);
        // crit 3 * 2 = 6, halved
        assert_eq!(r.player_damage, 3);
    }

    #[test]
    fn test_special_attack_telegraph_then_execute() {
        let resolver = ActionResolver::default();
        let enemy = ogre();
        let p = player();

        let round1 = EnemyState {
            template: &enemy,
            health: 60,
            charge_turns: 0,
        };
        let mut dice = ScriptedDice::new([]);
        let r = resolver.resolve_enemy_action(&round1, &p, false, &mut dice);
        assert_eq!(r.outcome.result, OutcomeTag::Charging);
        assert_eq!(r.player_damage, 0);
        assert_eq!(r.charge_turns, 1);
        assert_eq!(
            r.outcome.description,
            "The ogre raises its club high above its head."
        );

        let round2 = EnemyState {
            template: &enemy,
            health: 60,
            charge_turns: r.charge_turns,
        };
        // 10 + 12 = 22 vs 5 + 10 = 15, margin 7: plain hit
        let mut dice = ScriptedDice::new([10, 5]);
        let r = resolver.resolve_enemy_action(&round2, &p, false, &mut dice);
        assert_eq!(r.outcome.action_type, "special_attack");
        assert_eq!(r.outcome.result, OutcomeTag::Hit);
        assert_eq!(r.player_damage, 15);
        assert_eq!(r.charge_turns, 0);
        assert_eq!(r.outcome.description, "The club comes crashing down!");
    }

    #[test]
    fn test_long_charge_counts_down() {
        let resolver = ActionResolver::default();
        let mut enemy = ogre();
        if let Some(special) = enemy.special_attack.as_mut() {
            special.charge_turns = 3;
        }
        let p = player();
        let mut dice = ScriptedDice::new([]);

        let state = EnemyState {
            template: &enemy,
            health: 60,
            charge_turns: 3,
        };
        let r = resolver.resolve_enemy_action(&state, &p, false, &mut dice);
        assert_eq!(r.outcome.result, OutcomeTag::Charging);
        assert_eq!(r.charge_turns, 2);
    }

    #[test]
    fn test_zero_charge_special_is_standard_attack() {
        let resolver = ActionResolver::default();
        let mut enemy = ogre();
        if let Some(special) = enemy.special_attack.as_mut() {
            special.charge_turns = 0;
        }
        let state = EnemyState {
            template: &enemy,
            health: 60,
            charge_turns: 0,
        };
        let mut dice = ScriptedDice::new([10, 5]);
        let r = resolver.resolve_enemy_action(&state, &player(), false, &mut dice);
        assert_eq!(r.outcome.action_type, "attack");
        assert_eq!(r.player_damage, 6);
    }

    #[test]
    fn test_use_item_heals_to_cap() {
        let resolver = ActionResolver::default();
        let enemy = goblin();
        let state = EnemyState {
            template: &enemy,
            health: 10,
            charge_turns: 0,
        };
        let item = potion("heal+50;skill+2");
        let mut dice = ScriptedDice::new([]);
        let r = resolver
            .resolve_player_action(
                PlayerMove::UseItem {
                    item: &item,
                    held: 1,
                },
                &player(),
                &state,
                &mut dice,
            )
            .unwrap();
        assert_eq!(r.outcome.result, OutcomeTag::ItemUsed);
        assert_eq!(r.healed, 20);
        assert_eq!(r.outcome.target_health, 100);
        assert_eq!(r.consumed_item, Some(7));
        assert_eq!(
            r.buffs,
            vec![Modifier::StatDelta {
                stat: crate::combat::Stat::Skill,
                amount: 2
            }]
        );
    }

    #[test]
    fn test_consumable_effect_sorting() {
        let effect =
            ConsumableEffect::parse(Some("health+10;heal+5;stamina+5;damage+2;stamina_cost:3"))
                .unwrap();
        assert_eq!(effect.health, 15);
        assert_eq!(effect.stamina, 5);
        assert_eq!(
            effect.buffs,
            vec![Modifier::StatDelta {
                stat: Stat::Damage,
                amount: 2
            }]
        );

        let err = ConsumableEffect::parse(Some("heal+5;health:50")).unwrap_err();
        assert_eq!(err.clause, "health:50");
        let err = ConsumableEffect::parse(Some("stamina:3")).unwrap_err();
        assert_eq!(err.clause, "stamina:3");
    }

    #[test]
    fn test_use_item_restores_health_and_stamina() {
        let resolver = ActionResolver::default();
        let enemy = goblin();
        let state = EnemyState {
            template: &enemy,
            health: 10,
            charge_turns: 0,
        };
        let mut tired = player();
        tired.stamina = 12;
        let mut dice = ScriptedDice::new([]);

        let item = potion("health+10;stamina+5");
        let r = resolver
            .resolve_player_action(
                PlayerMove::UseItem {
                    item: &item,
                    held: 1,
                },
                &tired,
                &state,
                &mut dice,
            )
            .unwrap();
        assert_eq!(r.healed, 10);
        assert_eq!(r.stamina_spent, -5);
        assert!(r.buffs.is_empty());
        assert!(!r.outcome.description.contains("until the fight ends"));
        assert!(r.outcome.description.contains("recover 5 stamina"));

        // the pool never exceeds effective stamina
        let item = potion("stamina+50");
        let r = resolver
            .resolve_player_action(
                PlayerMove::UseItem {
                    item: &item,
                    held: 1,
                },
                &tired,
                &state,
                &mut dice,
            )
            .unwrap();
        assert_eq!(r.stamina_spent, -8);

        let item = potion("health-5");
        let r = resolver
            .resolve_player_action(
                PlayerMove::UseItem {
                    item: &item,
                    held: 1,
                },
                &tired,
                &state,
                &mut dice,
            )
            .unwrap();
        assert_eq!(r.healed, 0);
        assert_eq!(r.health_spent, 5);
        assert_eq!(r.outcome.target_health, 75);
    }

    #[test]
    fn test_use_item_not_held_or_not_usable() {
        let resolver = ActionResolver::default();
        let enemy = goblin();
        let state = EnemyState {
            template: &enemy,
            health: 10,
            charge_turns: 0,
        };
        let mut dice = ScriptedDice::new([]);

        let item = potion("heal+10");
        let err = resolver
            .resolve_player_action(
                PlayerMove::UseItem {
                    item: &item,
                    held: 0,
                },
                &player(),
                &state,
                &mut dice,
            )
            .unwrap_err();
        assert!(matches!(err, GameError::ItemNotAvailable(7)));

        let mut sword = potion("damage+2");
        sword.usable = false;
        let err = resolver
            .resolve_player_action(
                PlayerMove::UseItem {
                    item: &sword,
                    held: 1,
                },
                &player(),
                &state,
                &mut dice,
            )
            .unwrap_err();
        assert!(matches!(err, GameError::ItemNotAvailable(7)));
    }

    #[test]
    fn test_use_item_malformed_effect() {
        let resolver = ActionResolver::default();
        let enemy = goblin();
        let state = EnemyState {
            template: &enemy,
            health: 10,
            charge_turns: 0,
        };
        let item = potion("heal+10;glow");
        let mut dice = ScriptedDice::new([]);
        let err = resolver
            .resolve_player_action(
                PlayerMove::UseItem {
                    item: &item,
                    held: 1,
                },
                &player(),
                &state,
                &mut dice,
            )
            .unwrap_err();
        assert!(matches!(err, GameError::MalformedEffect { .. }));
    }

    #[test]
    fn test_use_ability() {
        let resolver = ActionResolver::default();
        let enemy = ogre();
        let state = EnemyState {
            template: &enemy,
            health: 60,
            charge_turns: 0,
        };
        let ability = Ability {
            id: 3,
            name: "Power Strike".to_string(),
            kind: AbilityKind::ActiveCombatAction,
            effect: Some("damage_multiplier:1.5;stamina_cost:10".to_string()),
            talent_point_cost: 1,
            level_requirement: 1,
            prerequisites: vec![],
            allowed_archetype_ids: None,
        };
        // 14 + 10 = 24 vs 5 + 12 = 17
        let mut dice = ScriptedDice::new([14, 5]);
        let r = resolver
            .resolve_player_action(PlayerMove::UseAbility(&ability), &player(), &state, &mut dice)
            .unwrap();
        assert_eq!(r.outcome.action_type, "use_ability");
        assert_eq!(r.stamina_spent, 10);
        // 5 * 1.5 = 7.5, rounded down
        assert_eq!(r.enemy_damage, 7);

        let mut tired = player();
        tired.stamina = 4;
        let err = resolver
            .resolve_player_action(PlayerMove::UseAbility(&ability), &tired, &state, &mut dice)
            .unwrap_err();
        assert!(matches!(
            err,
            GameError::InsufficientStamina {
                needed: 10,
                available: 4
            }
        ));
    }

    #[test]
    fn test_passive_ability_cannot_be_used() {
        let resolver = ActionResolver::default();
        let enemy = ogre();
        let state = EnemyState {
            template: &enemy,
            health: 60,
            charge_turns: 0,
        };
        let ability = Ability {
            id: 4,
            name: "Toughness".to_string(),
            kind: AbilityKind::PassiveStat,
            effect: Some("defense+1".to_string()),
            talent_point_cost: 1,
            level_requirement: 1,
            prerequisites: vec![],
            allowed_archetype_ids: None,
        };
        let mut dice = ScriptedDice::new([]);
        let err = resolver
            .resolve_player_action(PlayerMove::UseAbility(&ability), &player(), &state, &mut dice)
            .unwrap_err();
        assert!(matches!(err, GameError::AbilityNotUsable(4)));
    }
}
